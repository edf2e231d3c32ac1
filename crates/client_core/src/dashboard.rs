//! Conversation list: contacts and groups of the signed-in user.

use std::{collections::HashSet, fmt, str::FromStr, sync::Arc};

use shared::domain::{GroupSummary, UserId, UserSummary};
use tracing::{info, warn};

use crate::{
    api::ApiClient,
    error::ApiClientError,
    events::{ClientEvent, Route},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    All,
    Unread,
    Favorites,
    Groups,
}

impl DashboardTab {
    pub const ALL: [DashboardTab; 4] = [Self::All, Self::Unread, Self::Favorites, Self::Groups];

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Unread => "Unread",
            Self::Favorites => "Favorites",
            Self::Groups => "Groups",
        }
    }
}

impl fmt::Display for DashboardTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DashboardTab {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.label().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown tab: {raw}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEntry {
    Direct(UserSummary),
    Group(GroupSummary),
}

impl ConversationEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Direct(user) => &user.name,
            Self::Group(group) => &group.name,
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Self::Direct(user) => Route::DirectChat {
                peer: user.id,
                peer_name: user.name.clone(),
            },
            Self::Group(group) => Route::GroupChat {
                group: group.id,
                group_name: group.name.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardData {
    contacts: Vec<UserSummary>,
    groups: Vec<GroupSummary>,
}

impl DashboardData {
    /// Drops the current user from the contacts and keeps the first
    /// occurrence of each group id.
    pub fn new(me: UserId, users: Vec<UserSummary>, groups: Vec<GroupSummary>) -> Self {
        let contacts = users.into_iter().filter(|user| user.id != me).collect();
        let mut seen = HashSet::new();
        let groups = groups
            .into_iter()
            .filter(|group| seen.insert(group.id))
            .collect();
        Self { contacts, groups }
    }

    pub fn contacts(&self) -> &[UserSummary] {
        &self.contacts
    }

    pub fn groups(&self) -> &[GroupSummary] {
        &self.groups
    }

    pub fn entries(&self, tab: DashboardTab, search: &str) -> Vec<ConversationEntry> {
        let needle = search.trim().to_lowercase();
        let matches = |name: &str| needle.is_empty() || name.to_lowercase().contains(&needle);

        match tab {
            DashboardTab::Groups => self
                .groups
                .iter()
                .filter(|group| matches(&group.name))
                .cloned()
                .map(ConversationEntry::Group)
                .collect(),
            DashboardTab::All | DashboardTab::Unread | DashboardTab::Favorites => self
                .contacts
                .iter()
                .filter(|user| match tab {
                    DashboardTab::Unread => user.unread > 0,
                    DashboardTab::Favorites => user.pinned,
                    _ => true,
                })
                .filter(|user| matches(&user.name))
                .cloned()
                .map(ConversationEntry::Direct)
                .collect(),
        }
    }
}

pub struct Dashboard {
    api: Arc<ApiClient>,
}

impl Dashboard {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Fetches contacts and groups. The two lists load independently; a
    /// failure of one leaves it empty unless the session was rejected.
    pub async fn load(&self) -> Result<DashboardData, ApiClientError> {
        let session = self.api.session().require().await?;
        let me = session.user_id();

        let (users, groups) = tokio::join!(self.api.list_users(me), self.api.list_groups(me));
        if matches!(users, Err(ApiClientError::Unauthorized))
            || matches!(groups, Err(ApiClientError::Unauthorized))
        {
            return Err(ApiClientError::Unauthorized);
        }

        let users = users.unwrap_or_else(|err| {
            warn!("dashboard: failed to fetch users: {err}");
            Vec::new()
        });
        let groups = groups.unwrap_or_else(|err| {
            warn!("dashboard: failed to fetch groups: {err}");
            Vec::new()
        });

        let data = DashboardData::new(me, users, groups);
        info!(
            contacts = data.contacts.len(),
            groups = data.groups.len(),
            "dashboard: loaded"
        );
        Ok(data)
    }

    pub fn open(&self, entry: &ConversationEntry) -> Route {
        let route = entry.route();
        let _ = self
            .api
            .session()
            .events()
            .send(ClientEvent::Navigate(route.clone()));
        route
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
