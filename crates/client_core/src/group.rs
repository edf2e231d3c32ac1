//! Group creation: pick a name and members among the user's contacts.

use std::sync::Arc;

use shared::{
    domain::{UserId, UserSummary},
    protocol::CreateGroupRequest,
};
use tracing::{info, warn};

use crate::{api::ApiClient, error::ApiClientError, events::ClientEvent};

pub const GROUP_CREATED_NOTICE: &str = "Group created successfully!";
pub const GROUP_FAILED_NOTICE: &str = "Error creating group. Please try again.";

#[derive(Debug, Clone, Default)]
pub struct GroupDraft {
    owner: Option<UserId>,
    name: String,
    candidates: Vec<UserSummary>,
    selected: Vec<UserId>,
}

impl GroupDraft {
    pub fn new(owner: UserId, contacts: Vec<UserSummary>) -> Self {
        Self {
            owner: Some(owner),
            name: String::new(),
            candidates: contacts
                .into_iter()
                .filter(|user| user.id != owner)
                .collect(),
            selected: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn candidates(&self) -> &[UserSummary] {
        &self.candidates
    }

    pub fn selected(&self) -> &[UserId] {
        &self.selected
    }

    /// Flips the selection of `user_id`; returns whether it is now selected.
    /// Ids that are not candidates are ignored.
    pub fn toggle(&mut self, user_id: UserId) -> bool {
        if let Some(pos) = self.selected.iter().position(|id| *id == user_id) {
            self.selected.remove(pos);
            return false;
        }
        if self.candidates.iter().any(|user| user.id == user_id) {
            self.selected.push(user_id);
            return true;
        }
        false
    }

    pub fn can_submit(&self) -> bool {
        !self.name.trim().is_empty() && !self.selected.is_empty()
    }

    /// Clears name and selection, keeping the candidate list.
    pub fn reset(&mut self) {
        self.name.clear();
        self.selected.clear();
    }

    /// Request body for the creation endpoint. The owner is always a member.
    pub fn to_request(&self) -> Result<CreateGroupRequest, ApiClientError> {
        if self.name.trim().is_empty() {
            return Err(ApiClientError::Validation(
                "Group name is required".to_string(),
            ));
        }
        if self.selected.is_empty() {
            return Err(ApiClientError::Validation(
                "Select at least one member".to_string(),
            ));
        }
        let mut members = self.selected.clone();
        if let Some(owner) = self.owner {
            if !members.contains(&owner) {
                members.push(owner);
            }
        }
        Ok(CreateGroupRequest {
            name: self.name.trim().to_string(),
            members,
        })
    }
}

pub struct GroupCreator {
    api: Arc<ApiClient>,
}

impl GroupCreator {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn draft(&self) -> Result<GroupDraft, ApiClientError> {
        let session = self.api.session().require().await?;
        let contacts = self.api.list_users(session.user_id()).await?;
        Ok(GroupDraft::new(session.user_id(), contacts))
    }

    /// Submits the draft. On success the draft is reset; either way a single
    /// notice is emitted.
    pub async fn submit(&self, draft: &mut GroupDraft) -> Result<(), ApiClientError> {
        let request = draft.to_request()?;
        let events = self.api.session().events();
        match self.api.create_group(&request).await {
            Ok(_) => {
                info!(
                    name = %request.name,
                    members = request.members.len(),
                    "group: created"
                );
                draft.reset();
                let _ = events.send(ClientEvent::Notice(GROUP_CREATED_NOTICE.to_string()));
                Ok(())
            }
            Err(err) => {
                warn!(name = %request.name, "group: creation failed: {err}");
                let _ = events.send(ClientEvent::Notice(GROUP_FAILED_NOTICE.to_string()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/group_tests.rs"]
mod tests;
