//! Client-wide events and navigation targets.

use shared::domain::{GroupId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    DirectChat { peer: UserId, peer_name: String },
    GroupChat { group: GroupId, group_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Navigate(Route),
    /// Blocking-alert style message for the user.
    Notice(String),
    SessionChanged { user_id: Option<UserId> },
    Error(String),
}
