use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub created_at: i64,
}

/// A mutual pair. `user_low < user_high` under the Uuid total order, so one
/// row represents the unordered pair regardless of who liked last.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: Uuid,
    pub user_low: Uuid,
    pub user_high: Uuid,
    pub created_at: i64,
}

impl Match {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user_low == user_id || self.user_high == user_id
    }

    /// The participant other than `user_id`, if `user_id` is in the match.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user_low == user_id {
            Some(self.user_high)
        } else if self.user_high == user_id {
            Some(self.user_low)
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    /// Per-match send order, strictly increasing, assigned by the store.
    pub seq: i64,
    pub created_at: i64,
    pub read_at: Option<i64>,
}

/// One entry of a user's match list.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub other_user: User,
    pub created_at: i64,
    pub last_message: Option<Message>,
    pub unread: u32,
}
