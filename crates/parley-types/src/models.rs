use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RoomId = i64;
pub type MembershipId = i64;
pub type MessageId = i64;
pub type EmojiId = i64;

/// Preview shown for a room that has no messages.
pub const NO_MESSAGES_PREVIEW: &str = "No messages yet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Room {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled group")
    }
}

/// A user's seat in a room, with their read progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub last_read_message_id: Option<MessageId>,
}

/// A message as stored. The room is reached through `membership_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub membership_id: MembershipId,
    pub author_id: UserId,
    pub author_username: String,
    pub sent_at: DateTime<Utc>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    pub id: EmojiId,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    pub count: usize,
    pub reacted_by_viewer: bool,
}

/// Emoji name -> tally, for a single message.
pub type ReactionSummary = BTreeMap<String, ReactionTally>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub message: Message,
    pub reactions: ReactionSummary,
    /// Set on the first unread message of this view only; never persisted.
    pub unread_start: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub room: Room,
    pub read: Vec<ChatMessage>,
    pub unread: Vec<ChatMessage>,
    /// Users who are not members yet.
    pub invitable: Vec<User>,
    pub emoji: Vec<Emoji>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub room: Room,
    pub unread_count: u64,
    pub preview_text: String,
}
