//! Row types that carry columns the domain types leave out.

use parley_types::models::{MessageId, User, UserId};

/// Credential row. The hash stays out of `parley_types::models::User`.
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
        }
    }
}

/// One reaction joined with its emoji name.
pub struct ReactionRow {
    pub message_id: MessageId,
    pub emoji: String,
    pub user_id: UserId,
}
