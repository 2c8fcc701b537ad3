use parley_types::models::{ChatMessage, ChatView, MembershipId, RoomId, UserId};

use crate::directory::query_room;
use crate::emoji::query_emoji;
use crate::memberships::{query_room_memberships, update_read_pointer};
use crate::messages::{query_latest_message, query_messages};
use crate::reactions::{query_reactions, summarize};
use crate::users::query_users_outside_room;
use crate::{Database, Result, StoreError};

impl Database {
    /// Builds the viewer's read/unread split of a room and then marks the
    /// whole room read for them.
    ///
    /// The split uses the read pointer as it was before this call, so a
    /// second call right after shows nothing unread. Runs in one transaction:
    /// if loading fails the pointer does not move.
    pub fn build_chat_view(&self, room_id: RoomId, viewer: UserId) -> Result<ChatView> {
        self.with_tx(|tx| {
            let room = query_room(tx, room_id)?
                .ok_or_else(|| StoreError::NotFound(format!("room {}", room_id)))?;

            let memberships = query_room_memberships(tx, room_id)?;
            let last_read = memberships
                .iter()
                .find(|m| m.user_id == viewer)
                .and_then(|m| m.last_read_message_id)
                .unwrap_or(0);
            let member_ids: Vec<MembershipId> = memberships.iter().map(|m| m.id).collect();

            let messages = query_messages(tx, &member_ids)?;
            let message_ids: Vec<_> = messages.iter().map(|m| m.id).collect();
            let mut summaries = summarize(&query_reactions(tx, &message_ids)?, viewer);

            let mut read = Vec::new();
            let mut unread: Vec<ChatMessage> = Vec::new();
            for message in messages {
                let reactions = summaries.remove(&message.id).unwrap_or_default();
                let entry = ChatMessage {
                    message,
                    reactions,
                    unread_start: false,
                };
                if entry.message.id <= last_read {
                    read.push(entry);
                } else {
                    unread.push(entry);
                }
            }
            if let Some(first) = unread.iter_mut().min_by_key(|m| m.message.id) {
                first.unread_start = true;
            }

            if let Some(latest) = query_latest_message(tx, &member_ids)? {
                update_read_pointer(tx, room_id, viewer, latest.id)?;
            }

            Ok(ChatView {
                room,
                read,
                unread,
                invitable: query_users_outside_room(tx, room_id)?,
                emoji: query_emoji(tx)?,
            })
        })
    }
}
