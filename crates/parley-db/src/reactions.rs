use std::collections::HashMap;

use rusqlite::{Connection, params_from_iter};

use parley_types::models::{MessageId, ReactionSummary, RoomId, ToggleOutcome, UserId};

use crate::emoji::query_emoji_id;
use crate::error::{Constraint, violated_constraint};
use crate::memberships::query_membership;
use crate::messages::query_room_of_message;
use crate::models::ReactionRow;
use crate::{Database, Result, StoreError, placeholders};

impl Database {
    // -- Reaction store --

    /// Toggle a reaction: removes it if present, adds it otherwise.
    pub fn toggle_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
        emoji_name: &str,
    ) -> Result<ToggleOutcome> {
        self.with_tx(|tx| toggle(tx, message_id, user_id, emoji_name))
    }

    /// Toggles a reaction for a member of the message's room and returns the
    /// room it landed in.
    pub fn react(
        &self,
        message_id: MessageId,
        user_id: UserId,
        emoji_name: &str,
    ) -> Result<(ToggleOutcome, RoomId)> {
        self.with_tx(|tx| {
            // Unknown emoji wins over every other failure.
            query_emoji_id(tx, emoji_name)?
                .ok_or_else(|| StoreError::UnknownEmoji(emoji_name.to_string()))?;
            let room_id = query_room_of_message(tx, message_id)?
                .ok_or_else(|| StoreError::NotFound(format!("message {}", message_id)))?;
            if query_membership(tx, room_id, user_id)?.is_none() {
                return Err(StoreError::NotAMember);
            }
            let outcome = toggle(tx, message_id, user_id, emoji_name)?;
            Ok((outcome, room_id))
        })
    }

    /// Per message, reactions grouped by emoji name with counts and whether
    /// `viewer` is among the reactors. Messages without reactions are absent.
    pub fn summarize_reactions(
        &self,
        message_ids: &[MessageId],
        viewer: UserId,
    ) -> Result<HashMap<MessageId, ReactionSummary>> {
        self.with_conn(|conn| {
            let rows = query_reactions(conn, message_ids)?;
            Ok(summarize(&rows, viewer))
        })
    }
}

pub(crate) fn toggle(
    conn: &Connection,
    message_id: MessageId,
    user_id: UserId,
    emoji_name: &str,
) -> Result<ToggleOutcome> {
    let emoji_id = query_emoji_id(conn, emoji_name)?
        .ok_or_else(|| StoreError::UnknownEmoji(emoji_name.to_string()))?;

    let removed = conn.execute(
        "DELETE FROM emoji_message_users
         WHERE message_id = ?1 AND user_id = ?2 AND emoji_id = ?3",
        (message_id, user_id, emoji_id),
    )?;
    if removed > 0 {
        return Ok(ToggleOutcome::Removed);
    }

    conn.execute(
        "INSERT INTO emoji_message_users (message_id, user_id, emoji_id) VALUES (?1, ?2, ?3)
         ON CONFLICT (message_id, user_id, emoji_id) DO NOTHING",
        (message_id, user_id, emoji_id),
    )
    .map_err(|e| match violated_constraint(&e) {
        Some(Constraint::ForeignKey) => StoreError::NotFound(format!("message {}", message_id)),
        _ => e.into(),
    })?;
    Ok(ToggleOutcome::Added)
}

/// Batch-fetch reactions for a set of message IDs.
pub(crate) fn query_reactions(
    conn: &Connection,
    message_ids: &[MessageId],
) -> Result<Vec<ReactionRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT r.message_id, e.name, r.user_id
         FROM emoji_message_users r
         JOIN emoji e ON e.emoji_id = r.emoji_id
         WHERE r.message_id IN ({})",
        placeholders(1, message_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(message_ids), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                emoji: row.get(1)?,
                user_id: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn summarize(
    rows: &[ReactionRow],
    viewer: UserId,
) -> HashMap<MessageId, ReactionSummary> {
    let mut summaries: HashMap<MessageId, ReactionSummary> = HashMap::new();
    for row in rows {
        let tally = summaries
            .entry(row.message_id)
            .or_default()
            .entry(row.emoji.clone())
            .or_default();
        tally.count += 1;
        tally.reacted_by_viewer |= row.user_id == viewer;
    }
    summaries
}
