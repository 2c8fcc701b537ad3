use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use parley_types::models::{
    MembershipId, NO_MESSAGES_PREVIEW, Room, RoomId, RoomSummary, UserId,
};

use crate::memberships::{
    insert_membership, insert_membership_if_absent, membership_from_row, query_room_memberships,
};
use crate::messages::{count_messages, query_latest_message, query_message};
use crate::{Database, Result, StoreError, format_timestamp, timestamp_at};

impl Database {
    // -- Room directory --

    pub fn get_room(&self, room_id: RoomId) -> Result<Option<Room>> {
        self.with_conn(|conn| query_room(conn, room_id))
    }

    /// Creates a room whose members are `member_ids` plus the creator.
    pub fn create_room(
        &self,
        name: &str,
        creator: UserId,
        member_ids: &[UserId],
    ) -> Result<RoomId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("Group name is required".into()));
        }

        let mut members: BTreeSet<UserId> = member_ids.iter().copied().collect();
        members.insert(creator);

        let room_id = self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO rooms (name, start_datetime) VALUES (?1, ?2)",
                (name, format_timestamp(Utc::now())),
            )?;
            let room_id = tx.last_insert_rowid();
            for user_id in &members {
                insert_membership(tx, room_id, *user_id)?;
            }
            Ok(room_id)
        })?;

        info!("Room {} '{}' created with {} members", room_id, name, members.len());
        Ok(room_id)
    }

    /// Adds every user in `user_ids` who is not already a member. Returns how
    /// many were added; existing members are skipped silently.
    pub fn invite_users(&self, room_id: RoomId, user_ids: &[UserId]) -> Result<usize> {
        let wanted: BTreeSet<UserId> = user_ids.iter().copied().collect();

        let added = self.with_tx(|tx| {
            if query_room(tx, room_id)?.is_none() {
                return Err(StoreError::NotFound(format!("room {}", room_id)));
            }
            let mut added = 0;
            for user_id in &wanted {
                if insert_membership_if_absent(tx, room_id, *user_id)? {
                    added += 1;
                }
            }
            Ok(added)
        })?;

        info!("Invited {} of {} users to room {}", added, wanted.len(), room_id);
        Ok(added)
    }

    /// The viewer's rooms with unread counts and the latest message as preview.
    pub fn list_rooms_for_user(&self, user_id: UserId) -> Result<Vec<RoomSummary>> {
        self.with_conn(|conn| {
            // One deferred read transaction, so every count and preview
            // comes from the same snapshot.
            let tx = conn.unchecked_transaction()?;
            let mut stmt = tx.prepare(
                "SELECT room_user_id, user_id, room_id, last_read_message_id
                 FROM room_users WHERE user_id = ?1 ORDER BY room_id",
            )?;
            let memberships = stmt
                .query_map([user_id], membership_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut summaries = Vec::with_capacity(memberships.len());
            for membership in memberships {
                let room = query_room(&tx, membership.room_id)?.ok_or_else(|| {
                    StoreError::NotFound(format!("room {}", membership.room_id))
                })?;
                let member_ids: Vec<MembershipId> = query_room_memberships(&tx, room.id)?
                    .into_iter()
                    .map(|m| m.id)
                    .collect();

                let last_read = match membership.last_read_message_id {
                    Some(id) => query_message(&tx, id)?,
                    None => None,
                };
                // Never read: everything in the room counts as unread.
                let unread_count =
                    count_messages(&tx, &member_ids, last_read.map(|m| m.sent_at))?;

                let preview_text = match query_latest_message(&tx, &member_ids)? {
                    Some(latest) => latest.text.unwrap_or_default(),
                    None => NO_MESSAGES_PREVIEW.to_string(),
                };

                summaries.push(RoomSummary {
                    room,
                    unread_count,
                    preview_text,
                });
            }
            drop(stmt);
            tx.commit()?;
            Ok(summaries)
        })
    }
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        started_at: timestamp_at(row, 2)?,
    })
}

pub(crate) fn query_room(conn: &Connection, room_id: RoomId) -> Result<Option<Room>> {
    let room = conn
        .query_row(
            "SELECT room_id, name, start_datetime FROM rooms WHERE room_id = ?1",
            [room_id],
            room_from_row,
        )
        .optional()?;
    Ok(room)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use parley_types::models::NO_MESSAGES_PREVIEW;

    use crate::StoreError;
    use crate::testing::{open_temp, user};

    #[test]
    fn creator_is_always_a_member() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");

        let room = db.create_room("  Team  ", a, &[b, b]).unwrap();
        assert_eq!(db.get_room(room).unwrap().unwrap().name.as_deref(), Some("Team"));
        assert_eq!(db.room_memberships(room).unwrap().len(), 2);

        let solo = db.create_room("Notes", a, &[a]).unwrap();
        assert_eq!(db.room_memberships(solo).unwrap().len(), 1);
    }

    #[test]
    fn blank_room_name_is_invalid() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        assert!(matches!(
            db.create_room("   ", a, &[]),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_member_creates_nothing() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        assert!(matches!(
            db.create_room("Team", a, &[999]),
            Err(StoreError::NotFound(_))
        ));
        assert!(db.list_rooms_for_user(a).unwrap().is_empty());
    }

    #[test]
    fn inviting_existing_members_changes_nothing() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let c = user(&db, "c");
        let room = db.create_room("Team", a, &[b]).unwrap();

        assert_eq!(db.invite_users(room, &[a, b]).unwrap(), 0);
        assert_eq!(db.room_memberships(room).unwrap().len(), 2);

        assert_eq!(db.invite_users(room, &[b, c, c]).unwrap(), 1);
        assert_eq!(db.room_memberships(room).unwrap().len(), 3);
    }

    #[test]
    fn inviting_into_unknown_room_is_not_found() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        assert!(matches!(db.invite_users(7, &[a]), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn listing_ignores_uncommitted_writes() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let room = db.create_room("Team", a, &[]).unwrap();
        let membership = db.membership(room, a).unwrap().unwrap().id;

        db.with_tx(|tx| {
            crate::messages::insert_message(tx, membership, "pending", Utc::now())?;
            let rooms = db.list_rooms_for_user(a)?;
            assert_eq!(rooms[0].unread_count, 0);
            assert_eq!(rooms[0].preview_text, NO_MESSAGES_PREVIEW);
            Ok(())
        })
        .unwrap();

        let rooms = db.list_rooms_for_user(a).unwrap();
        assert_eq!(rooms[0].unread_count, 1);
        assert_eq!(rooms[0].preview_text, "pending");
    }

    #[test]
    fn unread_counts_and_previews() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let room = db.create_room("Team", a, &[b]).unwrap();
        let quiet = db.create_room("Quiet", b, &[]).unwrap();

        let t0 = Utc::now();
        db.post_message(room, a, "first", t0).unwrap();
        let second = db.post_message(room, a, "second", t0 + Duration::seconds(1)).unwrap();

        let rooms = db.list_rooms_for_user(b).unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].room.id, room);
        // b never opened the room, so both messages are unread.
        assert_eq!(rooms[0].unread_count, 2);
        assert_eq!(rooms[0].preview_text, "second");
        assert_eq!(rooms[1].room.id, quiet);
        assert_eq!(rooms[1].unread_count, 0);
        assert_eq!(rooms[1].preview_text, NO_MESSAGES_PREVIEW);

        db.advance_read_pointer(room, b, second).unwrap();
        assert_eq!(db.list_rooms_for_user(b).unwrap()[0].unread_count, 0);

        db.post_message(room, a, "third", t0 + Duration::seconds(2)).unwrap();
        let rooms = db.list_rooms_for_user(b).unwrap();
        assert_eq!(rooms[0].unread_count, 1);
        assert_eq!(rooms[0].preview_text, "third");

        // The sender has read their own messages.
        assert_eq!(db.list_rooms_for_user(a).unwrap()[0].unread_count, 0);
    }
}
