use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};

use parley_types::models::{MembershipId, Message, MessageId, RoomId, UserId};

use crate::error::{Constraint, violated_constraint};
use crate::memberships::{query_membership, update_read_pointer};
use crate::{Database, Result, StoreError, format_timestamp, placeholders, timestamp_at};

// Author resolved through the membership row, in one query.
const MESSAGE_SELECT: &str = "SELECT m.message_id, m.room_user_id, ru.user_id, u.username, m.sent_datetime, m.text
     FROM messages m
     JOIN room_users ru ON ru.room_user_id = m.room_user_id
     JOIN users u ON u.user_id = ru.user_id";

impl Database {
    // -- Message store --

    pub fn append_message(
        &self,
        membership_id: MembershipId,
        text: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<MessageId> {
        self.with_conn_mut(|conn| insert_message(conn, membership_id, text, sent_at))
    }

    /// Messages sent through any of `membership_ids`, oldest first.
    pub fn list_messages(&self, membership_ids: &[MembershipId]) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages(conn, membership_ids))
    }

    pub fn latest_message(&self, membership_ids: &[MembershipId]) -> Result<Option<Message>> {
        self.with_conn(|conn| query_latest_message(conn, membership_ids))
    }

    /// Messages sent strictly after `after`.
    pub fn count_messages_after(
        &self,
        membership_ids: &[MembershipId],
        after: DateTime<Utc>,
    ) -> Result<u64> {
        self.with_conn(|conn| count_messages(conn, membership_ids, Some(after)))
    }

    pub fn count_messages(&self, membership_ids: &[MembershipId]) -> Result<u64> {
        self.with_conn(|conn| count_messages(conn, membership_ids, None))
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// The room a message belongs to, through its sender's membership.
    pub fn room_of_message(&self, id: MessageId) -> Result<Option<RoomId>> {
        self.with_conn(|conn| query_room_of_message(conn, id))
    }

    /// Sends a message as `user_id` in `room_id` and marks it read for the
    /// sender.
    pub fn post_message(
        &self,
        room_id: RoomId,
        user_id: UserId,
        text: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<MessageId> {
        self.with_tx(|tx| {
            let membership =
                query_membership(tx, room_id, user_id)?.ok_or(StoreError::NotAMember)?;
            let message_id = insert_message(tx, membership.id, text, sent_at)?;
            update_read_pointer(tx, room_id, user_id, message_id)?;
            Ok(message_id)
        })
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        membership_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        sent_at: timestamp_at(row, 4)?,
        text: row.get(5)?,
    })
}

pub(crate) fn insert_message(
    conn: &Connection,
    membership_id: MembershipId,
    text: &str,
    sent_at: DateTime<Utc>,
) -> Result<MessageId> {
    conn.execute(
        "INSERT INTO messages (room_user_id, sent_datetime, text) VALUES (?1, ?2, ?3)",
        (membership_id, format_timestamp(sent_at), text),
    )
    .map_err(|e| match violated_constraint(&e) {
        Some(Constraint::ForeignKey) => {
            StoreError::NotFound(format!("membership {}", membership_id))
        }
        _ => e.into(),
    })?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn query_messages(
    conn: &Connection,
    membership_ids: &[MembershipId],
) -> Result<Vec<Message>> {
    if membership_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "{} WHERE m.room_user_id IN ({}) ORDER BY m.sent_datetime ASC, m.message_id ASC",
        MESSAGE_SELECT,
        placeholders(1, membership_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(membership_ids), message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_latest_message(
    conn: &Connection,
    membership_ids: &[MembershipId],
) -> Result<Option<Message>> {
    if membership_ids.is_empty() {
        return Ok(None);
    }

    let sql = format!(
        "{} WHERE m.room_user_id IN ({}) ORDER BY m.sent_datetime DESC, m.message_id DESC LIMIT 1",
        MESSAGE_SELECT,
        placeholders(1, membership_ids.len())
    );
    let row = conn
        .query_row(&sql, params_from_iter(membership_ids), message_from_row)
        .optional()?;
    Ok(row)
}

pub(crate) fn count_messages(
    conn: &Connection,
    membership_ids: &[MembershipId],
    after: Option<DateTime<Utc>>,
) -> Result<u64> {
    if membership_ids.is_empty() {
        return Ok(0);
    }

    // ?1 is the cutoff (NULL counts everything), ids follow.
    let cutoff = after.map(format_timestamp);
    let sql = format!(
        "SELECT COUNT(*) FROM messages
         WHERE (?1 IS NULL OR sent_datetime > ?1) AND room_user_id IN ({})",
        placeholders(2, membership_ids.len())
    );
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(membership_ids.len() + 1);
    params.push(&cutoff);
    params.extend(membership_ids.iter().map(|id| id as &dyn ToSql));

    let count: i64 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}

pub(crate) fn query_message(conn: &Connection, id: MessageId) -> Result<Option<Message>> {
    let row = conn
        .query_row(
            &format!("{} WHERE m.message_id = ?1", MESSAGE_SELECT),
            [id],
            message_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn query_room_of_message(conn: &Connection, id: MessageId) -> Result<Option<RoomId>> {
    let room = conn
        .query_row(
            "SELECT ru.room_id FROM messages m
             JOIN room_users ru ON ru.room_user_id = m.room_user_id
             WHERE m.message_id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(room)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::StoreError;
    use crate::testing::{open_temp, user};

    #[test]
    fn messages_come_back_in_send_order() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let room = db.create_room("Team", a, &[b]).unwrap();
        let ma = db.membership(room, a).unwrap().unwrap().id;
        let mb = db.membership(room, b).unwrap().unwrap().id;

        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        // Inserted out of time order on purpose; equal timestamps fall back to id.
        let late = db.append_message(ma, "late", t0 + Duration::minutes(5)).unwrap();
        let early = db.append_message(mb, "early", t0).unwrap();
        let tie = db.append_message(ma, "tie", t0).unwrap();

        let ids: Vec<_> = db
            .list_messages(&[ma, mb])
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![early, tie, late]);

        let latest = db.latest_message(&[ma, mb]).unwrap().unwrap();
        assert_eq!(latest.id, late);
        assert_eq!(latest.author_username, "a");
        assert_eq!(latest.text.as_deref(), Some("late"));
        assert_eq!(latest.sent_at, t0 + Duration::minutes(5));
    }

    #[test]
    fn counts_strictly_after_cutoff() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let room = db.create_room("Team", a, &[]).unwrap();
        let ma = db.membership(room, a).unwrap().unwrap().id;

        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        db.append_message(ma, "one", t0).unwrap();
        db.append_message(ma, "two", t0 + Duration::seconds(1)).unwrap();
        db.append_message(ma, "three", t0 + Duration::seconds(2)).unwrap();

        assert_eq!(db.count_messages_after(&[ma], t0).unwrap(), 2);
        assert_eq!(db.count_messages_after(&[ma], t0 + Duration::seconds(2)).unwrap(), 0);
        assert_eq!(db.count_messages(&[ma]).unwrap(), 3);
        assert_eq!(db.count_messages(&[]).unwrap(), 0);
    }

    #[test]
    fn empty_text_is_kept() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let room = db.create_room("Team", a, &[]).unwrap();
        let id = db.post_message(room, a, "", Utc::now()).unwrap();

        let message = db.get_message(id).unwrap().unwrap();
        assert_eq!(message.text.as_deref(), Some(""));
        assert_eq!(db.room_of_message(id).unwrap(), Some(room));
    }

    #[test]
    fn posting_requires_membership_and_marks_read() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let outsider = user(&db, "outsider");
        let room = db.create_room("Team", a, &[]).unwrap();

        assert!(matches!(
            db.post_message(room, outsider, "hi", Utc::now()),
            Err(StoreError::NotAMember)
        ));

        let id = db.post_message(room, a, "hi", Utc::now()).unwrap();
        assert_eq!(
            db.membership(room, a).unwrap().unwrap().last_read_message_id,
            Some(id)
        );
    }

    #[test]
    fn append_to_unknown_membership_is_not_found() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.append_message(42, "hi", Utc::now()),
            Err(StoreError::NotFound(_))
        ));
    }
}
