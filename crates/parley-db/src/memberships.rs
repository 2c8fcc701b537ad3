use rusqlite::{Connection, OptionalExtension, Row};

use parley_types::models::{Membership, MembershipId, MessageId, RoomId, UserId};

use crate::error::{Constraint, violated_constraint};
use crate::{Database, Result, StoreError};

const MEMBERSHIP_COLUMNS: &str = "room_user_id, user_id, room_id, last_read_message_id";

impl Database {
    // -- Membership store --

    pub fn join(&self, room_id: RoomId, user_id: UserId) -> Result<MembershipId> {
        self.with_conn_mut(|conn| insert_membership(conn, room_id, user_id))
    }

    pub fn list_memberships(&self, user_id: UserId) -> Result<Vec<Membership>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM room_users WHERE user_id = ?1 ORDER BY room_id",
                MEMBERSHIP_COLUMNS
            ))?;
            let rows = stmt
                .query_map([user_id], membership_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn membership(&self, room_id: RoomId, user_id: UserId) -> Result<Option<Membership>> {
        self.with_conn(|conn| query_membership(conn, room_id, user_id))
    }

    pub fn room_memberships(&self, room_id: RoomId) -> Result<Vec<Membership>> {
        self.with_conn(|conn| query_room_memberships(conn, room_id))
    }

    /// Moves the read pointer forward to `message_id`. Returns whether it moved;
    /// an older id or a missing membership leaves everything unchanged.
    pub fn advance_read_pointer(
        &self,
        room_id: RoomId,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| update_read_pointer(conn, room_id, user_id, message_id))
    }
}

pub(crate) fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        user_id: row.get(1)?,
        room_id: row.get(2)?,
        last_read_message_id: row.get(3)?,
    })
}

pub(crate) fn insert_membership(
    conn: &Connection,
    room_id: RoomId,
    user_id: UserId,
) -> Result<MembershipId> {
    conn.execute(
        "INSERT INTO room_users (user_id, room_id) VALUES (?1, ?2)",
        (user_id, room_id),
    )
    .map_err(|e| match violated_constraint(&e) {
        Some(Constraint::Unique) => StoreError::AlreadyMember,
        Some(Constraint::ForeignKey) => {
            StoreError::NotFound(format!("room {} or user {}", room_id, user_id))
        }
        None => e.into(),
    })?;
    Ok(conn.last_insert_rowid())
}

/// Joins unless the pair already exists. Returns whether a row was inserted.
pub(crate) fn insert_membership_if_absent(
    conn: &Connection,
    room_id: RoomId,
    user_id: UserId,
) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO room_users (user_id, room_id) VALUES (?1, ?2)
             ON CONFLICT (user_id, room_id) DO NOTHING",
            (user_id, room_id),
        )
        .map_err(|e| match violated_constraint(&e) {
            Some(Constraint::ForeignKey) => StoreError::NotFound(format!("user {}", user_id)),
            _ => e.into(),
        })?;
    Ok(inserted == 1)
}

pub(crate) fn query_membership(
    conn: &Connection,
    room_id: RoomId,
    user_id: UserId,
) -> Result<Option<Membership>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM room_users WHERE room_id = ?1 AND user_id = ?2",
                MEMBERSHIP_COLUMNS
            ),
            (room_id, user_id),
            membership_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn query_room_memberships(conn: &Connection, room_id: RoomId) -> Result<Vec<Membership>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM room_users WHERE room_id = ?1 ORDER BY room_user_id",
        MEMBERSHIP_COLUMNS
    ))?;
    let rows = stmt
        .query_map([room_id], membership_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn update_read_pointer(
    conn: &Connection,
    room_id: RoomId,
    user_id: UserId,
    message_id: MessageId,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE room_users SET last_read_message_id = ?3
         WHERE room_id = ?1 AND user_id = ?2
           AND (last_read_message_id IS NULL OR last_read_message_id < ?3)",
        (room_id, user_id, message_id),
    )?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use crate::StoreError;
    use crate::testing::{open_temp, user};

    #[test]
    fn joining_twice_is_rejected() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let room = db.create_room("Team", a, &[]).unwrap();

        let id = db.join(room, b).unwrap();
        let membership = db.membership(room, b).unwrap().unwrap();
        assert_eq!(membership.id, id);
        assert_eq!(membership.last_read_message_id, None);

        assert!(matches!(db.join(room, b), Err(StoreError::AlreadyMember)));
        assert!(matches!(db.join(room, a), Err(StoreError::AlreadyMember)));
        assert_eq!(db.room_memberships(room).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_joins_admit_one() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let room = db.create_room("Team", a, &[]).unwrap();

        let db = std::sync::Arc::new(db);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || db.join(room, b))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(StoreError::AlreadyMember)))
        );
        assert_eq!(db.room_memberships(room).unwrap().len(), 2);
    }

    #[test]
    fn joining_unknown_room_is_not_found() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        assert!(matches!(db.join(999, a), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn read_pointer_only_moves_forward() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let room = db.create_room("Team", a, &[]).unwrap();

        assert!(db.advance_read_pointer(room, a, 10).unwrap());
        assert!(!db.advance_read_pointer(room, a, 4).unwrap());
        assert!(!db.advance_read_pointer(room, a, 10).unwrap());
        assert_eq!(
            db.membership(room, a).unwrap().unwrap().last_read_message_id,
            Some(10)
        );

        assert!(db.advance_read_pointer(room, a, 11).unwrap());
        assert_eq!(
            db.membership(room, a).unwrap().unwrap().last_read_message_id,
            Some(11)
        );
    }

    #[test]
    fn read_pointer_without_membership_is_a_no_op() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let room = db.create_room("Team", a, &[]).unwrap();

        assert!(!db.advance_read_pointer(room, b, 3).unwrap());
        assert!(db.membership(room, b).unwrap().is_none());
    }

    #[test]
    fn memberships_listed_per_user() {
        let (_dir, db) = open_temp();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let first = db.create_room("One", a, &[b]).unwrap();
        let second = db.create_room("Two", b, &[]).unwrap();

        let rooms: Vec<_> = db
            .list_memberships(b)
            .unwrap()
            .into_iter()
            .map(|m| m.room_id)
            .collect();
        assert_eq!(rooms, vec![first, second]);
        assert_eq!(db.list_memberships(a).unwrap().len(), 1);
    }
}
