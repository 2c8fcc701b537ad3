use rusqlite::{Connection, OptionalExtension};

use parley_types::models::{User, UserId};

use crate::error::{Constraint, violated_constraint};
use crate::models::UserRow;
use crate::{Database, Result, StoreError};

impl Database {
    // -- Credential store --

    /// Inserts a user. The UNIQUE constraint on `username` decides duplicates.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserId> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
                (username, password_hash),
            )
            .map_err(|e| match violated_constraint(&e) {
                Some(Constraint::Unique) => StoreError::DuplicateUsername,
                _ => e.into(),
            })?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Every user except `excluded`, by name.
    pub fn list_other_users(&self, excluded: UserId) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, username FROM users WHERE user_id != ?1 ORDER BY username",
            )?;
            let users = stmt
                .query_map([excluded], |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

pub(crate) fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, username, password_hash, created_at FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT user_id, username FROM users WHERE user_id = ?1",
            [id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Users with no membership in `room_id`.
pub(crate) fn query_users_outside_room(conn: &Connection, room_id: i64) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT u.user_id, u.username
         FROM users u
         WHERE NOT EXISTS (
             SELECT 1 FROM room_users ru WHERE ru.user_id = u.user_id AND ru.room_id = ?1
         )
         ORDER BY u.username",
    )?;
    let users = stmt
        .query_map([room_id], |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use crate::testing::open_temp;
    use crate::StoreError;

    #[test]
    fn second_signup_with_same_name_is_rejected() {
        let (_dir, db) = open_temp();
        let id = db.create_user("alice", "hash-1").unwrap();
        assert!(id > 0);

        let err = db.create_user("alice", "hash-2").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let (_dir, db) = open_temp();
        db.create_user("alice", "h").unwrap();
        db.create_user("Alice", "h").unwrap();
        assert_eq!(db.list_other_users(0).unwrap().len(), 2);
    }

    #[test]
    fn lookup_by_name_returns_hash() {
        let (_dir, db) = open_temp();
        let id = db.create_user("bob", "$argon2id$stub").unwrap();

        let row = db.get_user_by_username("bob").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.password_hash, "$argon2id$stub");
        assert!(db.get_user_by_username("carol").unwrap().is_none());
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().username, "bob");
    }

    #[test]
    fn other_users_excludes_caller() {
        let (_dir, db) = open_temp();
        let a = db.create_user("a", "h").unwrap();
        db.create_user("b", "h").unwrap();

        let names: Vec<_> = db
            .list_other_users(a)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["b"]);
    }
}
