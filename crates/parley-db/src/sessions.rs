use std::path::Path;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::{Result, StoreError, format_timestamp, timestamp_at};

/// A logged-in browser. Only the username is stored; the user is resolved
/// per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Server-side session store, kept in its own database file.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at);
            ",
        )?;

        info!("Session store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("sessions: {}", e)))?;
        f(&conn)
    }

    pub fn create(&self, username: &str, ttl: Duration) -> Result<Session> {
        let token: [u8; 32] = rand::random();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::InvalidInput(format!("session ttl {} out of range", ttl)))?;
        let session = Session {
            id: URL_SAFE_NO_PAD.encode(token),
            username: username.to_string(),
            expires_at,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, username, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                (
                    &session.id,
                    &session.username,
                    format_timestamp(now),
                    format_timestamp(session.expires_at),
                ),
            )?;
            Ok(())
        })?;

        debug!("Session created for {}", username);
        Ok(session)
    }

    /// Looks up a live session. An expired one is deleted on the way.
    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        self.with_conn(|conn| {
            let session = conn
                .query_row(
                    "SELECT id, username, expires_at FROM sessions WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(Session {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            expires_at: timestamp_at(row, 2)?,
                        })
                    },
                )
                .optional()?;

            match session {
                Some(s) if s.expires_at <= Utc::now() => {
                    conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
                    Ok(None)
                }
                other => Ok(other),
            }
        })
    }

    pub fn destroy(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn purge_expired(&self) -> Result<usize> {
        let removed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                [format_timestamp(Utc::now())],
            )?)
        })?;
        if removed > 0 {
            info!("Purged {} expired sessions", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(&dir.path().join("sessions.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_get_destroy() {
        let (_dir, store) = open_temp();
        let session = store.create("alice", Duration::hours(1)).unwrap();
        assert_eq!(session.id.len(), 43);

        let found = store.get(&session.id).unwrap().unwrap();
        assert_eq!(found.username, "alice");

        store.destroy(&session.id).unwrap();
        assert!(store.get(&session.id).unwrap().is_none());
    }

    #[test]
    fn session_ids_are_unique() {
        let (_dir, store) = open_temp();
        let a = store.create("alice", Duration::hours(1)).unwrap();
        let b = store.create("alice", Duration::hours(1)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let (_dir, store) = open_temp();
        let err = store
            .create("alice", Duration::seconds(1_000_000_000_000_000))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn expired_sessions_disappear() {
        let (_dir, store) = open_temp();
        let stale = store.create("alice", Duration::seconds(-1)).unwrap();
        let live = store.create("bob", Duration::hours(1)).unwrap();

        assert!(store.get(&stale.id).unwrap().is_none());

        store.create("carol", Duration::seconds(-5)).unwrap();
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.get(&live.id).unwrap().is_some());
    }
}
