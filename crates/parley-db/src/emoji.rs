use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use parley_types::models::{Emoji, EmojiId};

use crate::{Database, Result};

/// Catalog written on first start: (name, image).
pub const DEFAULT_EMOJI: [(&str, &str); 3] = [
    ("heart", "heart.png"),
    ("laughing", "laughing.png"),
    ("thumbs_up", "thumbs_up.png"),
];

impl Database {
    /// Seeds the default catalog if the table is empty. Safe to call on every
    /// start; returns how many rows were written.
    pub fn seed_default_emoji(&self) -> Result<usize> {
        let seeded = self.with_tx(|tx| {
            let present: bool =
                tx.query_row("SELECT EXISTS (SELECT 1 FROM emoji)", [], |row| row.get(0))?;
            if present {
                return Ok(0);
            }

            let mut stmt = tx.prepare("INSERT INTO emoji (name, image) VALUES (?1, ?2)")?;
            for (name, image) in DEFAULT_EMOJI {
                stmt.execute((name, image))?;
            }
            Ok(DEFAULT_EMOJI.len())
        })?;

        if seeded > 0 {
            info!("Seeded {} default emoji", seeded);
        } else {
            info!("Emoji catalog already present");
        }
        Ok(seeded)
    }

    pub fn list_emoji(&self) -> Result<Vec<Emoji>> {
        self.with_conn(query_emoji)
    }
}

pub(crate) fn query_emoji(conn: &Connection) -> Result<Vec<Emoji>> {
    let mut stmt = conn.prepare("SELECT emoji_id, name, image FROM emoji ORDER BY emoji_id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Emoji {
                id: row.get(0)?,
                name: row.get(1)?,
                image: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_emoji_id(conn: &Connection, name: &str) -> Result<Option<EmojiId>> {
    let id = conn
        .query_row("SELECT emoji_id FROM emoji WHERE name = ?1", [name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use crate::testing::open_temp;

    #[test]
    fn seeding_is_idempotent() {
        let (_dir, db) = open_temp();
        assert_eq!(db.seed_default_emoji().unwrap(), 0);

        let names: Vec<_> = db.list_emoji().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["heart", "laughing", "thumbs_up"]);
    }
}
