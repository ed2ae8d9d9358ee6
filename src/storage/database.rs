use crate::common::Result;
use crate::core::password::HashAlgorithm;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    hash_algorithm TEXT
);

CREATE TABLE IF NOT EXISTS face_embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    embedding_dim INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS workout_plans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    type TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    plan_id INTEGER,
    completed BOOLEAN DEFAULT FALSE,
    feedback TEXT,
    completed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users (id),
    FOREIGN KEY (plan_id) REFERENCES workout_plans (id)
);
"#;

/// Handle on the SQLite file. Every store operation opens its own
/// connection through [`Database::connect`] and drops it before returning.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Create the schema if needed and run the one-time migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self { path: path.to_path_buf() };
        db.initialize()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        migrate_hash_algorithm(&conn)?;
        Ok(())
    }
}

/// Tag user rows that predate the `hash_algorithm` column.
///
/// Rows holding a 64 character hex digest are tagged legacy-digest, `$2a$`,
/// `$2b$` and `$2y$` hashes bcrypt, the rest salted-adaptive-hash. Neither
/// older form can be turned into an Argon2 hash without the plaintext, so
/// those rows stay as they are until their owner's next successful login
/// (see `UserStore::authenticate`). Returns the number of rows awaiting that
/// conversion.
pub fn migrate_hash_algorithm(conn: &Connection) -> Result<usize> {
    let has_column = {
        let mut stmt = conn.prepare("PRAGMA table_info(users)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        names.iter().any(|name| name == "hash_algorithm")
    };

    if !has_column {
        conn.execute("ALTER TABLE users ADD COLUMN hash_algorithm TEXT", [])?;
    }

    let untagged: Vec<(i64, String)> = {
        let mut stmt = conn.prepare("SELECT id, password FROM users WHERE hash_algorithm IS NULL")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut legacy = 0;
    for (id, hash) in &untagged {
        let algorithm = HashAlgorithm::detect(hash);
        if algorithm.needs_upgrade() {
            legacy += 1;
        }
        conn.execute(
            "UPDATE users SET hash_algorithm = ?1 WHERE id = ?2",
            rusqlite::params![algorithm.as_str(), id],
        )?;
    }

    if !untagged.is_empty() {
        tracing::info!(
            "Tagged {} user rows with a hash algorithm ({} older hashes awaiting conversion at next login)",
            untagged.len(),
            legacy
        );
    }

    Ok(legacy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::password::legacy_digest;

    #[test]
    fn open_creates_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("nested/users.db")).unwrap();

        let conn = db.connect().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'face_embeddings', 'workout_plans', 'progress')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn migration_tags_rows_from_an_older_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL,
                    password TEXT NOT NULL
                );",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO users (username, email, password) VALUES ('old', 'old@x.io', ?1)",
                [legacy_digest("pw")],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO users (username, email, password) VALUES ('bc', 'bc@x.io', ?1)",
                [bcrypt::hash("pw", 4).unwrap()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO users (username, email, password) VALUES ('new', 'new@x.io', '$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA')",
                [],
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let conn = db.connect().unwrap();
        let tag = |name: &str| -> String {
            conn.query_row(
                "SELECT hash_algorithm FROM users WHERE username = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(tag("old"), "legacy-digest");
        assert_eq!(tag("new"), "salted-adaptive-hash");
        assert_eq!(tag("bc"), "bcrypt");

        // second pass finds nothing left to do
        assert_eq!(migrate_hash_algorithm(&conn).unwrap(), 0);
    }
}
