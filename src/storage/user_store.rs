use crate::common::{MoodFitError, Result};
use crate::core::password::{self, HashAlgorithm};
use crate::core::recognizer::Embedding;
use crate::storage::database::Database;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A registered user. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

struct StoredUser {
    user: User,
    password_hash: String,
    algorithm: HashAlgorithm,
}

impl StoredUser {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<(User, String, Option<String>)> {
        Ok((
            User {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
            },
            row.get(3)?,
            row.get(4)?,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn create_user(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let conn = self.db.connect()?;

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            [username],
            |row| row.get(0),
        )?;
        if taken {
            return Err(MoodFitError::DuplicateUsername);
        }

        let password_hash = password::hash_password(password)?;

        let inserted = conn.execute(
            "INSERT INTO users (username, email, password, hash_algorithm) VALUES (?1, ?2, ?3, ?4)",
            params![username, email, password_hash, HashAlgorithm::SaltedAdaptive.as_str()],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let msg = msg.unwrap_or_default();
                tracing::debug!("Signup rejected for '{}': {}", username, msg);
                return Err(if msg.contains("users.username") {
                    MoodFitError::DuplicateUsername
                } else if msg.contains("users.email") {
                    MoodFitError::DuplicateEmail
                } else {
                    MoodFitError::RegistrationFailed
                });
            }
            Err(e) => return Err(e.into()),
        }

        let user = User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
        };
        tracing::info!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check a username/password pair. A legacy-digest or bcrypt row that
    /// verifies is rewritten as an Argon2 hash before returning.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let Some(stored) = self.find_stored(username)? else {
            tracing::debug!("Login attempt for unknown user '{}'", username);
            return Err(MoodFitError::InvalidCredentials);
        };

        if !password::verify_password(password, &stored.password_hash, stored.algorithm) {
            return Err(MoodFitError::InvalidCredentials);
        }

        if stored.algorithm.needs_upgrade() {
            self.upgrade_hash(stored.user.id, stored.algorithm, password)?;
        }

        Ok(stored.user)
    }

    fn upgrade_hash(&self, user_id: i64, from: HashAlgorithm, password: &str) -> Result<()> {
        let new_hash = password::hash_password(password)?;
        let conn = self.db.connect()?;
        conn.execute(
            "UPDATE users SET password = ?1, hash_algorithm = ?2 WHERE id = ?3",
            params![new_hash, HashAlgorithm::SaltedAdaptive.as_str(), user_id],
        )?;
        tracing::info!("Converted {} password hash for user {}", from, user_id);
        Ok(())
    }

    fn find_stored(&self, username: &str) -> Result<Option<StoredUser>> {
        let conn = self.db.connect()?;
        let row = conn
            .query_row(
                "SELECT id, username, email, password, hash_algorithm FROM users WHERE username = ?1",
                [username],
                StoredUser::from_row,
            )
            .optional()?;

        let Some((user, password_hash, tag)) = row else {
            return Ok(None);
        };

        let algorithm = match tag {
            Some(tag) => tag.parse()?,
            None => HashAlgorithm::detect(&password_hash),
        };

        Ok(Some(StoredUser { user, password_hash, algorithm }))
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find_stored(username)?.map(|stored| stored.user))
    }

    pub fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.db.connect()?;
        let user = conn
            .query_row(
                "SELECT id, username, email FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn save_face_embedding(&self, user_id: i64, embedding: &Embedding) -> Result<()> {
        let encoded = bincode::serialize(embedding)
            .map_err(|e| MoodFitError::Storage(format!("Failed to serialize embedding: {}", e)))?;

        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO face_embeddings (user_id, embedding, embedding_dim) VALUES (?1, ?2, ?3)",
            params![user_id, encoded, embedding.len() as i64],
        )?;
        tracing::debug!("Stored {}-d face embedding for user {}", embedding.len(), user_id);
        Ok(())
    }

    /// The newest embedding recorded for `user_id`.
    pub fn get_face_embedding(&self, user_id: i64) -> Result<Option<Embedding>> {
        let conn = self.db.connect()?;
        let blob: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT embedding, embedding_dim FROM face_embeddings
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((data, dim)) = blob else {
            return Ok(None);
        };

        let embedding: Embedding = bincode::deserialize(&data)
            .map_err(|e| MoodFitError::Storage(format!("Failed to deserialize embedding: {}", e)))?;

        if embedding.len() as i64 != dim {
            return Err(MoodFitError::Storage(format!(
                "Embedding for user {} has {} values, row says {}",
                user_id,
                embedding.len(),
                dim
            )));
        }

        Ok(Some(embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::password::legacy_digest;

    fn store() -> (tempfile::TempDir, UserStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("users.db")).unwrap();
        (dir, UserStore::new(db))
    }

    #[test]
    fn create_then_authenticate() {
        let (_dir, store) = store();
        let created = store.create_user("maya", "maya@example.com", "s3cret!").unwrap();
        let logged_in = store.authenticate("maya", "s3cret!").unwrap();

        assert_eq!(created, logged_in);
        assert_eq!(store.find_user_by_id(created.id).unwrap(), Some(created));
    }

    #[test]
    fn wrong_password_and_unknown_user_are_rejected() {
        let (_dir, store) = store();
        store.create_user("maya", "maya@example.com", "s3cret!").unwrap();

        assert!(matches!(store.authenticate("maya", "s3cret"), Err(MoodFitError::InvalidCredentials)));
        assert!(matches!(store.authenticate("nobody", "s3cret!"), Err(MoodFitError::InvalidCredentials)));
    }

    #[test]
    fn duplicates_are_classified() {
        let (_dir, store) = store();
        store.create_user("maya", "maya@example.com", "pw").unwrap();

        assert!(matches!(
            store.create_user("maya", "other@example.com", "pw"),
            Err(MoodFitError::DuplicateUsername)
        ));
        assert!(matches!(
            store.create_user("sam", "maya@example.com", "pw"),
            Err(MoodFitError::DuplicateEmail)
        ));
        // both clash: username is reported
        assert!(matches!(
            store.create_user("maya", "maya@example.com", "pw"),
            Err(MoodFitError::DuplicateUsername)
        ));
    }

    #[test]
    fn legacy_rows_are_converted_on_login() {
        let (_dir, store) = store();
        {
            let conn = store.database().connect().unwrap();
            conn.execute(
                "INSERT INTO users (username, email, password, hash_algorithm) VALUES ('old', 'old@x.io', ?1, 'legacy-digest')",
                [legacy_digest("hunter2")],
            )
            .unwrap();
        }

        assert!(store.authenticate("old", "wrong").is_err());
        store.authenticate("old", "hunter2").unwrap();

        let conn = store.database().connect().unwrap();
        let (hash, tag): (String, String) = conn
            .query_row(
                "SELECT password, hash_algorithm FROM users WHERE username = 'old'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(tag, "salted-adaptive-hash");
        assert!(hash.starts_with("$argon2"));

        // still logs in after conversion
        store.authenticate("old", "hunter2").unwrap();
    }

    #[test]
    fn migrated_bcrypt_rows_log_in_and_convert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
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
                "INSERT INTO users (username, email, password) VALUES ('maya', 'maya@example.com', ?1)",
                [bcrypt::hash("hunter2", 4).unwrap()],
            )
            .unwrap();
        }

        let store = UserStore::new(Database::open(&path).unwrap());
        let tag = || -> String {
            store
                .database()
                .connect()
                .unwrap()
                .query_row("SELECT hash_algorithm FROM users WHERE username = 'maya'", [], |row| {
                    row.get(0)
                })
                .unwrap()
        };
        assert_eq!(tag(), "bcrypt");

        assert!(matches!(
            store.authenticate("maya", "hunter3"),
            Err(MoodFitError::InvalidCredentials)
        ));
        assert_eq!(tag(), "bcrypt");

        let user = store.authenticate("maya", "hunter2").unwrap();
        assert_eq!(user.email, "maya@example.com");
        assert_eq!(tag(), "salted-adaptive-hash");
        store.authenticate("maya", "hunter2").unwrap();
    }

    #[test]
    fn newest_embedding_wins() {
        let (_dir, store) = store();
        let user = store.create_user("maya", "maya@example.com", "pw").unwrap();

        assert_eq!(store.get_face_embedding(user.id).unwrap(), None);
        store.save_face_embedding(user.id, &vec![0.1, 0.2]).unwrap();
        store.save_face_embedding(user.id, &vec![0.3, 0.4]).unwrap();
        assert_eq!(store.get_face_embedding(user.id).unwrap(), Some(vec![0.3, 0.4]));
    }
}
