//! Credential Store
//! Mission: Persist user accounts and refresh tokens with SQLite

use crate::auth::models::{RefreshToken, Role, User};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// SQLite-backed store for users and refresh tokens.
///
/// Opens a connection per call like the rest of the codebase; the row volume
/// here is tiny and every operation is a single-row read or write.
pub struct CredentialStore {
    db_path: String,
}

impl CredentialStore {
    /// Create a new store and initialize the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                roles TEXT NOT NULL,
                full_name TEXT,
                bio TEXT,
                image_url TEXT,
                enabled INTEGER NOT NULL DEFAULT 0,
                email_verified INTEGER NOT NULL DEFAULT 0,
                verification_token TEXT,
                verification_token_expiry TEXT,
                password_reset_token TEXT,
                password_reset_token_expiry TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // username is UNIQUE: at most one active refresh token per user,
        // enforced by the storage constraint rather than application logic.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                expiry TEXT NOT NULL
            )",
            [],
        )?;

        info!("🔐 Credential store initialized at: {}", self.db_path);
        Ok(())
    }

    /// Get user by username
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_user("username", username)
    }

    /// Get user by email
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user("email", email)
    }

    fn find_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let conn = Connection::open(&self.db_path)?;

        let sql = format!(
            "SELECT id, username, email, password_hash, roles, full_name, bio, image_url,
                    enabled, email_verified, verification_token, verification_token_expiry,
                    password_reset_token, password_reset_token_expiry, created_at
             FROM users WHERE {column} = ?1"
        );
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![value], map_user_row) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Total number of registered users (drives the first-user-admin policy)
    pub fn count_users(&self) -> Result<i64> {
        let conn = Connection::open(&self.db_path)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")?;
        Ok(count)
    }

    /// Insert a new user row
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, roles, full_name, bio,
                                image_url, enabled, email_verified, verification_token,
                                verification_token_expiry, password_reset_token,
                                password_reset_token_expiry, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                user.password_hash,
                user.roles_string(),
                user.full_name,
                user.bio,
                user.image_url,
                user.enabled,
                user.email_verified,
                user.verification_token,
                user.verification_token_expiry.map(|t| t.to_rfc3339()),
                user.password_reset_token,
                user.password_reset_token_expiry.map(|t| t.to_rfc3339()),
                user.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert user")?;

        debug!("Inserted user: {}", user.username);
        Ok(())
    }

    /// Persist the full user row after mutation (keyed by id, so renames work)
    pub fn save_user(&self, user: &User) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        let updated = conn
            .execute(
                "UPDATE users SET username = ?2, email = ?3, password_hash = ?4, roles = ?5,
                        full_name = ?6, bio = ?7, image_url = ?8, enabled = ?9,
                        email_verified = ?10, verification_token = ?11,
                        verification_token_expiry = ?12, password_reset_token = ?13,
                        password_reset_token_expiry = ?14
                 WHERE id = ?1",
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.roles_string(),
                    user.full_name,
                    user.bio,
                    user.image_url,
                    user.enabled,
                    user.email_verified,
                    user.verification_token,
                    user.verification_token_expiry.map(|t| t.to_rfc3339()),
                    user.password_reset_token,
                    user.password_reset_token_expiry.map(|t| t.to_rfc3339()),
                ],
            )
            .context("Failed to save user")?;

        if updated == 0 {
            anyhow::bail!("User not found: {}", user.username);
        }
        Ok(())
    }

    /// Find a refresh token row by its token string
    pub fn find_refresh_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let conn = Connection::open(&self.db_path)?;
        let mut stmt =
            conn.prepare("SELECT token, username, expiry FROM refresh_tokens WHERE token = ?1")?;

        match stmt.query_row(params![token], map_refresh_row) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find a user's active refresh token, if any
    pub fn find_refresh_by_user(&self, username: &str) -> Result<Option<RefreshToken>> {
        let conn = Connection::open(&self.db_path)?;
        let mut stmt =
            conn.prepare("SELECT token, username, expiry FROM refresh_tokens WHERE username = ?1")?;

        match stmt.query_row(params![username], map_refresh_row) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace any existing refresh token for the same user.
    ///
    /// A single conditional upsert keyed on the UNIQUE username column, so a
    /// concurrent create for the same user cannot leave two live rows or a
    /// lost deletion behind.
    pub fn upsert_refresh(&self, token: &RefreshToken) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT INTO refresh_tokens (token, username, expiry) VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO UPDATE SET token = excluded.token, expiry = excluded.expiry",
            params![token.token, token.username, token.expiry.to_rfc3339()],
        )
        .context("Failed to upsert refresh token")?;
        Ok(())
    }

    /// Delete by token string; absence is not an error
    pub fn delete_refresh_by_token(&self, token: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute("DELETE FROM refresh_tokens WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Delete a user's refresh token; absence is not an error
    pub fn delete_refresh_by_user(&self, username: &str) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "DELETE FROM refresh_tokens WHERE username = ?1",
            params![username],
        )?;
        Ok(())
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let roles_str: String = row.get(4)?;
    Ok(User {
        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_else(|_| Uuid::nil()),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        roles: Role::parse_list(&roles_str),
        full_name: row.get(5)?,
        bio: row.get(6)?,
        image_url: row.get(7)?,
        enabled: row.get(8)?,
        email_verified: row.get(9)?,
        verification_token: row.get(10)?,
        verification_token_expiry: parse_timestamp(row.get::<_, Option<String>>(11)?),
        password_reset_token: row.get(12)?,
        password_reset_token_expiry: parse_timestamp(row.get::<_, Option<String>>(13)?),
        created_at: parse_timestamp(Some(row.get::<_, String>(14)?)).unwrap_or_else(Utc::now),
    })
}

fn map_refresh_row(row: &Row<'_>) -> rusqlite::Result<RefreshToken> {
    Ok(RefreshToken {
        token: row.get(0)?,
        username: row.get(1)?,
        expiry: parse_timestamp(Some(row.get::<_, String>(2)?)).unwrap_or_else(Utc::now),
    })
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (CredentialStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = CredentialStore::new(db_path).unwrap();
        (store, temp_file)
    }

    fn sample_user(username: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            roles: vec![Role::User],
            full_name: None,
            bio: None,
            image_url: None,
            enabled: false,
            email_verified: false,
            verification_token: Some(Uuid::new_v4().to_string()),
            verification_token_expiry: Some(Utc::now() + Duration::hours(24)),
            password_reset_token: None,
            password_reset_token_expiry: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_find_user() {
        let (store, _temp) = create_test_store();
        let user = sample_user("alice", "a@x.com");
        store.insert_user(&user).unwrap();

        let by_name = store.find_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.email, "a@x.com");
        assert_eq!(by_name.roles, vec![Role::User]);
        assert!(!by_name.enabled);
        assert!(by_name.verification_token.is_some());
        assert!(by_name.verification_token_expiry.unwrap() > Utc::now());

        let by_email = store.find_user_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(by_email.username, "alice");

        assert!(store.find_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn test_count_users() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.count_users().unwrap(), 0);

        store.insert_user(&sample_user("alice", "a@x.com")).unwrap();
        store.insert_user(&sample_user("bob", "b@x.com")).unwrap();
        assert_eq!(store.count_users().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (store, _temp) = create_test_store();
        store.insert_user(&sample_user("alice", "a@x.com")).unwrap();
        assert!(store.insert_user(&sample_user("alice", "b@x.com")).is_err());
        assert!(store.insert_user(&sample_user("bob", "a@x.com")).is_err());
    }

    #[test]
    fn test_save_user_persists_mutations() {
        let (store, _temp) = create_test_store();
        let mut user = sample_user("alice", "a@x.com");
        store.insert_user(&user).unwrap();

        user.enabled = true;
        user.email_verified = true;
        user.verification_token = None;
        user.verification_token_expiry = None;
        store.save_user(&user).unwrap();

        let loaded = store.find_user_by_username("alice").unwrap().unwrap();
        assert!(loaded.enabled);
        assert!(loaded.email_verified);
        assert!(loaded.verification_token.is_none());
        assert!(loaded.verification_token_expiry.is_none());
    }

    #[test]
    fn test_save_unknown_user_fails() {
        let (store, _temp) = create_test_store();
        assert!(store.save_user(&sample_user("ghost", "g@x.com")).is_err());
    }

    #[test]
    fn test_refresh_upsert_replaces_existing_row() {
        let (store, _temp) = create_test_store();

        let first = RefreshToken {
            token: Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            expiry: Utc::now() + Duration::days(7),
        };
        let second = RefreshToken {
            token: Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            expiry: Utc::now() + Duration::days(7),
        };

        store.upsert_refresh(&first).unwrap();
        store.upsert_refresh(&second).unwrap();

        // Exactly one live row: the second token wins, the first is gone.
        assert!(store.find_refresh_by_token(&first.token).unwrap().is_none());
        let active = store.find_refresh_by_user("alice").unwrap().unwrap();
        assert_eq!(active.token, second.token);
    }

    #[test]
    fn test_refresh_delete_is_idempotent() {
        let (store, _temp) = create_test_store();
        store.delete_refresh_by_token("missing").unwrap();
        store.delete_refresh_by_user("nobody").unwrap();

        let token = RefreshToken {
            token: Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            expiry: Utc::now() + Duration::days(7),
        };
        store.upsert_refresh(&token).unwrap();
        store.delete_refresh_by_token(&token.token).unwrap();
        assert!(store.find_refresh_by_user("alice").unwrap().is_none());
        store.delete_refresh_by_token(&token.token).unwrap();
    }
}
