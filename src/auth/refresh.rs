//! Refresh Token Manager
//! Mission: Own the persisted refresh-token lifecycle

use crate::auth::{error::AuthError, models::RefreshToken, store::CredentialStore};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle per user: NONE -> ACTIVE -> NONE (logout or expiry), or
/// ACTIVE -> ACTIVE' when a new login replaces the row.
pub struct RefreshTokenManager {
    store: Arc<CredentialStore>,
    ttl_secs: i64,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<CredentialStore>, ttl_secs: i64) -> Self {
        info!("Refresh token manager initialized (ttl {}s)", ttl_secs);
        Self { store, ttl_secs }
    }

    /// Create a refresh token for a user, replacing any existing one.
    pub fn create(&self, username: &str) -> Result<RefreshToken, AuthError> {
        debug!("Creating refresh token for user: {}", username);

        if self.store.find_user_by_username(username)?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let token = RefreshToken {
            token: Uuid::new_v4().to_string(),
            username: username.to_string(),
            expiry: Utc::now() + Duration::seconds(self.ttl_secs),
        };

        // Single atomic upsert: the username UNIQUE constraint guarantees at
        // most one live token per user even under concurrent logins.
        self.store.upsert_refresh(&token)?;

        info!("Refresh token created for user: {}", username);
        Ok(token)
    }

    /// Pure lookup, no mutation
    pub fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, AuthError> {
        Ok(self.store.find_refresh_by_token(token)?)
    }

    /// Fail with `TokenExpired` if the expiry has passed, deleting the row as
    /// a side effect. Expired tokens are garbage-collected on touch, not by a
    /// background sweep - callers must not assume failure is side-effect-free.
    pub fn verify_expiration(&self, token: RefreshToken) -> Result<RefreshToken, AuthError> {
        if token.expiry < Utc::now() {
            warn!("Refresh token expired for user: {}", token.username);
            self.store.delete_refresh_by_token(&token.token)?;
            return Err(AuthError::TokenExpired);
        }
        Ok(token)
    }

    /// Idempotent delete by token string (logout)
    pub fn delete_by_token(&self, token: &str) -> Result<(), AuthError> {
        debug!("Deleting refresh token");
        Ok(self.store.delete_refresh_by_token(token)?)
    }

    /// Idempotent delete of a user's token (account-level invalidation)
    pub fn delete_by_user(&self, username: &str) -> Result<(), AuthError> {
        debug!("Deleting refresh token for user: {}", username);
        Ok(self.store.delete_refresh_by_user(username)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{Role, User};
    use tempfile::NamedTempFile;

    fn setup() -> (RefreshTokenManager, Arc<CredentialStore>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(CredentialStore::new(temp_file.path().to_str().unwrap()).unwrap());
        let manager = RefreshTokenManager::new(store.clone(), 7 * 24 * 3600);
        (manager, store, temp_file)
    }

    fn insert_user(store: &CredentialStore, username: &str) {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@x.com"),
            password_hash: "hash".to_string(),
            roles: vec![Role::User],
            full_name: None,
            bio: None,
            image_url: None,
            enabled: true,
            email_verified: true,
            verification_token: None,
            verification_token_expiry: None,
            password_reset_token: None,
            password_reset_token_expiry: None,
            created_at: Utc::now(),
        };
        store.insert_user(&user).unwrap();
    }

    #[test]
    fn test_create_requires_known_user() {
        let (manager, _store, _temp) = setup();
        assert!(matches!(
            manager.create("ghost"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn test_create_twice_leaves_one_active_token() {
        let (manager, store, _temp) = setup();
        insert_user(&store, "alice");

        let first = manager.create("alice").unwrap();
        let second = manager.create("alice").unwrap();
        assert_ne!(first.token, second.token);

        assert!(manager.find_by_token(&first.token).unwrap().is_none());
        let active = store.find_refresh_by_user("alice").unwrap().unwrap();
        assert_eq!(active.token, second.token);
    }

    #[test]
    fn test_verify_expiration_passes_fresh_token_through() {
        let (manager, store, _temp) = setup();
        insert_user(&store, "alice");

        let token = manager.create("alice").unwrap();
        let verified = manager.verify_expiration(token.clone()).unwrap();
        assert_eq!(verified.token, token.token);
        assert!(manager.find_by_token(&token.token).unwrap().is_some());
    }

    #[test]
    fn test_verify_expiration_deletes_expired_token() {
        let (manager, store, _temp) = setup();
        insert_user(&store, "alice");

        let expired = RefreshToken {
            token: Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            expiry: Utc::now() - Duration::seconds(1),
        };
        store.upsert_refresh(&expired).unwrap();

        let result = manager.verify_expiration(expired.clone());
        assert!(matches!(result, Err(AuthError::TokenExpired)));

        // Consumed on touch: unfindable afterwards.
        assert!(manager.find_by_token(&expired.token).unwrap().is_none());
    }

    #[test]
    fn test_delete_by_user_and_token_are_idempotent() {
        let (manager, store, _temp) = setup();
        insert_user(&store, "alice");

        let token = manager.create("alice").unwrap();
        manager.delete_by_token(&token.token).unwrap();
        manager.delete_by_token(&token.token).unwrap();
        manager.delete_by_user("alice").unwrap();
        assert!(manager.find_by_token(&token.token).unwrap().is_none());
    }
}
