//! Auth Service
//! Mission: Orchestrate registration, login, refresh, and the single-use token flows

use crate::auth::{
    error::AuthError,
    jwt::JwtHandler,
    models::{
        LoginResponse, RefreshTokenResponse, RegisterRequest, Role, User, UserProfile,
    },
    refresh::RefreshTokenManager,
    store::CredentialStore,
};
use crate::email::{EmailJob, EmailQueue};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Verification links stay valid for a day; reset links for an hour
/// (higher-risk operation, shorter window).
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Orchestrates the credential and session lifecycle over the store, the
/// token codec, the refresh token manager, and the email queue.
pub struct AuthService {
    store: Arc<CredentialStore>,
    jwt: Arc<JwtHandler>,
    refresh_tokens: Arc<RefreshTokenManager>,
    email: EmailQueue,
    first_user_admin: bool,
}

impl AuthService {
    pub fn new(
        store: Arc<CredentialStore>,
        jwt: Arc<JwtHandler>,
        refresh_tokens: Arc<RefreshTokenManager>,
        email: EmailQueue,
        first_user_admin: bool,
    ) -> Self {
        info!(
            "Auth service initialized (first-user-admin: {})",
            first_user_admin
        );
        Self {
            store,
            jwt,
            refresh_tokens,
            email,
            first_user_admin,
        }
    }

    /// Register a new account, disabled until email verification.
    pub fn register(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        debug!("Starting registration for username: {}", request.username);

        if self
            .store
            .find_user_by_username(&request.username)?
            .is_some()
        {
            warn!(
                "Registration attempt with existing username: {}",
                request.username
            );
            return Err(AuthError::AlreadyExists("Username"));
        }
        if self.store.find_user_by_email(&request.email)?.is_some() {
            warn!(
                "Registration attempt with existing email: {}",
                request.email
            );
            return Err(AuthError::AlreadyExists("Email"));
        }

        let user_count = self.store.count_users()?;
        let role = if user_count == 0 && self.first_user_admin {
            Role::Admin
        } else {
            Role::User
        };
        info!(
            "Assigning {} role to new user: {}",
            role.as_str(),
            request.username
        );

        let (token, expiry) = new_ephemeral_token(Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));

        let user = User {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: hash_password(&request.password)?,
            roles: vec![role],
            full_name: None,
            bio: None,
            image_url: None,
            enabled: false, // Disabled until email verified
            email_verified: false,
            verification_token: Some(token.clone()),
            verification_token_expiry: Some(expiry),
            password_reset_token: None,
            password_reset_token_expiry: None,
            created_at: Utc::now(),
        };

        self.store.insert_user(&user)?;
        info!(
            "✅ User '{}' registered (disabled, pending email verification)",
            user.username
        );

        self.email.enqueue(EmailJob::Verification {
            to: user.email,
            username: user.username,
            token,
        });

        Ok(())
    }

    /// Authenticate and issue an access + refresh token pair.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable. If the
    /// refresh token cannot be created the whole login fails - an access
    /// token is never returned without its paired refresh token.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        info!("🔐 Login attempt: {}", username);

        let user = self
            .store
            .find_user_by_username(username)?
            .ok_or(AuthError::AuthenticationFailed)?;

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AuthError::Storage(anyhow::Error::new(e)))?;
        if !valid {
            warn!("❌ Failed login attempt: {}", username);
            return Err(AuthError::AuthenticationFailed);
        }

        if !user.enabled {
            warn!("Disabled account login attempt: {}", username);
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self
            .jwt
            .issue_access(&user.username, &user.authorities())
            .map_err(|e| AuthError::Storage(anyhow::Error::new(e)))?;

        let refresh_token = self.refresh_tokens.create(&user.username)?;

        info!(
            "✅ Login successful: {} with authorities {:?}",
            username,
            user.authorities()
        );

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh_token.token,
        })
    }

    /// Exchange a live refresh token for a fresh access token.
    ///
    /// The user and roles are reloaded from the store, not taken from the
    /// refresh token row - roles may have changed since it was minted. The
    /// refresh token itself is not rotated.
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshTokenResponse, AuthError> {
        debug!("Token refresh request received");

        let token = self
            .refresh_tokens
            .find_by_token(refresh_token)?
            .ok_or(AuthError::TokenNotFound)?;

        let token = self.refresh_tokens.verify_expiration(token)?;

        let user = self
            .store
            .find_user_by_username(&token.username)?
            .ok_or(AuthError::UserNotFound)?;

        let access_token = self
            .jwt
            .issue_access(&user.username, &user.authorities())
            .map_err(|e| AuthError::Storage(anyhow::Error::new(e)))?;

        info!("Token refreshed for user: {}", user.username);
        Ok(RefreshTokenResponse { access_token })
    }

    /// Invalidate the refresh token. The access token stays valid until its
    /// natural expiry.
    pub fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.refresh_tokens.delete_by_token(refresh_token)?;
        info!("Logout successful");
        Ok(())
    }

    /// Consume a verification token, enabling the account.
    pub fn verify_email(&self, email: &str, token: &str) -> Result<&'static str, AuthError> {
        info!("Attempting to verify email for: {}", email);

        let mut user = self
            .store
            .find_user_by_email(email)?
            .ok_or(AuthError::UserNotFound)?;

        // Idempotent against replays after success: the token is neither
        // checked nor consumed once the account is verified.
        if user.email_verified {
            info!("Email already verified for user: {}", user.username);
            return Ok("Email already verified");
        }

        if user.verification_token.as_deref() != Some(token) {
            warn!("Invalid verification token for user: {}", user.username);
            return Err(AuthError::InvalidToken);
        }

        match user.verification_token_expiry {
            Some(expiry) if Utc::now() <= expiry => {}
            _ => {
                warn!("Verification token expired for user: {}", user.username);
                return Err(AuthError::TokenExpired);
            }
        }

        user.email_verified = true;
        user.enabled = true;
        user.verification_token = None;
        user.verification_token_expiry = None;
        self.store.save_user(&user)?;

        info!("✅ Email verified for user: {}", user.username);

        self.email.enqueue(EmailJob::Welcome {
            to: user.email,
            username: user.username,
            roles: user
                .roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(","),
        });

        Ok("Email verification successful")
    }

    /// Issue a fresh verification token, overwriting any prior one.
    pub fn resend_verification(&self, email: &str) -> Result<&'static str, AuthError> {
        info!("Resending verification email for: {}", email);

        let mut user = self
            .store
            .find_user_by_email(email)?
            .ok_or(AuthError::EmailNotFound)?;

        if user.email_verified {
            return Ok("Email already verified");
        }

        let (token, expiry) = new_ephemeral_token(Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));
        user.verification_token = Some(token.clone());
        user.verification_token_expiry = Some(expiry);
        self.store.save_user(&user)?;

        self.email.enqueue(EmailJob::Verification {
            to: user.email,
            username: user.username,
            token,
        });

        Ok("Verification email sent")
    }

    /// Issue a password-reset token, overwriting any prior one.
    pub fn forgot_password(&self, email: &str) -> Result<&'static str, AuthError> {
        info!("Password reset requested for email: {}", email);

        let mut user = self
            .store
            .find_user_by_email(email)?
            .ok_or(AuthError::EmailNotFound)?;

        let (token, expiry) = new_ephemeral_token(Duration::hours(RESET_TOKEN_TTL_HOURS));
        user.password_reset_token = Some(token.clone());
        user.password_reset_token_expiry = Some(expiry);
        self.store.save_user(&user)?;

        self.email.enqueue(EmailJob::PasswordReset {
            to: user.email,
            username: user.username,
            token,
        });

        info!("Password reset email queued for: {}", email);
        Ok("Password reset email sent")
    }

    /// Consume a reset token and store the new password hash.
    ///
    /// Token mismatch and token expiry surface as the same error so the
    /// endpoint cannot be used as an oracle for token guessing.
    pub fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<&'static str, AuthError> {
        info!("Attempting password reset for email: {}", email);

        let mut user = self
            .store
            .find_user_by_email(email)?
            .ok_or(AuthError::EmailNotFound)?;

        if user.password_reset_token.as_deref() != Some(token) {
            warn!("Invalid password reset token for user: {}", user.username);
            return Err(AuthError::InvalidOrExpiredToken);
        }

        match user.password_reset_token_expiry {
            Some(expiry) if Utc::now() <= expiry => {}
            _ => {
                warn!("Expired password reset token for user: {}", user.username);
                return Err(AuthError::InvalidOrExpiredToken);
            }
        }

        user.password_hash = hash_password(new_password)?;
        user.password_reset_token = None;
        user.password_reset_token_expiry = None;
        self.store.save_user(&user)?;

        // Any outstanding session should not outlive the old password.
        self.refresh_tokens.delete_by_user(&user.username)?;

        info!("✅ Password reset for user: {}", user.username);
        Ok("Password reset successful")
    }

    pub fn get_profile(&self, username: &str) -> Result<UserProfile, AuthError> {
        let user = self
            .store
            .find_user_by_username(username)?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserProfile::from_user(&user))
    }

    /// Update profile fields; username and email changes are checked for
    /// collisions first.
    pub fn update_profile(
        &self,
        username: &str,
        update: &UserProfile,
    ) -> Result<UserProfile, AuthError> {
        let mut user = self
            .store
            .find_user_by_username(username)?
            .ok_or(AuthError::UserNotFound)?;

        let mut renamed = false;
        if let Some(new_username) = update.username.as_deref() {
            if new_username != user.username {
                if self.store.find_user_by_username(new_username)?.is_some() {
                    warn!(
                        "Attempt to change username to existing username: {} by user: {}",
                        new_username, username
                    );
                    return Err(AuthError::AlreadyExists("Username"));
                }
                info!("Username change: {} -> {}", username, new_username);
                user.username = new_username.to_string();
                renamed = true;
            }
        }

        if let Some(new_email) = update.email.as_deref() {
            if new_email != user.email {
                if self.store.find_user_by_email(new_email)?.is_some() {
                    warn!(
                        "Attempt to change email to existing email: {} by user: {}",
                        new_email, username
                    );
                    return Err(AuthError::AlreadyExists("Email"));
                }
                user.email = new_email.to_string();
            }
        }

        user.full_name = update.full_name.clone();
        user.bio = update.bio.clone();
        user.image_url = update.image_url.clone();

        self.store.save_user(&user)?;

        if renamed {
            // Refresh tokens are keyed by username; drop the stale row so the
            // old name cannot linger as a session handle.
            self.refresh_tokens.delete_by_user(username)?;
        }

        info!("Profile updated for user: {}", user.username);
        Ok(UserProfile::from_user(&user))
    }

    /// Grant a role to a user (administrative action). Adding a role the user
    /// already holds is a no-op.
    pub fn add_role(&self, username: &str, role: Role) -> Result<(), AuthError> {
        info!("Adding {} role to user {}", role.as_str(), username);

        let mut user = self
            .store
            .find_user_by_username(username)?
            .ok_or(AuthError::UserNotFound)?;

        if user.roles.contains(&role) {
            info!("User {} already has role {}", username, role.as_str());
            return Ok(());
        }

        user.roles.push(role);
        self.store.save_user(&user)?;
        info!("✅ Added role {} to user {}", role.as_str(), username);
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    hash(password, DEFAULT_COST).map_err(|e| AuthError::Storage(anyhow::Error::new(e)))
}

/// Shared generator for both single-use token channels: an opaque random
/// string plus its expiry. The call sites keep distinct error kinds.
fn new_ephemeral_token(ttl: Duration) -> (String, DateTime<Utc>) {
    (Uuid::new_v4().to_string(), Utc::now() + ttl)
}
