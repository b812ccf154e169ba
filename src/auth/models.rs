//! Authentication Models
//! Mission: Define user, token, and request/response data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub roles: Vec<Role>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub enabled: bool, // false until email verified
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_token_expiry: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Authority strings carried in access-token claims ("ROLE_ADMIN", "ROLE_USER")
    pub fn authorities(&self) -> Vec<String> {
        self.roles
            .iter()
            .map(|r| format!("ROLE_{}", r.as_str()))
            .collect()
    }

    /// Roles joined for single-column storage
    pub fn roles_string(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "ADMIN")]
    Admin, // Full access including role administration
    #[serde(rename = "USER")]
    User, // Standard account
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }

    /// Parse a comma-separated role list from storage, dropping unknown names
    pub fn parse_list(s: &str) -> Vec<Role> {
        s.split(',')
            .filter_map(|name| Role::from_str(name.trim()))
            .collect()
    }
}

/// JWT claims payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // subject (username)
    pub roles: Vec<String>, // authority names, ROLE_-prefixed
    pub iat: i64,           // issued-at timestamp
    pub exp: i64,           // expiration timestamp
}

impl Claims {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.roles.iter().any(|r| r == authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority("ROLE_ADMIN")
    }
}

/// Persisted refresh token - one active row per user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    pub username: String,
    pub expiry: DateTime<Utc>,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response: paired access + refresh tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh / logout request body
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Refresh response: new access token only (refresh token is not rotated)
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
}

/// Email verification request body
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub token: String,
}

/// Forgot-password request body
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password request body
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

/// Resend-verification query parameters
#[derive(Debug, Deserialize)]
pub struct ResendVerificationParams {
    pub email: String,
}

/// Profile view and update payload (sanitized)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
}

impl UserProfile {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: Some(user.username.clone()),
            email: Some(user.email.clone()),
            full_name: user.full_name.clone(),
            bio: user.bio.clone(),
            image_url: user.image_url.clone(),
        }
    }
}

/// Admin role-grant request body
#[derive(Debug, Deserialize)]
pub struct AddRoleRequest {
    pub username: String,
    pub role: String,
}
