//! Auth API
//! Mission: HTTP surface for the credential and session lifecycle

use crate::auth::{
    error::AuthError,
    models::{
        AddRoleRequest, Claims, ForgotPasswordRequest, LoginRequest, LoginResponse,
        RefreshTokenRequest, RefreshTokenResponse, RegisterRequest, ResendVerificationParams,
        ResetPasswordRequest, Role, UserProfile, VerifyEmailRequest,
    },
    service::AuthService,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
}

/// All /api routes. Identity is read from request extensions, populated by
/// the auth gate layered over the whole app.
pub fn routes(service: Arc<AuthService>) -> Router {
    let state = AuthState { service };
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/verify-email", post(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/me", get(me))
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/admin/add-role", post(add_role))
        .with_state(state)
}

/// HTTP-facing error wrapper. Domain errors map onto status codes here, in
/// one place, so the service layer stays protocol-free.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Unauthorized,
    Forbidden,
    BadRequest(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            ApiError::Forbidden => {
                (StatusCode::FORBIDDEN, "Insufficient permissions".to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Auth(e) => {
                let status = match &e {
                    AuthError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
                    AuthError::AccountDisabled | AuthError::Forbidden => StatusCode::FORBIDDEN,
                    AuthError::UserNotFound
                    | AuthError::EmailNotFound
                    | AuthError::TokenNotFound => StatusCode::NOT_FOUND,
                    AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
                    AuthError::InvalidToken
                    | AuthError::TokenExpired
                    | AuthError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
                    AuthError::Storage(inner) => {
                        error!("Internal error serving auth request: {:?}", inner);
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({ "error": "Internal server error" })),
                        )
                            .into_response();
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn identity(claims: Option<Extension<Claims>>) -> Result<Claims, ApiError> {
    claims
        .map(|Extension(c)| c)
        .ok_or(ApiError::Unauthorized)
}

async fn register(
    State(state): State<AuthState>,
    Json(request): Json<RegisterRequest>,
) -> Result<String, ApiError> {
    state.service.register(&request)?;
    Ok("User registered successfully. Please check your email to verify your account".to_string())
}

async fn login(
    State(state): State<AuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let tokens = state.service.login(&request.username, &request.password)?;
    Ok(Json(tokens))
}

async fn refresh(
    State(state): State<AuthState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<RefreshTokenResponse>, ApiError> {
    let token = state.service.refresh(&request.refresh_token)?;
    Ok(Json(token))
}

async fn logout(
    State(state): State<AuthState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<String, ApiError> {
    state.service.logout(&request.refresh_token)?;
    Ok("Logout successful".to_string())
}

async fn verify_email(
    State(state): State<AuthState>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<String, ApiError> {
    let message = state.service.verify_email(&request.email, &request.token)?;
    Ok(message.to_string())
}

async fn resend_verification(
    State(state): State<AuthState>,
    Query(params): Query<ResendVerificationParams>,
) -> Result<String, ApiError> {
    let message = state.service.resend_verification(&params.email)?;
    Ok(message.to_string())
}

async fn forgot_password(
    State(state): State<AuthState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<String, ApiError> {
    let message = state.service.forgot_password(&request.email)?;
    Ok(message.to_string())
}

async fn reset_password(
    State(state): State<AuthState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<String, ApiError> {
    let message =
        state
            .service
            .reset_password(&request.email, &request.token, &request.new_password)?;
    Ok(message.to_string())
}

// Answers straight from the verified claims, no store round-trip.
async fn me(claims: Option<Extension<Claims>>) -> Result<Json<Claims>, ApiError> {
    let claims = identity(claims)?;
    Ok(Json(claims))
}

async fn get_profile(
    State(state): State<AuthState>,
    claims: Option<Extension<Claims>>,
) -> Result<Json<UserProfile>, ApiError> {
    let claims = identity(claims)?;
    let profile = state.service.get_profile(&claims.sub)?;
    Ok(Json(profile))
}

async fn update_profile(
    State(state): State<AuthState>,
    claims: Option<Extension<Claims>>,
    Json(update): Json<UserProfile>,
) -> Result<Json<UserProfile>, ApiError> {
    let claims = identity(claims)?;
    let profile = state.service.update_profile(&claims.sub, &update)?;
    Ok(Json(profile))
}

async fn add_role(
    State(state): State<AuthState>,
    claims: Option<Extension<Claims>>,
    Json(request): Json<AddRoleRequest>,
) -> Result<String, ApiError> {
    let claims = identity(claims)?;
    if !claims.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let role = Role::from_str(&request.role)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown role: {}", request.role)))?;
    state.service.add_role(&request.username, role)?;
    Ok(format!(
        "Role {} added to user {}",
        request.role, request.username
    ))
}
