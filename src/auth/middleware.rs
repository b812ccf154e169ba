//! Auth Gate
//! Mission: Attach verified claims to requests without ever rejecting them

use crate::auth::jwt::JwtHandler;
use crate::auth::models::Claims;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fail-open authentication gate.
///
/// A valid bearer token puts [`Claims`] into the request extensions; a
/// missing, malformed, or expired token leaves them absent and the request
/// proceeds anonymously. Handlers decide whether identity is required by
/// extracting `Option<Extension<Claims>>`.
pub async fn auth_gate(
    State(jwt): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        match jwt.verify(token) {
            Ok(claims) => {
                debug!("Authenticated request from: {}", claims.sub);
                req.extensions_mut().insert(claims);
            }
            Err(e) => {
                // Anonymous passthrough; the handler returns 401 if it cares.
                warn!("Rejected bearer token: {:?}", e);
            }
        }
    }
    next.run(req).await
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::util::ServiceExt;

    async fn whoami(claims: Option<Extension<Claims>>) -> String {
        match claims {
            Some(Extension(c)) => c.sub,
            None => "anonymous".to_string(),
        }
    }

    fn test_app(jwt: Arc<JwtHandler>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(jwt, auth_gate))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(auth_header: Option<String>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = auth_header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_attaches_claims() {
        let jwt = Arc::new(JwtHandler::new(Some("gate-test-secret".to_string()), 900));
        let token = jwt
            .issue_access("alice", &["ROLE_USER".to_string()])
            .unwrap();

        let app = test_app(jwt);
        let response = app
            .oneshot(request(Some(format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "alice");
    }

    #[tokio::test]
    async fn test_missing_header_passes_through_anonymously() {
        let jwt = Arc::new(JwtHandler::new(Some("gate-test-secret".to_string()), 900));
        let app = test_app(jwt);

        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_bad_token_passes_through_anonymously() {
        let jwt = Arc::new(JwtHandler::new(Some("gate-test-secret".to_string()), 900));
        let other = JwtHandler::new(Some("a-different-secret".to_string()), 900);
        let forged = other
            .issue_access("mallory", &["ROLE_ADMIN".to_string()])
            .unwrap();

        let app = test_app(jwt);
        let response = app
            .oneshot(request(Some(format!("Bearer {forged}"))))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_ignored() {
        let jwt = Arc::new(JwtHandler::new(Some("gate-test-secret".to_string()), 900));
        let app = test_app(jwt);

        let response = app
            .oneshot(request(Some("Basic YWxpY2U6cHc=".to_string())))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "anonymous");
    }
}
