/// Authentication middleware for Axum
///
/// Validates the `Authorization: Bearer <token>` header and adds an
/// [`AuthContext`] to the request extensions. Handlers read it with Axum's
/// `Extension` extractor.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use teamtask_shared::auth::jwt::TokenVerifier;
/// use teamtask_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.user_id)
/// }
///
/// let verifier = TokenVerifier::new("a-secret-that-is-at-least-32-bytes", "teamtask");
/// let app: Router = Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn_with_state(verifier, jwt_auth_middleware));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::jwt::{Claims, JwtError, TokenVerifier};

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// User ID from the token subject
    pub user_id: String,

    /// Email, when the identity provider supplies one
    pub email: Option<String>,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    /// Creates auth context from validated claims
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            _ => AuthError::InvalidToken(format!("Invalid token: {}", err)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials").into_response()
            }
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
        }
    }
}

/// Extracts the token from an `Authorization` header value
pub fn bearer_token(header_value: &str) -> Result<&str, AuthError> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Authenticates a request from its `Authorization` header
pub fn authenticate(
    verifier: &TokenVerifier,
    header_value: Option<&str>,
) -> Result<AuthContext, AuthError> {
    let header_value = header_value.ok_or(AuthError::MissingCredentials)?;
    let token = bearer_token(header_value)?;
    let claims = verifier.validate(token)?;

    Ok(AuthContext::from_claims(claims))
}

/// JWT authentication middleware
///
/// # Errors
///
/// - 401 Unauthorized: header missing, token invalid or expired
/// - 400 Bad Request: header is not a Bearer token
pub async fn jwt_auth_middleware(
    State(verifier): State<TokenVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth_context = authenticate(&verifier, header_value).map_err(|e| {
        tracing::warn!(error = %e, "Rejected request authentication");
        e
    })?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::create_token;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert!(bearer_token("Basic abc").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }

    #[test]
    fn test_authenticate() {
        let verifier = TokenVerifier::new(SECRET, "teamtask");
        let token = create_token(&Claims::new("u1", "teamtask"), SECRET).unwrap();
        let header_value = format!("Bearer {}", token);

        let auth = authenticate(&verifier, Some(&header_value)).unwrap();
        assert_eq!(auth, AuthContext::new("u1"));

        assert!(matches!(
            authenticate(&verifier, None),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            authenticate(&verifier, Some("Bearer nope")),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::InvalidFormat("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AuthError::InvalidToken("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
