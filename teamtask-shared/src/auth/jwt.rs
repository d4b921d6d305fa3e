/// JWT validation for tokens issued by the identity provider
///
/// TeamTask does not run sign-in flows itself. An external identity provider
/// authenticates the user and issues an HS256 token signed with a shared
/// secret; this module validates those tokens and extracts the caller's
/// user ID. `create_token` exists for tooling and tests.
///
/// # Validation
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Checks**: Signature, expiration, not-before, and issuer
/// - **Secret**: At least 32 bytes, shared with the identity provider
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::jwt::{create_token, Claims, TokenVerifier};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = TokenVerifier::new("a-secret-that-is-at-least-32-bytes", "teamtask");
///
/// let token = create_token(&Claims::new("user-123", "teamtask"), verifier.secret())?;
/// let claims = verifier.validate(&token)?;
/// assert_eq!(claims.sub, "user-123");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default token lifetime used by `Claims::new`
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 1;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Issuer claim does not match
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// JWT claims
///
/// - `sub`: User ID assigned by the identity provider
/// - `iss`: Issuer, checked against the configured value
/// - `iat` / `exp` / `nbf`: Unix timestamps
/// - `email`: Optional, informational only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// User email, when the provider includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    /// Creates claims with the default lifetime
    pub fn new(user_id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self::with_expiration(user_id, issuer, Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS))
    }

    /// Creates claims with a custom lifetime
    ///
    /// A negative `expires_in` produces an already-expired token, which is
    /// handy in tests.
    pub fn with_expiration(
        user_id: impl Into<String>,
        issuer: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        let not_before = if expires_in < Duration::zero() {
            now + expires_in - Duration::seconds(1)
        } else {
            now
        };

        Self {
            sub: user_id.into(),
            iss: issuer.into(),
            iat: not_before.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: not_before.timestamp(),
            email: None,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Creates an HS256 token from claims
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates tokens against a shared secret and expected issuer
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    secret: String,
    issuer: String,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Validates a token and extracts its claims
    ///
    /// # Errors
    ///
    /// - `JwtError::Expired` when `exp` has passed
    /// - `JwtError::InvalidIssuer` when `iss` does not match
    /// - `JwtError::ValidationError` for bad signatures or malformed tokens
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: self.issuer.clone(),
            },
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        })?;

        if token_data.claims.sub.is_empty() {
            return Err(JwtError::ValidationError("Token has an empty subject".to_string()));
        }

        Ok(token_data.claims)
    }
}
