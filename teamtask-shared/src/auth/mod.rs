/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`jwt`]: Validation of identity-provider tokens
/// - [`middleware`]: Axum middleware that turns a bearer token into an `AuthContext`
/// - [`authorization`]: Guards built on the group role resolver
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::jwt::{create_token, Claims, TokenVerifier};
/// use teamtask_shared::auth::middleware::authenticate;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = TokenVerifier::new("a-secret-that-is-at-least-32-bytes", "teamtask");
/// let token = create_token(&Claims::new("u1", "teamtask"), verifier.secret())?;
///
/// let auth = authenticate(&verifier, Some(&format!("Bearer {}", token)))?;
/// assert_eq!(auth.user_id, "u1");
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
