use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for authenticated users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Privilege level attached to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Applicant,
    Admin,
}

/// An authenticated caller as resolved by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: UserId,
    pub role: CallerRole,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }
}

/// External authentication seam. Implementations map an opaque bearer token
/// to a stable user identity.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Caller, AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or invalid credentials")]
    Unauthenticated,
    #[error("caller lacks the required privileges")]
    Forbidden,
}

/// Pull the bearer token out of the `Authorization` header and resolve it.
pub fn caller_from_headers(
    headers: &HeaderMap,
    identity: &dyn IdentityProvider,
) -> Result<Caller, AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::Unauthenticated)?;

    identity.authenticate(token.trim())
}
