//! Bearer token verification against the identity provider's signing secret.
//!
//! Tokens are HS256-signed JWTs whose `sub` is the user id. The role is not
//! trusted from the token; it is read from the user's profile in the store.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided or invalid format. Use: Bearer <token>")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Claims the identity provider puts in every ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError>;
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(), // HS256, validates exp
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(VerifiedToken {
            uid: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
        })
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[cfg(test)]
pub(crate) fn sign_for_tests(secret: &str, sub: &str, email: Option<&str>, exp: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    let claims = Claims {
        sub: sub.to_string(),
        email: email.map(str::to_string),
        email_verified: Some(true),
        name: None,
        exp,
        iat: Some(chrono::Utc::now().timestamp()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encoding should succeed")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

    #[tokio::test]
    async fn test_valid_token_yields_uid_and_email() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = sign_for_tests(SECRET, "user-42", Some("a@college.edu"), exp);

        let verified = JwtVerifier::new(SECRET).verify(&token).await.unwrap();
        assert_eq!(verified.uid, "user-42");
        assert_eq!(verified.email.as_deref(), Some("a@college.edu"));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        // Well past the default 60 second leeway.
        let exp = chrono::Utc::now().timestamp() - 300;
        let token = sign_for_tests(SECRET, "user-42", None, exp);

        let err = JwtVerifier::new(SECRET).verify(&token).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = sign_for_tests("another-secret-entirely-0123456789", "u", None, exp);
        assert!(JwtVerifier::new(SECRET).verify(&token).await.is_err());
    }

    #[test]
    fn test_bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(None).is_err());
    }
}
