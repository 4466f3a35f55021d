//! Caller identity and role gates.
//!
//! [`AuthUser`] verifies the bearer token, loads the caller's role from their
//! user profile and charges one request against the caller's rate-limit
//! window. The `Require*` extractors wrap it and reject callers whose role is
//! not allowed.
//!
//! In development with `DEV_AUTH_BYPASS=true` every request is treated as the
//! synthetic `dev-user-id` account; its role comes from the `x-dev-role`
//! header and defaults to faculty.

pub mod rate_limit;
pub mod verifier;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::user::Role;
use crate::state::AppState;
use verifier::bearer_token;

pub const DEV_USER_ID: &str = "dev-user-id";
const DEV_ROLE_HEADER: &str = "x-dev-role";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
}

impl Identity {
    fn development(role: Option<Role>) -> Self {
        Identity {
            uid: DEV_USER_ID.to_string(),
            email: Some("dev@example.com".to_string()),
            name: Some("Development User".to_string()),
            role,
        }
    }

    /// Checks the caller against a set of allowed roles.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        let Some(role) = self.role else {
            return Err(AppError::Forbidden("User role not found".to_string()));
        };
        if allowed.contains(&role) {
            return Ok(());
        }
        let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
        Err(AppError::Forbidden(format!(
            "Access denied. Required role: {}",
            names.join(" or ")
        )))
    }
}

fn dev_role(parts: &Parts) -> Option<Role> {
    match parts.headers.get(DEV_ROLE_HEADER) {
        None => Some(Role::Faculty),
        Some(value) => value.to_str().ok().and_then(|r| r.parse().ok()),
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Identity, AppError> {
    if state.config.auth_bypass_enabled() {
        let identity = Identity::development(dev_role(parts));
        debug!("Auth bypass: using development identity ({:?})", identity.role);
        return Ok(identity);
    }

    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header).map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let verifier = state.verifier.as_ref().ok_or_else(|| {
        AppError::Unauthorized("Token verification is not configured".to_string())
    })?;
    let verified = verifier.verify(token).await.map_err(|e| {
        warn!("Token verification error: {e}");
        AppError::Unauthorized(e.to_string())
    })?;

    let profile = state.store.get_user(&verified.uid).await?;
    if let Some(profile) = &profile {
        if !profile.active {
            return Err(AppError::Forbidden("User account is disabled".to_string()));
        }
    }

    Ok(Identity {
        email: verified
            .email
            .or_else(|| profile.as_ref().map(|p| p.email.clone()))
            .filter(|e| !e.is_empty()),
        name: verified
            .name
            .or_else(|| profile.as_ref().map(|p| p.name.clone()))
            .filter(|n| !n.is_empty()),
        role: profile.and_then(|p| p.role),
        uid: verified.uid,
    })
}

/// Any signed-in caller. Rejects with 401 when the token is missing or invalid
/// and with 429 when the caller's window is exhausted.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(AuthUser(identity.clone()));
        }

        let identity = authenticate(parts, state).await?;
        state
            .rate_limiter
            .check(&format!("user:{}", identity.uid))
            .await
            .into_result()?;

        parts.extensions.insert(identity.clone());
        Ok(AuthUser(identity))
    }
}

/// Requires `faculty` or `admin`. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct RequireFaculty(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for RequireFaculty {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        identity.require_role(&[Role::Faculty, Role::Admin])?;
        Ok(RequireFaculty(identity))
    }
}

/// Requires `student`.
#[derive(Debug, Clone)]
pub struct RequireStudent(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for RequireStudent {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        identity.require_role(&[Role::Student])?;
        Ok(RequireStudent(identity))
    }
}

/// Requires `admin`.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        identity.require_role(&[Role::Admin])?;
        Ok(RequireAdmin(identity))
    }
}

/// Identity when a valid token is present, `None` otherwise. Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.config.auth_bypass_enabled() && !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(OptionalAuth(None));
        }
        match authenticate(parts, state).await {
            Ok(identity) => Ok(OptionalAuth(Some(identity))),
            Err(e) => {
                debug!("Optional auth: continuing anonymously ({e})");
                Ok(OptionalAuth(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use chrono::Utc;

    use super::verifier::{sign_for_tests, JwtVerifier};
    use super::*;
    use crate::models::user::UserProfile;
    use crate::state::test_state;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/faculty/students");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn token_state() -> AppState {
        let mut state = test_state();
        state.config.dev_auth_bypass = false;
        state.verifier = Some(Arc::new(JwtVerifier::new(SECRET)));
        state
    }

    fn bearer(uid: &str) -> String {
        let exp = Utc::now().timestamp() + 600;
        format!("Bearer {}", sign_for_tests(SECRET, uid, Some("u@college.edu"), exp))
    }

    #[tokio::test]
    async fn test_bypass_defaults_to_faculty() {
        let state = test_state();
        let mut p = parts(&[]);
        let RequireFaculty(identity) = RequireFaculty::from_request_parts(&mut p, &state)
            .await
            .unwrap();
        assert_eq!(identity.uid, DEV_USER_ID);
        assert_eq!(identity.role, Some(Role::Faculty));
    }

    #[tokio::test]
    async fn test_bypass_role_header_is_enforced() {
        let state = test_state();
        let mut p = parts(&[("x-dev-role", "student")]);
        let err = RequireFaculty::from_request_parts(&mut p, &state)
            .await
            .unwrap_err();
        match err {
            AppError::Forbidden(msg) => {
                assert_eq!(msg, "Access denied. Required role: faculty or admin")
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut p = parts(&[("x-dev-role", "student")]);
        assert!(RequireStudent::from_request_parts(&mut p, &state).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let state = token_state();
        let mut p = parts(&[]);
        let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
        match err {
            AppError::Unauthorized(msg) => assert!(msg.starts_with("No token provided")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_role_comes_from_profile() {
        let state = token_state();
        let now = Utc::now();
        state
            .store
            .upsert_user(&UserProfile {
                id: "u-admin".into(),
                email: "admin@college.edu".into(),
                name: "Admin".into(),
                role: Some(Role::Admin),
                active: true,
                permissions: Role::Admin.default_permissions(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let header = bearer("u-admin");
        let mut p = parts(&[("authorization", header.as_str())]);
        let RequireAdmin(identity) = RequireAdmin::from_request_parts(&mut p, &state)
            .await
            .unwrap();
        assert_eq!(identity.uid, "u-admin");

        // A verified caller without a profile has no role.
        let header = bearer("u-nobody");
        let mut p = parts(&[("authorization", header.as_str())]);
        let err = RequireFaculty::from_request_parts(&mut p, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg == "User role not found"));
    }

    #[tokio::test]
    async fn test_optional_auth_never_rejects() {
        let state = token_state();
        let mut p = parts(&[("authorization", "Bearer not-a-jwt")]);
        let OptionalAuth(identity) = OptionalAuth::from_request_parts(&mut p, &state)
            .await
            .unwrap();
        assert!(identity.is_none());
    }

    #[tokio::test]
    async fn test_caller_is_rate_limited() {
        let mut state = test_state();
        state.rate_limiter = Arc::new(rate_limit::MemoryRateLimiter::new(
            1,
            std::time::Duration::from_secs(60),
            10,
        ));
        let mut p = parts(&[]);
        assert!(AuthUser::from_request_parts(&mut p, &state).await.is_ok());
        let mut p = parts(&[]);
        let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
    }
}
