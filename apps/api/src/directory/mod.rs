//! Faculty-side management of the student and drive records, plus role
//! assignment for user accounts.

pub mod drives;
pub mod handlers;
pub mod students;

use chrono::Utc;
use tracing::info;

use crate::errors::AppError;
use crate::models::user::{Role, UserProfile};
use crate::store::PlacementStore;

/// Sets `role` on the user's profile, creating the profile if the account has none yet.
/// Permissions are reset to the role's defaults.
pub async fn assign_role(
    store: &dyn PlacementStore,
    user_id: &str,
    role: Role,
) -> Result<UserProfile, AppError> {
    let now = Utc::now();
    let profile = match store.get_user(user_id).await? {
        Some(existing) => UserProfile {
            role: Some(role),
            permissions: role.default_permissions(),
            updated_at: now,
            ..existing
        },
        None => UserProfile {
            id: user_id.to_string(),
            email: String::new(),
            name: String::new(),
            role: Some(role),
            active: true,
            permissions: role.default_permissions(),
            created_at: now,
            updated_at: now,
        },
    };
    store.upsert_user(&profile).await?;
    info!("User {user_id} assigned role {role}");
    Ok(profile)
}
