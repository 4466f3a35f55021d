use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{DriveListing, EligibleDrives, PublicDrive, StudentDashboard};
use crate::auth::RequireStudent;
use crate::enrollment::handlers::{EnrollmentCreated, WithdrawRequest};
use crate::enrollment::manager::{StatusUpdate, StudentEnrollments};
use crate::errors::AppError;
use crate::models::enrollment::Enrollment;
use crate::models::student::{ProfileUpdate, Student};
use crate::routes::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    #[serde(default)]
    pub drive_id: String,
}

/// GET /api/student/drives/public
/// No authentication; active drives with a reduced field set.
pub async fn handle_public_drives(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<PublicDrive>>>, AppError> {
    let drives = super::public_drives(state.store.as_ref()).await?;
    Ok(Json(Envelope::ok(drives)))
}

/// GET /api/student/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
) -> Result<Json<Envelope<Student>>, AppError> {
    let student = super::profile(state.store.as_ref(), &caller).await?;
    Ok(Json(Envelope::ok(student)))
}

/// PUT /api/student/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Envelope<Student>>, AppError> {
    let student = super::update_profile(state.store.as_ref(), &caller, update).await?;
    Ok(Json(
        Envelope::ok(student).with_message("Profile updated successfully"),
    ))
}

/// GET /api/student/drives
pub async fn handle_drives(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
) -> Result<Json<Envelope<Vec<DriveListing>>>, AppError> {
    let drives = super::drives_for(state.store.as_ref(), &caller).await?;
    Ok(Json(Envelope::ok(drives)))
}

/// GET /api/student/eligible-drives
pub async fn handle_eligible_drives(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
) -> Result<Json<Envelope<EligibleDrives>>, AppError> {
    let result = super::eligible_drives(state.store.as_ref(), &caller).await?;
    Ok(Json(Envelope::ok(result)))
}

/// POST /api/student/enroll
pub async fn handle_enroll(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
    Json(req): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<EnrollmentCreated>), AppError> {
    let enrollment = super::enroll(state.store.as_ref(), &caller, &req.drive_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollmentCreated {
            success: true,
            enrollment_id: enrollment.id.clone(),
            message: format!("Successfully enrolled in {}", enrollment.company_name),
            enrollment,
        }),
    ))
}

/// GET /api/student/enrollments
pub async fn handle_enrollments(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
) -> Result<Json<Envelope<StudentEnrollments>>, AppError> {
    let result = super::enrollments(state.store.as_ref(), &caller).await?;
    Ok(Json(Envelope::ok(result)))
}

/// GET /api/student/enrollments/:id
pub async fn handle_enrollment(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Enrollment>>, AppError> {
    let enrollment = super::own_enrollment(state.store.as_ref(), &caller, &id).await?;
    Ok(Json(Envelope::ok(enrollment)))
}

/// DELETE /api/student/enrollments/:id
pub async fn handle_withdraw(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
    Path(id): Path<String>,
    body: Option<Json<WithdrawRequest>>,
) -> Result<Json<Envelope<StatusUpdate>>, AppError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let update = super::withdraw(state.store.as_ref(), &caller, &id, reason).await?;
    let message = update.message.clone();
    Ok(Json(Envelope::ok(update).with_message(message)))
}

/// GET /api/student/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    RequireStudent(caller): RequireStudent,
) -> Result<Json<Envelope<StudentDashboard>>, AppError> {
    let dashboard = super::dashboard(state.store.as_ref(), &caller).await?;
    Ok(Json(Envelope::ok(dashboard)))
}
