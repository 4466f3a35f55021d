use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::manager::{self, BulkResult, DriveEnrollments, StatusUpdate};
use super::status::{valid_statuses, EnrollmentStatus};
use crate::auth::RequireFaculty;
use crate::errors::AppError;
use crate::models::enrollment::Enrollment;
use crate::routes::Envelope;
use crate::state::AppState;
use crate::store::EnrollmentQuery;

pub(crate) fn parse_status(raw: &str) -> Result<EnrollmentStatus, AppError> {
    raw.parse::<EnrollmentStatus>().map_err(|e| {
        AppError::InvalidTransition(format!("{e}. Valid statuses: {}", valid_statuses()))
    })
}

fn parse_optional_status(raw: Option<&str>) -> Result<Option<EnrollmentStatus>, AppError> {
    raw.filter(|s| !s.trim().is_empty()).map(parse_status).transpose()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentListQuery {
    pub drive_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub drive_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCreated {
    pub success: bool,
    pub enrollment_id: String,
    pub enrollment: Enrollment,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRequest {
    pub round_number: Option<u32>,
    pub cleared: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub enrollment_ids: Vec<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawRequest {
    pub reason: Option<String>,
}

/// GET /api/faculty/enrollments
pub async fn handle_list_enrollments(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Query(params): Query<EnrollmentListQuery>,
) -> Result<Json<Envelope<Vec<Enrollment>>>, AppError> {
    let query = EnrollmentQuery {
        drive_id: params.drive_id.filter(|s| !s.is_empty()),
        student_id: params.student_id.filter(|s| !s.is_empty()),
        status: parse_optional_status(params.status.as_deref())?,
    };
    let enrollments = state.store.list_enrollments(&query).await?;
    Ok(Json(Envelope::list(enrollments)))
}

/// GET /api/faculty/drives/:id/enrollments
pub async fn handle_drive_enrollments(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Path(drive_id): Path<String>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Envelope<DriveEnrollments>>, AppError> {
    let status = parse_optional_status(filter.status.as_deref())?;
    let result = manager::drive_enrollments(state.store.as_ref(), &drive_id, status).await?;
    Ok(Json(Envelope::ok(result)))
}

/// POST /api/faculty/enrollments
pub async fn handle_create_enrollment(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Json(req): Json<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentCreated>), AppError> {
    let enrollment =
        manager::enroll_student(state.store.as_ref(), &req.student_id, &req.drive_id, &user.uid)
            .await?;
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

/// PUT /api/faculty/enrollments/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Envelope<StatusUpdate>>, AppError> {
    let status = parse_status(req.status.as_deref().unwrap_or_default())?;
    let update =
        manager::update_status(state.store.as_ref(), &id, status, &user.uid, req.remarks).await?;
    let message = update.message.clone();
    Ok(Json(Envelope::ok(update).with_message(message)))
}

/// PUT /api/faculty/enrollments/:id/round
pub async fn handle_update_round(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Path(id): Path<String>,
    Json(req): Json<RoundRequest>,
) -> Result<Json<Envelope<StatusUpdate>>, AppError> {
    let (Some(round), Some(cleared)) = (req.round_number, req.cleared) else {
        return Err(AppError::Validation(
            "Round number and cleared status are required".to_string(),
        ));
    };
    let update = manager::update_round(state.store.as_ref(), &id, round, cleared, &user.uid).await?;
    Ok(Json(Envelope::ok(update)))
}

/// POST /api/faculty/enrollments/bulk-status
pub async fn handle_bulk_status(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Json(req): Json<BulkStatusRequest>,
) -> Result<Json<Envelope<BulkResult>>, AppError> {
    if req.enrollment_ids.is_empty() {
        return Err(AppError::Validation(
            "Enrollment IDs array is required".to_string(),
        ));
    }
    let status = parse_status(req.status.as_deref().unwrap_or_default())?;
    let result = manager::bulk_update_status(
        state.store.as_ref(),
        &req.enrollment_ids,
        status,
        &user.uid,
        req.remarks,
    )
    .await;
    let message = format!("Updated {} enrollments", result.success);
    Ok(Json(Envelope::ok(result).with_message(message)))
}

/// DELETE /api/faculty/enrollments/:id
pub async fn handle_withdraw(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Path(id): Path<String>,
    body: Option<Json<WithdrawRequest>>,
) -> Result<Json<Envelope<StatusUpdate>>, AppError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let update = manager::withdraw(state.store.as_ref(), &id, &user.uid, reason).await?;
    let message = update.message.clone();
    Ok(Json(Envelope::ok(update).with_message(message)))
}

/// GET /api/faculty/enrollment-statuses
pub async fn handle_list_statuses(
    RequireFaculty(_): RequireFaculty,
) -> Json<Envelope<BTreeMap<String, &'static str>>> {
    let statuses = EnrollmentStatus::ALL
        .iter()
        .map(|s| (s.key(), s.as_str()))
        .collect();
    Json(Envelope::ok(statuses))
}
