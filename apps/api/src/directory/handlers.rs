use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::drives::{self, DriveDetail};
use super::students::{self, StudentDetail, StudentFilters};
use crate::auth::{RequireAdmin, RequireFaculty};
use crate::eligibility::scans::{self, DriveEligibility};
use crate::enrollment::manager::BulkResult;
use crate::errors::AppError;
use crate::models::drive::{Drive, DriveInput, DriveStatus};
use crate::models::student::{Student, StudentInput};
use crate::models::user::{Role, UserProfile};
use crate::routes::{Ack, Envelope};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCreated {
    pub success: bool,
    pub message: &'static str,
    pub student_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveCreated {
    pub success: bool,
    pub message: &'static str,
    pub drive_id: String,
    pub eligible_student_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUploadRequest {
    #[serde(default)]
    pub students: Vec<StudentInput>,
}

#[derive(Debug, Deserialize)]
pub struct DriveFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Option<String>,
}

fn parse_drive_status(raw: Option<&str>) -> Result<Option<DriveStatus>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map(Some)
        .map_err(|_| {
            AppError::Validation(format!(
                "Unknown drive status '{raw}'. Valid statuses: Upcoming, Ongoing, Closed, Results Published"
            ))
        })
}

// ── Students ────────────────────────────────────────────────────────────────

/// GET /api/faculty/students
pub async fn handle_list_students(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Query(filters): Query<StudentFilters>,
) -> Result<Json<Envelope<Vec<Student>>>, AppError> {
    let students = students::list_students(state.store.as_ref(), &filters).await?;
    Ok(Json(Envelope::list(students)))
}

/// GET /api/faculty/students/:id
pub async fn handle_get_student(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Path(id): Path<String>,
) -> Result<Json<Envelope<StudentDetail>>, AppError> {
    let detail = students::student_detail(state.store.as_ref(), &id).await?;
    Ok(Json(Envelope::ok(detail)))
}

/// POST /api/faculty/students
pub async fn handle_create_student(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Json(input): Json<StudentInput>,
) -> Result<(StatusCode, Json<StudentCreated>), AppError> {
    let student = students::create_student(state.store.as_ref(), &input, &user.uid).await?;
    Ok((
        StatusCode::CREATED,
        Json(StudentCreated {
            success: true,
            message: "Student created successfully",
            student_id: student.id,
        }),
    ))
}

/// PUT /api/faculty/students/:id
pub async fn handle_update_student(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Path(id): Path<String>,
    Json(input): Json<StudentInput>,
) -> Result<Json<Envelope<Student>>, AppError> {
    let student = students::update_student(state.store.as_ref(), &id, &input, &user.uid).await?;
    Ok(Json(
        Envelope::ok(student).with_message("Student updated successfully"),
    ))
}

/// DELETE /api/faculty/students/:id
pub async fn handle_delete_student(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Path(id): Path<String>,
) -> Result<Json<Ack>, AppError> {
    students::delete_student(state.store.as_ref(), &id).await?;
    Ok(Json(Ack::new("Student deleted successfully")))
}

/// POST /api/faculty/students/bulk-upload
pub async fn handle_bulk_upload(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Json(req): Json<BulkUploadRequest>,
) -> Result<Json<Envelope<BulkResult>>, AppError> {
    let result = students::bulk_upload(state.store.as_ref(), &req.students, &user.uid).await?;
    let message = format!("Uploaded {} students", result.success);
    Ok(Json(Envelope::ok(result).with_message(message)))
}

// ── Drives ──────────────────────────────────────────────────────────────────

/// GET /api/faculty/drives
pub async fn handle_list_drives(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Query(filter): Query<DriveFilter>,
) -> Result<Json<Envelope<Vec<Drive>>>, AppError> {
    let status = parse_drive_status(filter.status.as_deref())?;
    let drives = drives::list_drives(state.store.as_ref(), status).await?;
    Ok(Json(Envelope::list(drives)))
}

/// GET /api/faculty/drives/:id
pub async fn handle_get_drive(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Path(id): Path<String>,
) -> Result<Json<Envelope<DriveDetail>>, AppError> {
    let detail = drives::drive_detail(state.store.as_ref(), &id).await?;
    Ok(Json(Envelope::ok(detail)))
}

/// POST /api/faculty/drives
pub async fn handle_create_drive(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Json(input): Json<DriveInput>,
) -> Result<(StatusCode, Json<DriveCreated>), AppError> {
    let drive = drives::create_drive(state.store.as_ref(), &input, &user.uid).await?;
    Ok((
        StatusCode::CREATED,
        Json(DriveCreated {
            success: true,
            message: "Drive created successfully",
            drive_id: drive.id,
            eligible_student_count: drive.eligible_student_count,
        }),
    ))
}

/// PUT /api/faculty/drives/:id
pub async fn handle_update_drive(
    State(state): State<AppState>,
    RequireFaculty(user): RequireFaculty,
    Path(id): Path<String>,
    Json(input): Json<DriveInput>,
) -> Result<Json<Envelope<Drive>>, AppError> {
    let drive = drives::update_drive(state.store.as_ref(), &id, &input, &user.uid).await?;
    Ok(Json(Envelope::ok(drive).with_message("Drive updated successfully")))
}

/// DELETE /api/faculty/drives/:id
pub async fn handle_delete_drive(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Path(id): Path<String>,
) -> Result<Json<Ack>, AppError> {
    drives::delete_drive(state.store.as_ref(), &id).await?;
    Ok(Json(Ack::new("Drive deleted successfully")))
}

/// GET /api/faculty/drives/:id/eligible-students
pub async fn handle_eligible_students(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Path(id): Path<String>,
) -> Result<Json<Envelope<DriveEligibility>>, AppError> {
    let result = scans::eligible_students_for_drive(state.store.as_ref(), &id).await?;
    Ok(Json(Envelope::ok(result)))
}

// ── Users ───────────────────────────────────────────────────────────────────

/// PUT /api/faculty/users/:id/role
pub async fn handle_set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<Envelope<UserProfile>>, AppError> {
    let role: Role = req
        .role
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| {
            AppError::Validation("Invalid role. Must be one of: student, faculty, admin".to_string())
        })?;
    let profile = super::assign_role(state.store.as_ref(), &user_id, role).await?;
    tracing::info!("Role change for {user_id} made by {}", admin.uid);
    Ok(Json(Envelope::ok(profile).with_message("User role updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_status_filter_parsing() {
        assert_eq!(parse_drive_status(None).unwrap(), None);
        assert_eq!(parse_drive_status(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_drive_status(Some("Results Published")).unwrap(),
            Some(DriveStatus::ResultsPublished)
        );
        assert!(matches!(
            parse_drive_status(Some("Paused")),
            Err(AppError::Validation(_))
        ));
    }
}
