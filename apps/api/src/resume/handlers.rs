use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ats::{self, AtsReport};
use super::{
    transform_student_to_resume, DriveTargetInput, ResumeData, ResumeTemplate,
    StudentResumeInput, TemplateInfo,
};
use crate::auth::OptionalAuth;
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub student_data: Option<StudentResumeInput>,
    pub drive_data: Option<DriveTargetInput>,
    pub template: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResume {
    pub success: bool,
    pub resume_data: ResumeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<ResumeTemplate>,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub templates: Vec<TemplateInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsRequest {
    #[serde(default)]
    pub resume_text: String,
}

fn require_student(req: &ResumeRequest) -> Result<&StudentResumeInput, AppError> {
    req.student_data
        .as_ref()
        .ok_or_else(|| AppError::Validation("Student data is required".to_string()))
}

/// POST /api/generate-resume
pub async fn handle_generate_resume(
    OptionalAuth(caller): OptionalAuth,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<GeneratedResume>, AppError> {
    let student = require_student(&req)?;
    let name = student.display_name().ok_or_else(|| {
        AppError::Validation("Student name is required. studentData must include a name field".to_string())
    })?;
    info!(
        "Generating resume for {name} (caller: {})",
        caller.as_ref().map_or("anonymous", |c| c.uid.as_str())
    );

    let template = ResumeTemplate::from_id(req.template.as_deref());
    Ok(Json(GeneratedResume {
        success: true,
        resume_data: transform_student_to_resume(student, req.drive_data.as_ref()),
        template: Some(template),
        message: "Resume data prepared. Generate PDF on client side",
    }))
}

/// POST /api/prepare-resume
pub async fn handle_prepare_resume(
    OptionalAuth(_): OptionalAuth,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<GeneratedResume>, AppError> {
    let student = require_student(&req)?;
    Ok(Json(GeneratedResume {
        success: true,
        resume_data: transform_student_to_resume(student, req.drive_data.as_ref()),
        template: None,
        message: "Resume data prepared successfully",
    }))
}

/// GET /api/templates
pub async fn handle_templates() -> Json<TemplateList> {
    Json(TemplateList {
        templates: ResumeTemplate::ALL.iter().map(|t| t.info()).collect(),
    })
}

fn llm(state: &AppState) -> Result<&LlmClient, AppError> {
    state.llm.as_ref().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "OPENROUTER_API_KEY environment variable is not set"
        ))
    })
}

/// POST /api/ats-score
pub async fn handle_ats_score(
    State(state): State<AppState>,
    Json(req): Json<AtsRequest>,
) -> Result<Json<AtsReport>, AppError> {
    ats::validate_resume_text(&req.resume_text)?;
    let report = ats::score_resume(llm(&state)?, &req.resume_text).await?;
    Ok(Json(report))
}

/// POST /api/ats-score/pdf
/// Multipart upload with the résumé PDF in a `file` (or `resume`) field.
pub async fn handle_ats_score_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AtsReport>, AppError> {
    let mut pdf = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if matches!(field.name(), Some("file") | Some("resume")) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            pdf = Some(data);
            break;
        }
    }
    let pdf = pdf.ok_or_else(|| {
        AppError::Validation("Upload the resume PDF in a 'file' field".to_string())
    })?;

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
        .map_err(|e| {
            warn!("PDF text extraction failed: {e}");
            AppError::Validation("Could not read text from the uploaded PDF".to_string())
        })?;

    ats::validate_resume_text(&text)?;
    let report = ats::score_resume(llm(&state)?, &text).await?;
    Ok(Json(report))
}
