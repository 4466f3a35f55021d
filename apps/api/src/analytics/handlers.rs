use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::aggregates::{BranchReport, DashboardStats, PlacementTrends, DEFAULT_TREND_MONTHS};
use super::export::{ExportData, ExportType};
use super::CombinedAnalytics;
use crate::auth::RequireFaculty;
use crate::errors::AppError;
use crate::models::parse_leading_int;
use crate::routes::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub months: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(rename = "type")]
    pub export_type: Option<String>,
    #[serde(default)]
    pub archive: bool,
}

/// Missing, non-numeric or non-positive values fall back to the default window.
fn trend_months(raw: Option<&str>) -> u32 {
    raw.and_then(parse_leading_int)
        .filter(|m| *m > 0)
        .and_then(|m| u32::try_from(m).ok())
        .unwrap_or(DEFAULT_TREND_MONTHS)
}

/// GET /api/faculty/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
) -> Result<Json<Envelope<DashboardStats>>, AppError> {
    let stats = super::dashboard_stats(state.store.as_ref()).await?;
    Ok(Json(Envelope::ok(stats)))
}

/// GET /api/faculty/analytics
pub async fn handle_analytics(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
) -> Result<Json<Envelope<CombinedAnalytics>>, AppError> {
    let combined = super::combined_analytics(state.store.as_ref()).await?;
    Ok(Json(Envelope::ok(combined)))
}

/// GET /api/faculty/analytics/branch
pub async fn handle_branch_analytics(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
) -> Result<Json<Envelope<BranchReport>>, AppError> {
    let report = super::branch_analytics(state.store.as_ref()).await?;
    Ok(Json(Envelope::ok(report)))
}

/// GET /api/faculty/analytics/trends?months=N
pub async fn handle_trends(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Query(params): Query<TrendsQuery>,
) -> Result<Json<Envelope<PlacementTrends>>, AppError> {
    let months = trend_months(params.months.as_deref());
    let trends = super::placement_trends(state.store.as_ref(), months).await?;
    Ok(Json(Envelope::ok(trends)))
}

/// GET /api/faculty/export?type=all|students|drives|enrollments&archive=true
pub async fn handle_export(
    State(state): State<AppState>,
    RequireFaculty(_): RequireFaculty,
    Query(params): Query<ExportQuery>,
) -> Result<Json<Envelope<ExportData>>, AppError> {
    let export_type: ExportType = params.export_type.as_deref().unwrap_or("all").parse()?;
    let mut export = super::export_data(state.store.as_ref(), export_type).await?;

    if params.archive {
        let archive = state.archive.as_ref().ok_or_else(|| {
            AppError::Validation("Export archive is not configured".to_string())
        })?;
        export.archive_key = Some(archive.upload(&export).await?);
    }

    Ok(Json(Envelope::ok(export)))
}
