//! Read-only rollups over the student, drive and enrollment collections.
//!
//! Every report is a full scan folded by a pure function in [`aggregates`];
//! the async wrappers here only load the documents.

pub mod aggregates;
pub mod export;
pub mod handlers;

use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::store::{DriveQuery, EnrollmentQuery, PlacementStore, StudentQuery};
use aggregates::{
    BranchAnalytics, CompanyRow, CtcStats, DashboardStats, Distribution, DriveAnalytics,
    MonthlyPlacements, Overview, PlacementTrends, DEFAULT_TREND_MONTHS,
};
use export::{ExportData, ExportType};

pub async fn dashboard_stats(store: &dyn PlacementStore) -> Result<DashboardStats, AppError> {
    let (student_query, drive_query, enrollment_query) = (
        StudentQuery::default(),
        DriveQuery::default(),
        EnrollmentQuery::default(),
    );
    let (students, drives, enrollments) = tokio::try_join!(
        store.list_students(&student_query),
        store.list_drives(&drive_query),
        store.list_enrollments(&enrollment_query),
    )?;
    Ok(aggregates::dashboard(&students, &drives, &enrollments, Utc::now()))
}

pub async fn branch_analytics(
    store: &dyn PlacementStore,
) -> Result<aggregates::BranchReport, AppError> {
    let students = store.list_students(&StudentQuery::default()).await?;
    Ok(aggregates::branch_breakdown(&students, Utc::now()))
}

pub async fn drive_analytics(
    store: &dyn PlacementStore,
    drive_id: &str,
) -> Result<DriveAnalytics, AppError> {
    let query = EnrollmentQuery::for_drive(drive_id);
    let (drive, enrollments) = tokio::try_join!(
        store.get_drive(drive_id),
        store.list_enrollments(&query),
    )?;
    let drive = drive.ok_or_else(|| AppError::NotFound("Drive not found".to_string()))?;
    Ok(aggregates::drive_breakdown(drive, &enrollments, Utc::now()))
}

pub async fn placement_trends(
    store: &dyn PlacementStore,
    months: u32,
) -> Result<PlacementTrends, AppError> {
    let placed = StudentQuery {
        placed: Some(true),
        ..StudentQuery::default()
    };
    let students = store.list_students(&placed).await?;
    Ok(aggregates::placement_trends(&students, months, Utc::now()))
}

/// Dashboard, branch and trend figures in one payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedAnalytics {
    pub overview: Overview,
    pub ctc_stats: CtcStats,
    pub distribution: Distribution,
    pub company_wise: Vec<CompanyRow>,
    pub branch_analytics: Vec<BranchAnalytics>,
    pub trends: Vec<MonthlyPlacements>,
}

pub async fn combined_analytics(store: &dyn PlacementStore) -> Result<CombinedAnalytics, AppError> {
    let (dashboard, branches, trends) = tokio::try_join!(
        dashboard_stats(store),
        branch_analytics(store),
        placement_trends(store, DEFAULT_TREND_MONTHS),
    )?;
    Ok(CombinedAnalytics {
        overview: dashboard.overview,
        ctc_stats: dashboard.ctc_stats,
        distribution: dashboard.distribution,
        company_wise: dashboard.company_wise,
        branch_analytics: branches.branch_analytics,
        trends: trends.trends,
    })
}

pub async fn export_data(
    store: &dyn PlacementStore,
    export_type: ExportType,
) -> Result<ExportData, AppError> {
    let students = if export_type.includes(ExportType::Students) {
        store.list_students(&StudentQuery::default()).await?
    } else {
        Vec::new()
    };
    let drives = if export_type.includes(ExportType::Drives) {
        store.list_drives(&DriveQuery::default()).await?
    } else {
        Vec::new()
    };
    let enrollments = if export_type.includes(ExportType::Enrollments) {
        store.list_enrollments(&EnrollmentQuery::default()).await?
    } else {
        Vec::new()
    };
    Ok(export::build_export(
        export_type,
        &students,
        &drives,
        &enrollments,
        Utc::now(),
    ))
}
