use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

/// GET /api/health
/// Returns service status, version and the top-level endpoint groups.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "Placement Management API",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
        "endpoints": {
            "faculty": "/api/faculty",
            "student": "/api/student",
            "resume": "/api/generate-resume",
            "ats": "/api/ats-score",
            "docs": "/api/docs",
        },
    }))
}

/// GET /api/docs
pub async fn docs_handler() -> Json<Value> {
    Json(json!({
        "name": "Placement Management API",
        "version": env!("CARGO_PKG_VERSION"),
        "authentication": "Bearer token in the Authorization header",
        "endpoints": {
            "faculty": {
                "GET /api/faculty/dashboard": "Placement overview, CTC stats and distributions",
                "GET /api/faculty/analytics": "Dashboard, branch and trend figures combined",
                "GET /api/faculty/analytics/branch": "Per-branch placement rates",
                "GET /api/faculty/analytics/trends?months=N": "Monthly placement counts",
                "GET /api/faculty/export?type=all|students|drives|enrollments": "JSON export",
                "GET|POST /api/faculty/students": "List (filters) or create students",
                "POST /api/faculty/students/bulk-upload": "Upsert many students",
                "GET|PUT|DELETE /api/faculty/students/:id": "Student detail, update, delete",
                "GET|POST /api/faculty/drives": "List or create drives",
                "GET|PUT|DELETE /api/faculty/drives/:id": "Drive detail, update, delete",
                "GET /api/faculty/drives/:id/eligible-students": "Eligibility scan for a drive",
                "GET /api/faculty/drives/:id/enrollments": "Enrollments of a drive",
                "GET|POST /api/faculty/enrollments": "List or create enrollments",
                "PUT /api/faculty/enrollments/:id/status": "Move an enrollment to a new status",
                "PUT /api/faculty/enrollments/:id/round": "Record a round result",
                "POST /api/faculty/enrollments/bulk-status": "Same status for many enrollments",
                "DELETE /api/faculty/enrollments/:id": "Withdraw an enrollment",
                "GET /api/faculty/enrollment-statuses": "Known enrollment statuses",
                "PUT /api/faculty/users/:id/role": "Assign a role (admin only)",
            },
            "student": {
                "GET /api/student/drives/public": "Active drives, no sign-in required",
                "GET|PUT /api/student/profile": "Own profile",
                "GET /api/student/drives": "Active drives with eligibility",
                "GET /api/student/eligible-drives": "Drives the student qualifies for",
                "POST /api/student/enroll": "Enroll in a drive",
                "GET /api/student/enrollments": "Own enrollments",
                "GET|DELETE /api/student/enrollments/:id": "Enrollment detail or withdrawal",
                "GET /api/student/dashboard": "Summary for the student home page",
            },
            "resume": {
                "POST /api/generate-resume": "Resume data for a template",
                "POST /api/prepare-resume": "Resume data without a template",
                "GET /api/templates": "Available templates",
                "POST /api/ats-score": "ATS score for resume text",
                "POST /api/ats-score/pdf": "ATS score for an uploaded PDF",
            },
        },
    }))
}
