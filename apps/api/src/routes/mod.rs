pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::analytics::handlers as analytics;
use crate::auth::rate_limit::limit_by_ip;
use crate::config::Config;
use crate::directory::handlers as directory;
use crate::enrollment::handlers as enrollment;
use crate::portal::handlers as portal;
use crate::resume::handlers as resume;
use crate::state::AppState;

/// Multipart résumé uploads are the largest bodies the API accepts.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Success body shared by the JSON endpoints: `{ success, data, total?, message? }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            success: true,
            data,
            total: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> Envelope<Vec<T>> {
    /// Wraps a collection and reports its length as `total`.
    pub fn list(items: Vec<T>) -> Self {
        let total = items.len();
        Envelope {
            total: Some(total),
            ..Envelope::ok(items)
        }
    }
}

/// Body for mutations that return nothing but a confirmation.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Ack {
            success: true,
            message: message.into(),
        }
    }
}

fn faculty_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(analytics::handle_dashboard))
        .route("/analytics", get(analytics::handle_analytics))
        .route("/analytics/branch", get(analytics::handle_branch_analytics))
        .route("/analytics/trends", get(analytics::handle_trends))
        .route("/export", get(analytics::handle_export))
        .route(
            "/students",
            get(directory::handle_list_students).post(directory::handle_create_student),
        )
        .route("/students/bulk-upload", post(directory::handle_bulk_upload))
        .route(
            "/students/:id",
            get(directory::handle_get_student)
                .put(directory::handle_update_student)
                .delete(directory::handle_delete_student),
        )
        .route(
            "/drives",
            get(directory::handle_list_drives).post(directory::handle_create_drive),
        )
        .route(
            "/drives/:id",
            get(directory::handle_get_drive)
                .put(directory::handle_update_drive)
                .delete(directory::handle_delete_drive),
        )
        .route(
            "/drives/:id/eligible-students",
            get(directory::handle_eligible_students),
        )
        .route(
            "/drives/:id/enrollments",
            get(enrollment::handle_drive_enrollments),
        )
        .route(
            "/enrollments",
            get(enrollment::handle_list_enrollments).post(enrollment::handle_create_enrollment),
        )
        .route("/enrollments/bulk-status", post(enrollment::handle_bulk_status))
        .route("/enrollments/:id", delete(enrollment::handle_withdraw))
        .route("/enrollments/:id/status", put(enrollment::handle_update_status))
        .route("/enrollments/:id/round", put(enrollment::handle_update_round))
        .route("/enrollment-statuses", get(enrollment::handle_list_statuses))
        .route("/users/:id/role", put(directory::handle_set_role))
}

fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/drives/public", get(portal::handle_public_drives))
        .route(
            "/profile",
            get(portal::handle_get_profile).put(portal::handle_update_profile),
        )
        .route("/drives", get(portal::handle_drives))
        .route("/eligible-drives", get(portal::handle_eligible_drives))
        .route("/enroll", post(portal::handle_enroll))
        .route("/enrollments", get(portal::handle_enrollments))
        .route(
            "/enrollments/:id",
            get(portal::handle_enrollment).delete(portal::handle_withdraw),
        )
        .route("/dashboard", get(portal::handle_dashboard))
}

/// Fallback for unmatched routes.
async fn handle_not_found(method: Method, uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NOT_FOUND",
            "message": format!("Route {method} {} not found", uri.path()),
            "hint": "Visit /api/docs for the list of available endpoints",
        })),
    )
}

pub fn build_router(state: AppState) -> Router {
    let ats = Router::new()
        .route("/api/ats-score", post(resume::handle_ats_score))
        .route("/api/ats-score/pdf", post(resume::handle_ats_score_pdf))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_by_ip));

    Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/docs", get(health::docs_handler))
        .nest("/api/faculty", faculty_routes())
        .nest("/api/student", student_routes())
        .route("/api/generate-resume", post(resume::handle_generate_resume))
        .route("/api/prepare-resume", post(resume::handle_prepare_resume))
        .route("/api/templates", get(resume::handle_templates))
        .merge(ats)
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Browser origins allowed to call the API with credentials: the two local
/// dev servers plus `FRONTEND_URL` when set.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = ["http://localhost:3000", "http://localhost:5173"]
        .into_iter()
        .map(str::to_string)
        .chain(config.frontend_url.clone())
        .filter_map(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-dev-role"),
        ])
}
