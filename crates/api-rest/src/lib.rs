//! # API REST
//!
//! REST API implementation for the LIS.
//!
//! Handles:
//! - HTTP endpoints with axum under `/api/v1`
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON envelopes, CORS, request tracing)
//!
//! Uses `api-shared` for request types and caller identification. Handlers are thin: they
//! parse the request, call one core service operation and wrap the outcome.

#![warn(rust_2018_idioms)]

pub mod error;
mod handlers;

use api_shared::auth::{validate_api_key, API_KEY_HEADER};
use api_shared::dto;
use api_shared::HealthRes;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{Json, Response};
use axum::routing::{get, patch, post, put};
use axum::Router;
use error::ApiError;
use handlers::{catalog, orders, patients, reports, results, samples};
use lis_core::collaborators::{LogMailer, MemoryCache};
use lis_core::config::{expiry_days_from_env_value, transition_policy_from_env_value};
use lis_core::{CoreConfig, LabServices, LabStore, LisResult};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    services: LabServices,
    api_key: Option<Arc<str>>,
}

impl AppState {
    /// # Arguments
    ///
    /// * `services` - Core services wired to the process store.
    /// * `api_key` - When set, every `/api/v1` request must carry it in `x-api-key`.
    pub fn new(services: LabServices, api_key: Option<String>) -> Self {
        Self {
            services,
            api_key: api_key.map(Arc::from),
        }
    }

    pub fn services(&self) -> &LabServices {
        &self.services
    }
}

/// Resolves core configuration from the environment.
///
/// # Environment Variables
/// - `LIS_DATA_DIR`: persist documents under this directory (memory only when unset)
/// - `LIS_TRANSITION_POLICY`: `permissive` (default) or `strict`
/// - `LIS_SAMPLE_EXPIRY_DAYS`: default shelf life of a collected sample (default 7)
///
/// # Errors
///
/// Returns a validation error if a variable holds an unparseable value.
pub fn config_from_env() -> LisResult<CoreConfig> {
    let data_dir = std::env::var("LIS_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    CoreConfig::new(
        data_dir,
        transition_policy_from_env_value(std::env::var("LIS_TRANSITION_POLICY").ok())?,
        expiry_days_from_env_value(std::env::var("LIS_SAMPLE_EXPIRY_DAYS").ok())?,
    )
}

/// Opens the store described by `cfg` and wires the services with a memory cache and a
/// logging mailer.
///
/// # Errors
///
/// Returns a storage error if the data directory cannot be created or listed.
pub fn build_state(cfg: CoreConfig, api_key: Option<String>) -> LisResult<AppState> {
    let store = LabStore::open(&cfg)?;
    let services = LabServices::new(
        Arc::new(cfg),
        store,
        Arc::new(MemoryCache::new()),
        Arc::new(LogMailer),
    );
    Ok(AppState::new(services, api_key))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        patients::create_patient,
        patients::list_patients,
        patients::get_patient,
        patients::add_allergy,
        patients::remove_allergy,
        catalog::create_test,
        catalog::list_tests,
        catalog::update_price,
        catalog::create_user,
        orders::create_order,
        orders::get_order,
        orders::update_status,
        orders::update_payment,
        samples::create_sample,
        samples::pending_samples,
        samples::collection_stats,
        samples::update_status,
        samples::bulk_update_status,
        results::create_result,
        results::update_value,
        results::verify_result,
        results::reject_result,
        results::mark_critical,
        results::bulk_verify,
        reports::create_report,
        reports::submit_report,
        reports::approve_report,
        reports::reject_report,
        reports::deliver_report,
        reports::archive_report,
        reports::amend_report,
        reports::report_versions,
        reports::report_chain,
    ),
    components(schemas(
        HealthRes,
        dto::DataEnvelope,
        dto::ErrorRes,
        dto::BulkUpdateRes,
        dto::CollectionStatRes,
        dto::CreatePatientReq,
        dto::AllergyReq,
        dto::NormalRangeDto,
        dto::TestParameterDto,
        dto::CreateTestReq,
        dto::UpdatePriceReq,
        dto::CreateUserReq,
        dto::CreateOrderReq,
        dto::UpdateOrderStatusReq,
        dto::UpdatePaymentReq,
        dto::CreateSampleReq,
        dto::UpdateSampleStatusReq,
        dto::BulkSampleStatusReq,
        dto::ParameterValueDto,
        dto::CreateResultReq,
        dto::UpdateResultValueReq,
        dto::ReasonReq,
        dto::BulkIdsReq,
        dto::CreateReportReq,
        dto::DeliverReportReq,
        dto::AmendReportReq,
    ))
)]
pub struct ApiDoc;

/// Builds the full router: health, Swagger UI and the versioned API.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route("/patients/:id", get(patients::get_patient))
        .route("/patients/:id/allergies", put(patients::add_allergy))
        .route(
            "/patients/:id/allergies/:allergy",
            axum::routing::delete(patients::remove_allergy),
        )
        .route("/tests", get(catalog::list_tests).post(catalog::create_test))
        .route("/tests/:id/price", patch(catalog::update_price))
        .route("/users", post(catalog::create_user))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", patch(orders::update_status))
        .route("/orders/:id/payment", patch(orders::update_payment))
        .route("/samples", post(samples::create_sample))
        .route("/samples/pending", get(samples::pending_samples))
        .route("/samples/stats", get(samples::collection_stats))
        .route("/samples/bulk-status", patch(samples::bulk_update_status))
        .route("/samples/:id/status", patch(samples::update_status))
        .route("/results", post(results::create_result))
        .route("/results/bulk-verify", post(results::bulk_verify))
        .route("/results/:id/value", patch(results::update_value))
        .route("/results/:id/verify", post(results::verify_result))
        .route("/results/:id/reject", post(results::reject_result))
        .route("/results/:id/critical", post(results::mark_critical))
        .route("/reports", post(reports::create_report))
        .route("/reports/:id/submit", post(reports::submit_report))
        .route("/reports/:id/approve", post(reports::approve_report))
        .route("/reports/:id/reject", post(reports::reject_report))
        .route("/reports/:id/deliver", post(reports::deliver_report))
        .route("/reports/:id/archive", post(reports::archive_report))
        .route("/reports/:id/amend", post(reports::amend_report))
        .route("/reports/:id/versions", get(reports::report_versions))
        .route("/reports/:id/chain", get(reports::report_chain))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    validate_api_key(provided, state.api_key.as_deref())?;
    Ok(next.run(request).await)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API.
///
/// Used for monitoring and load balancer health checks. Not behind the API key.
async fn health() -> Json<HealthRes> {
    Json(api_shared::HealthService::check_health())
}
