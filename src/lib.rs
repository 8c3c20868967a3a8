use std::time::Instant;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

// --- Module Structure ---

// Request pipeline stages.
pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod sanitize;
pub mod telemetry;
pub mod validation;

// Core application services and components.
pub mod config;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;

// Module for routing segregation (Public, Admin).
pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use rate_limit::{MemoryWindowStore, RateLimits};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI document for every handler decorated with
/// `#[utoipa::path]` and every schema deriving `ToSchema`.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::health, handlers::admin_login, handlers::update_password,
        handlers::update_profile, handlers::get_all_students, handlers::get_all_faculty,
        handlers::get_all_departments, handlers::get_all_subjects, handlers::get_all_admins,
        handlers::add_admin, handlers::add_student, handlers::add_faculty,
        handlers::add_department, handlers::add_subject, handlers::create_notice,
        handlers::get_faculty, handlers::get_subject, handlers::get_student,
        handlers::get_notice, handlers::get_admin, handlers::delete_admin,
        handlers::delete_faculty, handlers::delete_student, handlers::delete_department,
        handlers::delete_subject
    ),
    components(
        schemas(
            models::Admin, models::Student, models::Faculty, models::Department,
            models::Subject, models::Notice, models::LoginRequest, models::LoginResponse,
            models::PasswordUpdateRequest, models::ProfileUpdateRequest,
            models::CreateAdminRequest, models::CreateStudentRequest,
            models::CreateFacultyRequest, models::CreateDepartmentRequest,
            models::CreateSubjectRequest, models::CreateNoticeRequest, models::DeleteRequest,
            models::Acknowledgement, models::HealthStatus, models::ApiInfo,
            error::ErrorEnvelope, error::FieldError,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "college-erp", description = "College ERP Admin API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// AppState
///
/// Implements the **Unified State Pattern**: the single, thread-safe container holding the
/// application services and configuration, shared across all requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: the document store (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Rate windows for the general and login classifications.
    pub limits: RateLimits,
    /// Process start, reported as uptime by `/health`.
    pub started_at: Instant,
}

impl AppState {
    /// State with rate windows kept in a fresh in-process store.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let limits = RateLimits::in_memory(&config.rate_limit);
        Self::with_limits(repo, config, limits)
    }

    pub fn with_limits(repo: RepositoryState, config: AppConfig, limits: RateLimits) -> Self {
        Self {
            repo,
            config,
            limits,
            started_at: Instant::now(),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow handlers and middleware to selectively pull components
// from the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// create_router
///
/// Assembles the routing table and wraps it in the request pipeline. Stages, outermost
/// first:
///
/// 1. CORS and security headers
/// 2. request id assignment and propagation
/// 3. rate limiting (general, then login)
/// 4. body size limit
/// 5. request logging (`TraceLayer`)
/// 6. error normalization, panic capture, compression
/// 7. route dispatch, with the 404 fallback
/// 8. per route: `require_auth` → `validate_body` → handler (see `routes::admin`)
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let limits = state.limits.clone();
    let env = state.config.env;

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Documentation: the generated OpenAPI document.
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(public::public_routes())
        .nest("/api/admin", admin::admin_routes(state.clone()))
        // Unknown paths and unsupported methods share the same 404 envelope.
        .fallback(handlers::route_not_found)
        .method_not_allowed_fallback(handlers::route_not_found)
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            // 1. CORS and response hardening headers.
            .layer(cors)
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=15552000; includeSubDomains"),
            ))
            // 2. Request ID: generated if absent, echoed back to the client.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(x_request_id))
            // 3. Rate limiting. Rejections never reach the inner stages.
            .layer(from_fn_with_state(limits, rate_limit::enforce_rate_limits))
            // 4. Body size ceiling for every body-reading extractor and stage.
            .layer(DefaultBodyLimit::max(config::MAX_BODY_BYTES))
            // 5. Request logging: the request span, then one completion line per request
            // once the body has been sent.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(telemetry::make_request_span)
                    .on_request(())
                    .on_response(())
                    .on_eos(())
                    .on_failure(()),
            )
            .layer(from_fn(telemetry::log_completion))
            // 6. Terminal error handling. Panics become internal failures before the
            // normalizer sees them.
            .layer(from_fn_with_state(env, error::normalize_errors))
            .layer(CatchPanicLayer::custom(error::handle_panic))
            .layer(CompressionLayer::new()),
    )
}
