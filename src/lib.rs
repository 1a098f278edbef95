use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod params;
pub mod policy;
pub mod repository;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use clock::{Clock, ClockState, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index, handlers::get_post_detail, handlers::get_category_posts,
        handlers::get_profile, handlers::get_me, handlers::update_me,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::add_comment, handlers::update_comment, handlers::delete_comment,
        handlers::create_category, handlers::set_category_status, handlers::delete_category,
        handlers::create_location, handlers::delete_location, handlers::set_post_status
    ),
    components(
        schemas(
            models::User, models::Category, models::Location, models::Post, models::Comment,
            models::CreatePostRequest, models::UpdatePostRequest, models::CommentRequest,
            models::UpdateProfileRequest, models::CreateCategoryRequest,
            models::CreateLocationRequest, models::PostPage, models::PostDetail,
            models::CategoryFeed, models::UserProfile, models::ProfileFeed,
        )
    ),
    tags(
        (name = "blogicum", description = "Blogicum blogging API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request needs: the
/// persistence collaborator, the clock the visibility policy reads, and the
/// immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub clock: ClockState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

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

/// auth_middleware
///
/// Runs the `AuthUser` extractor in front of the authenticated routes. A
/// failed authentication rejects the request with 401 before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // The 'admin' role check happens inside the handlers.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
