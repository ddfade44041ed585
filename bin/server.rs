// Insurance Charges Dashboard - Web Server
// JSON API over the derived tables plus the static dashboard page

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use charges_dashboard::{
    build_view, Dashboard, DashboardConfig, DashboardError, DashboardView, DatasetSource,
    FileSource, Record,
};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type SharedSource = Arc<dyn DatasetSource + Send + Sync>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    /// Owns the current view; readers and the final install lock it only briefly
    dashboard: Arc<RwLock<Dashboard>>,
    /// Serialises refreshes; held from the fetch until the new view is installed
    refresh_lock: Arc<Mutex<()>>,
    source: SharedSource,
}

impl AppState {
    fn new(config: DashboardConfig, source: SharedSource) -> Self {
        Self {
            dashboard: Arc::new(RwLock::new(Dashboard::new(config))),
            refresh_lock: Arc::new(Mutex::new(())),
            source,
        }
    }

    fn current_view(&self) -> Option<Arc<DashboardView>> {
        match self.dashboard.read() {
            Ok(guard) => guard.view().cloned(),
            Err(poisoned) => poisoned.into_inner().view().cloned(),
        }
    }

    fn age_thresholds(&self) -> Vec<f64> {
        match self.dashboard.read() {
            Ok(guard) => guard.config().age_thresholds.clone(),
            Err(poisoned) => poisoned.into_inner().config().age_thresholds.clone(),
        }
    }
}

/// Fetch, compute and install on a blocking thread
///
/// The refresh guard moves into the task, so a dropped request cannot let a
/// later refresh install before this one finishes.
fn refresh_blocking(
    _serial: OwnedMutexGuard<()>,
    dashboard: Arc<RwLock<Dashboard>>,
    source: SharedSource,
    thresholds: Vec<f64>,
) -> Result<Arc<DashboardView>, DashboardError> {
    let view = build_view(source.as_ref(), &thresholds).map_err(|e| {
        tracing::error!("Refresh from {} failed: {}", source.name(), e);
        e
    })?;

    let installed = match dashboard.write() {
        Ok(mut guard) => guard.install(view),
        Err(poisoned) => poisoned.into_inner().install(view),
    };
    Ok(installed)
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
            code: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String, code: &'static str) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
            code: Some(code),
        }
    }
}

fn ok_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn error_response(err: &DashboardError) -> Response {
    let status = match err {
        DashboardError::DatasetLoad { .. } => StatusCode::BAD_GATEWAY,
        DashboardError::EmptyDataset => StatusCode::UNPROCESSABLE_ENTITY,
        DashboardError::InvalidThresholds(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::failure(err.to_string(), err.code()))).into_response()
}

fn not_loaded() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiResponse::<()>::failure(
            "Dataset has not been loaded yet".to_string(),
            "not_loaded",
        )),
    )
        .into_response()
}

/// Run `f` against the current view, or answer 503 before the first load
fn with_view<T, F>(state: &AppState, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(&DashboardView) -> T,
{
    match state.current_view() {
        Some(view) => ok_response(f(&view)),
        None => not_loaded(),
    }
}

// ============================================================================
// Refresh
// ============================================================================

async fn run_refresh(state: &AppState) -> Result<Arc<DashboardView>, Response> {
    let serial = state.refresh_lock.clone().lock_owned().await;
    let dashboard = state.dashboard.clone();
    let source = state.source.clone();
    let thresholds = state.age_thresholds();

    let result = tokio::task::spawn_blocking(move || {
        refresh_blocking(serial, dashboard, source, thresholds)
    })
    .await;

    match result {
        Ok(Ok(view)) => {
            tracing::info!(
                snapshot = %view.snapshot.id,
                records = view.metrics.total_count,
                "Dashboard refreshed"
            );
            Ok(view)
        }
        // Previous view stays current
        Ok(Err(e)) => Err(error_response(&e)),
        Err(join_err) => {
            tracing::error!("Refresh task failed: {}", join_err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::failure(join_err.to_string(), "internal")),
            )
                .into_response())
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/dashboard - Metrics, groups, bins and records in one payload
async fn get_dashboard(State(state): State<AppState>) -> Response {
    with_view(&state, |view| view.clone())
}

/// GET /api/metrics
async fn get_metrics(State(state): State<AppState>) -> Response {
    with_view(&state, |view| view.metrics.clone())
}

/// GET /api/groups - Mean charges per region, highest first
async fn get_groups(State(state): State<AppState>) -> Response {
    with_view(&state, |view| view.groups.clone())
}

/// GET /api/bins - Mean charges per age band
async fn get_bins(State(state): State<AppState>) -> Response {
    with_view(&state, |view| view.age_bins.clone())
}

/// GET /api/records - All records in dataset order
async fn get_records(State(state): State<AppState>) -> Response {
    with_view(&state, |view| view.records().to_vec())
}

/// GET /api/records/region/:region - Records of one region
async fn get_region_records(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Response {
    with_view(&state, |view| {
        view.records_in_region(&region).cloned().collect::<Vec<Record>>()
    })
}

/// POST /api/refresh - Re-run the pipeline from the fetch onward
async fn refresh(State(state): State<AppState>) -> Response {
    match run_refresh(&state).await {
        Ok(view) => ok_response(view.as_ref()),
        Err(response) => response,
    }
}

/// GET / - Serve the dashboard page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

fn build_router(state: AppState, web_dir: &std::path::Path) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/metrics", get(get_metrics))
        .route("/groups", get(get_groups))
        .route("/bins", get(get_bins))
        .route("/records", get(get_records))
        .route("/records/region/:region", get(get_region_records))
        .route("/refresh", post(refresh))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(web_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Insurance Charges Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = DashboardConfig::default();
    let bind_addr = config.bind_addr.clone();
    let web_dir = config.web_dir.clone();
    let source: SharedSource = Arc::new(FileSource::new(config.dataset_path.clone()));

    let state = AppState::new(config, source);

    // Start serving even when the first load fails; the page can retry
    match run_refresh(&state).await {
        Ok(view) => println!("✓ Loaded {} records", view.metrics.total_count),
        Err(_) => eprintln!("❌ Initial dataset load failed (see log); use Refresh to retry"),
    }

    let app = build_router(state, &web_dir);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    println!("\n🚀 Server running on http://{}", bind_addr);
    println!("   API: /api/dashboard");
    println!("   UI:  /");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}
