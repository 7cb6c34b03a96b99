/// Multi-user web service
///
/// Routes:
/// - `GET  /`                   upload form
/// - `POST /`                   upload + colorize, redirects to the result
/// - `GET  /result/:filename`   result view
/// - `GET  /outputs/:filename`  colorized file, gated on an output record
/// - `GET  /health`             liveness

pub mod error;
pub mod handlers;
pub mod pages;
pub mod upload;
pub mod worker;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::{ArtifactDirs, Library};
pub use error::WebError;
pub use worker::ColorizeWorker;

/// Shared server state.
pub struct AppState {
    library: Mutex<Library>,
    pub worker: ColorizeWorker,
    pub dirs: ArtifactDirs,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(library: Library, worker: ColorizeWorker) -> Self {
        let dirs = library.dirs().clone();
        AppState {
            library: Mutex::new(library),
            worker,
            dirs,
        }
    }

    /// Lock the record store. Sweeps and inserts are serialized here.
    pub fn library(&self) -> MutexGuard<'_, Library> {
        // A panic mid-query leaves nothing half-written outside SQLite's own transaction
        self.library.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the expiry sweep. Storage failures are logged, never surfaced.
    /// Blocks on SQLite and file removal; handlers call it via `spawn_blocking`.
    pub fn sweep_expired(&self) {
        let result = self.library().sweep_expired(Utc::now());
        if let Err(e) = result {
            tracing::warn!("Expiry sweep failed: {}", e);
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("dirs", &self.dirs)
            .finish()
    }
}

/// Build the router. Bodies above `max_upload_bytes` are rejected with 413
/// before any handler runs.
pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::upload))
        .route("/result/:filename", get(handlers::result))
        .route("/outputs/:filename", get(handlers::output_file))
        .route("/health", get(handlers::health_check))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves, then let in-flight
/// requests finish.
pub async fn serve<F>(listener: tokio::net::TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("🚀 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
