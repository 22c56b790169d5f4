//! Server assembly: database backend, dialect resolution, router, and serve loop.

use crate::config::{load_entities, resolve, DatabaseBackend, ResolvedModel, Settings};
use crate::db::{Database, MemoryDatabase, PgDatabase, SpannerDatabase};
use crate::routes::{common_routes, entity_routes};
use crate::service::CrudService;
use crate::sql::Dialect;
use crate::state::AppState;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// API under /api/v1, common routes at the root, and the UI's static files for everything else.
/// Unknown static paths fall back to index.html so the single-page UI owns its routes.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let ui = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", entity_routes(state))
        .fallback_service(ui)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn connect(settings: &Settings, model: &ResolvedModel) -> Result<Arc<dyn Database>, Box<dyn std::error::Error>> {
    let db: Arc<dyn Database> = match settings.database.backend {
        DatabaseBackend::Spanner => {
            info!(database = %settings.database.database_path(), "connecting to Cloud Spanner");
            Arc::new(SpannerDatabase::connect(&settings.database).await?)
        }
        DatabaseBackend::Postgres => {
            info!(database = %settings.database.database_path(), "connecting to database");
            Arc::new(PgDatabase::connect(&settings.database).await?)
        }
        DatabaseBackend::Memory => {
            let dialect = settings.database.dialect.unwrap_or_default();
            info!(%dialect, "using in-memory database");
            Arc::new(MemoryDatabase::new(dialect, model))
        }
    };
    Ok(db)
}

/// Resolves the dialect once; a metadata failure aborts startup before any request is served.
pub async fn init_state(db: Arc<dyn Database>, model: ResolvedModel, settings: &Settings) -> Result<AppState, Box<dyn std::error::Error>> {
    let dialect = db.dialect().await?;
    info!(%dialect, "database dialect resolved");
    if dialect == Dialect::PostgreSql {
        for e in model.entities.iter().filter(|e| !e.postgres_dialect) {
            warn!(entity = %e.path_segment, "entity only emits named parameters; writes will fail on this PostgreSQL-dialect database");
        }
    }
    let crud = CrudService::new(db, dialect, settings.retry);
    Ok(AppState::new(model, crud))
}

pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let entities = load_entities(settings.entities_path.as_deref()).await?;
    let model = resolve(&entities)?;
    let db = connect(&settings, &model).await?;
    let state = init_state(db, model, &settings).await?;
    let app = build_router(state, &settings.static_dir);

    let listener = TcpListener::bind((settings.bind_address.as_str(), settings.port)).await?;
    info!("App listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
