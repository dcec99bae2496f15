use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_cookies::CookieManagerLayer;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::queries::stores;
use crate::db::{create_pool, migrations};
use crate::error_pages::{error_page_middleware, fallback_handler};
use crate::handlers;
use crate::state::AppState;
use crate::xsrf::xsrf_middleware;

/// Build the application state and Axum router from a [`Config`].
///
/// Creates the database pool, runs migrations, seeds the configured store
/// and prepares the upload directory.
pub fn build_app(config: Config) -> Result<(AppState, Router), Box<dyn std::error::Error>> {
    let db = create_pool(&config.database_path)?;

    {
        let conn = db.get()?;
        migrations::run_migrations(&conn, &config.migrations_path)?;
        if let Some(name) = &config.default_store {
            let store = stores::find_or_create_store(&conn, name)?;
            tracing::info!(store_id = store.id, name = %store.name, "Default store ready");
        }
    }

    std::fs::create_dir_all(&config.upload_dir)?;
    tracing::info!(upload_dir = %config.upload_dir.display(), "Upload directory ready");

    let state = AppState::new(db, config);
    let app = router(state.clone());

    Ok((state, app))
}

/// The full middleware stack over [`handlers::routes`].
pub fn router(state: AppState) -> Router {
    let xsrf_token = state.xsrf_token.clone();

    Router::new()
        .merge(handlers::routes())
        .fallback(fallback_handler)
        .layer(middleware::from_fn(move |req, next| {
            let token = xsrf_token.clone();
            xsrf_middleware(token, req, next)
        }))
        .layer(middleware::from_fn(error_page_middleware))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CookieManagerLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the router to `host:port` and spawn the server as a tokio task.
///
/// Returns the actual port the server bound to (useful when `port` is 0 for
/// OS-assigned ports) and a [`JoinHandle`] for the server task.
pub async fn serve(
    app: Router,
    host: &str,
    port: u16,
) -> Result<(u16, JoinHandle<()>), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    let actual_port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((actual_port, handle))
}
