pub mod products;

use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(products::upload))
        .route("/import", get(products::import))
        .route("/export", get(products::export))
        .route("/health", get(health))
}

async fn index() -> Redirect {
    Redirect::to("/import")
}

async fn health() -> &'static str {
    "OK"
}
