use crate::config::Config;
use crate::db::queries::stores;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::Store;
use crate::services::porter::{ProductPorter, SqlitePorter};
use crate::xsrf::XsrfToken;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub xsrf_token: XsrfToken,
    pub porter: Arc<dyn ProductPorter>,
}

impl AppState {
    /// State backed by the SQLite porter over `db`.
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            porter: Arc::new(SqlitePorter::new(db.clone())),
            db,
            config: Arc::new(config),
            xsrf_token: XsrfToken::generate(),
        }
    }

    pub fn with_porter(mut self, porter: Arc<dyn ProductPorter>) -> Self {
        self.porter = porter;
        self
    }

    /// The store a request operates on: the one named by `store_id`, or the
    /// oldest store, or none at all.
    ///
    /// The pooled connection is released before returning.
    pub fn current_store(&self, store_id: Option<i64>) -> AppResult<Option<Store>> {
        let conn = self.db.get()?;
        match store_id {
            Some(id) => stores::get_store(&conn, id)?
                .map(Some)
                .ok_or_else(|| AppError::NotFound(format!("Store {} not found", id))),
            None => Ok(stores::first_store(&conn)?),
        }
    }
}
