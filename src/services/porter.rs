use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::queries::products;
use crate::db::DbPool;
use crate::error::{AppResult, ImportError};
use crate::models::{ExportOptions, ImportOptions, Product};
use crate::services::csv_codec::{self, ProductRow};

/// Moves products between CSV files and storage.
///
/// Handlers only talk to this trait, so tests can swap in a double that
/// records the options it was called with.
pub trait ProductPorter: Send + Sync {
    /// Import every row of the CSV file at `path`. Either all rows are
    /// persisted and returned in file order, or nothing is.
    fn import(&self, path: &Path, options: &ImportOptions) -> Result<Vec<Product>, ImportError>;

    /// Serialize the products visible under `options` as CSV bytes.
    fn export(&self, options: &ExportOptions) -> AppResult<Vec<u8>>;
}

pub struct SqlitePorter {
    db: DbPool,
}

impl SqlitePorter {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl ProductPorter for SqlitePorter {
    fn import(&self, path: &Path, options: &ImportOptions) -> Result<Vec<Product>, ImportError> {
        let content = fs::read(path)?;
        let rows = csv_codec::parse_products(&content)?;
        debug!(
            row_count = rows.len(),
            store_id = ?options.store_id(),
            find_existing_by = ?options.find_existing_by,
            "Importing products"
        );

        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;

        let mut imported = Vec::with_capacity(rows.len());
        for row in &rows {
            imported.push(upsert_row(&tx, row, options)?);
        }

        tx.commit()?;
        info!(count = imported.len(), "Products imported");
        Ok(imported)
    }

    fn export(&self, options: &ExportOptions) -> AppResult<Vec<u8>> {
        let conn = self.db.get()?;
        let products = products::list_products(&conn, options.store_id())?;
        info!(count = products.len(), store_id = ?options.store_id(), "Exporting products");
        csv_codec::write_products(&products)
    }
}

fn upsert_row(
    conn: &Connection,
    row: &ProductRow,
    options: &ImportOptions,
) -> Result<Product, ImportError> {
    let store_id = options.store_id();
    let new_product = row.to_new_product(store_id);

    let existing = match options
        .find_existing_by
        .and_then(|field| row.lookup_value(field).map(|value| (field, value)))
    {
        Some((field, value)) => {
            let mut matches = products::find_products_by(conn, field, value, store_id, 2)?;
            if matches.len() > 1 {
                warn!(row = row.row_number, %field, value, "Ambiguous product match");
                return Err(ImportError::AmbiguousMatch {
                    row: row.row_number,
                    field,
                    value: value.to_string(),
                    count: products::count_matching(conn, field, value, store_id)?,
                });
            }
            matches.pop()
        }
        None => None,
    };

    let id = match existing {
        Some(product) => {
            products::update_product(conn, product.id, &new_product)?;
            product.id
        }
        None => products::create_product(conn, &new_product)?,
    };

    products::get_product(conn, id)?.ok_or(ImportError::Database(
        rusqlite::Error::QueryReturnedNoRows,
    ))
}
