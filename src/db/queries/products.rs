use crate::models::{NewProduct, Product, ProductField};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

const PRODUCT_COLUMNS: &str =
    "id, store_id, name, sku, price_cents, description, created_at, updated_at";

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        store_id: row.get(1)?,
        name: row.get(2)?,
        sku: row.get(3)?,
        price_cents: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// All products, or only those of `store_id` when given, in insertion order.
pub fn list_products(conn: &Connection, store_id: Option<i64>) -> rusqlite::Result<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE (?1 IS NULL OR store_id = ?1)
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let products = stmt
        .query_map([store_id], product_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(products)
}

pub fn count_products(conn: &Connection, store_id: Option<i64>) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM products WHERE (?1 IS NULL OR store_id = ?1)",
        [store_id],
        |row| row.get(0),
    )
}

pub fn get_product(conn: &Connection, id: i64) -> rusqlite::Result<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
    conn.query_row(&sql, [id], product_from_row).optional()
}

/// Products whose `field` equals `value`, confined to `store_id` when given.
///
/// At most `limit` rows are returned; callers only need to tell zero, one
/// and many apart.
pub fn find_products_by(
    conn: &Connection,
    field: ProductField,
    value: &str,
    store_id: Option<i64>,
    limit: usize,
) -> rusqlite::Result<Vec<Product>> {
    let column = field.as_str();
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE {column} = ?1 AND (?2 IS NULL OR store_id = ?2)
         ORDER BY id
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let products = stmt
        .query_map(params![value, store_id, limit as i64], product_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(products)
}

pub fn count_matching(
    conn: &Connection,
    field: ProductField,
    value: &str,
    store_id: Option<i64>,
) -> rusqlite::Result<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM products WHERE {} = ?1 AND (?2 IS NULL OR store_id = ?2)",
        field.as_str()
    );
    let count: i64 = conn.query_row(&sql, params![value, store_id], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn create_product(conn: &Connection, product: &NewProduct) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO products (store_id, name, sku, price_cents, description)
         VALUES (?, ?, ?, ?, ?)",
        params![
            product.store_id,
            product.name,
            product.sku,
            product.price_cents,
            product.description
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(product_id = id, name = %product.name, "Created product");
    Ok(id)
}

/// Overwrite name and price of product `id`. `sku` and `description` are
/// only replaced when the new values are present; `store_id` is never moved.
pub fn update_product(conn: &Connection, id: i64, product: &NewProduct) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE products
         SET name = ?, price_cents = ?,
             sku = COALESCE(?, sku),
             description = COALESCE(?, description),
             updated_at = datetime('now')
         WHERE id = ?",
        params![
            product.name,
            product.price_cents,
            product.sku,
            product.description,
            id
        ],
    )?;
    if rows > 0 {
        debug!(product_id = id, name = %product.name, "Updated product");
    }
    Ok(rows > 0)
}
