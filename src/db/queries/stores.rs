use crate::models::{NewStore, Store};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

fn store_from_row(row: &Row<'_>) -> rusqlite::Result<Store> {
    Ok(Store {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub fn list_stores(conn: &Connection) -> rusqlite::Result<Vec<Store>> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM stores ORDER BY id")?;
    let stores = stmt
        .query_map([], store_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(stores)
}

pub fn get_store(conn: &Connection, id: i64) -> rusqlite::Result<Option<Store>> {
    conn.query_row(
        "SELECT id, name, created_at FROM stores WHERE id = ?",
        [id],
        store_from_row,
    )
    .optional()
}

/// The oldest store, used as the default scope when a request names none.
pub fn first_store(conn: &Connection) -> rusqlite::Result<Option<Store>> {
    conn.query_row(
        "SELECT id, name, created_at FROM stores ORDER BY id LIMIT 1",
        [],
        store_from_row,
    )
    .optional()
}

pub fn find_store_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Store>> {
    conn.query_row(
        "SELECT id, name, created_at FROM stores WHERE name = ?",
        [name],
        store_from_row,
    )
    .optional()
}

pub fn create_store(conn: &Connection, store: &NewStore) -> rusqlite::Result<Store> {
    conn.execute("INSERT INTO stores (name) VALUES (?)", [&store.name])?;
    let id = conn.last_insert_rowid();
    info!(store_id = id, name = %store.name, "Created store");
    conn.query_row(
        "SELECT id, name, created_at FROM stores WHERE id = ?",
        [id],
        store_from_row,
    )
}

pub fn find_or_create_store(conn: &Connection, name: &str) -> rusqlite::Result<Store> {
    match find_store_by_name(conn, name)? {
        Some(store) => Ok(store),
        None => create_store(
            conn,
            &NewStore {
                name: name.to_string(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use std::path::Path;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn, Path::new("migrations")).unwrap();
        conn
    }

    #[test]
    fn test_first_store_is_oldest() {
        let conn = setup();
        assert!(first_store(&conn).unwrap().is_none());

        let itunes = find_or_create_store(&conn, "iTunes Store").unwrap();
        find_or_create_store(&conn, "App Store").unwrap();

        assert_eq!(first_store(&conn).unwrap(), Some(itunes));
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let conn = setup();
        let a = find_or_create_store(&conn, "iTunes Store").unwrap();
        let b = find_or_create_store(&conn, "iTunes Store").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(list_stores(&conn).unwrap().len(), 1);
    }
}
