//! Shared test utilities for integration tests.
//!
//! `TestClient` drives the full router against an in-memory database and a
//! temporary upload directory, carrying cookies between requests like a
//! browser would. `RecordingPorter` stands in for the import/export engine
//! when a test only cares about what the handlers hand it.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use stockroom::config::Config;
use stockroom::db::queries::{products, stores};
use stockroom::db::{create_in_memory_pool, migrations};
use stockroom::error::{AppResult, ImportError};
use stockroom::models::{
    ExportOptions, ImportOptions, NewProduct, Product, ProductField, Store,
};
use stockroom::server;
use stockroom::services::porter::ProductPorter;
use stockroom::state::AppState;
use stockroom::xsrf::XSRF_HEADER;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "stockroom-test-boundary";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }
}

/// A test client that simulates a browser session.
pub struct TestClient {
    pub state: AppState,
    upload_dir: TempDir,
    jar: Mutex<HashMap<String, String>>,
}

impl TestClient {
    /// Client backed by the real SQLite porter.
    pub fn new() -> Self {
        let upload_dir = TempDir::new().expect("Failed to create upload dir");
        let pool = create_in_memory_pool().expect("Failed to create in-memory pool");
        {
            let conn = pool.get().expect("Failed to get connection");
            migrations::run_migrations(&conn, Path::new("migrations"))
                .expect("Failed to run migrations");
        }

        let config = Config {
            host: "127.0.0.1".into(),
            port: 7070,
            database_path: PathBuf::from(":memory:"),
            migrations_path: PathBuf::from("migrations"),
            upload_dir: upload_dir.path().to_path_buf(),
            find_existing_by: Some(ProductField::Name),
            default_store: None,
            max_upload_bytes: 1024 * 1024,
        };

        Self {
            state: AppState::new(pool, config),
            upload_dir,
            jar: Mutex::new(HashMap::new()),
        }
    }

    /// Client whose import/export calls go to `porter`.
    pub fn with_porter(porter: Arc<dyn ProductPorter>) -> Self {
        let mut client = Self::new();
        client.state = client.state.with_porter(porter);
        client
    }

    pub fn router(&self) -> Router {
        server::router(self.state.clone())
    }

    pub fn upload_dir(&self) -> &Path {
        self.upload_dir.path()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar.lock().unwrap().get(name).cloned()
    }

    /// Send a request with the session cookies and remember any cookies set.
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        let cookie_header = {
            let jar = self.jar.lock().unwrap();
            jar.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ")
        };
        if !cookie_header.is_empty() {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie_header.parse().unwrap());
        }

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();

        let mut jar = self.jar.lock().unwrap();
        for set_cookie in headers.get_all(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let pair = set_cookie.split(';').next().unwrap_or("");
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() || set_cookie.contains("Max-Age=0") {
                jar.remove(name.trim());
            } else {
                jar.insert(name.trim().to_string(), value.to_string());
            }
        }

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POST a single file as multipart form data, with the XSRF header.
    pub async fn post_multipart(
        &self,
        uri: &str,
        field: &str,
        file_name: &str,
        content_type: &str,
        content: &[u8],
    ) -> TestResponse {
        let request = multipart_request(uri)
            .header(XSRF_HEADER, self.state.xsrf_token.value())
            .body(Body::from(multipart_body(field, file_name, content_type, content)))
            .unwrap();
        self.send(request).await
    }

    /// POST a single file as multipart form data without any XSRF token.
    pub async fn post_multipart_without_xsrf(
        &self,
        uri: &str,
        field: &str,
        file_name: &str,
        content_type: &str,
        content: &[u8],
    ) -> TestResponse {
        let request = multipart_request(uri)
            .body(Body::from(multipart_body(field, file_name, content_type, content)))
            .unwrap();
        self.send(request).await
    }

    /// POST with no body at all, with the XSRF header.
    pub async fn post_empty(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(XSRF_HEADER, self.state.xsrf_token.value())
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Upload `csv` as `products.csv` and follow the import redirect.
    /// Returns the flash shown on the import page afterwards.
    pub async fn upload_and_import(&self, uri_suffix: &str, csv: &[u8]) -> Option<String> {
        let upload = self
            .post_multipart(
                &format!("/upload{}", uri_suffix),
                "csv_file",
                "products.csv",
                "text/csv",
                csv,
            )
            .await;
        assert_eq!(upload.status, StatusCode::SEE_OTHER);

        let location = upload.location().unwrap().to_string();
        let import = self.get(&location).await;
        assert_eq!(import.status, StatusCode::SEE_OTHER);

        let page = self.get(import.location().unwrap()).await;
        assert_eq!(page.status, StatusCode::OK);
        flash_message(&page.text())
    }

    // =========================================================================
    // Direct database helpers
    // =========================================================================

    pub fn create_store(&self, name: &str) -> Store {
        let conn = self.state.db.get().expect("Failed to get connection");
        stores::find_or_create_store(&conn, name).expect("Failed to create store")
    }

    pub fn create_product(&self, store: Option<&Store>, name: &str, price_cents: i64) -> Product {
        let conn = self.state.db.get().expect("Failed to get connection");
        let id = products::create_product(
            &conn,
            &NewProduct {
                store_id: store.map(|s| s.id),
                name: name.into(),
                sku: None,
                price_cents,
                description: None,
            },
        )
        .expect("Failed to create product");
        products::get_product(&conn, id).unwrap().unwrap()
    }

    pub fn products(&self, store: Option<&Store>) -> Vec<Product> {
        let conn = self.state.db.get().expect("Failed to get connection");
        products::list_products(&conn, store.map(|s| s.id)).expect("Failed to list products")
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

fn multipart_request(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Text of the flash banner on a rendered page, entities decoded.
pub fn flash_message(html: &str) -> Option<String> {
    let start_tag = "<p class=\"flash-message\">";
    let start = html.find(start_tag)? + start_tag.len();
    let end = html[start..].find("</p>")? + start;
    Some(
        html[start..end]
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&quot;", "\"")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

pub fn sample_product(id: i64, name: &str, price_cents: i64) -> Product {
    Product {
        id,
        store_id: None,
        name: name.into(),
        sku: None,
        price_cents,
        description: None,
        created_at: "2024-01-15 00:00:00".into(),
        updated_at: "2024-01-15 00:00:00".into(),
    }
}

/// What the handlers passed to [`ProductPorter::import`].
#[derive(Debug, Clone)]
pub struct ImportCall {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub options: ImportOptions,
}

/// Porter double that records its calls and replays a fixed outcome.
pub struct RecordingPorter {
    outcome: Result<Vec<Product>, String>,
    imports: Mutex<Vec<ImportCall>>,
    exports: Mutex<Vec<ExportOptions>>,
}

impl RecordingPorter {
    pub fn returning(products: Vec<Product>) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(products),
            imports: Mutex::new(Vec::new()),
            exports: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(message.to_string()),
            imports: Mutex::new(Vec::new()),
            exports: Mutex::new(Vec::new()),
        })
    }

    pub fn imports(&self) -> Vec<ImportCall> {
        self.imports.lock().unwrap().clone()
    }

    pub fn exports(&self) -> Vec<ExportOptions> {
        self.exports.lock().unwrap().clone()
    }
}

impl ProductPorter for RecordingPorter {
    fn import(&self, path: &Path, options: &ImportOptions) -> Result<Vec<Product>, ImportError> {
        let content = fs::read(path)?;
        self.imports.lock().unwrap().push(ImportCall {
            path: path.to_path_buf(),
            content,
            options: options.clone(),
        });
        match &self.outcome {
            Ok(products) => Ok(products.clone()),
            Err(message) => Err(ImportError::Io(io::Error::other(message.clone()))),
        }
    }

    fn export(&self, options: &ExportOptions) -> AppResult<Vec<u8>> {
        self.exports.lock().unwrap().push(options.clone());
        Ok(b"name,sku,price,description\n".to_vec())
    }
}
