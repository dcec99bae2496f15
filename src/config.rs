use std::env;
use std::path::PathBuf;

use crate::models::ProductField;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub migrations_path: PathBuf,
    /// Directory holding uploads between the upload and import requests.
    pub upload_dir: PathBuf,
    /// Field imports match existing products on; `None` always inserts.
    pub find_existing_by: Option<ProductField>,
    /// Store created at startup when missing.
    pub default_store: Option<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env::var("STOCKROOM_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("STOCKROOM_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7070),
            database_path: env::var("STOCKROOM_DATABASE_URL")
                .map(|v| {
                    PathBuf::from(
                        v.strip_prefix("sqlite://")
                            .or_else(|| v.strip_prefix("sqlite:"))
                            .unwrap_or(&v),
                    )
                })
                .unwrap_or_else(|_| PathBuf::from("data/stockroom.db")),
            migrations_path: env::var("STOCKROOM_MIGRATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("migrations")),
            upload_dir: env::var("STOCKROOM_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("stockroom-uploads")),
            find_existing_by: parse_find_existing_by(
                env::var("STOCKROOM_FIND_EXISTING_BY").ok().as_deref(),
            ),
            default_store: env::var("STOCKROOM_STORE")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            max_upload_bytes: env::var("STOCKROOM_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Unset means `name`; `none` (or empty) disables matching.
fn parse_find_existing_by(value: Option<&str>) -> Option<ProductField> {
    let Some(value) = value else {
        return Some(ProductField::Name);
    };
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return None;
    }
    ProductField::parse(value).or_else(|| {
        tracing::warn!(
            value,
            "Unknown STOCKROOM_FIND_EXISTING_BY value, matching on name"
        );
        Some(ProductField::Name)
    })
}
