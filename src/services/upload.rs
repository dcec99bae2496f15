//! Validation and staging of uploaded CSV files.
//!
//! An accepted upload is written to `<upload_dir>/<token>.csv`, where the
//! token is a random UUID handed back to the client in a cookie. The file
//! lives until the next import request claims it as a [`PendingUpload`],
//! which deletes it when dropped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

/// User-facing message for a rejected upload.
pub const INVALID_FILE_MESSAGE: &str = "Error! Invalid file, please select a csv file.";

const CSV_CONTENT_TYPES: [&str; 5] = [
    "text/csv",
    "application/csv",
    "text/comma-separated-values",
    "text/x-csv",
    "application/x-csv",
];

/// Whether a file's declared name or content type marks it as CSV.
pub fn is_csv(file_name: Option<&str>, content_type: Option<&str>) -> bool {
    let by_extension = file_name
        .and_then(|name| Path::new(name).extension())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let by_content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .is_some_and(|ct| CSV_CONTENT_TYPES.contains(&ct.as_str()));

    by_extension || by_content_type
}

/// Path of the staged file for `token`.
pub fn staged_path(upload_dir: &Path, token: &Uuid) -> PathBuf {
    upload_dir.join(format!("{}.csv", token.as_hyphenated()))
}

/// Write `content` atomically to the staged path of `token`.
pub fn stage_upload(upload_dir: &Path, token: &Uuid, content: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(upload_dir)?;

    let mut staging = NamedTempFile::new_in(upload_dir)?;
    staging.write_all(content)?;
    staging.flush()?;

    let path = staged_path(upload_dir, token);
    staging.persist(&path).map_err(|e| e.error)?;
    debug!(path = %path.display(), size_bytes = content.len(), "Staged upload");
    Ok(path)
}

/// Remove the staged file of `token`, if any.
pub fn discard_upload(upload_dir: &Path, token: &Uuid) {
    let path = staged_path(upload_dir, token);
    match fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "Discarded staged upload"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard staged upload"),
    }
}

/// A staged upload claimed for import. The file is deleted on drop.
#[derive(Debug)]
pub struct PendingUpload {
    path: PathBuf,
}

impl PendingUpload {
    /// Claim the staged file named by a cookie token. Returns `None` when the
    /// token is not a UUID or nothing is staged under it.
    pub fn claim(upload_dir: &Path, token: &str) -> Option<Self> {
        let token = Uuid::parse_str(token).ok()?;
        let path = staged_path(upload_dir, &token);
        path.is_file().then_some(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove pending upload");
            }
        }
    }
}
