use askama::Template;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tower_cookies::{Cookie, Cookies};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::queries::products;
use crate::error::{AppError, AppResult, RenderHtml};
use crate::flash::Flash;
use crate::models::{ExportOptions, ImportOptions, Store};
use crate::services::upload::{self, PendingUpload};
use crate::state::AppState;
use crate::xsrf::XSRF_FORM_FIELD;
use crate::VERSION;

/// Content type sent with product exports.
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=iso-8859-1; header=present";

const EXPORT_DISPOSITION: &str = "attachment; filename=\"products.csv\"";

const UPLOAD_COOKIE: &str = "pending_upload";

const UPLOAD_FIELD: &str = "csv_file";

#[derive(Template)]
#[template(path = "pages/import.html")]
pub struct ImportTemplate {
    pub title: String,
    pub version: &'static str,
    pub flash: Option<Flash>,
    pub store: Option<Store>,
    pub product_count: i64,
    pub upload_query: String,
    pub export_query: String,
}

/// Optional explicit store selection, kept across redirects.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub store_id: Option<i64>,
}

impl ScopeQuery {
    fn import_path(&self) -> String {
        match self.store_id {
            Some(id) => format!("/import?store_id={}", id),
            None => "/import".to_string(),
        }
    }
}

struct ReceivedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    content: Vec<u8>,
}

/// Accept a `csv_file` upload and stage it for the next import request.
pub async fn upload(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(scope): Query<ScopeQuery>,
    multipart: Option<Multipart>,
) -> AppResult<Redirect> {
    // Any earlier staged file is superseded, whether or not this one is accepted.
    release_pending_upload(&state, &cookies);

    let mut received: Option<ReceivedFile> = None;

    // A post without a multipart body is treated like one without a file.
    let Some(mut multipart) = multipart else {
        warn!("Upload request carried no multipart body");
        Flash::invalid_upload().store(&cookies);
        return Ok(Redirect::to(&scope.import_path()));
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(multipart_error)?
            .to_vec();

        debug!(
            file_name = ?file_name,
            content_type = ?content_type,
            size_bytes = content.len(),
            "Received upload"
        );
        received = Some(ReceivedFile {
            file_name,
            content_type,
            content,
        });
    }

    let file = received.filter(|f| {
        upload::is_csv(f.file_name.as_deref(), f.content_type.as_deref())
    });

    let Some(file) = file else {
        warn!("Rejected upload that is not a CSV file");
        Flash::invalid_upload().store(&cookies);
        return Ok(Redirect::to(&scope.import_path()));
    };

    let token = Uuid::new_v4();
    upload::stage_upload(&state.config.upload_dir, &token, &file.content)?;
    info!(
        file_name = ?file.file_name,
        size_bytes = file.content.len(),
        "Accepted CSV upload"
    );

    cookies.add(
        Cookie::build((UPLOAD_COOKIE, token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(tower_cookies::cookie::SameSite::Lax)
            .build(),
    );

    Ok(Redirect::to(&scope.import_path()))
}

/// Run the staged import if there is one, otherwise render the import form.
pub async fn import(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(scope): Query<ScopeQuery>,
) -> AppResult<Response> {
    // Claim before anything can fail so the staged file is dropped on every path.
    let pending = take_upload_token(&cookies)
        .and_then(|t| PendingUpload::claim(&state.config.upload_dir, &t));

    let store = state.current_store(scope.store_id)?;

    let Some(pending) = pending else {
        return render_import_form(&state, &cookies, &scope, store)
            .map(IntoResponse::into_response);
    };

    let options = ImportOptions {
        scoped: store,
        find_existing_by: state.config.find_existing_by,
    };

    let flash = match state.porter.import(pending.path(), &options) {
        Ok(imported) => {
            info!(count = imported.len(), "Import succeeded");
            Flash::import_succeeded(imported.len())
        }
        Err(e) => {
            warn!(error = %e, "Import failed");
            Flash::import_failed(&e)
        }
    };
    drop(pending);

    flash.store(&cookies);
    Ok(Redirect::to(&scope.import_path()).into_response())
}

fn take_upload_token(cookies: &Cookies) -> Option<String> {
    let token = cookies.get(UPLOAD_COOKIE)?.value().to_string();
    cookies.remove(Cookie::build((UPLOAD_COOKIE, "")).path("/").build());
    Some(token)
}

fn release_pending_upload(state: &AppState, cookies: &Cookies) {
    if let Some(previous) = take_upload_token(cookies).and_then(|t| Uuid::parse_str(&t).ok()) {
        upload::discard_upload(&state.config.upload_dir, &previous);
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("The uploaded file is too large.".into())
    } else {
        AppError::Validation(e.body_text())
    }
}

fn render_import_form(
    state: &AppState,
    cookies: &Cookies,
    scope: &ScopeQuery,
    store: Option<Store>,
) -> AppResult<Html<String>> {
    let product_count = {
        let conn = state.db.get()?;
        products::count_products(&conn, store.as_ref().map(|s| s.id))?
    };

    let mut upload_params = vec![(XSRF_FORM_FIELD, state.xsrf_token.value().to_string())];
    if let Some(id) = scope.store_id {
        upload_params.push(("store_id", id.to_string()));
    }
    let upload_query = serde_urlencoded::to_string(&upload_params)
        .map_err(|e| AppError::Internal(format!("Failed to encode query: {}", e)))?;

    let export_query = scope
        .store_id
        .map(|id| format!("?store_id={}", id))
        .unwrap_or_default();

    let template = ImportTemplate {
        title: "Import".into(),
        version: VERSION,
        flash: Flash::take(cookies),
        store,
        product_count,
        upload_query,
        export_query,
    };

    template.render_html()
}

/// Download the current store's products as CSV.
pub async fn export(
    State(state): State<AppState>,
    Query(scope): Query<ScopeQuery>,
) -> AppResult<impl IntoResponse> {
    let options = ExportOptions {
        scoped: state.current_store(scope.store_id)?,
    };
    let csv = state.porter.export(&options)?;

    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, EXPORT_DISPOSITION),
        ],
        csv,
    ))
}
