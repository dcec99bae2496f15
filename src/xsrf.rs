//! XSRF (Cross-Site Request Forgery) protection middleware.
//!
//! State-changing requests must echo the per-process token, either in the
//! `X-XSRF-Token` header or in an `_xsrf_token` parameter. Form posts carry
//! the parameter in their body; multipart uploads carry it in the query
//! string so the file body never has to be buffered for the check.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use uuid::Uuid;

/// The header name for XSRF tokens in AJAX requests.
pub const XSRF_HEADER: &str = "X-XSRF-Token";

/// The parameter name for XSRF tokens in forms and upload URLs.
pub const XSRF_FORM_FIELD: &str = "_xsrf_token";

/// XSRF token shared across the application.
#[derive(Clone)]
pub struct XsrfToken(Arc<String>);

impl XsrfToken {
    pub fn generate() -> Self {
        Self(Arc::new(Uuid::new_v4().to_string()))
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    fn matches(&self, candidate: &str) -> bool {
        candidate == self.value()
    }
}

pub async fn xsrf_middleware(
    xsrf_token: XsrfToken,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if !matches!(
        method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    ) {
        return next.run(request).await;
    }

    let header_token = request
        .headers()
        .get(XSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if let Some(token) = header_token {
        if xsrf_token.matches(&token) {
            return next.run(request).await;
        }
        return xsrf_error_response();
    }

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let query_token = request.uri().query().and_then(find_token);
        return match query_token {
            Some(token) if xsrf_token.matches(&token) => next.run(request).await,
            _ => xsrf_error_response(),
        };
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let (parts, body) = request.into_parts();
        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(_) => return xsrf_error_response(),
        };

        let form_token = std::str::from_utf8(&bytes).ok().and_then(find_token);
        return match form_token {
            Some(token) if xsrf_token.matches(&token) => {
                next.run(Request::from_parts(parts, Body::from(bytes)))
                    .await
            }
            _ => xsrf_error_response(),
        };
    }

    xsrf_error_response()
}

fn find_token(encoded: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(encoded)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == XSRF_FORM_FIELD)
        .map(|(_, value)| value)
}

fn xsrf_error_response() -> Response {
    (StatusCode::FORBIDDEN, "Invalid or missing XSRF token").into_response()
}
