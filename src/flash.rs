//! One-shot notices carried across a redirect.
//!
//! A handler builds a [`Flash`] and stores it in the response cookie jar;
//! the next page render takes it back out, which also clears the cookie.

use tower_cookies::{Cookie, Cookies};

use crate::services::upload::INVALID_FILE_MESSAGE;

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Notice,
    Alert,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Notice => "notice",
            FlashKind::Alert => "alert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "notice" => Some(FlashKind::Notice),
            "alert" => Some(FlashKind::Alert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Notice,
            message: message.into(),
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Alert,
            message: message.into(),
        }
    }

    pub fn invalid_upload() -> Self {
        Self::alert(INVALID_FILE_MESSAGE)
    }

    pub fn import_succeeded(count: usize) -> Self {
        Self::notice(format!("Import Successful - Imported {} Products", count))
    }

    pub fn import_failed(error: &impl std::fmt::Display) -> Self {
        Self::alert(format!(
            "Import Failed - No records imported due to errors. {}",
            error
        ))
    }

    /// Cookie value: `<kind>:<percent-encoded message>`.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}",
            self.kind.as_str(),
            urlencoding::encode(&self.message)
        )
    }

    pub fn decode(value: &str) -> Option<Self> {
        let (kind, message) = value.split_once(':')?;
        Some(Self {
            kind: FlashKind::parse(kind)?,
            message: urlencoding::decode(message).ok()?.into_owned(),
        })
    }

    pub fn store(&self, cookies: &Cookies) {
        let cookie = Cookie::build((FLASH_COOKIE, self.encode()))
            .path("/")
            .http_only(true)
            .same_site(tower_cookies::cookie::SameSite::Lax)
            .build();
        cookies.add(cookie);
    }

    /// Read and clear the pending flash, if any.
    pub fn take(cookies: &Cookies) -> Option<Self> {
        let value = cookies.get(FLASH_COOKIE)?.value().to_string();
        cookies.remove(Cookie::build((FLASH_COOKIE, "")).path("/").build());
        Self::decode(&value)
    }
}
