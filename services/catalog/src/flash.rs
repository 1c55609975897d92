//! One-shot notices carried across a redirect.
//!
//! A notice is stored in a signed cookie by the handler that redirects and
//! removed by the page that renders it.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite, SignedCookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

pub const NOTICE_COOKIE: &str = "catalog_notice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
        }
    }
}

/// A message shown once on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    fn decode(value: &str) -> Option<Self> {
        let json = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

/// Derive the cookie signing key from the configured secret
pub fn signing_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

/// Queue `notice` for the next page
pub fn push(jar: SignedCookieJar, notice: &Notice) -> SignedCookieJar {
    jar.add(
        Cookie::build((NOTICE_COOKIE, notice.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Take the pending notice, if any, clearing it from the client.
///
/// The signed jar drops cookies that fail verification, so `headers` is
/// consulted to expire a stale or forged notice as well.
pub fn take(jar: SignedCookieJar, headers: &HeaderMap) -> (SignedCookieJar, Option<Notice>) {
    if let Some(cookie) = jar.get(NOTICE_COOKIE) {
        let notice = Notice::decode(cookie.value());
        let jar = jar.remove(Cookie::build(NOTICE_COOKIE).path("/"));
        return (jar, notice);
    }

    if CookieJar::from_headers(headers).get(NOTICE_COOKIE).is_none() {
        return (jar, None);
    }

    let mut expired = Cookie::build((NOTICE_COOKIE, "")).path("/").build();
    expired.make_removal();
    (jar.add(expired), None)
}
