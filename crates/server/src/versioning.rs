//! API version tracking.
//!
//! Requests carry their version in the `api-version` header or query
//! parameter. When neither is present the default version is assumed. Every
//! response from the versioned subtree reports the supported set and the
//! version the request was processed under.

use std::fmt;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::response::Pretty;

/// Header and query parameter name clients use to pick a version.
pub const VERSION_PARAM: &str = "api-version";
/// Response header listing every supported version.
pub const SUPPORTED_HEADER: &str = "api-supported-versions";

/// Version assumed when a request does not specify one.
pub const DEFAULT_VERSION: ApiVersion = ApiVersion { major: 1, minor: 0 };
/// Every version currently served. Documentation and the reporting header
/// are both derived from this set.
pub const SUPPORTED_VERSIONS: &[ApiVersion] = &[DEFAULT_VERSION];

/// A major.minor API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    /// Parse `1`, `1.0` or `v1` style version strings.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
        if raw.is_empty() {
            return None;
        }
        let mut parts = raw.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor })
    }

    /// Group name used for routes and documents, `v1` for version 1.0.
    pub fn group(&self) -> String {
        if self.minor == 0 {
            format!("v{}", self.major)
        } else {
            format!("v{}.{}", self.major, self.minor)
        }
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.contains(self)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Rejection body for malformed or unsupported versions.
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionError {
    pub error: String,
    pub supported_versions: Vec<String>,
}

/// Resolved version for a handler, falling back to the default when the
/// resolution middleware did not run.
#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ApiVersion {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ApiVersion>()
            .copied()
            .unwrap_or(DEFAULT_VERSION))
    }
}

/// Middleware resolving the request version and reporting the supported set.
pub async fn resolve(mut request: Request, next: Next) -> Response {
    let version = match requested_version(&request) {
        Ok(Some(version)) if version.is_supported() => version,
        Ok(None) => DEFAULT_VERSION,
        Ok(Some(version)) => return rejection(version.to_string()),
        Err(raw) => return rejection(raw),
    };

    request.extensions_mut().insert(version);
    let mut response = next.run(request).await;
    report(response.headers_mut(), version);
    response
}

/// Version requested by the client, if any. `Err` carries the raw value of a
/// malformed request for the rejection message.
fn requested_version(request: &Request) -> Result<Option<ApiVersion>, String> {
    if let Some(value) = request.headers().get(VERSION_PARAM) {
        let raw = match value.to_str() {
            Ok(raw) => raw,
            Err(_) => return Err(String::from("(non-ascii header)")),
        };
        return ApiVersion::parse(raw)
            .map(Some)
            .ok_or_else(|| raw.to_string());
    }

    if let Some(query) = request.uri().query() {
        for pair in query.split('&') {
            if let Some(raw) = pair.strip_prefix("api-version=") {
                return ApiVersion::parse(raw)
                    .map(Some)
                    .ok_or_else(|| raw.to_string());
            }
        }
    }

    Ok(None)
}

fn rejection(raw: String) -> Response {
    let body = VersionError {
        error: format!("unsupported API version '{raw}'"),
        supported_versions: SUPPORTED_VERSIONS
            .iter()
            .map(ApiVersion::to_string)
            .collect(),
    };
    (StatusCode::BAD_REQUEST, Pretty(body)).into_response()
}

fn report(headers: &mut HeaderMap, version: ApiVersion) {
    let supported = SUPPORTED_VERSIONS
        .iter()
        .map(ApiVersion::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&supported) {
        headers.insert(SUPPORTED_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&version.to_string()) {
        headers.insert(VERSION_PARAM, value);
    }
}
