//! Request classification. Pure: no I/O, so every branch is unit tested here
//! and the server only maps decisions to responses.

use axum::http::{header, HeaderMap, HeaderValue, Method};
use url::Url;

use crate::{config::RelayConfig, origin::normalize_origin};

/// `Access-Control-Allow-Methods` on preflight responses.
pub const ALLOWED_METHODS: &str = "GET,HEAD,POST,OPTIONS";
/// `Allow` on plain OPTIONS responses.
pub const ALLOW_HEADER_VALUE: &str = "GET, HEAD, POST, OPTIONS";
/// `Access-Control-Max-Age` on preflight responses, in seconds.
pub const PREFLIGHT_MAX_AGE: &str = "86400";

const TARGET_PARAM: &str = "url";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayDecision {
    /// CORS preflight; echo the requested headers back.
    Preflight { allow_headers: HeaderValue },
    /// OPTIONS without the preflight headers.
    PlainOptions,
    /// No `url` query parameter.
    MissingTarget,
    /// Untrusted origin or target outside the allow-list.
    Forbidden,
    /// Relay to `target` presenting `upstream_origin` as the Origin.
    Forward { target: Url, upstream_origin: String },
    MethodNotAllowed,
}

/// Classify one request.
///
/// `query` is the raw query string of the request URI.
pub fn decide(
    config: &RelayConfig,
    method: &Method,
    headers: &HeaderMap,
    query: Option<&str>,
) -> RelayDecision {
    if *method == Method::OPTIONS {
        return preflight(headers);
    }
    if !matches!(*method, Method::GET | Method::HEAD | Method::POST) {
        return RelayDecision::MethodNotAllowed;
    }

    let Some(raw_target) = target_param(query) else {
        return RelayDecision::MissingTarget;
    };

    if !origin_is_trusted(config, headers) {
        return RelayDecision::Forbidden;
    }

    let Ok(target) = Url::parse(&raw_target) else {
        return RelayDecision::Forbidden;
    };
    // Compare the parsed form so case or dot-segment tricks cannot slip a
    // different host past a prefix.
    if !config
        .allowed_prefixes
        .iter()
        .any(|prefix| raw_target.starts_with(prefix.as_str()) && target.as_str().starts_with(prefix.as_str()))
    {
        return RelayDecision::Forbidden;
    }

    let upstream_origin = target.origin().ascii_serialization();
    RelayDecision::Forward {
        target,
        upstream_origin,
    }
}

fn preflight(headers: &HeaderMap) -> RelayDecision {
    let is_preflight = headers.contains_key(header::ORIGIN)
        && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    match headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        Some(requested) if is_preflight => RelayDecision::Preflight {
            allow_headers: requested.clone(),
        },
        _ => RelayDecision::PlainOptions,
    }
}

fn target_param(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn origin_is_trusted(config: &RelayConfig, headers: &HeaderMap) -> bool {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .and_then(normalize_origin)
        .is_some_and(|origin| origin == config.trusted_origin)
}
