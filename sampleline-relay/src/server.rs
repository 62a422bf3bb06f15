use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::RelayConfig,
    error::RelayError,
    policy::{self, RelayDecision, ALLOWED_METHODS, ALLOW_HEADER_VALUE, PREFLIGHT_MAX_AGE},
};

#[derive(Clone)]
struct RelayState {
    config: Arc<RelayConfig>,
    client: reqwest::Client,
    trusted_origin: HeaderValue,
}

pub struct RelayHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Bind `config.bind_addr` and serve until the handle is shut down or
/// dropped.
pub async fn start_server(config: RelayConfig) -> Result<RelayHandle, RelayError> {
    let config = config.validated()?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;
    let app = router(config)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    info!(%addr, "relay listening");
    Ok(RelayHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

/// The relay as an axum router. Every path is handled the same way.
pub fn router(config: RelayConfig) -> Result<Router, RelayError> {
    let config = config.validated()?;
    let trusted_origin = HeaderValue::from_str(&config.trusted_origin)
        .map_err(|e| RelayError::InvalidConfig(format!("trusted origin: {e}")))?;
    let client = reqwest::Client::builder()
        .timeout(config.upstream_timeout())
        .build()?;

    let state = RelayState {
        config: Arc::new(config),
        client,
        trusted_origin,
    };
    Ok(Router::new().fallback(relay).with_state(state))
}

async fn relay(
    State(state): State<RelayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let decision = policy::decide(&state.config, &method, &headers, uri.query());
    debug!(%method, ?decision, "relay request");

    match decision {
        RelayDecision::Preflight { allow_headers } => {
            let mut response = StatusCode::OK.into_response();
            let out = response.headers_mut();
            out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, state.trusted_origin.clone());
            out.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            out.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE),
            );
            out.insert(header::VARY, HeaderValue::from_static("Origin"));
            out.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
            response
        }
        RelayDecision::PlainOptions => (
            StatusCode::OK,
            [(header::ALLOW, HeaderValue::from_static(ALLOW_HEADER_VALUE))],
        )
            .into_response(),
        RelayDecision::MissingTarget => {
            (StatusCode::BAD_REQUEST, "Missing target URL.").into_response()
        }
        RelayDecision::Forbidden => (
            StatusCode::FORBIDDEN,
            [(header::CONTENT_TYPE, "text/html")],
            "Forbidden\n",
        )
            .into_response(),
        RelayDecision::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RelayDecision::Forward {
            target,
            upstream_origin,
        } => match forward(&state, method, &headers, target, &upstream_origin, body).await {
            Ok(response) => response,
            Err(e) => {
                warn!("upstream request failed: {e}");
                (StatusCode::BAD_GATEWAY, "Bad Gateway\n").into_response()
            }
        },
    }
}

async fn forward(
    state: &RelayState,
    method: Method,
    headers: &HeaderMap,
    target: Url,
    upstream_origin: &str,
    body: Bytes,
) -> Result<Response, RelayError> {
    let mut upstream_headers = HeaderMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name)
            || *name == header::HOST
            || *name == header::ORIGIN
            || *name == header::CONTENT_LENGTH
        {
            continue;
        }
        upstream_headers.append(name.clone(), value.clone());
    }
    let origin = HeaderValue::from_str(upstream_origin)
        .map_err(|e| RelayError::InvalidConfig(format!("upstream origin: {e}")))?;
    upstream_headers.insert(header::ORIGIN, origin);

    let upstream = state
        .client
        .request(method, target.clone())
        .headers(upstream_headers)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut out = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    debug!(%target, %status, length = ?upstream.content_length(), "upstream responded");

    out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, state.trusted_origin.clone());
    out.append(header::VARY, HeaderValue::from_static("Origin"));

    // Streamed through, so large program images are never held in memory.
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = out;
    Ok(response)
}

/// Headers that describe one hop and must not be relayed.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
