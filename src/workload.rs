//! Demo HTTP workload deployed by the service module.
//!
//! Every request on every path and method is answered with `200` and
//! [`HELLO_BODY`]. Each request is logged as a single JSON record so the
//! container's log stream shows who reached it and how.

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, SocketAddr};

use axum::Router;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::uri::Authority;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Body returned for every request.
pub const HELLO_BODY: &str = "Hello, world!\n";

/// Errors raised by the workload server.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// Raised when a listener cannot be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Raised when a listener's address cannot be read back.
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] io::Error),
    /// Raised when a server stops with an error.
    #[error("server on {addr} failed: {source}")]
    Serve {
        /// Address the server listened on.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Raised when a server task panics or is cancelled.
    #[error("server task ended abnormally: {message}")]
    Join {
        /// Join error description.
        message: String,
    },
}

/// Structured record of one request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RequestLog {
    /// Peer address.
    pub remote_addr: String,
    /// Request method.
    pub method: String,
    /// Path and query as sent by the client.
    pub request_uri: String,
    /// `Host` header, or the URI authority when absent.
    pub host: String,
    /// Declared body length, `-1` when unknown.
    pub content_length: i64,
    /// Request headers; repeated headers keep every value.
    pub header: BTreeMap<String, Vec<String>>,
    /// Protocol version, for example `HTTP/1.1`.
    pub protocol: String,
}

impl RequestLog {
    /// Captures the loggable parts of `request`.
    #[must_use]
    pub fn capture<B>(remote: SocketAddr, request: &axum::http::Request<B>) -> Self {
        let headers = request.headers();
        let mut header: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            header
                .entry(name.as_str().to_owned())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let host = headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| request.uri().authority().map(Authority::as_str))
            .unwrap_or_default()
            .to_owned();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(-1);

        Self {
            remote_addr: remote.to_string(),
            method: request.method().as_str().to_owned(),
            request_uri: request
                .uri()
                .path_and_query()
                .map_or_else(|| String::from("/"), |pq| pq.as_str().to_owned()),
            host,
            content_length,
            header,
            protocol: format!("{:?}", request.version()),
        }
    }
}

async fn hello(ConnectInfo(remote): ConnectInfo<SocketAddr>, request: Request) -> &'static str {
    let record = RequestLog::capture(remote, &request);
    match serde_json::to_string(&record) {
        Ok(json) => info!(request = %json, "handled request"),
        Err(err) => warn!(error = %err, "failed to encode request log"),
    }
    HELLO_BODY
}

/// Router answering every request with [`HELLO_BODY`].
#[must_use]
pub fn router() -> Router {
    Router::new().fallback(hello)
}

/// Binds one listener per port on `host`.
///
/// # Errors
///
/// Returns [`WorkloadError::Bind`] for the first port that cannot be bound.
pub async fn bind(host: IpAddr, ports: &[u16]) -> Result<Vec<TcpListener>, WorkloadError> {
    let mut listeners = Vec::with_capacity(ports.len());
    for port in ports {
        let addr = SocketAddr::new(host, *port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| WorkloadError::Bind { addr, source })?;
        listeners.push(listener);
    }
    Ok(listeners)
}

/// Serves [`router`] on every listener until one of them fails.
///
/// # Errors
///
/// Returns the first [`WorkloadError`] raised by any server.
pub async fn serve(listeners: Vec<TcpListener>) -> Result<(), WorkloadError> {
    let mut servers = JoinSet::new();
    for listener in listeners {
        let addr = listener.local_addr().map_err(WorkloadError::LocalAddr)?;
        info!(%addr, "listening");
        servers.spawn(async move {
            axum::serve(
                listener,
                router().into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(|source| WorkloadError::Serve { addr, source })
        });
    }
    while let Some(joined) = servers.join_next().await {
        joined.map_err(|err| WorkloadError::Join {
            message: err.to_string(),
        })??;
    }
    Ok(())
}
