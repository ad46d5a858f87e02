//! Graph database gateway: one owned session, single-caller use.

use crate::config::EvaluationSettings;
use crate::value::Row;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Why an execution produced no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway never connected, or has been closed.
    NoConnection,
    /// The query itself failed (syntax or runtime error).
    Execution(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NoConnection => write!(f, "no database connection"),
            GatewayError::Execution(msg) => write!(f, "query execution error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

#[async_trait]
pub trait GraphGateway: Send {
    /// Establishes the session. Failure leaves the gateway degraded: later
    /// executions return [`GatewayError::NoConnection`].
    async fn connect(&mut self);

    async fn execute(&mut self, query: &str, graph: &str) -> Result<Vec<Row>, GatewayError>;

    /// Releases the session. Safe to call more than once.
    async fn close(&mut self);

    fn is_connected(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}

pub mod bolt;
pub mod fake;
pub mod http;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Bolt,
    Http,
}

impl Backend {
    /// `http://` and `https://` select the HTTP query API; every other
    /// scheme (`bolt`, `neo4j` and their TLS variants) speaks Bolt.
    pub fn for_uri(uri: &str) -> Self {
        let scheme = uri
            .split_once("://")
            .map(|(s, _)| s.to_ascii_lowercase())
            .unwrap_or_default();
        match scheme.as_str() {
            "http" | "https" => Backend::Http,
            _ => Backend::Bolt,
        }
    }
}

/// Builds the gateway the configured `db_uri` asks for.
pub fn from_settings(settings: &EvaluationSettings) -> Box<dyn GraphGateway> {
    let timeout = Duration::from_secs(settings.request_timeout_seconds);
    let password = Some(settings.resolve_password());
    let (uri, user) = (settings.db_uri.as_str(), settings.db_user.as_str());
    match Backend::for_uri(uri) {
        Backend::Bolt => {
            Box::new(bolt::BoltGraphGateway::new(uri, user, password).with_timeout(timeout))
        }
        Backend::Http => {
            Box::new(http::HttpGraphGateway::new(uri, user, password).with_timeout(timeout))
        }
    }
}
