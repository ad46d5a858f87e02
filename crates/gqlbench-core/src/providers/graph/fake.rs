//! In-memory gateway answering from a fixed query table.

use super::{GatewayError, GraphGateway};
use crate::value::Row;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct GatewayLog {
    pub connects: usize,
    pub closes: usize,
    pub executions: HashMap<String, usize>,
}

/// Unknown queries fail with an execution error. Call counts stay observable
/// through [`FakeGraphGateway::log`] after the gateway has been moved.
#[derive(Clone, Default)]
pub struct FakeGraphGateway {
    answers: HashMap<String, Result<Vec<Row>, String>>,
    reachable: bool,
    connected: bool,
    log: Arc<Mutex<GatewayLog>>,
}

impl FakeGraphGateway {
    pub fn new() -> Self {
        Self {
            reachable: true,
            ..Self::default()
        }
    }

    pub fn with_rows(mut self, query: &str, rows: Vec<Row>) -> Self {
        self.answers.insert(query.to_string(), Ok(rows));
        self
    }

    pub fn with_error(mut self, query: &str, message: &str) -> Self {
        self.answers
            .insert(query.to_string(), Err(message.to_string()));
        self
    }

    /// Connection attempts fail; the gateway stays degraded.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn log(&self) -> Arc<Mutex<GatewayLog>> {
        self.log.clone()
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut GatewayLog) -> T) -> T {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut log)
    }
}

#[async_trait]
impl GraphGateway for FakeGraphGateway {
    async fn connect(&mut self) {
        self.with_log(|l| l.connects += 1);
        self.connected = self.reachable;
    }

    async fn execute(&mut self, query: &str, _graph: &str) -> Result<Vec<Row>, GatewayError> {
        if !self.connected {
            return Err(GatewayError::NoConnection);
        }
        self.with_log(|l| *l.executions.entry(query.to_string()).or_insert(0) += 1);
        match self.answers.get(query) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(msg)) => Err(GatewayError::Execution(msg.clone())),
            None => Err(GatewayError::Execution(format!("unknown query: {}", query))),
        }
    }

    async fn close(&mut self) {
        self.with_log(|l| l.closes += 1);
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}
