//! Gateway over the Bolt protocol, served by TuGraph and Neo4j on port 7687.
//!
//! The driver hands rows back keyed by column name without the projection
//! order, so columns are laid out sorted by name.

use super::{GatewayError, GraphGateway};
use crate::value::{Row, Temporal, Value};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use neo4rs::{BoltMap, BoltPath, BoltType, ConfigBuilder, Graph};
use serde::de::{Deserialize, IntoDeserializer};
use std::time::Duration;

pub struct BoltGraphGateway {
    uri: String,
    user: String,
    password: String,
    timeout: Duration,
    graph: Option<Graph>,
}

impl BoltGraphGateway {
    pub fn new(uri: &str, user: &str, password: Option<String>) -> Self {
        Self {
            uri: uri.to_string(),
            user: user.to_string(),
            password: password.unwrap_or_default(),
            timeout: Duration::from_secs(60),
            graph: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The driver pools lazily; a trivial statement proves the server answers.
    async fn open(&self) -> anyhow::Result<Graph> {
        let config = ConfigBuilder::default()
            .uri(self.uri.as_str())
            .user(self.user.as_str())
            .password(self.password.as_str())
            .max_connections(1)
            .build()?;
        let graph = Graph::connect(config).await?;
        tokio::time::timeout(self.timeout, graph.run(neo4rs::query("RETURN 1")))
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {:?}", self.timeout))??;
        Ok(graph)
    }
}

#[async_trait]
impl GraphGateway for BoltGraphGateway {
    async fn connect(&mut self) {
        match self.open().await {
            Ok(graph) => {
                tracing::info!(uri = %self.uri, "connected to graph database");
                self.graph = Some(graph);
            }
            Err(e) => {
                tracing::warn!(
                    uri = %self.uri,
                    error = %e,
                    "graph database unreachable; every evaluation will score -1"
                );
            }
        }
    }

    async fn execute(&mut self, query: &str, graph: &str) -> Result<Vec<Row>, GatewayError> {
        let db = self.graph.as_ref().ok_or(GatewayError::NoConnection)?;
        let rows = tokio::time::timeout(self.timeout, fetch(db, query, graph))
            .await
            .map_err(|_| GatewayError::Execution(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| GatewayError::Execution(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.to_strict::<BoltMap>()
                    .map(|columns| decode_row(&columns))
                    .map_err(|e| GatewayError::Execution(e.to_string()))
            })
            .collect()
    }

    async fn close(&mut self) {
        if self.graph.take().is_some() {
            tracing::info!(uri = %self.uri, "graph database session closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.graph.is_some()
    }

    fn backend_name(&self) -> &'static str {
        "bolt"
    }
}

async fn fetch(db: &Graph, query: &str, graph: &str) -> neo4rs::Result<Vec<neo4rs::Row>> {
    let mut stream = db.execute_on(graph, neo4rs::query(query)).await?;
    let mut rows = Vec::new();
    while let Some(row) = stream.next().await? {
        rows.push(row);
    }
    Ok(rows)
}

pub fn decode_row(columns: &BoltMap) -> Row {
    Row::new(sorted_entries(columns))
}

pub fn decode_bolt(v: &BoltType) -> Value {
    match v {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(b) => Value::Bool(b.value),
        BoltType::Integer(i) => Value::Int(i.value),
        BoltType::Float(f) => Value::Float(f.value),
        BoltType::String(s) => Value::String(s.value.clone()),
        BoltType::List(items) => Value::List(items.value.iter().map(decode_bolt).collect()),
        BoltType::Map(m) => Value::Map(sorted_entries(m)),
        // Entities compare by their properties.
        BoltType::Node(n) => Value::Map(sorted_entries(&n.properties)),
        BoltType::Relation(r) => Value::Map(sorted_entries(&r.properties)),
        BoltType::UnboundedRelation(r) => Value::Map(sorted_entries(&r.properties)),
        BoltType::Path(p) => {
            decode_path(p).unwrap_or_else(|| other("Path", format!("{:?}", p)))
        }
        BoltType::Point2D(p) => other(
            "Point",
            format!("SRID={};POINT ({} {})", p.sr_id.value, p.x.value, p.y.value),
        ),
        BoltType::Point3D(p) => other(
            "Point",
            format!(
                "SRID={};POINT Z ({} {} {})",
                p.sr_id.value, p.x.value, p.y.value, p.z.value
            ),
        ),
        BoltType::Bytes(b) => other(
            "Bytes",
            b.value.iter().map(|byte| format!("{:02x}", byte)).collect(),
        ),
        BoltType::Duration(d) => match <(i64, i64)>::deserialize(v.into_deserializer()) {
            Ok((seconds, nanos)) => Value::Duration(iso_duration(seconds, nanos)),
            Err(_) => other("Duration", format!("{:?}", d)),
        },
        BoltType::Date(d) => temporal(NaiveDate::try_from(d).map(Temporal::Date).ok(), d),
        BoltType::LocalTime(t) => Value::Temporal(Temporal::LocalTime(NaiveTime::from(t))),
        BoltType::Time(t) => {
            let (time, offset): (NaiveTime, FixedOffset) = t.into();
            Value::Temporal(Temporal::Time {
                time,
                offset: offset.to_string(),
            })
        }
        BoltType::LocalDateTime(dt) => temporal(
            NaiveDateTime::try_from(dt).map(Temporal::LocalDateTime).ok(),
            dt,
        ),
        BoltType::DateTime(dt) => temporal(
            DateTime::<FixedOffset>::try_from(dt).map(Temporal::DateTime).ok(),
            dt,
        ),
        BoltType::DateTimeZoneId(dt) => temporal(
            DateTime::<FixedOffset>::try_from(dt)
                .map(|datetime| Temporal::Zoned {
                    datetime,
                    zone: dt.tz_id().to_string(),
                })
                .ok(),
            dt,
        ),
    }
}

fn sorted_entries(map: &BoltMap) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = map
        .value
        .iter()
        .map(|(k, v)| (k.value.clone(), decode_bolt(v)))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// Flattens a path into its alternating node/relationship sequence. Indices
/// come in pairs: a 1-based relationship index (negative when traversed
/// backwards) then a 0-based node index.
fn decode_path(p: &BoltPath) -> Option<Value> {
    let mut seq = vec![decode_bolt(p.nodes.get(0)?)];
    for pair in p.indices.value.chunks(2) {
        let [BoltType::Integer(rel), BoltType::Integer(node)] = pair else {
            return None;
        };
        let rel = usize::try_from(rel.value.unsigned_abs()).ok()?.checked_sub(1)?;
        let node = usize::try_from(node.value).ok()?;
        seq.push(decode_bolt(p.rels.get(rel)?));
        seq.push(decode_bolt(p.nodes.get(node)?));
    }
    Some(Value::List(seq))
}

fn iso_duration(seconds: i64, nanos: i64) -> String {
    if nanos == 0 {
        return format!("PT{}S", seconds);
    }
    let frac = format!("{:09}", nanos.unsigned_abs());
    format!("PT{}.{}S", seconds, frac.trim_end_matches('0'))
}

fn temporal(parsed: Option<Temporal>, raw: &impl std::fmt::Debug) -> Value {
    Value::Temporal(parsed.unwrap_or_else(|| Temporal::Raw(format!("{:?}", raw))))
}

fn other(kind: &str, repr: String) -> Value {
    Value::Other {
        kind: kind.to_string(),
        repr,
    }
}
