//! Gateway over the Neo4j-compatible HTTP query API (`/db/{graph}/query/v2`).
//!
//! Responses are requested in the typed JSON format so integers, floats and
//! temporals survive the trip: every value arrives as `{"$type", "_value"}`.
//! Untyped JSON is accepted as a fallback.

use super::{GatewayError, GraphGateway};
use crate::value::{Row, Temporal, Value};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const TYPED_JSON: &str = "application/vnd.neo4j.query";

pub struct HttpGraphGateway {
    base_url: String,
    user: String,
    password: Option<String>,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl HttpGraphGateway {
    pub fn new(uri: &str, user: &str, password: Option<String>) -> Self {
        Self {
            base_url: uri.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password,
            timeout: Duration::from_secs(60),
            client: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.basic_auth(&self.user, self.password.as_deref())
    }

    async fn ping(&self, client: &reqwest::Client) -> anyhow::Result<()> {
        let resp = self
            .authed(client.get(&self.base_url))
            .header("Accept", "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("server answered {}", resp.status());
        }
        Ok(())
    }
}

#[async_trait]
impl GraphGateway for HttpGraphGateway {
    async fn connect(&mut self) {
        let client = match reqwest::Client::builder().timeout(self.timeout).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build HTTP client; evaluation degraded");
                return;
            }
        };
        match self.ping(&client).await {
            Ok(()) => {
                tracing::info!(uri = %self.base_url, "connected to graph database");
                self.client = Some(client);
            }
            Err(e) => {
                tracing::warn!(
                    uri = %self.base_url,
                    error = %e,
                    "graph database unreachable; every evaluation will score -1"
                );
            }
        }
    }

    async fn execute(&mut self, query: &str, graph: &str) -> Result<Vec<Row>, GatewayError> {
        let client = self.client.as_ref().ok_or(GatewayError::NoConnection)?;
        let url = format!("{}/db/{}/query/v2", self.base_url, graph);

        let resp = self
            .authed(client.post(&url))
            .header("Accept", TYPED_JSON)
            .json(&json!({ "statement": query }))
            .send()
            .await
            .map_err(|e| GatewayError::Execution(e.to_string()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Execution(format!("{} ({})", e, status)))?;

        if let Some(msg) = first_error(&body) {
            return Err(GatewayError::Execution(msg));
        }
        if !status.is_success() {
            return Err(GatewayError::Execution(format!("server answered {}", status)));
        }
        decode_response(&body).map_err(GatewayError::Execution)
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::info!(uri = %self.base_url, "graph database session closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn backend_name(&self) -> &'static str {
        "neo4j-http"
    }
}

fn first_error(body: &serde_json::Value) -> Option<String> {
    let err = body.get("errors")?.as_array()?.first()?;
    let code = err.get("code").and_then(|v| v.as_str()).unwrap_or("Error");
    let message = err.get("message").and_then(|v| v.as_str()).unwrap_or("");
    Some(format!("{}: {}", code, message))
}

/// Decodes `{"data": {"fields": [...], "values": [[...], ...]}}` into rows.
pub fn decode_response(body: &serde_json::Value) -> Result<Vec<Row>, String> {
    let data = body.get("data").ok_or("response without 'data'")?;
    let fields: Vec<&str> = data
        .get("fields")
        .and_then(|f| f.as_array())
        .ok_or("response without 'data.fields'")?
        .iter()
        .map(|f| f.as_str().unwrap_or_default())
        .collect();
    let values = data
        .get("values")
        .and_then(|v| v.as_array())
        .ok_or("response without 'data.values'")?;

    values
        .iter()
        .map(|record| -> Result<Row, String> {
            let cells = record.as_array().ok_or("record is not an array")?;
            if cells.len() != fields.len() {
                return Err(format!(
                    "record has {} values for {} fields",
                    cells.len(),
                    fields.len()
                ));
            }
            Ok(fields
                .iter()
                .zip(cells)
                .map(|(f, c)| (*f, decode_value(c)))
                .collect())
        })
        .collect()
}

pub fn decode_value(v: &serde_json::Value) -> Value {
    use serde_json::Value as J;
    match v {
        J::Object(obj) => match (obj.get("$type").and_then(|t| t.as_str()), obj.get("_value")) {
            (Some(kind), Some(inner)) => decode_typed(kind, inner),
            (Some("Null"), None) => Value::Null,
            _ => Value::Map(obj.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect()),
        },
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        J::String(s) => Value::String(s.clone()),
        J::Array(items) => Value::List(items.iter().map(decode_value).collect()),
    }
}

fn decode_typed(kind: &str, inner: &serde_json::Value) -> Value {
    let text = || match inner {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match kind {
        "Null" => Value::Null,
        "Boolean" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "Integer" => match text().parse() {
            Ok(i) => Value::Int(i),
            Err(_) => other(kind, text()),
        },
        "Float" => Value::Float(parse_float(&text())),
        "String" => Value::String(text()),
        "Date" | "Time" | "LocalTime" | "DateTime" | "OffsetDateTime" | "ZonedDateTime"
        | "LocalDateTime" => Value::Temporal(Temporal::parse(kind, &text())),
        "Duration" => Value::Duration(text()),
        "List" => match inner.as_array() {
            Some(items) => Value::List(items.iter().map(decode_value).collect()),
            None => other(kind, text()),
        },
        "Map" => match inner.as_object() {
            Some(obj) => Value::Map(obj.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect()),
            None => other(kind, text()),
        },
        // Entities compare by their properties.
        "Node" | "Relationship" => match inner.get("_properties").and_then(|p| p.as_object()) {
            Some(props) => Value::Map(
                props
                    .iter()
                    .map(|(k, v)| (k.clone(), decode_value(v)))
                    .collect(),
            ),
            None => other(kind, text()),
        },
        "Path" => match inner.as_array() {
            Some(items) => Value::List(items.iter().map(decode_value).collect()),
            None => other(kind, text()),
        },
        _ => other(kind, text()),
    }
}

fn parse_float(text: &str) -> f64 {
    match text {
        "NaN" => f64::NAN,
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}

fn other(kind: &str, repr: String) -> Value {
    Value::Other {
        kind: kind.to_string(),
        repr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_decode_typed_response() {
        let body = json!({
            "data": {
                "fields": ["name", "born", "score", "released", "tags"],
                "values": [[
                    {"$type": "String", "_value": "Keanu"},
                    {"$type": "Integer", "_value": "1964"},
                    {"$type": "Float", "_value": "0.5"},
                    {"$type": "Date", "_value": "1999-03-31"},
                    {"$type": "List", "_value": [{"$type": "Null", "_value": null}]}
                ]]
            },
            "bookmarks": []
        });
        let rows = decode_response(&body).unwrap();
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        let names: Vec<&str> = r.columns().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["name", "born", "score", "released", "tags"]);
        assert_eq!(r.get("born"), Some(&Value::Int(1964)));
        assert_eq!(r.get("score"), Some(&Value::Float(0.5)));
        assert_eq!(
            r.get("released"),
            Some(&Value::Temporal(Temporal::Date(
                NaiveDate::from_ymd_opt(1999, 3, 31).unwrap()
            )))
        );
        assert_eq!(r.get("tags"), Some(&Value::List(vec![Value::Null])));
    }

    #[test]
    fn test_decode_node_keeps_properties() {
        let v = decode_value(&json!({
            "$type": "Node",
            "_value": {
                "_element_id": "4:abc:0",
                "_labels": ["Person"],
                "_properties": {"name": {"$type": "String", "_value": "Ann"}}
            }
        }));
        assert_eq!(
            v,
            Value::Map(vec![("name".into(), Value::String("Ann".into()))])
        );
    }

    #[test]
    fn test_decode_plain_json_and_specials() {
        assert_eq!(decode_value(&json!(3)), Value::Int(3));
        assert_eq!(decode_value(&json!(2.5)), Value::Float(2.5));
        assert!(matches!(
            decode_value(&json!({"$type": "Float", "_value": "NaN"})),
            Value::Float(f) if f.is_nan()
        ));
        assert!(matches!(
            decode_value(&json!({"$type": "Point", "_value": "SRID=4326;POINT (1 2)"})),
            Value::Other { ref kind, .. } if kind == "Point"
        ));
    }

    #[test]
    fn test_malformed_response_is_an_error() {
        assert!(decode_response(&json!({"errors": []})).is_err());
        let ragged = json!({"data": {"fields": ["a", "b"], "values": [[1]]}});
        assert!(decode_response(&ragged).is_err());
    }

    #[test]
    fn test_server_errors_are_reported() {
        let body = json!({"errors": [{"code": "Neo.ClientError.Statement.SyntaxError",
                                      "message": "Invalid input"}]});
        assert_eq!(
            first_error(&body).as_deref(),
            Some("Neo.ClientError.Statement.SyntaxError: Invalid input")
        );
        assert_eq!(first_error(&json!({"data": {}})), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades_to_no_connection() {
        let mut gw = HttpGraphGateway::new("http://127.0.0.1:1", "admin", None)
            .with_timeout(Duration::from_secs(2));
        gw.connect().await;
        assert!(!gw.is_connected());
        assert_eq!(
            gw.execute("RETURN 1", "movie").await.unwrap_err(),
            GatewayError::NoConnection
        );
        gw.close().await;
        gw.close().await;
    }
}
