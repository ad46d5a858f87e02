use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a corpus-level metric: a score, or a textual result for
/// metrics that cannot produce one (e.g. mismatched inputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{:.4}", n),
            MetricValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A metric over one level's cleaned (prediction, gold) query lists. Both
/// slices have the same length and are aligned by item.
pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    fn compute(&self, predictions: &[String], golds: &[String]) -> anyhow::Result<MetricValue>;
}
