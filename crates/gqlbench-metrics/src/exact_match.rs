use gqlbench_core::metrics_api::{Metric, MetricValue};

use crate::{ensure_aligned, squash_ws};

/// Share of predictions textually equal to their gold query.
pub struct ExactMatchMetric;

impl Metric for ExactMatchMetric {
    fn name(&self) -> &'static str {
        "exact_match"
    }

    fn compute(&self, predictions: &[String], golds: &[String]) -> anyhow::Result<MetricValue> {
        ensure_aligned(predictions, golds)?;
        if golds.is_empty() {
            return Ok(MetricValue::Number(0.0));
        }
        let hits = predictions
            .iter()
            .zip(golds)
            .filter(|(p, g)| !p.is_empty() && squash_ws(p) == squash_ws(g))
            .count();
        Ok(MetricValue::Number(hits as f64 / golds.len() as f64))
    }
}
