use gqlbench_core::metrics_api::{Metric, MetricValue};

use crate::{ensure_aligned, squash_ws};

/// Mean normalized Levenshtein similarity between prediction and gold.
/// A missing prediction scores 0.
pub struct SimilarityMetric;

impl Metric for SimilarityMetric {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn compute(&self, predictions: &[String], golds: &[String]) -> anyhow::Result<MetricValue> {
        ensure_aligned(predictions, golds)?;
        if golds.is_empty() {
            return Ok(MetricValue::Number(0.0));
        }
        let total: f64 = predictions
            .iter()
            .zip(golds)
            .map(|(p, g)| {
                if p.is_empty() {
                    0.0
                } else {
                    strsim::normalized_levenshtein(&squash_ws(p), &squash_ws(g))
                }
            })
            .sum();
        let mean = total / golds.len() as f64;
        tracing::debug!(mean, samples = golds.len(), "similarity computed");
        Ok(MetricValue::Number(mean))
    }
}
