use std::sync::Arc;

use gqlbench_core::metrics_api::Metric;

mod exact_match;
mod similarity;

pub use exact_match::ExactMatchMetric;
pub use similarity::SimilarityMetric;

pub fn default_metrics() -> Vec<Arc<dyn Metric>> {
    vec![Arc::new(ExactMatchMetric), Arc::new(SimilarityMetric)]
}

/// Collapses whitespace runs so formatting differences do not count.
pub(crate) fn squash_ws(q: &str) -> String {
    q.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn ensure_aligned(predictions: &[String], golds: &[String]) -> anyhow::Result<()> {
    if predictions.len() != golds.len() {
        anyhow::bail!(
            "prediction/gold length mismatch: {} vs {}",
            predictions.len(),
            golds.len()
        );
    }
    Ok(())
}
