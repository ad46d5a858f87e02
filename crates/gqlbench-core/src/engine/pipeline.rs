//! End-to-end run: prediction phase, then evaluation phase, over one gateway.

use crate::config::BenchConfig;
use crate::dataset::{load_dataset, load_predictions, write_predictions};
use crate::engine::evaluation::{Evaluator, RunSummary};
use crate::engine::generation::GenerationDriver;
use crate::metrics_api::Metric;
use crate::model::PredictionRecord;
use crate::providers::graph::GraphGateway;
use crate::providers::llm::LlmProvider;
use anyhow::Context;
use std::sync::Arc;

pub struct PipelineRunner {
    pub cfg: Arc<BenchConfig>,
    pub provider: Arc<dyn LlmProvider>,
    pub metrics: Vec<Arc<dyn Metric>>,
}

impl PipelineRunner {
    pub fn new(cfg: Arc<BenchConfig>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            cfg,
            provider,
            metrics: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<Arc<dyn Metric>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs the enabled phases. The gateway is closed exactly once before
    /// returning, whether or not a phase failed.
    pub async fn run(&self, gateway: &mut dyn GraphGateway) -> anyhow::Result<Option<RunSummary>> {
        if self.cfg.pipeline.run_evaluation {
            gateway.connect().await;
        }
        let result = self.run_phases(gateway).await;
        gateway.close().await;
        result
    }

    async fn run_phases(&self, gateway: &mut dyn GraphGateway) -> anyhow::Result<Option<RunSummary>> {
        let predictions = self.prediction_phase().await?;
        if !self.cfg.pipeline.run_evaluation {
            tracing::info!("evaluation disabled; done");
            return Ok(None);
        }
        let summary = self.evaluation_phase(gateway, &predictions).await?;
        Ok(Some(summary))
    }

    async fn prediction_phase(&self) -> anyhow::Result<Vec<PredictionRecord>> {
        let data = &self.cfg.data;
        let levels = &self.cfg.prediction.level_fields;

        if !self.cfg.pipeline.run_prediction {
            tracing::info!(path = %data.output_path.display(), "prediction disabled; loading predictions");
            return load_predictions(&data.output_path, levels, &data.gold_field)
                .context("cannot evaluate without a prediction file");
        }

        let items = load_dataset(&data.input_path, levels, &data.gold_field)?;
        let p = &self.cfg.prediction;
        tracing::info!(
            items = items.len(),
            model = %p.model,
            workers = p.max_workers,
            "starting prediction phase"
        );
        let driver = GenerationDriver::new(self.provider.clone(), &self.cfg.schema_text)
            .with_retry(p.retry_policy())
            .with_workers(p.max_workers);
        let records = driver.generate_batch(items).await;

        let failed = records
            .iter()
            .flat_map(|r| r.queries.iter())
            .filter(|q| q.is_none())
            .count();
        if failed > 0 {
            tracing::warn!(missing = failed, "some (item, level) pairs have no prediction");
        }
        write_predictions(&data.output_path, &records, levels)?;
        Ok(records)
    }

    async fn evaluation_phase(
        &self,
        gateway: &mut dyn GraphGateway,
        predictions: &[PredictionRecord],
    ) -> anyhow::Result<RunSummary> {
        let e = &self.cfg.evaluation;
        tracing::info!(
            backend = gateway.backend_name(),
            connected = gateway.is_connected(),
            graph = %e.graph,
            comparison = e.comparison.as_str(),
            "starting evaluation phase"
        );
        let evaluator = Evaluator::new(&e.graph, e.comparison)
            .with_metrics(self.metrics.clone())
            .with_output_dir(e.output_dir.clone());
        let (summary, _reports) = evaluator
            .evaluate_all(gateway, predictions, &self.cfg.prediction.level_fields)
            .await?;
        crate::report::console::print_run_summary(&summary);
        Ok(summary)
    }
}
