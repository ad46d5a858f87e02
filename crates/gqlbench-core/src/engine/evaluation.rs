//! Level-wise execution evaluation.
//!
//! Every (item, level) pair ends in exactly one [`EvalState`]:
//!
//! | state                 | when                                   | score |
//! |-----------------------|----------------------------------------|-------|
//! | `SkippedNoPrediction` | cleaned prediction is empty            | 0     |
//! | `GoldExecFailed`      | gold query fails (or no connection)    | -1    |
//! | `PredExecFailed`      | gold ran, prediction failed            | 0     |
//! | `Compared`            | both ran                               | 1 / 0 |
//!
//! Evaluation is sequential over a single gateway; no retries.

use crate::equivalence::{results_equivalent, Comparison};
use crate::metrics_api::{Metric, MetricValue};
use crate::model::{EvalState, EvaluationRecord, LevelField, PredictionRecord, Score};
use crate::prompt::clean_query;
use crate::providers::graph::GraphGateway;
use crate::value::Row;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub state: EvalState,
    pub score: Score,
    pub error: Option<String>,
    pub gold_rows: Vec<Row>,
    pub pred_rows: Vec<Row>,
}

impl PairOutcome {
    fn terminal(state: EvalState, score: Score, error: Option<String>) -> Self {
        Self {
            state,
            score,
            error,
            gold_rows: Vec::new(),
            pred_rows: Vec::new(),
        }
    }
}

/// Scores one cleaned (gold, predicted) pair. The predicted query is only
/// executed after the gold query succeeded.
pub async fn evaluate_pair(
    gateway: &mut dyn GraphGateway,
    graph: &str,
    gold: &str,
    predicted: &str,
    comparison: Comparison,
) -> PairOutcome {
    if predicted.trim().is_empty() {
        return PairOutcome::terminal(EvalState::SkippedNoPrediction, Score::Miss, None);
    }

    let gold_rows = match gateway.execute(gold, graph).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "gold query failed");
            return PairOutcome::terminal(
                EvalState::GoldExecFailed,
                Score::GoldFailed,
                Some(e.to_string()),
            );
        }
    };

    let pred_rows = match gateway.execute(predicted, graph).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::debug!(error = %e, "predicted query failed");
            return PairOutcome {
                state: EvalState::PredExecFailed,
                score: Score::Miss,
                error: Some(e.to_string()),
                gold_rows,
                pred_rows: Vec::new(),
            };
        }
    };

    let score = if results_equivalent(&gold_rows, &pred_rows, comparison) {
        Score::Match
    } else {
        Score::Miss
    };
    PairOutcome {
        state: EvalState::Compared,
        score,
        error: None,
        gold_rows,
        pred_rows,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    pub level: String,
    pub samples: usize,
    pub correct: usize,
    pub gold_failures: usize,
    pub pred_failures: usize,
    pub skipped: usize,
    pub accuracy: f64,
    pub accuracy_excluding_gold_failures: f64,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl LevelSummary {
    fn from_records(level: &str, records: &[EvaluationRecord]) -> Self {
        let count = |s: EvalState| records.iter().filter(|r| r.state == s).count();
        let samples = records.len();
        let correct = records.iter().filter(|r| r.score == Score::Match).count();
        let gold_failures = count(EvalState::GoldExecFailed);
        Self {
            level: level.to_string(),
            samples,
            correct,
            gold_failures,
            pred_failures: count(EvalState::PredExecFailed),
            skipped: count(EvalState::SkippedNoPrediction),
            accuracy: ratio(correct, samples),
            accuracy_excluding_gold_failures: ratio(correct, samples - gold_failures),
            metrics: BTreeMap::new(),
        }
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

#[derive(Debug, Clone)]
pub struct LevelReport {
    pub summary: LevelSummary,
    pub records: Vec<EvaluationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub graph: String,
    pub comparison: &'static str,
    pub levels: Vec<LevelSummary>,
}

pub struct Evaluator {
    pub graph: String,
    pub comparison: Comparison,
    pub metrics: Vec<Arc<dyn Metric>>,
    /// Where per-level detail and the run summary are written. `None` keeps
    /// everything in memory.
    pub output_dir: Option<PathBuf>,
}

impl Evaluator {
    pub fn new(graph: &str, comparison: Comparison) -> Self {
        Self {
            graph: graph.to_string(),
            comparison,
            metrics: Vec::new(),
            output_dir: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<Arc<dyn Metric>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub async fn evaluate_level(
        &self,
        gateway: &mut dyn GraphGateway,
        predictions: &[PredictionRecord],
        level_index: usize,
        level: &LevelField,
    ) -> anyhow::Result<LevelReport> {
        tracing::info!(level = %level.query_field, samples = predictions.len(), "evaluating level");

        let mut records = Vec::with_capacity(predictions.len());
        for p in predictions {
            let pred_query = p.query(level_index).map(str::to_string);
            let cleaned_gold = clean_query(Some(&p.item.gold_query));
            let cleaned_pred = clean_query(pred_query.as_deref());

            let outcome = evaluate_pair(
                gateway,
                &self.graph,
                &cleaned_gold,
                &cleaned_pred,
                self.comparison,
            )
            .await;

            tracing::debug!(
                instance = %p.item.instance_id,
                state = ?outcome.state,
                score = outcome.score.as_i8(),
                "evaluated"
            );
            records.push(EvaluationRecord {
                instance_id: p.item.instance_id.clone(),
                gold_query: p.item.gold_query.clone(),
                pred_query,
                cleaned_gold,
                cleaned_pred,
                state: outcome.state,
                score: outcome.score,
                error: outcome.error,
                gold_result: outcome.gold_rows,
                pred_result: outcome.pred_rows,
            });
        }

        let mut summary = LevelSummary::from_records(&level.query_field, &records);
        let preds: Vec<String> = records.iter().map(|r| r.cleaned_pred.clone()).collect();
        let golds: Vec<String> = records.iter().map(|r| r.cleaned_gold.clone()).collect();
        for m in &self.metrics {
            match m.compute(&preds, &golds) {
                Ok(v) => {
                    summary.metrics.insert(m.name().to_string(), v);
                }
                Err(e) => {
                    tracing::warn!(metric = m.name(), error = %e, "metric failed");
                    summary
                        .metrics
                        .insert(m.name().to_string(), MetricValue::Text(format!("error: {}", e)));
                }
            }
        }

        if let Some(dir) = &self.output_dir {
            crate::report::json::write_level_detail(dir, &level.query_field, &records)?;
        }

        Ok(LevelReport { summary, records })
    }

    /// Evaluates every level in configured order and writes the run summary.
    pub async fn evaluate_all(
        &self,
        gateway: &mut dyn GraphGateway,
        predictions: &[PredictionRecord],
        levels: &[LevelField],
    ) -> anyhow::Result<(RunSummary, Vec<LevelReport>)> {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(levels.len());
        for (i, level) in levels.iter().enumerate() {
            let report = self.evaluate_level(gateway, predictions, i, level).await?;
            crate::report::console::print_level_summary(&report.summary);
            reports.push(report);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            graph: self.graph.clone(),
            comparison: self.comparison.as_str(),
            levels: reports.iter().map(|r| r.summary.clone()).collect(),
        };
        if let Some(dir) = &self.output_dir {
            crate::report::json::write_summary(dir, &summary)?;
        }
        Ok((summary, reports))
    }
}
