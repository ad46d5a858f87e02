use std::sync::Arc;

use gqlbench_core::config::{load_config, BenchConfig};
use gqlbench_core::engine::pipeline::PipelineRunner;
use gqlbench_core::providers::graph;
use gqlbench_core::providers::llm::openai::OpenAiProvider;

use super::{exit_codes, Phases};
use crate::cli::args::RunArgs;

pub async fn run(args: RunArgs, phases: Phases) -> anyhow::Result<i32> {
    let mut cfg = match load_config(&args.config, args.strict_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    apply_overrides(&mut cfg, &args, phases);

    let provider = Arc::new(OpenAiProvider::from_settings(&cfg.prediction));
    let mut gateway = graph::from_settings(&cfg.evaluation);
    tracing::debug!(
        backend = gateway.backend_name(),
        uri = %cfg.evaluation.db_uri,
        "graph gateway selected"
    );

    let runner = PipelineRunner::new(Arc::new(cfg), provider)
        .with_metrics(gqlbench_metrics::default_metrics());
    runner.run(gateway.as_mut()).await?;
    Ok(exit_codes::OK)
}

fn apply_overrides(cfg: &mut BenchConfig, args: &RunArgs, phases: Phases) {
    match phases {
        Phases::FromConfig => {}
        Phases::PredictOnly => {
            cfg.pipeline.run_prediction = true;
            cfg.pipeline.run_evaluation = false;
        }
        Phases::EvaluateOnly => {
            cfg.pipeline.run_prediction = false;
            cfg.pipeline.run_evaluation = true;
        }
    }
    if let Some(w) = args.workers {
        cfg.prediction.max_workers = w.max(1);
    }
    if let Some(g) = &args.graph {
        cfg.evaluation.graph = g.clone();
    }
    if let Some(dir) = &args.output_dir {
        cfg.evaluation.output_dir = dir.clone();
    }
}
