use gqlbench_core::config::load_config;
use gqlbench_core::engine::pipeline::PipelineRunner;
use gqlbench_core::providers::graph::fake::FakeGraphGateway;
use gqlbench_core::providers::llm::fake::FakeLlmProvider;
use gqlbench_core::value::{Row, Value};
use std::sync::Arc;
use tempfile::tempdir;

fn write_config(dir: &std::path::Path, run_prediction: bool) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("bench.yaml");
    std::fs::write(
        &path,
        format!(
            r#"
data:
  input_path: data.json
  output_path: out/predictions.json
pipeline:
  run_prediction: {}
prediction:
  max_workers: 2
  retry_backoff_ms: 1
  level_fields:
    - [initial_nl, initial_query]
    - [level_1, level_1_query]
evaluation:
  graph: movie
  output_dir: detail
"#,
            run_prediction
        ),
    )?;
    std::fs::write(
        dir.join("data.json"),
        serde_json::json!([
            {"instance_id": "movie_2", "gql_query": "MATCH (n) RETURN n.name",
             "initial_nl": "names", "level_1": "all names"},
            {"instance_id": "movie_1", "gql_query": "MATCH (n) RETURN count(n)",
             "initial_nl": "count", "level_1": null}
        ])
        .to_string(),
    )?;
    Ok(path)
}

fn one_row(col: &str, v: Value) -> Vec<Row> {
    vec![[(col, v)].into_iter().collect()]
}

#[tokio::test]
async fn test_full_run_closes_gateway_once() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let cfg = load_config(&write_config(dir.path(), true)?, false)?;

    let llm = FakeLlmProvider::new()
        .answer("names", "```\nMATCH (p) RETURN p.name\n```")
        .answer("all names", "MATCH (x) RETURN x.title")
        .answer("count", "MATCH (n) RETURN count(*)");
    let mut gw = FakeGraphGateway::new()
        .with_rows("MATCH (n) RETURN n.name", one_row("n.name", Value::String("Ann".into())))
        .with_rows("MATCH (p) RETURN p.name", one_row("p.name", Value::String("Ann".into())))
        .with_rows("MATCH (x) RETURN x.title", one_row("x.title", Value::String("Heat".into())))
        .with_rows("MATCH (n) RETURN count(n)", one_row("count(n)", Value::Int(2)))
        .with_rows("MATCH (n) RETURN count(*)", one_row("count(*)", Value::Int(2)));
    let log = gw.log();

    let runner = PipelineRunner::new(Arc::new(cfg), Arc::new(llm));
    let summary = runner.run(&mut gw).await?.expect("evaluation enabled");

    assert_eq!(summary.levels.len(), 2);
    assert_eq!(summary.levels[0].correct, 2);
    assert_eq!(summary.levels[1].correct, 0);
    assert_eq!(summary.levels[1].skipped, 1);

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        dir.path().join("out/predictions.json"),
    )?)?;
    assert_eq!(written[0]["instance_id"], "movie_1");
    assert_eq!(written[0]["level_1_query"], serde_json::Value::Null);
    assert!(dir.path().join("detail/level_1_query_results.json").exists());

    let log = log.lock().unwrap();
    assert_eq!(log.connects, 1);
    assert_eq!(log.closes, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_prediction_file_still_closes_gateway() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let cfg = load_config(&write_config(dir.path(), false)?, false)?;
    let mut gw = FakeGraphGateway::new();
    let log = gw.log();

    let runner = PipelineRunner::new(Arc::new(cfg), Arc::new(FakeLlmProvider::new()));
    let err = runner.run(&mut gw).await.unwrap_err();
    assert!(format!("{:#}", err).contains("prediction file"));

    assert_eq!(log.lock().unwrap().closes, 1);
    Ok(())
}
