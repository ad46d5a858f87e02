use gqlbench_core::engine::evaluation::Evaluator;
use gqlbench_core::equivalence::Comparison;
use gqlbench_core::model::{EvalState, LevelField, PredictionRecord, Score, WorkItem};
use gqlbench_core::providers::graph::fake::FakeGraphGateway;
use gqlbench_core::providers::graph::GraphGateway;
use gqlbench_core::value::{Row, Value};
use tempfile::tempdir;

fn record(id: &str, ordinal: u64, gold: &str, pred: Option<&str>) -> PredictionRecord {
    PredictionRecord {
        item: WorkItem {
            instance_id: id.into(),
            ordinal,
            gold_query: gold.into(),
            questions: vec![Some("question".into())],
            raw: Default::default(),
        },
        queries: vec![pred.map(String::from)],
    }
}

fn rows(name: &str) -> Vec<Row> {
    vec![[("n.name", Value::String(name.into()))].into_iter().collect()]
}

fn level() -> LevelField {
    LevelField::new("initial_nl", "initial_query")
}

#[tokio::test]
async fn test_matching_results_score_one() -> anyhow::Result<()> {
    let mut gw = FakeGraphGateway::new()
        .with_rows("MATCH (n:Person) RETURN n.name", rows("Alice"))
        .with_rows("MATCH (p:Person) RETURN p.name AS name", rows("Alice"));
    gw.connect().await;

    let preds = vec![record(
        "movie_1",
        1,
        "MATCH (n:Person) RETURN n.name;",
        Some("```cypher\nMATCH (p:Person) RETURN p.name AS name\n```"),
    )];
    let report = Evaluator::new("movie", Comparison::Set)
        .evaluate_level(&mut gw, &preds, 0, &level())
        .await?;

    let r = &report.records[0];
    assert_eq!(r.score, Score::Match);
    assert_eq!(r.cleaned_gold, "MATCH (n:Person) RETURN n.name");
    assert_eq!(r.cleaned_pred, "MATCH (p:Person) RETURN p.name AS name");
    assert_eq!(report.summary.accuracy, 1.0);
    Ok(())
}

#[tokio::test]
async fn test_missing_prediction_never_reaches_the_gateway() -> anyhow::Result<()> {
    let mut gw = FakeGraphGateway::new().with_rows("RETURN 1", rows("x"));
    let log = gw.log();
    gw.connect().await;

    let preds = vec![record("movie_1", 1, "RETURN 1", None)];
    let report = Evaluator::new("movie", Comparison::Set)
        .evaluate_level(&mut gw, &preds, 0, &level())
        .await?;

    let r = &report.records[0];
    assert_eq!(r.state, EvalState::SkippedNoPrediction);
    assert_eq!(r.score, Score::Miss);
    assert!(log.lock().unwrap().executions.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_gold_failure_persists_empty_predicted_result() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut gw = FakeGraphGateway::new()
        .with_error("MATCH (n:Nope RETURN n", "Invalid input")
        .with_rows("MATCH (n) RETURN n.name", rows("Alice"));
    gw.connect().await;

    let preds = vec![
        record("movie_1", 1, "MATCH (n:Nope RETURN n", Some("MATCH (n) RETURN n.name")),
        record("movie_2", 2, "MATCH (n) RETURN n.name", Some("MATCH (n) RETURN n.name")),
    ];
    let evaluator = Evaluator::new("movie", Comparison::Set).with_output_dir(dir.path().to_path_buf());
    let (summary, reports) = evaluator.evaluate_all(&mut gw, &preds, &[level()]).await?;

    let first = &reports[0].records[0];
    assert_eq!(first.score, Score::GoldFailed);
    assert!(first.pred_result.is_empty());
    assert_eq!(summary.levels[0].gold_failures, 1);
    assert_eq!(summary.levels[0].accuracy, 0.5);
    assert_eq!(summary.levels[0].accuracy_excluding_gold_failures, 1.0);

    let detail: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        dir.path().join("initial_query_results.json"),
    )?)?;
    assert_eq!(detail[0]["score"], -1);
    assert_eq!(detail[0]["pred_result"], serde_json::json!([]));
    assert_eq!(detail[1]["instance_id"], "movie_2");
    assert!(dir.path().join("summary.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_numeric_and_order_differences_are_tolerated() -> anyhow::Result<()> {
    let gold: Vec<Row> = vec![
        [("c", Value::Int(2)), ("avg", Value::Float(0.3))].into_iter().collect(),
        [("c", Value::Int(1)), ("avg", Value::Float(1.0))].into_iter().collect(),
    ];
    let pred: Vec<Row> = vec![
        [("count", Value::Float(1.0)), ("a", Value::Int(1))].into_iter().collect(),
        [("count", Value::Int(2)), ("a", Value::Float(0.1 + 0.2))].into_iter().collect(),
    ];
    let mut gw = FakeGraphGateway::new()
        .with_rows("GOLD", gold)
        .with_rows("PRED", pred);
    gw.connect().await;

    let preds = vec![record("movie_1", 1, "GOLD", Some("PRED"))];
    let report = Evaluator::new("movie", Comparison::Multiset)
        .evaluate_level(&mut gw, &preds, 0, &level())
        .await?;
    assert_eq!(report.records[0].score, Score::Match);
    Ok(())
}
