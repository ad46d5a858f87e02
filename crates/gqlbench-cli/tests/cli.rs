use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn gqlbench() -> Command {
    let mut cmd = Command::cargo_bin("gqlbench").unwrap();
    cmd.env("GQLBENCH_LOG", "warn");
    cmd
}

#[test]
fn test_version_prints_crate_version() {
    gqlbench()
        .arg("version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_writes_loadable_config_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gqlbench.yaml");

    gqlbench()
        .args(["init", "--config"])
        .arg(&path)
        .assert()
        .success();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("level_fields"));

    gqlbench()
        .args(["init", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(contains("already exists"));
}

#[test]
fn test_missing_config_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    gqlbench()
        .args(["run", "--config"])
        .arg(dir.path().join("nope.yaml"))
        .assert()
        .code(2)
        .stderr(contains("config error"));
}

#[test]
fn test_strict_config_rejects_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.yaml");
    fs::write(
        &path,
        "data:\n  input_path: a.json\n  output_path: b.json\nevaluation:\n  dbgpt_root: /opt\n",
    )
    .unwrap();

    gqlbench()
        .args(["evaluate", "--strict-config", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(contains("unknown fields"));
}

#[test]
fn test_evaluate_against_unreachable_database_scores_gold_failures() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bench.yaml");
    fs::write(
        &config,
        r#"
data:
  input_path: data.json
  output_path: predictions.json
prediction:
  level_fields:
    - [initial_nl, initial_query]
evaluation:
  db_uri: http://127.0.0.1:1
  graph: movie
  output_dir: detail
  request_timeout_seconds: 2
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("predictions.json"),
        r#"[
  {"instance_id": "movie_1", "gql_query": "MATCH (n) RETURN n", "initial_nl": "q1",
   "initial_query": "MATCH (n) RETURN n"},
  {"instance_id": "movie_2", "gql_query": "MATCH (n) RETURN n", "initial_nl": "q2",
   "initial_query": null}
]"#,
    )
    .unwrap();

    gqlbench()
        .args(["evaluate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("Results for initial_query"));

    let detail: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("detail/initial_query_results.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(detail[0]["score"], -1);
    assert_eq!(detail[0]["state"], "gold_exec_failed");
    assert_eq!(detail[1]["score"], 0);
    assert_eq!(detail[1]["state"], "skipped_no_prediction");

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("detail/summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["levels"][0]["gold_failures"], 1);
    assert_eq!(summary["levels"][0]["accuracy"], 0.0);
}

#[test]
fn test_fatal_error_is_logged_and_printed() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bench.yaml");
    fs::write(
        &config,
        r#"
data:
  input_path: data.json
  output_path: missing_predictions.json
evaluation:
  db_uri: http://127.0.0.1:1
  request_timeout_seconds: 2
"#,
    )
    .unwrap();

    gqlbench()
        .args(["evaluate", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("ERROR"))
        .stderr(contains("fatal: cannot evaluate without a prediction file"));
}
