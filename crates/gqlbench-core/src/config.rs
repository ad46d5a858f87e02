use crate::engine::generation::RetryPolicy;
use crate::equivalence::Comparison;
use crate::errors::ConfigError;
use crate::model::{default_level_fields, LevelField};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Benchmark configuration. Built once at startup and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_version", alias = "configVersion")]
    pub version: u32,
    pub data: DataSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub prediction: PredictionSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    /// Rendered from `prediction.schema_path` at load time.
    #[serde(skip)]
    pub schema_text: String,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default = "default_gold_field")]
    pub gold_field: String,
}

fn default_gold_field() -> String {
    "gql_query".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    #[serde(default = "yes")]
    pub run_prediction: bool,
    #[serde(default = "yes")]
    pub run_evaluation: bool,
}

fn yes() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            run_prediction: true,
            run_evaluation: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: Option<f32>,
    /// Extra provider-specific fields merged into each request body.
    pub extra_body: Option<serde_json::Value>,
    pub max_workers: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_seconds: u64,
    pub schema_path: Option<PathBuf>,
    pub level_fields: Vec<LevelField>,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            model: "qwen-plus".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: None,
            extra_body: None,
            max_workers: 5,
            max_retries: 3,
            retry_backoff_ms: 1000,
            timeout_seconds: 30,
            schema_path: None,
            level_fields: default_level_fields(),
        }
    }
}

impl PredictionSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }

    /// Literal key from config, else the environment variable it names.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationSettings {
    pub db_uri: String,
    pub db_user: String,
    pub db_pass: Option<String>,
    pub db_pass_env: String,
    /// Target graph (database) name for every execution.
    pub graph: String,
    pub output_dir: PathBuf,
    pub comparison: Comparison,
    pub request_timeout_seconds: u64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            db_uri: "bolt://localhost:7687".into(),
            db_user: "admin".into(),
            db_pass: None,
            db_pass_env: "GQLBENCH_DB_PASS".into(),
            graph: "default".into(),
            output_dir: PathBuf::from("evaluation_detail/execution_results"),
            comparison: Comparison::Set,
            request_timeout_seconds: 60,
        }
    }
}

impl EvaluationSettings {
    pub fn resolve_password(&self) -> String {
        self.db_pass
            .clone()
            .or_else(|| std::env::var(&self.db_pass_env).ok())
            .unwrap_or_default()
    }
}

/// Loads a YAML (or JSON) config. Unknown keys are warned about, or rejected
/// when `strict` is set.
pub fn load_config(path: &Path, strict: bool) -> Result<BenchConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let mut cfg: BenchConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored_keys.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;

    if !ignored_keys.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "unknown fields in strict mode: {:?} (file: {})",
                ignored_keys,
                path.display()
            )));
        }
        tracing::warn!(keys = ?ignored_keys, "ignored unknown config fields");
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    validate(&cfg)?;
    normalize_paths(&mut cfg, path);

    if let Some(schema_path) = &cfg.prediction.schema_path {
        cfg.schema_text = load_schema_text(schema_path)?;
    }

    Ok(cfg)
}

fn validate(cfg: &BenchConfig) -> Result<(), ConfigError> {
    let p = &cfg.prediction;
    if p.level_fields.is_empty() {
        return Err(ConfigError("prediction.level_fields is empty".into()));
    }
    if p.max_workers == 0 {
        return Err(ConfigError("prediction.max_workers must be at least 1".into()));
    }
    if p.max_retries == 0 {
        return Err(ConfigError("prediction.max_retries must be at least 1".into()));
    }
    let mut seen = std::collections::HashSet::new();
    for level in &p.level_fields {
        if !seen.insert(level.query_field.as_str()) {
            return Err(ConfigError(format!(
                "duplicate level query field '{}'",
                level.query_field
            )));
        }
    }
    Ok(())
}

fn normalize_paths(cfg: &mut BenchConfig, config_path: &Path) {
    let r = path_resolver::PathResolver::new(config_path);
    r.resolve(&mut cfg.data.input_path);
    r.resolve(&mut cfg.data.output_path);
    r.resolve(&mut cfg.evaluation.output_dir);
    r.resolve_opt(&mut cfg.prediction.schema_path);
}

fn load_schema_text(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read schema {}: {}", path.display(), e)))?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse schema {}: {}", path.display(), e)))?;
    crate::prompt::schema_to_text(&json)
        .map_err(|e| ConfigError(format!("invalid schema {}: {}", path.display(), e)))
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
data:
  input_path: data/movie_5levels.json
  output_path: output/predictions.json
  gold_field: gql_query
pipeline:
  run_prediction: true
  run_evaluation: true
prediction:
  model: qwen-plus
  base_url: https://dashscope.aliyuncs.com/compatible-mode/v1
  api_key_env: OPENAI_API_KEY
  extra_body:
    enable_thinking: false
  max_workers: 5
  max_retries: 3
  retry_backoff_ms: 1000
  timeout_seconds: 30
  # schema_path: data/movie_schema.json
  level_fields:
    - [initial_nl, initial_query]
    - [level_1, level_1_query]
    - [level_2, level_2_query]
    - [level_3, level_3_query]
    - [level_4, level_4_query]
evaluation:
  # bolt:// or neo4j:// speaks Bolt; http(s):// uses the HTTP query API
  db_uri: bolt://localhost:7687
  db_user: admin
  db_pass_env: GQLBENCH_DB_PASS
  graph: movie
  output_dir: evaluation_detail/execution_results
  comparison: set
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
