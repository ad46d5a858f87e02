use crate::value::Row;
use serde::{Deserialize, Serialize, Serializer};

/// One difficulty level: the question field it reads and the query field it
/// writes. Configured as a `[question_field, query_field]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct LevelField {
    pub nl_field: String,
    pub query_field: String,
}

impl LevelField {
    pub fn new(nl_field: &str, query_field: &str) -> Self {
        Self {
            nl_field: nl_field.to_string(),
            query_field: query_field.to_string(),
        }
    }
}

impl From<(String, String)> for LevelField {
    fn from((nl_field, query_field): (String, String)) -> Self {
        Self {
            nl_field,
            query_field,
        }
    }
}

impl From<LevelField> for (String, String) {
    fn from(l: LevelField) -> Self {
        (l.nl_field, l.query_field)
    }
}

pub fn default_level_fields() -> Vec<LevelField> {
    vec![
        LevelField::new("initial_nl", "initial_query"),
        LevelField::new("level_1", "level_1_query"),
        LevelField::new("level_2", "level_2_query"),
        LevelField::new("level_3", "level_3_query"),
        LevelField::new("level_4", "level_4_query"),
    ]
}

/// A dataset entry. `questions` is indexed by level.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub instance_id: String,
    pub ordinal: u64,
    pub gold_query: String,
    pub questions: Vec<Option<String>>,
    /// The source object, written back (augmented) into the prediction file.
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl WorkItem {
    pub fn question(&self, level: usize) -> Option<&str> {
        self.questions
            .get(level)
            .and_then(|q| q.as_deref())
            .filter(|q| !q.trim().is_empty())
    }
}

/// Generated queries for one item, indexed by level. `None` means generation
/// failed or the level had no question.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub item: WorkItem,
    pub queries: Vec<Option<String>>,
}

impl PredictionRecord {
    pub fn empty(item: WorkItem) -> Self {
        let queries = vec![None; item.questions.len()];
        Self { item, queries }
    }

    pub fn query(&self, level: usize) -> Option<&str> {
        self.queries.get(level).and_then(|q| q.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Terminal state of one (item, level) evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvalState {
    SkippedNoPrediction,
    GoldExecFailed,
    PredExecFailed,
    Compared,
}

/// Ternary execution score, persisted as -1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    GoldFailed,
    Miss,
    Match,
}

impl Score {
    pub fn as_i8(self) -> i8 {
        match self {
            Score::GoldFailed => -1,
            Score::Miss => 0,
            Score::Match => 1,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.as_i8())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub instance_id: String,
    pub gold_query: String,
    pub pred_query: Option<String>,
    pub cleaned_gold: String,
    pub cleaned_pred: String,
    pub state: EvalState,
    pub score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub gold_result: Vec<Row>,
    pub pred_result: Vec<Row>,
}
