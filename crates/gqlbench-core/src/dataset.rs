//! Dataset and prediction file I/O.
//!
//! Items are validated at load time: a string `instance_id` (or `id`) ending
//! in a number, unique within the file, and a gold query string.

use crate::model::{LevelField, PredictionRecord, WorkItem};
use anyhow::Context;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// Numeric ordinal embedded at the end of an instance identifier
/// (`movie_12` -> 12).
pub fn instance_ordinal(id: &str) -> Option<u64> {
    let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    id[id.len() - digits..].parse().ok()
}

fn string_field(obj: &Map<String, Value>, key: &str) -> anyhow::Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => anyhow::bail!("field '{}' must be a string or null, got {}", key, other),
    }
}

pub fn parse_item(
    value: Value,
    levels: &[LevelField],
    gold_field: &str,
) -> anyhow::Result<WorkItem> {
    let Value::Object(raw) = value else {
        anyhow::bail!("dataset entry is not an object");
    };

    let instance_id = match raw.get("instance_id").or_else(|| raw.get("id")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => anyhow::bail!("dataset entry without instance_id"),
    };
    let ordinal = instance_ordinal(&instance_id).ok_or_else(|| {
        anyhow::anyhow!("instance_id '{}' does not end in a number", instance_id)
    })?;
    let gold_query = string_field(&raw, gold_field)
        .with_context(|| format!("instance {}", instance_id))?
        .ok_or_else(|| anyhow::anyhow!("instance {} has no '{}'", instance_id, gold_field))?;

    let mut questions = Vec::with_capacity(levels.len());
    for level in levels {
        questions.push(
            string_field(&raw, &level.nl_field)
                .with_context(|| format!("instance {}", instance_id))?,
        );
    }

    Ok(WorkItem {
        instance_id,
        ordinal,
        gold_query,
        questions,
        raw,
    })
}

fn read_array(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    match json {
        Value::Array(items) => Ok(items),
        _ => anyhow::bail!("{} must contain a JSON array", path.display()),
    }
}

fn ensure_unique(items: &[WorkItem]) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.instance_id.as_str()) {
            anyhow::bail!("duplicate instance_id '{}'", item.instance_id);
        }
    }
    Ok(())
}

pub fn load_dataset(
    path: &Path,
    levels: &[LevelField],
    gold_field: &str,
) -> anyhow::Result<Vec<WorkItem>> {
    let items = read_array(path)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            parse_item(v, levels, gold_field)
                .with_context(|| format!("{} entry #{}", path.display(), i))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    ensure_unique(&items)?;
    tracing::info!(path = %path.display(), items = items.len(), "loaded dataset");
    Ok(items)
}

/// Loads a prediction file written by [`write_predictions`] (or any dataset
/// already carrying the level query fields).
pub fn load_predictions(
    path: &Path,
    levels: &[LevelField],
    gold_field: &str,
) -> anyhow::Result<Vec<PredictionRecord>> {
    let mut records = Vec::new();
    for (i, v) in read_array(path)?.into_iter().enumerate() {
        let item = parse_item(v, levels, gold_field)
            .with_context(|| format!("{} entry #{}", path.display(), i))?;
        let queries = levels
            .iter()
            .map(|l| string_field(&item.raw, &l.query_field))
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("instance {}", item.instance_id))?;
        records.push(PredictionRecord { item, queries });
    }
    let items: Vec<WorkItem> = records.iter().map(|r| r.item.clone()).collect();
    ensure_unique(&items)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded predictions");
    Ok(records)
}

pub fn prediction_to_json(record: &PredictionRecord, levels: &[LevelField]) -> Value {
    let mut obj = record.item.raw.clone();
    for (i, level) in levels.iter().enumerate() {
        let q = record.query(i).map(|s| Value::String(s.to_string()));
        obj.insert(level.query_field.clone(), q.unwrap_or(Value::Null));
    }
    Value::Object(obj)
}

pub fn write_predictions(
    path: &Path,
    records: &[PredictionRecord],
    levels: &[LevelField],
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let out: Vec<Value> = records.iter().map(|r| prediction_to_json(r, levels)).collect();
    let text = serde_json::to_string_pretty(&out)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), "predictions saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn levels() -> Vec<LevelField> {
        vec![
            LevelField::new("initial_nl", "initial_query"),
            LevelField::new("level_1", "level_1_query"),
        ]
    }

    #[test]
    fn test_instance_ordinal() {
        assert_eq!(instance_ordinal("movie_12"), Some(12));
        assert_eq!(instance_ordinal("q007"), Some(7));
        assert_eq!(instance_ordinal("42"), Some(42));
        assert_eq!(instance_ordinal("movie_"), None);
        assert_eq!(instance_ordinal(""), None);
    }

    #[test]
    fn test_parse_item_reads_level_questions() {
        let item = parse_item(
            json!({"instance_id": "movie_3", "gql_query": "RETURN 1",
                   "initial_nl": "q0", "level_1": null, "extra": 5}),
            &levels(),
            "gql_query",
        )
        .unwrap();
        assert_eq!(item.ordinal, 3);
        assert_eq!(item.questions, vec![Some("q0".to_string()), None]);
        assert_eq!(item.raw["extra"], json!(5));
    }

    #[test]
    fn test_parse_item_rejects_bad_entries() {
        let l = levels();
        assert!(parse_item(json!({"gql_query": "RETURN 1"}), &l, "gql_query").is_err());
        assert!(parse_item(json!({"instance_id": "abc", "gql_query": "RETURN 1"}), &l, "gql_query").is_err());
        assert!(parse_item(json!({"instance_id": "a_1"}), &l, "gql_query").is_err());
        assert!(parse_item(
            json!({"instance_id": "a_1", "gql_query": "RETURN 1", "level_1": 3}),
            &l,
            "gql_query"
        )
        .is_err());
    }

    #[test]
    fn test_duplicate_ids_fail_dataset_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            json!([
                {"instance_id": "m_1", "gql_query": "RETURN 1"},
                {"instance_id": "m_1", "gql_query": "RETURN 2"}
            ])
            .to_string(),
        )
        .unwrap();
        let err = load_dataset(&path, &levels(), "gql_query").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_predictions_file_round_trip_keeps_source_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/pred.json");
        let item = parse_item(
            json!({"instance_id": "m_2", "gql_query": "RETURN 2", "initial_nl": "q", "note": "x"}),
            &levels(),
            "gql_query",
        )
        .unwrap();
        let rec = PredictionRecord {
            item,
            queries: vec![Some("MATCH (n) RETURN n".into()), None],
        };
        write_predictions(&path, &[rec.clone()], &levels()).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["note"], json!("x"));
        assert_eq!(written[0]["level_1_query"], Value::Null);

        let loaded = load_predictions(&path, &levels(), "gql_query").unwrap();
        assert_eq!(loaded[0].queries, rec.queries);
        assert_eq!(loaded[0].item.instance_id, "m_2");
    }
}
