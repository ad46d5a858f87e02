use crate::engine::evaluation::RunSummary;
use crate::model::EvaluationRecord;
use anyhow::Context;
use std::path::{Path, PathBuf};

pub fn level_detail_path(dir: &Path, query_field: &str) -> PathBuf {
    dir.join(format!("{}_results.json", query_field))
}

pub fn write_level_detail(
    dir: &Path,
    query_field: &str,
    records: &[EvaluationRecord],
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = level_detail_path(dir, query_field);
    let text = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "detailed results saved");
    Ok(path)
}

pub fn write_summary(dir: &Path, summary: &RunSummary) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("summary.json");
    std::fs::write(&path, serde_json::to_string_pretty(summary)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
