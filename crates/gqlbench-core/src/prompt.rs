//! Fixed instruction context for query generation, and cleanup of generated
//! query text.

use crate::model::ChatMessage;
use regex::Regex;
use std::sync::OnceLock;

const INSTRUCTIONS: &str = "You are an expert in graph query languages.\n\
The database schema is as follows:\n\
{schema}\n\n\
Your task: Given a natural language question, output ONLY one query:\n\
Cypher (for Neo4j)\n\n\
Requirements:\n\
- Use the schema exactly (labels, properties, edge types).\n\
- Maintain the exact relationship types and directions.\n\
- Preserve all temporal constraints.\n\
- Use DISTINCT when necessary.\n\
- For path length, use length(p)-1 if matching multi-hop paths.\n\
- Do not merge different edge types unless explicitly required.\n\
- Output must be plain query only, no comments, no explanation.\n";

pub fn build_messages(schema_text: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(INSTRUCTIONS.replace("{schema}", schema_text)),
        ChatMessage::user(question.trim()),
    ]
}

/// Renders a `{"schema": [...]}` graph schema description as prompt text.
pub fn schema_to_text(schema: &serde_json::Value) -> anyhow::Result<String> {
    let items = schema
        .get("schema")
        .and_then(|s| s.as_array())
        .ok_or_else(|| anyhow::anyhow!("missing 'schema' array"))?;

    let mut vertices = Vec::new();
    let mut edges = Vec::new();

    for item in items {
        let label = item
            .get("label")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("schema entry without label"))?;
        let kind = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let props = item
            .get("properties")
            .and_then(|v| v.as_array())
            .map(|ps| ps.iter().map(render_property).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();

        match kind {
            "VERTEX" => match item.get("primary").and_then(|v| v.as_str()) {
                Some(primary) => {
                    vertices.push(format!("- {} [primary: {}] ({})", label, primary, props))
                }
                None => vertices.push(format!("- {}({})", label, props)),
            },
            "EDGE" => match item.get("temporal").and_then(|v| v.as_str()) {
                Some(temporal) => {
                    edges.push(format!("- {} [temporal: {}] ({})", label, temporal, props))
                }
                None => edges.push(format!("- {}({})", label, props)),
            },
            other => tracing::debug!(label, kind = other, "skipping schema entry"),
        }
    }

    let mut lines = Vec::new();
    if !vertices.is_empty() {
        lines.push("Vertex types:".to_string());
        lines.extend(vertices);
    }
    if !edges.is_empty() {
        lines.push("\nEdge types:".to_string());
        lines.extend(edges);
    }
    Ok(lines.join("\n"))
}

fn render_property(p: &serde_json::Value) -> String {
    let name = p.get("name").and_then(|v| v.as_str()).unwrap_or("?");
    let ty = p.get("type").and_then(|v| v.as_str()).unwrap_or("?");
    let optional = p.get("optional").and_then(|v| v.as_bool()).unwrap_or(false);
    if optional {
        format!("{}: {} (optional)", name, ty)
    } else {
        format!("{}: {}", name, ty)
    }
}

/// A language tag is only recognised when a newline follows it, so an
/// untagged one-line fence keeps its first keyword.
fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^```(?:[A-Za-z0-9_+-]+[ \t]*\n|\n?)(.*?)\n?[ \t]*```$").ok()
    })
    .as_ref()
}

/// Strips a surrounding markdown code fence, surrounding whitespace and a
/// trailing semicolon. Missing input cleans to the empty string.
pub fn clean_query(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let mut q = raw.trim();
    if let Some(caps) = fence_re().and_then(|re| re.captures(q)) {
        if let Some(body) = caps.get(1) {
            q = body.as_str().trim();
        }
    }
    q.trim_end_matches(';').trim_end().to_string()
}
