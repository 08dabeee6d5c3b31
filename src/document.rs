use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Origin tag attached to every produced document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    JiraServiceManagement,
}

/// A linkable chunk of document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub link: String,
    pub text: String,
}

/// Normalized document handed to the indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub sections: Vec<Section>,
    pub source: DocumentSource,
    pub semantic_identifier: String,
    pub metadata: BTreeMap<String, String>,
}

/// Flatten a rich-text field to plain text.
///
/// Jira v3 returns descriptions in Atlassian Document Format (ADF); older
/// or service-desk endpoints may return a plain string. `null` yields an
/// empty string.
pub fn rich_text_to_plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("doc") => {
            let mut result = String::new();
            if let Some(Value::Array(nodes)) = obj.get("content") {
                for node in nodes {
                    extract_adf_text(node, &mut result);
                }
            }
            result.trim().to_string()
        }
        other => other.to_string(),
    }
}

fn extract_adf_text(node: &Value, result: &mut String) {
    let node_type = node.get("type").and_then(Value::as_str);

    match node_type {
        Some("text") => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                result.push_str(text);
            }
        }
        Some("hardBreak") => result.push('\n'),
        Some("listItem") => {
            result.push_str("• ");
            extract_children(node, result);
        }
        Some("paragraph") | Some("heading") | Some("codeBlock") | Some("blockquote") => {
            extract_children(node, result);
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
        }
        Some("mention") => {
            if let Some(text) = node
                .get("attrs")
                .and_then(|a| a.get("text"))
                .and_then(Value::as_str)
            {
                result.push_str(text);
            }
        }
        _ => extract_children(node, result),
    }
}

fn extract_children(node: &Value, result: &mut String) {
    if let Some(Value::Array(items)) = node.get("content") {
        for item in items {
            extract_adf_text(item, result);
        }
    }
}
