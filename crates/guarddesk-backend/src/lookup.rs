//! Resolve human-entered names to record ids.

use serde::Deserialize;
use serde_json::Value;

use guarddesk_core::error::BridgeError;
use guarddesk_core::types::{ActionType, ProposedAction};

/// Minimal view of a directory record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRecord {
    pub id: String,
    pub name: String,
}

/// Find a record by name: exact case-insensitive match first, then the first
/// record whose name contains the query.
pub fn find_by_name<'a>(records: &'a [NamedRecord], query: &str) -> Option<&'a NamedRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    records
        .iter()
        .find(|r| r.name.trim().to_lowercase() == query)
        .or_else(|| {
            records
                .iter()
                .find(|r| r.name.to_lowercase().contains(&query))
        })
}

/// Whether executing `action` needs its `name` resolved to an `id` first.
pub fn needs_resolution(action: &ProposedAction) -> bool {
    action.action_type != ActionType::Create
        && action.data.get("id").is_none()
        && action.data.get("name").and_then(Value::as_str).is_some()
}

/// Fill in `data.id` from `data.name` using `records`.
pub fn resolve_action(
    action: &ProposedAction,
    records: &[NamedRecord],
) -> Result<ProposedAction, BridgeError> {
    let mut resolved = action.clone();
    let Some(name) = action.data.get("name").and_then(Value::as_str) else {
        return Ok(resolved);
    };
    let record = find_by_name(records, name).ok_or_else(|| {
        BridgeError::Rejected(format!("No {} found matching '{name}'", action.entity))
    })?;
    if let Some(data) = resolved.data.as_object_mut() {
        data.insert("id".into(), Value::String(record.id.clone()));
    }
    Ok(resolved)
}
