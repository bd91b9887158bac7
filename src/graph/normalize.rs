//! Convert raw Graph entities into uniform search results.

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{EntityType, SearchResult};

/// Map raw records to [`SearchResult`]s, preserving order.
///
/// Records without an `id` are logged and skipped; missing optional fields become empty strings.
pub fn normalize(entity_type: EntityType, records: Vec<Value>) -> Vec<SearchResult> {
    let total = records.len();
    let results: Vec<SearchResult> = records
        .iter()
        .filter_map(|record| normalize_record(entity_type, record))
        .collect();

    if results.len() < total {
        warn!(
            "Dropped {} of {} {} records without an object ID",
            total - results.len(),
            total,
            entity_type
        );
    }

    results
}

fn normalize_record(entity_type: EntityType, record: &Value) -> Option<SearchResult> {
    let object_id = match text(record, "id") {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            warn!(
                "Skipping {} record without object ID: {}",
                entity_type,
                preview(record)
            );
            return None;
        }
    };

    if Uuid::parse_str(&object_id).is_err() {
        debug!("Object ID {} is not a GUID", object_id);
    }

    let principal_or_mail = match entity_type {
        EntityType::User => text(record, "mail")
            .filter(|m| !m.is_empty())
            .or_else(|| text(record, "userPrincipalName"))
            .unwrap_or_default(),
        EntityType::Group => text(record, "mail").unwrap_or_default(),
        EntityType::Application => "",
    }
    .to_string();

    let display_name = match text(record, "displayName") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => principal_or_mail.clone(),
    };

    Some(SearchResult {
        object_id,
        display_name,
        principal_or_mail,
        entity_type,
    })
}

/// String field, treating JSON `null` the same as absent.
fn text<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn preview(record: &Value) -> String {
    let mut text = record.to_string();
    if text.len() > 200 {
        let mut end = 200;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}
