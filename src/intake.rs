//! Lenient intake of descriptor and field lists.
//!
//! Both lists arrive as loosely-typed JSON (from an oracle or a caller).
//! Each entry is parsed on its own; an entry that is malformed or misses a
//! required value is dropped and counted, never fatal.

use crate::{FieldType, FieldValue, PlaceholderDescriptor};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    key: Option<String>,
    label: Option<String>,
    #[serde(rename = "type")]
    field_type: Option<Value>,
    original_pattern: Option<String>,
    #[serde(alias = "numberOfOccurrences")]
    occurrence_count: Option<Value>,
    question: Option<String>,
}

impl RawDescriptor {
    fn validate(self) -> Option<PlaceholderDescriptor> {
        let key = self.key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())?;
        let original_pattern = self.original_pattern.filter(|p| !p.is_empty())?;
        let occurrence_count = self.occurrence_count.as_ref().and_then(count_of)?;
        let label = self.label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).unwrap_or_else(|| key.clone());

        Some(PlaceholderDescriptor {
            key,
            label,
            field_type: type_of(self.field_type.as_ref()),
            original_pattern,
            occurrence_count,
            question: self.question.filter(|q| !q.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    key: Option<String>,
    label: Option<String>,
    #[serde(rename = "type")]
    field_type: Option<Value>,
    value: Option<Value>,
    suggestion: Option<Value>,
}

impl RawField {
    fn validate(self) -> Option<FieldValue> {
        let key = self.key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())?;
        let value = [self.value.as_ref(), self.suggestion.as_ref()]
            .into_iter()
            .flatten()
            .map(value_text)
            .find(|v| !v.is_empty())?;
        let label = self.label.filter(|l| !l.trim().is_empty()).unwrap_or_else(|| key.clone());

        Some(FieldValue { key, label, field_type: type_of(self.field_type.as_ref()), value })
    }
}

/// Validated descriptors from `[...]` or `{"placeholders": [...]}`.
pub fn descriptors_from_value(value: &Value) -> Vec<PlaceholderDescriptor> {
    let entries = entries(value, "placeholders");
    let total = entries.len();
    let accepted: Vec<PlaceholderDescriptor> = entries
        .iter()
        .filter_map(|entry| match RawDescriptor::deserialize(*entry) {
            Ok(raw) => raw.validate(),
            Err(err) => {
                debug!(error = %err, "descriptor entry is not an object of the expected shape");
                None
            }
        })
        .collect();

    if accepted.len() < total {
        warn!(dropped = total - accepted.len(), kept = accepted.len(), "dropped malformed descriptors");
    }
    accepted
}

/// Validated field values from `[...]` or `{"fields": [...]}`.
///
/// `value` falls back to `suggestion`. Entries with an empty key or no
/// value are dropped.
pub fn fields_from_value(value: &Value) -> Vec<FieldValue> {
    let entries = entries(value, "fields");
    let total = entries.len();
    let accepted: Vec<FieldValue> = entries
        .iter()
        .filter_map(|entry| RawField::deserialize(*entry).ok().and_then(RawField::validate))
        .collect();

    if accepted.len() < total {
        debug!(dropped = total - accepted.len(), kept = accepted.len(), "dropped fields without key or value");
    }
    accepted
}

fn entries<'a>(value: &'a Value, wrapper: &str) -> Vec<&'a Value> {
    let list = match value {
        Value::Object(map) => map.get(wrapper).and_then(Value::as_array),
        other => other.as_array(),
    };
    list.map(|items| items.iter().collect()).unwrap_or_default()
}

/// A count given as a non-negative integer, integral float, or numeric string.
fn count_of(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize).or_else(|| {
            n.as_f64().filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0).map(|f| f as usize)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn type_of(value: Option<&Value>) -> FieldType {
    value.and_then(Value::as_str).map(FieldType::parse_lenient).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_descriptors_are_dropped() {
        let value = json!({
            "placeholders": [
                { "key": "company", "label": "Company", "type": "text", "originalPattern": "[Company]", "numberOfOccurrences": "3" },
                { "key": "", "originalPattern": "[X]", "occurrenceCount": 1 },
                { "key": "amount", "originalPattern": "", "occurrenceCount": 1 },
                { "key": "cap", "originalPattern": "$[____]", "occurrenceCount": "many" },
                { "key": "date", "type": "date", "originalPattern": "[Date]", "occurrenceCount": 2.0 },
                "not an object",
            ]
        });
        let found = descriptors_from_value(&value);
        let keys: Vec<&str> = found.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["company", "date"]);
        assert_eq!(found[0].occurrence_count, 3);
        assert_eq!(found[1].field_type, FieldType::Date);
        assert_eq!(found[1].label, "date");
    }

    #[test]
    fn bare_arrays_are_accepted() {
        let value = json!([{ "key": "k", "originalPattern": "[K]", "occurrenceCount": 1, "type": "weird" }]);
        let found = descriptors_from_value(&value);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field_type, FieldType::Text);
    }

    #[test]
    fn field_value_falls_back_to_suggestion() {
        let value = json!({
            "fields": [
                { "key": "name", "value": "", "suggestion": "Ann" },
                { "key": "amount", "type": "currency", "value": 5000 },
                { "key": "empty", "value": null },
                { "key": "", "value": "orphan" },
            ]
        });
        let fields = fields_from_value(&value);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].value, "Ann");
        assert_eq!(fields[1].value, "5000");
        assert_eq!(fields[1].field_type, FieldType::Currency);
    }

    #[test]
    fn wrong_shapes_yield_nothing() {
        assert!(descriptors_from_value(&json!("text")).is_empty());
        assert!(fields_from_value(&json!({ "other": [] })).is_empty());
    }
}
