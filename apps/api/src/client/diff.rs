use serde_json::{Map, Value};

/// Top-level fields of `edited` that differ from `original`, including
/// fields `original` lacks. Unchanged fields are left out.
pub fn changed_fields(original: &Value, edited: &Value) -> Map<String, Value> {
    let Some(edited) = edited.as_object() else {
        return Map::new();
    };
    let original = original.as_object();

    edited
        .iter()
        .filter(|(key, value)| original.and_then(|o| o.get(*key)) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
