use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{Document, MutationPathError, is_blank};
use crate::schema::SchemaConfig;

/// Per-field validation flags for one section: `true` means the field is
/// missing or blank while the schema requires it.
pub type FieldErrors = IndexMap<String, bool>;

/// Check `data`'s direct keys against the connection section's required set.
/// Pure: the document is not touched.
pub fn validate_connection(doc: &Document, schema: &SchemaConfig) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let empty = Map::new();
    let data = doc.data.as_object().unwrap_or(&empty);
    for (key, value) in data {
        if schema.connection.required.contains(key) && is_blank(value) {
            errors.insert(key.clone(), true);
        }
    }
    for required in &schema.connection.required {
        if !data.contains_key(required) {
            errors.insert(required.clone(), true);
        }
    }
    errors
}

/// Check `data.metaDataFields` against the metadata section's required set.
///
/// Deliberate side effect: every required key missing from the document is
/// back-filled into the returned document as an empty string, so the edit
/// surface always has an editable slot for it. Callers that need pure
/// validation must not rely on the returned document.
pub fn validate_metadata_and_backfill(
    doc: &Document,
    schema: &SchemaConfig,
) -> Result<(Document, FieldErrors), MutationPathError> {
    let mut errors = FieldErrors::new();
    let empty = Map::new();
    let fields = doc.metadata_fields().unwrap_or(&empty);
    for (key, value) in fields {
        if schema.metadata.required.contains(key) && is_blank(value) {
            errors.insert(key.clone(), true);
        }
    }

    let missing: Vec<&String> = schema
        .metadata
        .required
        .iter()
        .filter(|required| !fields.contains_key(*required))
        .collect();
    if missing.is_empty() {
        return Ok((doc.clone(), errors));
    }

    let paths: Vec<String> = missing
        .iter()
        .map(|required| format!("data.metaDataFields.{required}"))
        .collect();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let values = vec![Some(Value::String(String::new())); paths.len()];
    let next = doc.with_changes(&path_refs, values)?;
    for required in missing {
        errors.insert(required.clone(), true);
        debug!(field = %required, "back-filled missing required metadata field");
    }
    Ok((next, errors))
}
