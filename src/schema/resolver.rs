use serde_json::{Map, Value};

use super::{FieldSpec, SectionSchema};

/// Compute the keys that can still be added to a field map: fixed keys absent
/// from `current`, plus one candidate per pattern group. Output is sorted
/// case-insensitively and is identical for identical inputs.
pub fn next_keys(section: &SectionSchema, current: &Map<String, Value>) -> Vec<String> {
    let mut keys = Vec::new();
    for field in &section.fields {
        match field {
            FieldSpec::Fixed { key, .. } => {
                if !current.contains_key(key) {
                    keys.push(key.clone());
                }
            }
            FieldSpec::Multiplicity { count, start, .. } => {
                if let Some(key) = next_multiplicity_key(field, *count, *start, current) {
                    keys.push(key);
                }
            }
            FieldSpec::Bilingual { base } => {
                let nl = format!("{base}:nl");
                let en = format!("{base}:en");
                match (current.contains_key(&nl), current.contains_key(&en)) {
                    (false, false) => {
                        keys.push(nl);
                        keys.push(en);
                    }
                    (false, true) => keys.push(nl),
                    (true, false) => keys.push(en),
                    (true, true) => {}
                }
            }
        }
    }
    keys.sort_by_key(|key| key.to_lowercase());
    keys
}

/// The lowest unused index for a multiplicity group, or nothing once the
/// group is exhausted.
fn next_multiplicity_key(
    field: &FieldSpec,
    count: usize,
    start: usize,
    current: &Map<String, Value>,
) -> Option<String> {
    let highest = current.keys().filter_map(|key| field.index_of(key)).max();
    match highest {
        None => field.key_at(start),
        Some(highest) if highest + 1 < start + count => field.key_at(highest + 1),
        Some(_) => None,
    }
}
