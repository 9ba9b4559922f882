use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A path mutation tried to tunnel through a value that is neither an object
/// nor blank. Overwriting it silently would corrupt the document, so the
/// whole mutation is refused and the input snapshot stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot mutate `{path}`: segment `{segment}` is not an object")]
pub struct MutationPathError {
    pub path: String,
    pub segment: String,
}

/// A metadata record as held by the registry: identity and revision
/// bookkeeping plus the free-form `data` bag that the editor mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Value>,
    pub data: Value,
}

/// An allow-list membership record. `name` is the peer's entity identifier
/// and is the only part that counts for equality between memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl EntityRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: None,
        }
    }

    /// Membership identity: the identifier alone decides whether two
    /// references denote the same peer.
    pub fn same_entity(&self, other: &EntityRef) -> bool {
        self.name == other.name
    }
}

impl Document {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            id: None,
            doc_type: doc_type.into(),
            revision: None,
            data: Value::Object(Map::new()),
        }
    }

    pub fn revision_number(&self) -> Option<i64> {
        self.revision.as_ref()?.get("number")?.as_i64()
    }

    /// The `metaDataFields` map inside `data`, if present.
    pub fn metadata_fields(&self) -> Option<&Map<String, Value>> {
        self.data.get("metaDataFields")?.as_object()
    }

    /// Read a dotted path inside `data` (the path does not include the
    /// leading `data.`).
    pub fn data_at(&self, path: &str) -> Option<&Value> {
        value_at(&self.data, path)
    }

    /// Human-facing name: English name, Dutch name, then the entity id.
    pub fn display_name(&self) -> Option<&str> {
        let fields = self.metadata_fields();
        fields
            .and_then(|f| f.get("name:en"))
            .or_else(|| fields.and_then(|f| f.get("name:nl")))
            .or_else(|| self.data.get("entityid"))
            .and_then(Value::as_str)
    }

    /// Apply a single dotted-path set or delete and return the new snapshot.
    /// Paths must target the `data` subtree; `None` deletes the leaf.
    pub fn with_change(&self, path: &str, value: Option<Value>) -> Result<Self, MutationPathError> {
        self.with_changes(&[path], vec![value])
    }

    /// Batched form of [`with_change`](Self::with_change): parallel paths and
    /// values applied in index order against one snapshot. Fails without
    /// partial application if any path is invalid.
    pub fn with_changes(
        &self,
        paths: &[&str],
        values: Vec<Option<Value>>,
    ) -> Result<Self, MutationPathError> {
        let mut data = self.data.clone();
        for (path, value) in paths.iter().zip(values) {
            let rest = path
                .strip_prefix("data.")
                .ok_or_else(|| MutationPathError {
                    path: (*path).to_string(),
                    segment: path.split('.').next().unwrap_or(path).to_string(),
                })?;
            apply_path(&mut data, rest, value).map_err(|err| MutationPathError {
                path: (*path).to_string(),
                segment: err.segment,
            })?;
        }
        Ok(Self {
            id: self.id.clone(),
            doc_type: self.doc_type.clone(),
            revision: self.revision.clone(),
            data,
        })
    }
}

/// Blank in the editor's sense: absent values, empty containers, and
/// whitespace-only strings all count.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Apply a dotted-path set (`Some`) or delete (`None`) to an object tree,
/// returning a new tree. Intermediate segments that are absent or blank are
/// created as empty objects; a non-object, non-blank intermediate aborts the
/// mutation.
pub fn set_path(root: &Value, path: &str, value: Option<Value>) -> Result<Value, MutationPathError> {
    set_paths(root, &[path], vec![value])
}

/// Batched [`set_path`]: every mutation is applied in index order against a
/// single copy of `root`, or none are.
pub fn set_paths(
    root: &Value,
    paths: &[&str],
    values: Vec<Option<Value>>,
) -> Result<Value, MutationPathError> {
    let mut next = root.clone();
    for (path, value) in paths.iter().zip(values) {
        apply_path(&mut next, path, value)?;
    }
    Ok(next)
}

/// Read a dotted path out of an object tree.
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = root;
    for segment in path.split('.') {
        cursor = cursor.as_object()?.get(segment)?;
    }
    Some(cursor)
}

pub(crate) fn apply_path(
    root: &mut Value,
    path: &str,
    value: Option<Value>,
) -> Result<(), MutationPathError> {
    // Metadata keys such as `NameIDFormat.redirect.sign` legitimately contain
    // dots. The final segment boundary is moved to `redirect@sign` before
    // splitting and any `@` in the leaf key is expanded back afterwards.
    let rewritten;
    let (effective, expand_at) = if path.ends_with("redirect.sign") {
        rewritten = format!("{}redirect@sign", &path[..path.len() - "redirect.sign".len()]);
        (rewritten.as_str(), true)
    } else {
        (path, false)
    };

    let (dirs, leaf) = match effective.rsplit_once('.') {
        Some((dirs, leaf)) => (Some(dirs), leaf),
        None => (None, effective),
    };

    let mut cursor = root;
    if let Some(dirs) = dirs {
        for segment in dirs.split('.') {
            let object = match cursor {
                Value::Object(map) => map,
                _ => return Err(path_error(path, segment)),
            };
            let entry = object.entry(segment.to_string()).or_insert(Value::Null);
            if is_blank(entry) {
                *entry = Value::Object(Map::new());
            } else if !entry.is_object() {
                return Err(path_error(path, segment));
            }
            cursor = entry;
        }
    }

    let object = match cursor {
        Value::Object(map) => map,
        _ => return Err(path_error(path, leaf)),
    };
    let key = if expand_at {
        leaf.replace('@', ".")
    } else {
        leaf.to_string()
    };
    match value {
        Some(value) => {
            object.insert(key, value);
        }
        None => {
            object.remove(&key);
        }
    }
    Ok(())
}

fn path_error(path: &str, segment: &str) -> MutationPathError {
    MutationPathError {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}
