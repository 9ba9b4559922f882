mod resolver;

pub use resolver::next_keys;

use indexmap::IndexSet;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A pattern property the engine cannot interpret. This is a
    /// schema/engine mismatch, never a user error, so loading aborts.
    #[error("unsupported pattern property `{0}`")]
    UnsupportedPattern(String),
    #[error("no configuration for document type `{0}`")]
    UnknownType(String),
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// One schema field. Pattern-keyed fields are classified once at load time;
/// nothing re-parses regular expressions per resolver call.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Fixed {
        key: String,
        required: bool,
    },
    /// Repeating keys `prefix{i}suffix` for `i` in `start..start + count`.
    Multiplicity {
        prefix: String,
        suffix: String,
        count: usize,
        start: usize,
    },
    /// Language pair `base:nl` / `base:en`, at most one of each.
    Bilingual {
        base: String,
    },
}

impl FieldSpec {
    /// For a multiplicity field, the numeric index of a matching key.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        match self {
            FieldSpec::Multiplicity { prefix, suffix, .. } => key
                .strip_prefix(prefix.as_str())?
                .strip_suffix(suffix.as_str())?
                .parse()
                .ok(),
            _ => None,
        }
    }

    /// For a multiplicity field, the concrete key at `index`.
    pub fn key_at(&self, index: usize) -> Option<String> {
        match self {
            FieldSpec::Multiplicity { prefix, suffix, .. } => {
                Some(format!("{prefix}{index}{suffix}"))
            }
            _ => None,
        }
    }
}

/// The field definitions and required-key set for one logical section.
#[derive(Debug, Clone, Default)]
pub struct SectionSchema {
    pub fields: Vec<FieldSpec>,
    pub required: IndexSet<String>,
}

/// Per-type schema configuration: the connection section covers `data`'s
/// direct keys, the metadata section covers `data.metaDataFields`.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub doc_type: String,
    pub connection: SectionSchema,
    pub metadata: SectionSchema,
}

impl SchemaConfig {
    /// Pick and load the configuration whose `title` matches `doc_type` from
    /// the registry's configuration list.
    pub fn for_type(configurations: &[Value], doc_type: &str) -> Result<Self, ConfigError> {
        let config = configurations
            .iter()
            .find(|conf| conf.get("title").and_then(Value::as_str) == Some(doc_type))
            .ok_or_else(|| ConfigError::UnknownType(doc_type.to_string()))?;
        Self::from_value(config)
    }

    /// Load one configuration document. Pattern properties are resolved into
    /// [`FieldSpec`] variants here; an unrecognized pattern shape fails the
    /// load with [`ConfigError::UnsupportedPattern`].
    pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
        let doc_type = config
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::Malformed("configuration has no title".into()))?
            .to_string();
        let properties = config
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::Malformed("configuration has no properties".into()))?;
        let definitions = config.get("definitions").and_then(Value::as_object);

        let connection_required = required_keys(config);
        let mut connection_fields = Vec::new();
        for (key, _) in properties.iter().filter(|(key, _)| key.as_str() != "metaDataFields") {
            connection_fields.push(FieldSpec::Fixed {
                key: key.clone(),
                required: connection_required.contains(key),
            });
        }

        let meta = properties
            .get("metaDataFields")
            .ok_or_else(|| ConfigError::Malformed("configuration has no metaDataFields".into()))?;
        let metadata_required = required_keys(meta);
        let mut metadata_fields = Vec::new();
        if let Some(fixed) = meta.get("properties").and_then(Value::as_object) {
            for (key, _) in fixed {
                metadata_fields.push(FieldSpec::Fixed {
                    key: key.clone(),
                    required: metadata_required.contains(key),
                });
            }
        }
        if let Some(patterns) = meta.get("patternProperties").and_then(Value::as_object) {
            let shape = Regex::new(r"^\^(.*?)\((.*?)\)(.*)\$$")
                .map_err(|err| ConfigError::Malformed(err.to_string()))?;
            for (pattern, property) in patterns {
                metadata_fields.push(parse_pattern(&shape, pattern, property, definitions)?);
            }
        }

        Ok(Self {
            doc_type,
            connection: SectionSchema {
                fields: connection_fields,
                required: connection_required,
            },
            metadata: SectionSchema {
                fields: metadata_fields,
                required: metadata_required,
            },
        })
    }
}

fn required_keys(schema: &Value) -> IndexSet<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| {
            keys.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Classify one pattern property. The two recognized shapes are a
/// multiplicity counter (the property carries `multiplicity`, optionally
/// `startIndex`) and the `(en|nl)` language pair.
fn parse_pattern(
    shape: &Regex,
    pattern: &str,
    property: &Value,
    definitions: Option<&Map<String, Value>>,
) -> Result<FieldSpec, ConfigError> {
    let property = resolve_ref(property, definitions);
    let captures = shape
        .captures(pattern)
        .ok_or_else(|| ConfigError::UnsupportedPattern(pattern.to_string()))?;
    let prefix = unescape(&captures[1]);
    let group = &captures[2];
    let suffix = unescape(&captures[3]);

    if let Some(count) = property.get("multiplicity").and_then(Value::as_u64) {
        let start = property
            .get("startIndex")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        return Ok(FieldSpec::Multiplicity {
            prefix,
            suffix,
            count: count as usize,
            start: start as usize,
        });
    }
    if (group == "en|nl" || group == "nl|en") && suffix.is_empty() {
        let base = prefix.trim_end_matches(':').to_string();
        return Ok(FieldSpec::Bilingual { base });
    }
    Err(ConfigError::UnsupportedPattern(pattern.to_string()))
}

/// Follow a `$ref` into the configuration's definitions table, with the
/// referring property's own keys taking precedence.
fn resolve_ref(property: &Value, definitions: Option<&Map<String, Value>>) -> Value {
    let Some(reference) = property.get("$ref").and_then(Value::as_str) else {
        return property.clone();
    };
    let name = reference.rsplit('/').next().unwrap_or(reference);
    let Some(definition) = definitions
        .and_then(|defs| defs.get(name))
        .and_then(Value::as_object)
    else {
        return property.clone();
    };
    let mut merged = definition.clone();
    if let Some(own) = property.as_object() {
        for (key, value) in own {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn unescape(raw: &str) -> String {
    raw.replace('\\', "")
}
