use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ChangeTracker, Section};
use crate::document::{Document, MutationPathError, is_blank};

/// One proposed scalar change: applied only when the user selected it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldProposal {
    pub selected: bool,
    #[serde(default)]
    pub value: Value,
}

/// An externally computed partial document: replacement sequences for the
/// mergeable collections plus selected/value pairs for scalar fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportProposal {
    pub connection: IndexMap<String, FieldProposal>,
    pub meta_data_fields: IndexMap<String, FieldProposal>,
    pub allowed_entities: Option<Value>,
    pub disable_consent: Option<Value>,
    pub stepup_entities: Option<Value>,
    pub mfa_entities: Option<Value>,
    pub arp: Option<Value>,
    pub allowed_resource_servers: Option<Value>,
}

/// Which parts of a proposal the user chose to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyFlags {
    pub connection: bool,
    pub meta_data_fields: bool,
    pub allowed_entities: bool,
    pub disable_consent: bool,
    pub stepup_entities: bool,
    pub mfa_entities: bool,
    pub arp: bool,
    pub allowed_resource_servers: bool,
}

impl ApplyFlags {
    pub fn all() -> Self {
        Self {
            connection: true,
            meta_data_fields: true,
            allowed_entities: true,
            disable_consent: true,
            stepup_entities: true,
            mfa_entities: true,
            arp: true,
            allowed_resource_servers: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: Document,
    pub tracker: ChangeTracker,
    /// Distinct affected sections, in application order, for user
    /// notification.
    pub affected: Vec<Section>,
}

/// Merge a proposal into the live document.
///
/// Collections are replaced wholesale when both the apply flag and a
/// proposal value are present. Selected metadata fields with a blank value
/// are removed from the document; selected connection fields apply verbatim,
/// blank or not. The caller re-runs the validator and refreshes the
/// allow-list baseline afterwards; this function does neither.
pub fn merge(
    doc: &Document,
    tracker: &ChangeTracker,
    proposal: &ImportProposal,
    flags: ApplyFlags,
) -> Result<MergeOutcome, MutationPathError> {
    let mut next = doc.clone();
    let mut tracker = tracker.clone();
    let mut affected = Vec::new();

    let collections = [
        ("allowedEntities", flags.allowed_entities, &proposal.allowed_entities, Section::Whitelist),
        ("disableConsent", flags.disable_consent, &proposal.disable_consent, Section::ConsentDisabling),
        ("stepupEntities", flags.stepup_entities, &proposal.stepup_entities, Section::StepupEntities),
        ("mfaEntities", flags.mfa_entities, &proposal.mfa_entities, Section::MfaEntities),
        ("arp", flags.arp, &proposal.arp, Section::Arp),
        ("allowedResourceServers", flags.allowed_resource_servers, &proposal.allowed_resource_servers, Section::ResourceServers),
    ];
    for (key, enabled, replacement, section) in collections {
        let Some(replacement) = replacement else {
            continue;
        };
        if !enabled {
            continue;
        }
        next = next.with_change(&format!("data.{key}"), Some(replacement.clone()))?;
        record(&mut tracker, &mut affected, section);
        debug!(collection = key, "import replaced collection");
    }

    if flags.meta_data_fields {
        for (key, field) in &proposal.meta_data_fields {
            if !field.selected {
                continue;
            }
            let path = format!("data.metaDataFields.{key}");
            // a blank applied value removes the field rather than blanking it
            let value = if is_blank(&field.value) {
                None
            } else {
                Some(field.value.clone())
            };
            next = next.with_change(&path, value)?;
            record(&mut tracker, &mut affected, Section::Metadata);
        }
    }

    if flags.connection {
        for (key, field) in &proposal.connection {
            if !field.selected {
                continue;
            }
            next = next.with_change(&format!("data.{key}"), Some(field.value.clone()))?;
            record(&mut tracker, &mut affected, Section::Connection);
        }
    }

    Ok(MergeOutcome {
        document: next,
        tracker,
        affected,
    })
}

fn record(tracker: &mut ChangeTracker, affected: &mut Vec<Section>, section: Section) {
    tracker.mark_dirty(section);
    let target = section.change_target();
    if !affected.contains(&target) {
        affected.push(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tabs_for;
    use serde_json::json;

    fn document() -> Document {
        let mut doc = Document::new("saml20_sp");
        doc.data = json!({
            "entityid": "https://old.example.org",
            "metaDataFields": {"name:en": "Old", "coin:stale": "yes"}
        });
        doc
    }

    fn tracker() -> ChangeTracker {
        ChangeTracker::for_tabs(tabs_for("saml20_sp"))
    }

    #[test]
    fn selected_connection_fields_apply_verbatim() {
        let proposal = ImportProposal {
            connection: IndexMap::from([
                (
                    "entityid".to_string(),
                    FieldProposal {
                        selected: true,
                        value: json!("https://x"),
                    },
                ),
                (
                    "notes".to_string(),
                    FieldProposal {
                        selected: true,
                        value: json!(""),
                    },
                ),
                (
                    "state".to_string(),
                    FieldProposal {
                        selected: false,
                        value: json!("testaccepted"),
                    },
                ),
            ]),
            ..ImportProposal::default()
        };
        let outcome = merge(&document(), &tracker(), &proposal, ApplyFlags::all())
            .expect("merge succeeds");
        assert_eq!(outcome.document.data_at("entityid"), Some(&json!("https://x")));
        // blank connection values are set verbatim, not deleted
        assert_eq!(outcome.document.data_at("notes"), Some(&json!("")));
        assert_eq!(outcome.document.data_at("state"), None);
        assert_eq!(outcome.affected, vec![Section::Connection]);
        assert!(outcome.tracker.is_dirty(Section::Connection));
    }

    #[test]
    fn blank_metadata_values_remove_the_field() {
        let proposal = ImportProposal {
            meta_data_fields: IndexMap::from([
                (
                    "coin:stale".to_string(),
                    FieldProposal {
                        selected: true,
                        value: json!(""),
                    },
                ),
                (
                    "name:en".to_string(),
                    FieldProposal {
                        selected: true,
                        value: json!("New"),
                    },
                ),
            ]),
            ..ImportProposal::default()
        };
        let outcome = merge(&document(), &tracker(), &proposal, ApplyFlags::all())
            .expect("merge succeeds");
        assert_eq!(outcome.document.data_at("metaDataFields.coin:stale"), None);
        assert_eq!(
            outcome.document.data_at("metaDataFields.name:en"),
            Some(&json!("New"))
        );
        assert_eq!(outcome.affected, vec![Section::Metadata]);
    }

    #[test]
    fn collections_replace_only_when_flagged_and_present() {
        let proposal = ImportProposal {
            allowed_entities: Some(json!([{"name": "https://idp.example.org"}])),
            disable_consent: Some(json!([{"name": "https://other.example.org"}])),
            ..ImportProposal::default()
        };
        let flags = ApplyFlags {
            allowed_entities: true,
            disable_consent: false,
            ..ApplyFlags::default()
        };
        let outcome = merge(&document(), &tracker(), &proposal, flags).expect("merge succeeds");
        assert_eq!(
            outcome.document.data_at("allowedEntities"),
            Some(&json!([{"name": "https://idp.example.org"}]))
        );
        assert_eq!(outcome.document.data_at("disableConsent"), None);
        assert_eq!(outcome.affected, vec![Section::Whitelist]);
    }

    #[test]
    fn mfa_list_lands_on_the_stepup_section() {
        let proposal = ImportProposal {
            mfa_entities: Some(json!([{"name": "https://idp.example.org", "level": "loa2"}])),
            ..ImportProposal::default()
        };
        let outcome = merge(&document(), &tracker(), &proposal, ApplyFlags::all())
            .expect("merge succeeds");
        assert_eq!(outcome.affected, vec![Section::StepupEntities]);
        assert!(outcome.tracker.is_dirty(Section::StepupEntities));
    }

    #[test]
    fn affected_sections_are_not_recorded_twice() {
        let proposal = ImportProposal {
            connection: IndexMap::from([
                (
                    "entityid".to_string(),
                    FieldProposal {
                        selected: true,
                        value: json!("https://x"),
                    },
                ),
                (
                    "state".to_string(),
                    FieldProposal {
                        selected: true,
                        value: json!("prodaccepted"),
                    },
                ),
            ]),
            ..ImportProposal::default()
        };
        let outcome = merge(&document(), &tracker(), &proposal, ApplyFlags::all())
            .expect("merge succeeds");
        assert_eq!(outcome.affected, vec![Section::Connection]);
    }

    #[test]
    fn nothing_applies_without_flags() {
        let proposal = ImportProposal {
            allowed_entities: Some(json!([])),
            connection: IndexMap::from([(
                "entityid".to_string(),
                FieldProposal {
                    selected: true,
                    value: json!("https://x"),
                },
            )]),
            ..ImportProposal::default()
        };
        let outcome = merge(&document(), &tracker(), &proposal, ApplyFlags::default())
            .expect("merge succeeds");
        assert_eq!(outcome.document.data, document().data);
        assert!(outcome.affected.is_empty());
    }

    #[test]
    fn proposals_deserialize_from_the_import_payload() {
        let proposal: ImportProposal = serde_json::from_value(json!({
            "connection": {"entityid": {"selected": true, "value": "https://x"}},
            "metaDataFields": {"name:en": {"selected": false, "value": "Name"}},
            "allowedEntities": [{"name": "https://idp.example.org"}]
        }))
        .expect("valid payload");
        assert!(proposal.connection["entityid"].selected);
        assert!(!proposal.meta_data_fields["name:en"].selected);
        assert!(proposal.allowed_entities.is_some());
    }
}
