mod allowlist;
mod changes;
mod import;

pub use allowlist::AllowListDiff;
pub use changes::ChangeTracker;
pub use import::{ApplyFlags, FieldProposal, ImportProposal, MergeOutcome, merge};

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::client::{CatalogEntry, ResourceServer};
use crate::document::{Document, EntityRef, MutationPathError};
use crate::schema::{SchemaConfig, next_keys};
use crate::validate::{validate_connection, validate_metadata_and_backfill};

/// A logical grouping of the document's fields, edited and validated as a
/// unit. One tab in the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Connection,
    ConnectedIdps,
    Metadata,
    Arp,
    Whitelist,
    Manipulation,
    Revisions,
    Import,
    Export,
    ConsentDisabling,
    StepupEntities,
    MfaEntities,
    ResourceServers,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Connection => "connection",
            Section::ConnectedIdps => "connected_idps",
            Section::Metadata => "metadata",
            Section::Arp => "arp",
            Section::Whitelist => "whitelist",
            Section::Manipulation => "manipulation",
            Section::Revisions => "revisions",
            Section::Import => "import",
            Section::Export => "export",
            Section::ConsentDisabling => "consent_disabling",
            Section::StepupEntities => "stepup_entities",
            Section::MfaEntities => "mfa_entities",
            Section::ResourceServers => "resource_servers",
        }
    }

    /// Where this section's changes are tracked. Multi-factor entities are
    /// edited on the step-up tab, so their changes land there.
    pub fn change_target(self) -> Section {
        match self {
            Section::MfaEntities => Section::StepupEntities,
            other => other,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TABS_SP: &[Section] = &[
    Section::Connection,
    Section::ConnectedIdps,
    Section::Metadata,
    Section::Arp,
    Section::Whitelist,
    Section::Manipulation,
    Section::Revisions,
    Section::Import,
    Section::Export,
];

const TABS_IDP: &[Section] = &[
    Section::Connection,
    Section::Whitelist,
    Section::ConsentDisabling,
    Section::StepupEntities,
    Section::Metadata,
    Section::Manipulation,
    Section::Revisions,
    Section::Import,
    Section::Export,
];

const TABS_OIDC: &[Section] = &[
    Section::Connection,
    Section::ConnectedIdps,
    Section::Metadata,
    Section::ResourceServers,
    Section::Arp,
    Section::Whitelist,
    Section::Manipulation,
    Section::Revisions,
    Section::Import,
    Section::Export,
];

const TABS_SINGLE_TENANT: &[Section] = &[
    Section::Connection,
    Section::Metadata,
    Section::Arp,
    Section::Revisions,
    Section::Import,
    Section::Export,
];

/// The ordered tab set for a document type. Unknown types get no tabs.
pub fn tabs_for(doc_type: &str) -> &'static [Section] {
    match doc_type {
        "saml20_sp" => TABS_SP,
        "saml20_idp" => TABS_IDP,
        "oidc10_rp" => TABS_OIDC,
        "single_tenant_template" => TABS_SINGLE_TENANT,
        _ => &[],
    }
}

/// Data keys cleared when a session starts from a clone of an existing
/// record.
const CLONE_CLEARED_KEYS: &[&str] = &[
    "entityid",
    "revision",
    "created",
    "eid",
    "id",
    "ip",
    "notes",
    "revisionid",
    "revisionnote",
    "user",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("a revision note is required")]
    MissingRevisionNote,
    #[error("one or more sections have blocking validation errors")]
    ValidationErrors,
    #[error(transparent)]
    Mutation(#[from] MutationPathError),
}

/// One editing session over one document: the live document plus every piece
/// of derived state the editor shows. All state is held here explicitly;
/// operations compute the next state in full before swapping it in, so a
/// failed operation leaves the session untouched.
#[derive(Debug, Clone)]
pub struct EditorSession {
    document: Document,
    schema: SchemaConfig,
    tracker: ChangeTracker,
    diff: AllowListDiff,
    catalog: Vec<CatalogEntry>,
    resource_servers: Vec<ResourceServer>,
    revisions: Vec<Document>,
    revision_note: String,
    original_entity_id: String,
    is_new: bool,
}

impl EditorSession {
    /// Start a session over a fetched document or template. Validates both
    /// schema-driven sections up front, back-filling missing required
    /// metadata fields.
    pub fn open(document: Document, schema: SchemaConfig) -> Result<Self, MutationPathError> {
        let is_new = document.id.is_none();
        Self::start(document, schema, is_new)
    }

    /// Start a session over a copy of an existing record: identity, revision
    /// bookkeeping and per-record data keys are cleared first.
    pub fn open_clone(document: Document, schema: SchemaConfig) -> Result<Self, MutationPathError> {
        let mut document = document;
        document.id = None;
        document.revision = None;
        let values = vec![None; CLONE_CLEARED_KEYS.len()];
        let paths: Vec<String> = CLONE_CLEARED_KEYS
            .iter()
            .map(|key| format!("data.{key}"))
            .collect();
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let document = document.with_changes(&path_refs, values)?;
        Self::start(document, schema, true)
    }

    fn start(
        document: Document,
        schema: SchemaConfig,
        is_new: bool,
    ) -> Result<Self, MutationPathError> {
        let (document, metadata_errors) = validate_metadata_and_backfill(&document, &schema)?;
        let connection_errors = validate_connection(&document, &schema);
        let mut tracker = ChangeTracker::for_tabs(tabs_for(&document.doc_type));
        tracker.set_section_errors(Section::Metadata, metadata_errors);
        tracker.set_section_errors(Section::Connection, connection_errors);
        let original_entity_id = document
            .data_at("entityid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            document,
            schema,
            tracker,
            diff: AllowListDiff::default(),
            catalog: Vec::new(),
            resource_servers: Vec::new(),
            revisions: Vec::new(),
            revision_note: String::new(),
            original_entity_id,
            is_new,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn diff(&self) -> &AllowListDiff {
        &self.diff
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn resource_servers(&self) -> &[ResourceServer] {
        &self.resource_servers
    }

    pub fn revisions(&self) -> &[Document] {
        &self.revisions
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn original_entity_id(&self) -> &str {
        &self.original_entity_id
    }

    pub fn tabs(&self) -> &'static [Section] {
        tabs_for(&self.document.doc_type)
    }

    /// The entity kind whose catalog backs this record's allow-list.
    pub fn allow_list_kind(&self) -> &'static str {
        match self.document.doc_type.as_str() {
            "saml20_sp" | "oidc10_rp" => "saml20_idp",
            _ => "saml20_sp",
        }
    }

    /// Apply one user edit: mutate the document, mark the section dirty, and
    /// recompute that section's validation errors.
    pub fn apply_change(
        &mut self,
        section: Section,
        path: &str,
        value: Option<Value>,
    ) -> Result<(), MutationPathError> {
        self.apply_changes(section, &[path], vec![value])
    }

    /// Batched edit over parallel paths and values, applied in index order.
    /// Fails whole: an invalid path leaves the session unchanged.
    pub fn apply_changes(
        &mut self,
        section: Section,
        paths: &[&str],
        values: Vec<Option<Value>>,
    ) -> Result<(), MutationPathError> {
        let next = self.document.with_changes(paths, values)?;
        let (next, metadata_errors) = if section == Section::Metadata {
            let (next, errors) = validate_metadata_and_backfill(&next, &self.schema)?;
            (next, Some(errors))
        } else {
            (next, None)
        };

        self.document = next;
        self.tracker.mark_dirty(section);
        if let Some(errors) = metadata_errors {
            self.tracker.set_section_errors(Section::Metadata, errors);
        }
        if section == Section::Connection {
            let errors = validate_connection(&self.document, &self.schema);
            self.tracker.set_section_errors(Section::Connection, errors);
        }
        if section == Section::Whitelist && paths.contains(&"data.allowedall") {
            // switching allow-list mode makes per-entity decisions moot
            self.diff.reset();
        }
        debug!(section = %section, paths = ?paths, "applied change");
        Ok(())
    }

    /// Flag or clear a field error reported by the edit surface.
    pub fn set_field_error(&mut self, section: Section, field: &str, is_error: bool) {
        self.tracker.set_field_error(section, field, is_error);
    }

    /// Record an allow-list decision: `added` follows the checkbox the user
    /// toggled.
    pub fn toggle_allowed(&mut self, added: bool, entity: EntityRef) {
        if added {
            self.diff.toggle_add(entity);
        } else {
            self.diff.toggle_remove(entity);
        }
    }

    /// Keys still offerable by the "add a metadata field" control.
    pub fn next_metadata_keys(&self) -> Vec<String> {
        let empty = Map::new();
        let current = self.document.metadata_fields().unwrap_or(&empty);
        next_keys(&self.schema.metadata, current)
    }

    /// Merge an import proposal into the session and re-validate. Returns the
    /// distinct affected sections for user notification. The allow-list
    /// baseline must be refreshed by reloading the catalog afterwards.
    pub fn apply_import(
        &mut self,
        proposal: &ImportProposal,
        flags: ApplyFlags,
    ) -> Result<Vec<Section>, MutationPathError> {
        let outcome = merge(&self.document, &self.tracker, proposal, flags)?;
        let (document, metadata_errors) =
            validate_metadata_and_backfill(&outcome.document, &self.schema)?;
        let connection_errors = validate_connection(&document, &self.schema);

        self.document = document;
        self.tracker = outcome.tracker;
        self.tracker
            .set_section_errors(Section::Metadata, metadata_errors);
        self.tracker
            .set_section_errors(Section::Connection, connection_errors);
        debug!(affected = ?outcome.affected, "applied import proposal");
        Ok(outcome.affected)
    }

    /// Install a freshly fetched allow-list catalog. This is the baseline
    /// refresh that follows an import or a workflow-state change.
    pub fn load_catalog(&mut self, entries: Vec<CatalogEntry>) {
        self.catalog = entries;
    }

    pub fn load_resource_servers(&mut self, servers: Vec<ResourceServer>) {
        self.resource_servers = servers;
    }

    /// Install the fetched revision history: the live document joins the list
    /// and everything is ordered newest first.
    pub fn load_revisions(&mut self, mut revisions: Vec<Document>) {
        revisions.push(self.document.clone());
        revisions.sort_by_key(|rev| std::cmp::Reverse(rev.revision_number().unwrap_or(-1)));
        self.revisions = revisions;
    }

    /// Names in the document's allow-list that no longer exist in the
    /// catalog. Derived on demand, never stored.
    pub fn unknown_allowed_entities(&self) -> Vec<String> {
        let allowed = self
            .document
            .data_at("allowedEntities")
            .and_then(Value::as_array);
        let Some(allowed) = allowed else {
            return Vec::new();
        };
        allowed
            .iter()
            .filter_map(|entity| entity.get("name").and_then(Value::as_str))
            .filter(|name| {
                !self
                    .catalog
                    .iter()
                    .any(|entry| entry.data.entityid == *name)
            })
            .map(str::to_string)
            .collect()
    }

    pub fn revision_note(&self) -> &str {
        &self.revision_note
    }

    pub fn set_revision_note(&mut self, note: impl Into<String>) {
        self.revision_note = note.into();
    }

    /// Gate submission: a revision note is required and no section may have
    /// blocking errors. On success the note is written into the document and
    /// the snapshot to persist is returned.
    pub fn prepare_submit(&mut self) -> Result<Document, SubmitError> {
        if self.revision_note.trim().is_empty() {
            return Err(SubmitError::MissingRevisionNote);
        }
        if self.tracker.has_global_errors() {
            return Err(SubmitError::ValidationErrors);
        }
        let next = self.document.with_change(
            "data.revisionnote",
            Some(Value::String(self.revision_note.clone())),
        )?;
        self.document = next;
        Ok(self.document.clone())
    }
}
