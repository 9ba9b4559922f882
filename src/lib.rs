#![deny(rust_2018_idioms)]

//! In-memory document-editing and validation engine for federation metadata
//! records. The host UI owns rendering and transport; this crate owns the
//! invariants: consistent nested-path mutation, idempotent re-validation,
//! allow-list diffing and import merging, all over explicit session state.

mod client;
mod document;
mod schema;
mod session;
mod validate;

pub use client::{
    CatalogData, CatalogEntry, MetadataStore, PersistOutcome, ResourceServer, ResourceServerData,
    StoreError,
};
pub use document::{
    Document, EntityRef, MutationPathError, is_blank, set_path, set_paths, value_at,
};
pub use schema::{ConfigError, FieldSpec, SchemaConfig, SectionSchema, next_keys};
pub use session::{
    AllowListDiff, ApplyFlags, ChangeTracker, EditorSession, FieldProposal, ImportProposal,
    MergeOutcome, Section, SubmitError, merge, tabs_for,
};
pub use validate::{FieldErrors, validate_connection, validate_metadata_and_backfill};

pub mod prelude {
    pub use super::{
        ApplyFlags, Document, EditorSession, EntityRef, ImportProposal, MetadataStore,
        SchemaConfig, Section,
    };
}
