use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::{Document, EntityRef};

/// A collaborator call failed. The core never retries; the caller re-invokes
/// the action. `NotFound` is split out so an initial detail fetch can render
/// a not-found state instead of a generic failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("store call failed: {0}")]
    Failed(String),
    #[error("malformed store response: {0}")]
    Response(#[from] serde_json::Error),
}

/// One row of the allow-list catalog: the peers a record may be connected to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub entity_kind: String,
    pub data: CatalogData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogData {
    pub entityid: String,
    pub state: String,
    pub meta_data_fields: Value,
    pub notes: Option<String>,
    pub allowedall: bool,
    pub allowed_entities: Vec<EntityRef>,
}

/// A resource server an OIDC relying party may be granted access to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub data: ResourceServerData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceServerData {
    pub entityid: String,
    pub meta_data_fields: Value,
}

/// Result of a persist call. The registry reports schema rejections inside a
/// success response; those are validation failures, not transport failures.
#[derive(Debug, Clone)]
pub enum PersistOutcome {
    Saved(Document),
    Rejected { validations: Value },
}

impl PersistOutcome {
    /// Interpret a raw persist response: a payload carrying `exception` or
    /// `error` is a rejection, anything else must parse as a document.
    pub fn from_response(response: Value) -> Result<Self, StoreError> {
        let rejected = response.get("exception").is_some() || response.get("error").is_some();
        if rejected {
            let validations = response.get("validations").cloned().unwrap_or(Value::Null);
            return Ok(Self::Rejected { validations });
        }
        let document = serde_json::from_value(response)?;
        Ok(Self::Saved(document))
    }
}

/// The registry backend as the editor sees it: single-shot asynchronous
/// calls, no retry, no state inside the core.
#[async_trait]
pub trait MetadataStore {
    async fn fetch_template(&self, doc_type: &str) -> Result<Document, StoreError>;
    async fn fetch_detail(&self, doc_type: &str, id: &str) -> Result<Document, StoreError>;
    async fn fetch_allow_list(
        &self,
        entity_kind: &str,
        state: &str,
    ) -> Result<Vec<CatalogEntry>, StoreError>;
    async fn fetch_resource_servers(&self, state: &str) -> Result<Vec<ResourceServer>, StoreError>;
    async fn fetch_revisions(&self, doc_type: &str, id: &str)
    -> Result<Vec<Document>, StoreError>;
    async fn persist_new(&self, doc: &Document) -> Result<PersistOutcome, StoreError>;
    async fn persist_update(&self, doc: &Document) -> Result<PersistOutcome, StoreError>;
    async fn delete(&self, doc: &Document, note: &str) -> Result<(), StoreError>;
}
