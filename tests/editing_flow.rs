use async_trait::async_trait;
use metaedit::{
    ApplyFlags, CatalogEntry, Document, EditorSession, EntityRef, ImportProposal, MetadataStore,
    PersistOutcome, ResourceServer, SchemaConfig, Section, StoreError,
};
use serde_json::{Value, json};

fn configurations() -> Vec<Value> {
    vec![json!({
        "title": "saml20_sp",
        "required": ["entityid", "state"],
        "definitions": {
            "AssertionConsumerServiceBinding": {"multiplicity": 10, "startIndex": 0}
        },
        "properties": {
            "entityid": {"type": "string"},
            "state": {"type": "string"},
            "metaDataFields": {
                "required": ["name:en", "NameIDFormat"],
                "properties": {
                    "NameIDFormat": {"type": "string"}
                },
                "patternProperties": {
                    "^name:(en|nl)$": {"type": "string"},
                    "^AssertionConsumerService:(\\d+):Binding$": {
                        "$ref": "#/definitions/AssertionConsumerServiceBinding"
                    }
                }
            }
        }
    })]
}

fn detail() -> Document {
    serde_json::from_value(json!({
        "id": "9",
        "type": "saml20_sp",
        "revision": {"number": 7},
        "data": {
            "entityid": "https://sp.example.org",
            "state": "prodaccepted",
            "allowedall": false,
            "allowedEntities": [{"name": "https://idp.example.org"}],
            "metaDataFields": {
                "name:en": "Example Service",
                "NameIDFormat": "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
                "AssertionConsumerService:0:Binding": "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"
            }
        }
    }))
    .expect("valid document")
}

/// A canned backend, the way the host wires the engine to its API layer.
struct FixedStore {
    template: Document,
}

#[async_trait]
impl MetadataStore for FixedStore {
    async fn fetch_template(&self, _doc_type: &str) -> Result<Document, StoreError> {
        Ok(self.template.clone())
    }

    async fn fetch_detail(&self, _doc_type: &str, id: &str) -> Result<Document, StoreError> {
        if id == "9" {
            Ok(detail())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn fetch_allow_list(
        &self,
        _entity_kind: &str,
        _state: &str,
    ) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(vec![
            serde_json::from_value(json!({
                "type": "saml20_idp",
                "data": {"entityid": "https://idp.example.org", "state": "prodaccepted"}
            }))
            .expect("valid row"),
        ])
    }

    async fn fetch_resource_servers(
        &self,
        _state: &str,
    ) -> Result<Vec<ResourceServer>, StoreError> {
        Ok(Vec::new())
    }

    async fn fetch_revisions(
        &self,
        _doc_type: &str,
        _id: &str,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(Vec::new())
    }

    async fn persist_new(&self, doc: &Document) -> Result<PersistOutcome, StoreError> {
        Ok(PersistOutcome::Saved(doc.clone()))
    }

    async fn persist_update(&self, doc: &Document) -> Result<PersistOutcome, StoreError> {
        let mut saved = doc.clone();
        saved.revision = Some(json!({"number": 8}));
        Ok(PersistOutcome::Saved(saved))
    }

    async fn delete(&self, _doc: &Document, _note: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test(flavor = "current_thread")]
async fn edit_import_and_submit_round_trip() {
    let store = FixedStore { template: detail() };
    let schema = SchemaConfig::for_type(&configurations(), "saml20_sp").expect("known type");

    let document = store.fetch_detail("saml20_sp", "9").await.expect("found");
    let mut session = EditorSession::open(document, schema).expect("opens");
    let catalog = store
        .fetch_allow_list(session.allow_list_kind(), "prodaccepted")
        .await
        .expect("catalog");
    session.load_catalog(catalog);
    assert!(session.unknown_allowed_entities().is_empty());

    // the resolver offers the next ACS binding slot and the missing language
    let offered = session.next_metadata_keys();
    assert!(offered.contains(&"AssertionConsumerService:1:Binding".to_string()));
    assert!(offered.contains(&"name:nl".to_string()));
    assert!(!offered.contains(&"name:en".to_string()));

    // a user edit marks the tab and keeps validation green
    session
        .apply_change(
            Section::Connection,
            "data.entityid",
            Some(json!("https://renamed.example.org")),
        )
        .expect("valid path");
    assert!(session.tracker().is_dirty(Section::Connection));
    assert!(!session.tracker().has_global_errors());

    // allow-list decisions diff against the baseline
    session.toggle_allowed(true, EntityRef::new("https://idp2.example.org"));
    session.toggle_allowed(false, EntityRef::new("https://idp2.example.org"));
    assert!(session.diff().is_empty());

    // an import proposal replaces the allow-list and blanks a metadata field
    let proposal: ImportProposal = serde_json::from_value(json!({
        "allowedEntities": [{"name": "https://idp.example.org"}],
        "metaDataFields": {"NameIDFormat": {"selected": true, "value": ""}}
    }))
    .expect("valid proposal");
    let affected = session
        .apply_import(&proposal, ApplyFlags::all())
        .expect("merge succeeds");
    assert_eq!(affected, vec![Section::Whitelist, Section::Metadata]);
    // the blanked required field was deleted, then back-filled and flagged
    assert_eq!(
        session.document().data_at("metaDataFields.NameIDFormat"),
        Some(&json!(""))
    );
    assert!(session.tracker().section_has_errors(Section::Metadata));
    assert_eq!(
        session.prepare_submit().unwrap_err(),
        metaedit::SubmitError::MissingRevisionNote
    );

    // repair, note, and persist
    session
        .apply_change(
            Section::Metadata,
            "data.metaDataFields.NameIDFormat",
            Some(json!("urn:oasis:names:tc:SAML:2.0:nameid-format:transient")),
        )
        .expect("valid path");
    session.set_revision_note("import from production feed");
    let snapshot = session.prepare_submit().expect("submits");
    match store.persist_update(&snapshot).await.expect("persists") {
        PersistOutcome::Saved(saved) => assert_eq!(saved.revision_number(), Some(8)),
        PersistOutcome::Rejected { .. } => panic!("expected a saved document"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn missing_documents_are_distinguished_from_other_failures() {
    let store = FixedStore { template: detail() };
    let err = store.fetch_detail("saml20_sp", "404").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}
