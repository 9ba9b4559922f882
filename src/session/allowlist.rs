use crate::document::EntityRef;

/// User decisions about allow-list membership, relative to the persisted
/// baseline. An entity is never in both lists: undoing a pending removal
/// takes precedence over recording a new addition, and vice versa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowListDiff {
    added: Vec<EntityRef>,
    removed: Vec<EntityRef>,
}

impl AllowListDiff {
    pub fn added(&self) -> &[EntityRef] {
        &self.added
    }

    pub fn removed(&self) -> &[EntityRef] {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Record that `entity` was allowed. If it was pending removal the
    /// removal is cancelled instead; re-adding an already-added entity does
    /// not duplicate it.
    pub fn toggle_add(&mut self, entity: EntityRef) {
        let before = self.removed.len();
        self.removed.retain(|removed| !removed.same_entity(&entity));
        if self.removed.len() == before && !self.added.iter().any(|added| added.same_entity(&entity))
        {
            self.added.push(entity);
        }
    }

    /// Mirror of [`toggle_add`](Self::toggle_add): cancel a pending addition,
    /// or record a removal.
    pub fn toggle_remove(&mut self, entity: EntityRef) {
        let before = self.added.len();
        self.added.retain(|added| !added.same_entity(&entity));
        if self.added.len() == before
            && !self.removed.iter().any(|removed| removed.same_entity(&entity))
        {
            self.removed.push(entity);
        }
    }

    /// Switching to "allow all" makes per-entity decisions moot.
    pub fn reset(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}
