use indexmap::IndexMap;

use super::Section;
use crate::validate::FieldErrors;

/// Per-section dirty flags and per-field error flags for one editing session.
///
/// Dirty flags are sticky: once a section is touched it stays marked until an
/// explicit [`reset`](Self::reset) when a fresh baseline is loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    dirty: IndexMap<Section, bool>,
    errors: IndexMap<Section, FieldErrors>,
}

impl ChangeTracker {
    /// Initialize flags for the given tab set, all clean and error-free.
    pub fn for_tabs(tabs: &[Section]) -> Self {
        Self {
            dirty: tabs.iter().map(|tab| (*tab, false)).collect(),
            errors: tabs.iter().map(|tab| (*tab, FieldErrors::new())).collect(),
        }
    }

    pub fn mark_dirty(&mut self, section: Section) {
        self.dirty.insert(section.change_target(), true);
    }

    pub fn is_dirty(&self, section: Section) -> bool {
        self.dirty
            .get(&section.change_target())
            .copied()
            .unwrap_or(false)
    }

    pub fn dirty_sections(&self) -> Vec<Section> {
        self.dirty
            .iter()
            .filter(|(_, dirty)| **dirty)
            .map(|(section, _)| *section)
            .collect()
    }

    /// Clear every dirty flag; error flags stay as the validator left them.
    pub fn reset(&mut self) {
        for dirty in self.dirty.values_mut() {
            *dirty = false;
        }
    }

    /// Flag or clear a single field, as reported by the edit surface.
    pub fn set_field_error(&mut self, section: Section, field: &str, is_error: bool) {
        self.errors
            .entry(section)
            .or_default()
            .insert(field.to_string(), is_error);
    }

    /// Replace a section's whole error map with a validator result.
    pub fn set_section_errors(&mut self, section: Section, errors: FieldErrors) {
        self.errors.insert(section, errors);
    }

    pub fn section_errors(&self, section: Section) -> Option<&FieldErrors> {
        self.errors.get(&section)
    }

    /// A section blocks submission while any of its fields is flagged.
    pub fn section_has_errors(&self, section: Section) -> bool {
        self.errors
            .get(&section)
            .map(|fields| fields.values().any(|flag| *flag))
            .unwrap_or(false)
    }

    pub fn has_global_errors(&self) -> bool {
        self.errors
            .values()
            .any(|fields| fields.values().any(|flag| *flag))
    }
}
