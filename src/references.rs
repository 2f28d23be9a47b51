/// Link reference definitions collected during block parsing
use std::collections::HashMap;

use crate::ast::LinkReferenceDefinition;
use crate::escaping::normalize_label;

/// Definitions keyed by normalized label. The first definition of a label wins.
#[derive(Debug, Clone, Default)]
pub struct LinkReferenceMap {
    definitions: HashMap<String, LinkReferenceDefinition>,
}

impl LinkReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition unless its label is already defined. Returns whether it was added.
    pub fn add(&mut self, definition: LinkReferenceDefinition) -> bool {
        let key = normalize_label(&definition.label);
        if self.definitions.contains_key(&key) {
            log::debug!("ignoring duplicate link reference definition [{}]", key);
            return false;
        }
        self.definitions.insert(key, definition);
        true
    }

    /// Looks up a label as written in the document (it is normalized first).
    pub fn get(&self, label: &str) -> Option<&LinkReferenceDefinition> {
        self.definitions.get(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
