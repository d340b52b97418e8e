// SPDX-License-Identifier: MIT OR Apache-2.0
//! State carried between the calls of one evaluation.

use crate::action::CreationId;
use std::collections::HashMap;

/// Key of a [`ChainState`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainKey {
    /// Location of the resource created under this id.
    Location(CreationId),
}

/// Values observed earlier in the sequence and consumed by later calls.
///
/// Created fresh for every evaluation and discarded afterwards.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    entries: HashMap<ChainKey, String>,
}

impl ChainState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the location created under `id`. An empty string records
    /// that the creation succeeded without a usable location.
    pub fn save_location(&mut self, id: CreationId, location: impl Into<String>) {
        self.entries.insert(ChainKey::Location(id), location.into());
    }

    /// Location created under `id`, if one was recorded.
    pub fn location(&self, id: &CreationId) -> Option<&str> {
        self.entries
            .get(&ChainKey::Location(id.clone()))
            .map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_saves_overwrite() {
        let mut state = ChainState::new();
        let id = CreationId::new("users");
        assert!(state.location(&id).is_none());
        state.save_location(id.clone(), "/users/1");
        state.save_location(id.clone(), "/users/2");
        assert_eq!(state.location(&id), Some("/users/2"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn empty_location_is_still_recorded() {
        let mut state = ChainState::new();
        state.save_location(CreationId::new("x"), "");
        assert_eq!(state.location(&CreationId::new("x")), Some(""));
    }
}
