use crate::participant::ParticipantState;

/// Stable arena index of a participant; the only form of external
/// reference. Assigned once at startup, never reused within a run.
pub type TagId = usize;

/// Fixed-capacity collection of participant records, the single owner of
/// all race truth. Built once from the roster; entries are never added or
/// removed afterwards, and all mutation goes through this registry.
#[derive(Debug)]
pub struct TagRegistry {
    entries: Vec<ParticipantState>,
}

impl TagRegistry {
    /// Build the arena from the roster. Entry `i` gets identity `i`.
    pub fn from_roster(addresses: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = addresses
            .into_iter()
            .enumerate()
            .map(|(id, (address, name))| ParticipantState::new(id, address, name))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a beacon address to its identity. Linear scan over the fixed
    /// roster.
    pub fn lookup(&self, address: &str) -> Option<TagId> {
        self.entries.iter().position(|p| p.address == address)
    }

    /// Out-of-range identities are a programming error, not a runtime
    /// condition: identities only ever come from this registry.
    pub fn get(&self, id: TagId) -> &ParticipantState {
        &self.entries[id]
    }

    pub fn get_mut(&mut self, id: TagId) -> &mut ParticipantState {
        &mut self.entries[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantState> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParticipantState> {
        self.entries.iter_mut()
    }

    /// Race-clear across the whole roster; entries stay allocated.
    pub fn reset_race(&mut self) {
        for p in &mut self.entries {
            p.reset_race();
        }
    }
}
