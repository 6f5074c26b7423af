//! Party name and tag reservation.
//!
//! The registry owns the uniqueness rules: party names are alphanumeric,
//! length-bounded and unique case-insensitively; tags are derived from the
//! first three characters of the name and disambiguated with a numeric
//! suffix. Entries are added when a party is created and released when it
//! disbands. The registry itself performs no I/O and takes no locks; it is
//! owned by the store and mutated under the store's lock.

use crate::error::{PartyError, PartyResult};
use crate::types::{NameLimits, PartyId};
use regex::Regex;
use std::collections::HashMap;

pub struct NameRegistry {
    pattern: Regex,
    names: HashMap<String, PartyId>,
    tags: HashMap<String, PartyId>,
}

impl NameRegistry {
    pub fn new(limits: NameLimits) -> Self {
        let pattern = Regex::new(&format!("^[A-Za-z0-9]{{{},{}}}$", limits.min, limits.max))
            .expect("name pattern is built from numeric bounds");
        Self {
            pattern,
            names: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    /// Validates `name`, reserves it for `party` and returns the derived tag.
    pub fn reserve(&mut self, name: &str, party: PartyId) -> PartyResult<String> {
        if !self.pattern.is_match(name) {
            return Err(PartyError::InvalidName(name.to_string()));
        }

        let key = name.to_lowercase();
        if self.names.contains_key(&key) {
            return Err(PartyError::DuplicateName(name.to_string()));
        }

        let prefix: String = name.chars().take(3).collect();
        let mut tag = prefix.clone();
        let mut suffix = 0u32;
        while self.tags.contains_key(&tag.to_lowercase()) {
            suffix += 1;
            tag = format!("{prefix}{suffix}");
        }

        self.names.insert(key, party);
        self.tags.insert(tag.to_lowercase(), party);
        Ok(tag)
    }

    /// Re-registers a persisted party under its stored name and tag.
    ///
    /// Unlike [`reserve`](Self::reserve), the tag is taken as-is; snapshots
    /// carry the tag a party was originally assigned.
    pub fn adopt(&mut self, name: &str, tag: &str, party: PartyId) -> PartyResult<()> {
        let name_key = name.to_lowercase();
        let tag_key = tag.to_lowercase();
        if self.names.contains_key(&name_key) {
            return Err(PartyError::DuplicateName(name.to_string()));
        }
        if self.tags.contains_key(&tag_key) {
            return Err(PartyError::DuplicateTag(tag.to_string()));
        }

        self.names.insert(name_key, party);
        self.tags.insert(tag_key, party);
        Ok(())
    }

    /// Drops the entries for a disbanded party.
    pub fn release(&mut self, name: &str, tag: &str) {
        self.names.remove(&name.to_lowercase());
        self.tags.remove(&tag.to_lowercase());
    }

    /// Case-insensitive lookup by display name.
    pub fn party_by_name(&self, name: &str) -> Option<PartyId> {
        self.names.get(&name.to_lowercase()).copied()
    }

    /// Case-insensitive lookup by tag.
    pub fn party_by_tag(&self, tag: &str) -> Option<PartyId> {
        self.tags.get(&tag.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.tags.clear();
    }
}
