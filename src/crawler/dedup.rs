//! Run-scoped set of listing addresses already scheduled for extraction

use crate::url::canonicalize_url;
use std::collections::HashSet;

/// Visited listing keys for the lifetime of one run
///
/// Keys are canonical listing addresses. Entries are never removed and the
/// set is not persisted: a resumed run starts empty.
#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical key for an address; unparsable addresses are keyed verbatim
    pub fn key_for(address: &str) -> String {
        canonicalize_url(address)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| address.trim().to_string())
    }

    pub fn has(&self, address: &str) -> bool {
        self.keys.contains(&Self::key_for(address))
    }

    pub fn add(&mut self, address: &str) {
        self.keys.insert(Self::key_for(address));
    }

    /// Adds the address and reports whether it was new
    pub fn insert(&mut self, address: &str) -> bool {
        self.keys.insert(Self::key_for(address))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
