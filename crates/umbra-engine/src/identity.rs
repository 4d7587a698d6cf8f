//! Session-scoped identity map
//!
//! Maps each foreign id to the one arena slot mirroring it. An entry is
//! never replaced once registered. Maps are not `Clone`: the only way to
//! copy one is `fork`, which is what the refresh pass uses.

use rustc_hash::FxHashMap;
use umbra_sdk::ForeignId;

use crate::value::Handle;

/// Foreign id -> mirror slot
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: FxHashMap<ForeignId, Handle>,
}

impl IdentityMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot under `id`.
    ///
    /// If `id` is already registered the existing entry is kept and
    /// returned; otherwise `handle` is returned.
    pub fn register(&mut self, id: ForeignId, handle: Handle) -> Handle {
        *self.entries.entry(id).or_insert(handle)
    }

    /// Slot registered under `id`
    #[inline]
    pub fn get(&self, id: ForeignId) -> Option<Handle> {
        self.entries.get(&id).copied()
    }

    /// Check if `id` is registered
    pub fn contains(&self, id: ForeignId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = (ForeignId, Handle)> + '_ {
        self.entries.iter().map(|(id, handle)| (*id, *handle))
    }

    /// A new map holding a copy of every entry.
    ///
    /// Registrations into the fork never reach this map.
    pub fn fork(&self) -> IdentityMap {
        IdentityMap {
            entries: self.entries.clone(),
        }
    }

    /// A fork that also holds the entries of `extras` not already in this map
    pub fn fork_with(&self, extras: &IdentityMap) -> IdentityMap {
        let mut fork = self.fork();
        for (id, handle) in extras.iter() {
            fork.register(id, handle);
        }
        fork
    }

    /// Entries whose id is not registered in `base`
    pub fn without(&self, base: &IdentityMap) -> IdentityMap {
        IdentityMap {
            entries: self
                .entries
                .iter()
                .filter(|(id, _)| !base.entries.contains_key(*id))
                .map(|(id, handle)| (*id, *handle))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_never_replaced() {
        let mut map = IdentityMap::new();
        let id = ForeignId::new(3);
        assert_eq!(map.register(id, Handle::new(0)), Handle::new(0));
        assert_eq!(map.register(id, Handle::new(1)), Handle::new(0));
        assert_eq!(map.get(id), Some(Handle::new(0)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_fork_is_independent() {
        let mut map = IdentityMap::new();
        map.register(ForeignId::new(1), Handle::new(0));
        let mut fork = map.fork();
        fork.register(ForeignId::new(2), Handle::new(1));

        assert_eq!(fork.len(), 2);
        assert_eq!(map.len(), 1);
        assert!(!map.contains(ForeignId::new(2)));
        assert_eq!(fork.get(ForeignId::new(1)), Some(Handle::new(0)));
    }

    #[test]
    fn test_fork_with_extras_keeps_own_entries() {
        let mut map = IdentityMap::new();
        map.register(ForeignId::new(1), Handle::new(0));
        let mut extras = IdentityMap::new();
        extras.register(ForeignId::new(1), Handle::new(4));
        extras.register(ForeignId::new(2), Handle::new(5));

        let fork = map.fork_with(&extras);
        assert_eq!(fork.get(ForeignId::new(1)), Some(Handle::new(0)));
        assert_eq!(fork.get(ForeignId::new(2)), Some(Handle::new(5)));

        let added = fork.without(&map);
        assert_eq!(added.len(), 1);
        assert_eq!(added.get(ForeignId::new(2)), Some(Handle::new(5)));
    }
}
