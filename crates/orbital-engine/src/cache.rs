//! Identity-keyed cache with an explicit diff step.
//!
//! `reconcile` replaces the framework-bound collection the pattern usually
//! hides behind: one call per refresh pass takes the full incoming
//! snapshot and yields an ordered delta batch, removals first, with
//! existing entities updated in place so their object identity survives.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entity::ViewEntity;
use crate::sink::Delta;

pub struct ResourceCache<E: ViewEntity> {
    entries: HashMap<String, Arc<E>>,
}

impl<E: ViewEntity> Default for ResourceCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ViewEntity> ResourceCache<E> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Diff a full snapshot against the cached set.
    ///
    /// Emits `Removed` for every cached identity absent from the snapshot
    /// (before any addition), `Added` for new identities and `Updated` for
    /// survivors after their record has been swapped in place. After the
    /// call the cached identity set equals the snapshot's exactly.
    pub fn reconcile(&mut self, records: Vec<E::Record>) -> Vec<Delta<E>> {
        let incoming: HashSet<&str> = records.iter().map(|r| E::record_id(r)).collect();

        let mut deltas = Vec::with_capacity(records.len());

        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !incoming.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.entries.remove(&id);
            deltas.push(Delta::Removed(id));
        }

        for record in records {
            let id = E::record_id(&record).to_string();
            match self.entries.get(&id) {
                Some(existing) => {
                    existing.apply(record);
                    deltas.push(Delta::Updated(Arc::clone(existing)));
                }
                None => {
                    let entity = Arc::new(E::from_record(record));
                    self.entries.insert(id, Arc::clone(&entity));
                    deltas.push(Delta::Added(entity));
                }
            }
        }

        deltas
    }

    pub fn get(&self, id: &str) -> Option<Arc<E>> {
        self.entries.get(id).cloned()
    }

    pub fn entities(&self) -> Vec<Arc<E>> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
