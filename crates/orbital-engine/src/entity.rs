//! Long-lived, identity-keyed wrappers around the latest resource records.
//!
//! A view entity survives every refresh that still contains its id: only
//! the wrapped record is swapped in place, so derived presentation state
//! (expansion flag, live stats strings) carries across updates. Entities
//! are shared as `Arc`s between the engine cache, delta batches and stack
//! groups; interior locks keep reads cheap for a UI thread.

use orbital_common::{ContainerRecord, ContainerState, ImageRecord, NetworkRecord, VolumeRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::stats::StatsStrings;

/// Identity-keyed wrapper over a record, updatable in place.
pub trait ViewEntity: Send + Sync + 'static {
    type Record: Clone + PartialEq + Send + Sync + 'static;

    fn record_id(record: &Self::Record) -> &str;
    fn from_record(record: Self::Record) -> Self;
    fn id(&self) -> &str;
    fn apply(&self, record: Self::Record);
}

// Lock poisoning only happens if a reader/writer panicked mid-access; the
// record inside is still the last fully written value, so recover it.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ContainerEntity {
    id: String,
    record: RwLock<ContainerRecord>,
    expanded: AtomicBool,
    stats: RwLock<StatsStrings>,
}

impl ContainerEntity {
    pub fn record(&self) -> ContainerRecord {
        read_lock(&self.record).clone()
    }

    pub fn name(&self) -> String {
        read_lock(&self.record).name.clone()
    }

    pub fn image(&self) -> String {
        read_lock(&self.record).image.clone()
    }

    pub fn state(&self) -> ContainerState {
        read_lock(&self.record).state
    }

    pub fn stack_name(&self) -> Option<String> {
        read_lock(&self.record).stack_name().map(str::to_string)
    }

    pub fn service_name(&self) -> Option<String> {
        read_lock(&self.record).service_name().map(str::to_string)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.load(Ordering::Acquire)
    }

    /// Flip the expansion flag, returning the new state. The engine pairs
    /// this with starting or stopping the stats task.
    pub fn toggle_expanded(&self) -> bool {
        !self.expanded.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn stats(&self) -> StatsStrings {
        read_lock(&self.stats).clone()
    }

    pub fn set_stats(&self, stats: StatsStrings) {
        *write_lock(&self.stats) = stats;
    }

    pub fn clear_stats(&self) {
        *write_lock(&self.stats) = StatsStrings::default();
    }

    /// Read-side search predicate: case-insensitive substring match on
    /// name, image or id. Never mutates the cache.
    pub fn matches_search(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        let record = read_lock(&self.record);
        record.name.to_lowercase().contains(&query)
            || record.image.to_lowercase().contains(&query)
            || record.id.to_lowercase().contains(&query)
    }
}

impl ViewEntity for ContainerEntity {
    type Record = ContainerRecord;

    fn record_id(record: &ContainerRecord) -> &str {
        &record.id
    }

    fn from_record(record: ContainerRecord) -> Self {
        Self {
            id: record.id.clone(),
            record: RwLock::new(record),
            expanded: AtomicBool::new(false),
            stats: RwLock::new(StatsStrings::default()),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, record: ContainerRecord) {
        if record.id != self.id {
            return;
        }
        *write_lock(&self.record) = record;
    }
}

pub struct ImageEntity {
    id: String,
    record: RwLock<ImageRecord>,
}

impl ImageEntity {
    pub fn record(&self) -> ImageRecord {
        read_lock(&self.record).clone()
    }

    pub fn reference(&self) -> String {
        read_lock(&self.record).reference()
    }

    pub fn matches_search(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        let record = read_lock(&self.record);
        record.repository.to_lowercase().contains(&query)
            || record.tag.to_lowercase().contains(&query)
            || record.id.to_lowercase().contains(&query)
    }
}

impl ViewEntity for ImageEntity {
    type Record = ImageRecord;

    fn record_id(record: &ImageRecord) -> &str {
        &record.id
    }

    fn from_record(record: ImageRecord) -> Self {
        Self {
            id: record.id.clone(),
            record: RwLock::new(record),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, record: ImageRecord) {
        if record.id != self.id {
            return;
        }
        *write_lock(&self.record) = record;
    }
}

pub struct VolumeEntity {
    name: String,
    record: RwLock<VolumeRecord>,
}

impl VolumeEntity {
    pub fn record(&self) -> VolumeRecord {
        read_lock(&self.record).clone()
    }

    pub fn matches_search(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        let record = read_lock(&self.record);
        record.name.to_lowercase().contains(&query)
            || record.driver.to_lowercase().contains(&query)
    }
}

impl ViewEntity for VolumeEntity {
    type Record = VolumeRecord;

    fn record_id(record: &VolumeRecord) -> &str {
        &record.name
    }

    fn from_record(record: VolumeRecord) -> Self {
        Self {
            name: record.name.clone(),
            record: RwLock::new(record),
        }
    }

    fn id(&self) -> &str {
        &self.name
    }

    fn apply(&self, record: VolumeRecord) {
        if record.name != self.name {
            return;
        }
        *write_lock(&self.record) = record;
    }
}

pub struct NetworkEntity {
    id: String,
    record: RwLock<NetworkRecord>,
}

impl NetworkEntity {
    pub fn record(&self) -> NetworkRecord {
        read_lock(&self.record).clone()
    }

    pub fn is_builtin(&self) -> bool {
        read_lock(&self.record).is_builtin()
    }

    pub fn matches_search(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        let record = read_lock(&self.record);
        record.name.to_lowercase().contains(&query)
            || record.driver.to_lowercase().contains(&query)
            || record.id.to_lowercase().contains(&query)
    }
}

impl ViewEntity for NetworkEntity {
    type Record = NetworkRecord;

    fn record_id(record: &NetworkRecord) -> &str {
        &record.id
    }

    fn from_record(record: NetworkRecord) -> Self {
        Self {
            id: record.id.clone(),
            record: RwLock::new(record),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, record: NetworkRecord) {
        if record.id != self.id {
            return;
        }
        *write_lock(&self.record) = record;
    }
}
