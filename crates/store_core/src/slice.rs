use std::collections::HashMap;
use std::hash::Hash;

/// Lifecycle of the most recent fetch for one collection view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Request status plus the last recorded error, as a projection result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestState {
    pub status: RequestStatus,
    pub last_error: Option<String>,
}

/// One entity type's partition of the store: an id-keyed mapping that
/// preserves first-insertion order for stable list rendering, the request
/// status for its collection view, and settlement bookkeeping.
///
/// Settlements are gated by a process-monotonic sequence number so that a
/// stale response arriving after a newer one settles can never overwrite
/// fresher data.
#[derive(Debug, Clone)]
pub struct CollectionState<K, T> {
    entries: HashMap<K, T>,
    insertion: Vec<K>,
    status: RequestStatus,
    last_error: Option<String>,
    last_settled_seq: u64,
}

impl<K, T> Default for CollectionState<K, T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            insertion: Vec::new(),
            status: RequestStatus::default(),
            last_error: None,
            last_settled_seq: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, T> CollectionState<K, T> {
    pub fn get(&self, id: &K) -> Option<&T> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &K) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    /// Entities in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.insertion.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }

    pub fn request_state(&self) -> RequestState {
        RequestState {
            status: self.status,
            last_error: self.last_error.clone(),
        }
    }

    /// `requested` phase: the fetch is about to start.
    pub(crate) fn begin(&mut self) {
        self.status = RequestStatus::Loading;
    }

    /// Returns true when a settlement tagged `seq` is allowed to apply.
    /// Advances the gate as a side effect, so out-of-order completions that
    /// arrive afterwards are rejected.
    pub(crate) fn try_settle(&mut self, seq: u64) -> bool {
        if seq > self.last_settled_seq {
            self.last_settled_seq = seq;
            true
        } else {
            false
        }
    }

    /// `fulfilled` phase for a list fetch: merge every entity keyed by id.
    /// Existing ids are updated in place, new ids appended, nothing is
    /// dropped.
    pub(crate) fn apply_fulfilled(&mut self, items: Vec<T>, key: impl Fn(&T) -> K) {
        for item in items {
            self.upsert(key(&item), item);
        }
        self.mark_succeeded();
    }

    pub(crate) fn mark_succeeded(&mut self) {
        self.status = RequestStatus::Succeeded;
        self.last_error = None;
    }

    /// `rejected` phase: record the failure, keep whatever entities we
    /// already have. Stale-but-available beats a cleared screen.
    pub(crate) fn apply_rejected(&mut self, error: String) {
        self.status = RequestStatus::Failed;
        self.last_error = Some(error);
    }

    /// Overwrite a single entity with the server's representation, appending
    /// it if it was unknown.
    pub(crate) fn upsert(&mut self, id: K, item: T) {
        if self.entries.insert(id.clone(), item).is_none() {
            self.insertion.push(id);
        }
    }

    /// Full slice reset (logout). The settlement gate survives so that a
    /// response from before the reset can never repopulate the slice.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.insertion.clear();
        self.status = RequestStatus::default();
        self.last_error = None;
    }
}

#[cfg(test)]
#[path = "tests/slice_tests.rs"]
mod tests;
