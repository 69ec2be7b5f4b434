// ABOUTME: Dedup/upsert gateway in front of the place store.
// ABOUTME: Answers "fetch this id?" before any avoidable work and batches staged records into one upsert.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::record::PlaceRecord;
use crate::store::PlaceStore;

pub struct DedupGateway<S> {
    store: S,
    staged: Vec<PlaceRecord>,
    /// Ids staged or written during this run.
    seen: HashSet<String>,
}

impl<S: PlaceStore> DedupGateway<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            staged: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// False when the id was already handled this run or exists in the store.
    ///
    /// A failing store lookup answers true: the upsert is idempotent, so
    /// fetching again costs time but never duplicates a record.
    pub fn should_fetch(&self, canonical_id: &str) -> bool {
        if self.seen.contains(canonical_id) {
            return false;
        }
        match self.store.exists(canonical_id) {
            Ok(exists) => !exists,
            Err(e) => {
                warn!(id = canonical_id, error = %e, "store lookup failed, fetching anyway");
                true
            }
        }
    }

    /// Queues a record for the next flush. A second record for the same id is ignored.
    pub fn stage(&mut self, record: PlaceRecord) -> bool {
        if !self.seen.insert(record.canonical_id.clone()) {
            debug!(id = %record.canonical_id, "already staged");
            return false;
        }
        self.staged.push(record);
        true
    }

    /// Writes all staged records in one upsert. Records stay staged if it fails.
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        if self.staged.is_empty() {
            return Ok(0);
        }
        let written = self.store.bulk_upsert(&self.staged)?;
        self.staged.clear();
        Ok(written)
    }
}
