use crate::storage::{Database, IndexRecord};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, error};

struct IndexState {
    /// Content hash → destination path of the file that owns it.
    known: HashMap<String, String>,
    /// Write-behind buffer of rows awaiting a durable commit.
    batch: Vec<IndexRecord>,
}

/// Duplicate-detection store shared by all workers.
///
/// One mutex guards the map and the batch together; this is what makes
/// check-then-insert atomic. The database sits behind its own lock, and a
/// flush writes a drained copy of the batch — readers calling `contains` or
/// `reserve` are never blocked by an in-flight commit.
pub struct HashIndex {
    state: Mutex<IndexState>,
    db: Mutex<Database>,
    batch_limit: usize,
}

impl HashIndex {
    /// Seed the in-memory index from the durable store.
    pub fn new(db: Database, batch_limit: usize) -> Result<Self, rusqlite::Error> {
        let known = db.load_hash_index()?;
        Ok(Self {
            state: Mutex::new(IndexState {
                known,
                batch: Vec::with_capacity(batch_limit),
            }),
            db: Mutex::new(db),
            batch_limit: batch_limit.max(1),
        })
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.state.lock().unwrap().known.contains_key(hash)
    }

    /// Atomically claim `hash` for `dest_path`. Returns the existing owner's
    /// destination path if the hash is already known, so of two workers
    /// racing on identical content exactly one wins and the other sees the
    /// duplicate. The claim happens before the physical copy completes.
    pub fn reserve(&self, hash: &str, dest_path: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.known.get(hash) {
            return Some(existing.clone());
        }
        state.known.insert(hash.to_string(), dest_path.to_string());
        None
    }

    /// Undo a reservation whose copy could not be committed, so a later
    /// occurrence of the same content can still be archived.
    pub fn release(&self, hash: &str) {
        self.state.lock().unwrap().known.remove(hash);
    }

    /// Buffer a durable-insert record; auto-flushes once the batch threshold
    /// is reached, to bound memory and the crash-loss window.
    pub fn enqueue(&self, record: IndexRecord) {
        let drained = {
            let mut state = self.state.lock().unwrap();
            state.batch.push(record);
            if state.batch.len() >= self.batch_limit {
                std::mem::take(&mut state.batch)
            } else {
                Vec::new()
            }
        };
        if !drained.is_empty() {
            self.commit(drained);
        }
    }

    /// Commit everything still buffered. Safe to call while other workers
    /// keep reserving and enqueuing.
    pub fn flush(&self) {
        let drained = std::mem::take(&mut self.state.lock().unwrap().batch);
        if !drained.is_empty() {
            self.commit(drained);
        }
    }

    fn commit(&self, drained: Vec<IndexRecord>) {
        let db = self.db.lock().unwrap();
        match db.insert_records(&drained) {
            Ok(inserted) => debug!("Flushed {} index records ({} new)", drained.len(), inserted),
            // Durable persistence is best-effort per batch; the in-memory
            // reservation already protects dedup correctness for this run.
            Err(e) => error!("Failed to flush {} index records: {}", drained.len(), e),
        }
    }

    pub fn known_count(&self) -> usize {
        self.state.lock().unwrap().known.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().batch.len()
    }
}
