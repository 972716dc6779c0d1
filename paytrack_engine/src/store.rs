//! Persistence contract for the record collections.
//!
//! The ledger only needs a key-value store with three named slots.
//! Each slot holds one whole collection as a JSON value; writes
//! replace the slot, and a successful `set` is visible to the next
//! `get`.  No cross-slot transaction is required from the store.

use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// The named slots a [`SlotStore`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Employers,
    WorkEntries,
    Payments,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Employers, Slot::WorkEntries, Slot::Payments];

    /// Storage key, shared with the interchange document's field names.
    pub fn key(self) -> &'static str {
        match self {
            Slot::Employers => "employers",
            Slot::WorkEntries => "workEntries",
            Slot::Payments => "payments",
        }
    }
}

/// Stores must be `Send + Sync` so the HTTP shell can share one
/// between request handlers.
pub trait SlotStore: Send + Sync {
    /// Returns the slot's value, or `None` if nothing was stored yet.
    fn get(&self, slot: Slot) -> Result<Option<Value>>;
    fn set(&self, slot: Slot, value: Value) -> Result<()>;
}

/// Process-local store, mostly for tests.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemoryStore {
    fn get(&self, slot: Slot) -> Result<Option<Value>> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slots.get(&slot).cloned())
    }

    fn set(&self, slot: Slot, value: Value) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.insert(slot, value);
        Ok(())
    }
}

/// Keeps each slot in `<dir>/<key>.json`.
///
/// Writes go to `<key>.json.tmp` first and are renamed into place, so
/// an interrupted write never leaves a half-written slot file behind.
/// A missing file reads as an empty slot.  A file that does not parse
/// is logged and also read as empty, so a damaged slot never stops the
/// ledger from loading.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!("{}.json", slot.key()))
    }
}

impl SlotStore for JsonDirStore {
    fn get(&self, slot: Slot) -> Result<Option<Value>> {
        let path = self.path(slot);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&data) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!("failed to parse slot file {:?}: {}", path, err);
                Ok(None)
            }
        }
    }

    fn set(&self, slot: Slot, value: Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(slot);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&value)?)?;
        std::fs::rename(&tmp, &path)?;
        debug!("wrote slot {} to {:?}", slot.key(), path);
        Ok(())
    }
}
