//! EPG store contract
//!
//! The store is owned by the host application. It advertises what it can do
//! through [`StoreCapabilities`]; the import run binds to exactly one import
//! path through [`StorageAdapter`] when it starts.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{StoreError, StoreResult};
use crate::models::{EventData, ServiceRef};

pub mod adapter;
pub mod jsonl;

pub use adapter::{ImportCapability, StorageAdapter};
pub use jsonl::JsonLinesStore;

/// Explicit feature flags of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// `import_events` accepts several services at once
    pub batch_import: bool,
    /// `import_event` accepts one service per call
    pub per_service_import: bool,
    /// `load` reloads the legacy EPG file in-process
    pub load: bool,
    /// `time_updated` refreshes the store's freshness marker
    pub time_updated: bool,
}

pub trait EpgStore: Send {
    fn capabilities(&self) -> StoreCapabilities;

    fn import_events(&mut self, _services: &[ServiceRef], _events: &[EventData]) -> StoreResult<()> {
        Err(StoreError::Unsupported {
            operation: "import_events",
        })
    }

    fn import_event(&mut self, _service: &str, _events: &[EventData]) -> StoreResult<()> {
        Err(StoreError::Unsupported {
            operation: "import_event",
        })
    }

    /// Reload the legacy EPG file from its well-known location
    fn load(&mut self) -> StoreResult<()> {
        Err(StoreError::Unsupported { operation: "load" })
    }

    fn time_updated(&mut self) -> StoreResult<()> {
        Err(StoreError::Unsupported {
            operation: "time_updated",
        })
    }

    /// Writer for stores that only ingest through a legacy EPG file
    fn legacy_importer(&mut self) -> Option<Box<dyn LegacyFileImporter>> {
        None
    }
}

/// Writes events into a legacy EPG file that the store loads afterwards
pub trait LegacyFileImporter: Send {
    fn import_events(&mut self, services: &[ServiceRef], events: &[EventData]) -> StoreResult<()>;

    /// File the events end up in
    fn epg_file(&self) -> PathBuf;

    /// Flush and close the file before it is loaded
    fn finish(&mut self) -> StoreResult<()>;
}

/// Store handle shared between the controller and the committer
pub type SharedStore = Arc<Mutex<dyn EpgStore>>;

pub fn shared<S: EpgStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

pub(crate) fn lock(store: &SharedStore) -> StoreResult<MutexGuard<'_, dyn EpgStore + 'static>> {
    store
        .lock()
        .map_err(|_| StoreError::rejected("store lock poisoned"))
}
