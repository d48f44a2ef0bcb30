use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use super::{lock, LegacyFileImporter, SharedStore};
use crate::errors::StoreResult;
use crate::models::{EventData, ServiceRef};

/// Import path a run is bound to, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportCapability {
    BatchImport,
    PerServiceImport,
    LegacyFileLoad,
}

/// The single import path resolved for one run
pub enum StorageAdapter {
    Batch(SharedStore),
    /// Fans each batch out into one call per service
    PerService(SharedStore),
    LegacyFile(Box<dyn LegacyFileImporter>),
}

impl StorageAdapter {
    /// Bind to the best import path the store offers, `None` if it has none
    pub fn resolve(store: &SharedStore) -> StoreResult<Option<Self>> {
        let mut guard = lock(store)?;
        let caps = guard.capabilities();

        let adapter = if caps.batch_import {
            Some(Self::Batch(SharedStore::clone(store)))
        } else if caps.per_service_import {
            Some(Self::PerService(SharedStore::clone(store)))
        } else {
            guard.legacy_importer().map(Self::LegacyFile)
        };

        if let Some(adapter) = &adapter {
            debug!("Storage adapter resolved to {:?}", adapter.capability());
        }
        Ok(adapter)
    }

    pub fn capability(&self) -> ImportCapability {
        match self {
            Self::Batch(_) => ImportCapability::BatchImport,
            Self::PerService(_) => ImportCapability::PerServiceImport,
            Self::LegacyFile(_) => ImportCapability::LegacyFileLoad,
        }
    }

    pub fn import_events(&mut self, services: &[ServiceRef], events: &[EventData]) -> StoreResult<()> {
        match self {
            Self::Batch(store) => lock(store)?.import_events(services, events),
            Self::PerService(store) => {
                let mut guard = lock(store)?;
                for service in services {
                    guard.import_event(service, events)?;
                }
                Ok(())
            }
            Self::LegacyFile(importer) => importer.import_events(services, events),
        }
    }

    /// Legacy file the store has to reload once the run is over
    pub fn need_load(&self) -> Option<PathBuf> {
        match self {
            Self::LegacyFile(importer) => Some(importer.epg_file()),
            _ => None,
        }
    }

    pub fn finish(&mut self) -> StoreResult<()> {
        match self {
            Self::LegacyFile(importer) => importer.finish(),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageAdapter")
            .field(&self.capability())
            .finish()
    }
}
