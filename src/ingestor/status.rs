use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Idle,
    FetchingPrimary,
    FetchingChannels,
    Parsing,
    Committing,
    Done,
}

/// Snapshot of the running import
#[derive(Debug, Clone, Serialize)]
pub struct ImportStatus {
    pub phase: ImportPhase,
    pub source: Option<String>,
    pub event_count: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl ImportStatus {
    pub fn is_running(&self) -> bool {
        !matches!(self.phase, ImportPhase::Idle | ImportPhase::Done)
    }
}

impl Default for ImportStatus {
    fn default() -> Self {
        Self {
            phase: ImportPhase::Idle,
            source: None,
            event_count: None,
            updated_at: Utc::now(),
        }
    }
}

pub type StatusReceiver = watch::Receiver<ImportStatus>;

/// Publishes [`ImportStatus`] changes to any number of observers
///
/// Clones publish into the same channel, so a parse worker can report
/// progress of the source it owns.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<ImportStatus>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ImportStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> StatusReceiver {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ImportStatus {
        self.tx.borrow().clone()
    }

    pub fn set_phase(&self, phase: ImportPhase, source: Option<&str>) {
        self.tx.send_modify(|status| {
            status.phase = phase;
            status.source = source.map(str::to_string);
            status.updated_at = Utc::now();
        });
    }

    pub fn set_event_count(&self, event_count: Option<u64>) {
        self.tx.send_modify(|status| {
            status.event_count = event_count;
            status.updated_at = Utc::now();
        });
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
