//! Execution backends for the parse-and-commit loop
//!
//! [`ExecutionBackend::Worker`] runs a whole source on the blocking pool.
//! [`ExecutionBackend::Cooperative`] stays on the calling task and yields
//! to the scheduler after every parse step, so a current-thread runtime is
//! never blocked for longer than one step.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use super::commit::Committer;
use super::fetch::PrimaryInput;
use super::legacy;
use super::status::{ImportPhase, StatusReporter};
use crate::channels::ChannelFilter;
use crate::errors::{ImportError, ImportResult};
use crate::models::Source;
use crate::parsers::{EpgParser, EventStream};
use crate::storage::SharedStore;
use crate::utils::{DecompressionService, ScratchFile};

/// Configured execution mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Cooperative on a current-thread runtime, worker otherwise
    #[default]
    Auto,
    Worker,
    Cooperative,
}

/// Everything one source needs to be parsed and committed
pub struct ParseJob {
    pub source: Source,
    pub parser: Box<dyn EpgParser>,
    pub filter: Arc<dyn ChannelFilter>,
    pub input: PrimaryInput,
    pub channel_file: Option<ScratchFile>,
    pub committer: Committer,
    pub status: StatusReporter,
}

/// What a finished job hands back to the controller
pub struct JobOutcome {
    pub committer: Committer,
    /// Primary input still open; the worker releases its own before returning
    pub input: Option<PrimaryInput>,
    /// `Err` when the source was abandoned before its events were read
    pub result: ImportResult<()>,
}

impl ParseJob {
    /// Resolve channels and open the event stream
    pub fn prepare(&mut self) -> ImportResult<EventStream> {
        let downloaded = self.channel_file.as_ref().map(ScratchFile::path);
        if let Err(e) = self.source.channels.update(self.filter.as_ref(), downloaded) {
            warn!(
                "Channel mapping update for '{}' failed, using existing mapping: {}",
                self.source.description, e
            );
        }

        let items = self.source.channels.items();
        debug!(
            "'{}' maps {} channel ids",
            self.source.description,
            items.len()
        );

        let reader = DecompressionService::open_reader(self.input.path())?;
        self.parser.iterator(reader, items)
    }

    fn start_commit(&mut self) {
        self.channel_file = None;
        self.status
            .set_phase(ImportPhase::Committing, Some(&self.source.description));
    }

    fn finish(self, result: ImportResult<()>) -> JobOutcome {
        JobOutcome {
            committer: self.committer,
            input: Some(self.input),
            result,
        }
    }

    /// Run the job to completion on the current thread
    pub fn run_blocking(mut self) -> JobOutcome {
        let result = self.prepare().map(|stream| {
            self.start_commit();
            self.committer.drain(stream, &self.source.description);
        });
        let mut outcome = self.finish(result);
        if let Some(input) = outcome.input.take() {
            debug!("Worker closing {}", input.path().display());
        }
        outcome
    }

    /// Run the job one parse step per scheduler tick
    pub async fn run_stepped(mut self) -> JobOutcome {
        let mut stream = match self.prepare() {
            Ok(stream) => stream,
            Err(e) => return self.finish(Err(e)),
        };
        self.start_commit();

        while self.committer.apply(stream.next(), &self.source.description) {
            tokio::task::yield_now().await;
        }
        drop(stream);
        self.finish(Ok(()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionBackend {
    Cooperative,
    Worker,
}

impl ExecutionBackend {
    pub fn select(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Worker => Self::Worker,
            ExecutionMode::Cooperative => Self::Cooperative,
            ExecutionMode::Auto => match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() != RuntimeFlavor::CurrentThread => {
                    Self::Worker
                }
                _ => Self::Cooperative,
            },
        }
    }

    /// Parse and commit one source
    ///
    /// `Err` means the worker died and took the committer with it.
    pub async fn run(self, job: ParseJob) -> ImportResult<JobOutcome> {
        match self {
            Self::Cooperative => Ok(job.run_stepped().await),
            Self::Worker => tokio::task::spawn_blocking(move || job.run_blocking())
                .await
                .map_err(|e| ImportError::worker(format!("parse worker failed: {e}"))),
        }
    }

    /// Install and load a legacy snapshot
    pub async fn run_legacy(
        self,
        store: SharedStore,
        input: PathBuf,
        target: PathBuf,
    ) -> ImportResult<()> {
        match self {
            Self::Cooperative => legacy::import_snapshot(&store, &input, &target),
            Self::Worker => {
                tokio::task::spawn_blocking(move || legacy::import_snapshot(&store, &input, &target))
                    .await
                    .map_err(|e| ImportError::worker(format!("snapshot worker failed: {e}")))?
            }
        }
    }
}
