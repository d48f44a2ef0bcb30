use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::backend::{ExecutionBackend, ParseJob};
use super::commit::Committer;
use super::fetch::{Fetcher, PrimaryInput};
use super::legacy;
use super::queue::SourceQueue;
use super::status::{ImportPhase, StatusReceiver, StatusReporter};
use crate::channels::{AcceptAll, ChannelFilter};
use crate::config::{Config, ImportConfig};
use crate::errors::ImportResult;
use crate::models::Source;
use crate::parsers::ParserRegistry;
use crate::storage::{lock, SharedStore, StorageAdapter};
use crate::utils::{DiskStorageLocator, Downloader, HttpDownloader, StorageLocator};

/// Result of one import run, handed to the completion callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCompletion {
    /// The store could not pick up the new data in-process
    pub reboot: bool,
    /// Legacy EPG file written during the run, if any
    pub epg_file: Option<PathBuf>,
    /// Events dispatched to the store, rejected ones included
    pub event_count: u64,
}

pub type DoneCallback = Arc<dyn Fn(&ImportCompletion) + Send + Sync>;

/// Mutable state of a run between `begin_import` and `close_import`
struct RunState {
    backend: ExecutionBackend,
    event_count: u64,
    current_source: Option<String>,
    reader: Option<PrimaryInput>,
    /// Lost when a parse worker dies
    committer: Option<Committer>,
}

/// Drives queued sources through fetch, parse and commit into an EPG store
pub struct EpgImporter {
    store: SharedStore,
    config: ImportConfig,
    queue: SourceQueue,
    fetcher: Fetcher,
    parsers: ParserRegistry,
    filter: Arc<dyn ChannelFilter>,
    rng: StdRng,
    on_done: Option<DoneCallback>,
    status: StatusReporter,
    state: Option<RunState>,
}

impl EpgImporter {
    pub fn new(store: SharedStore, config: &Config) -> ImportResult<Self> {
        let downloader: Arc<dyn Downloader> =
            Arc::new(HttpDownloader::from_config(&config.download)?);
        let locator: Arc<dyn StorageLocator> =
            Arc::new(DiskStorageLocator::from_config(&config.scratch));

        Ok(Self {
            store,
            config: config.import.clone(),
            queue: SourceQueue::new(config.import.queue_order),
            fetcher: Fetcher::new(downloader, locator, &config.scratch),
            parsers: ParserRegistry::new(),
            filter: Arc::new(AcceptAll),
            rng: StdRng::from_os_rng(),
            on_done: None,
            status: StatusReporter::new(),
            state: None,
        })
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.fetcher.set_downloader(downloader);
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn StorageLocator>) -> Self {
        self.fetcher.set_locator(locator);
        self
    }

    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn with_filter<F: ChannelFilter + 'static>(mut self, filter: F) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Make URL failover picks reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn on_done<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ImportCompletion) + Send + Sync + 'static,
    {
        self.on_done = Some(Arc::new(callback));
        self
    }

    pub fn queue_source(&mut self, source: Source) {
        self.queue.push(source);
    }

    pub fn queue_sources<I: IntoIterator<Item = Source>>(&mut self, sources: I) {
        self.queue.extend(sources);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn subscribe(&self) -> StatusReceiver {
        self.status.subscribe()
    }

    /// `None` when no run is open
    pub fn event_count(&self) -> Option<u64> {
        self.state.as_ref().map(|state| state.event_count)
    }

    pub fn is_import_running(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.current_source.is_some())
    }

    /// Run an import over every queued source
    ///
    /// `long_desc_until` is a unix timestamp; events starting later lose
    /// their long description. Defaults to now plus the configured horizon.
    pub async fn begin_import(&mut self, long_desc_until: Option<i64>) -> Option<ImportCompletion> {
        if self.state.is_some() {
            warn!("Import already in progress");
            return None;
        }

        let long_desc_until = long_desc_until.unwrap_or_else(|| {
            let horizon = i64::try_from(self.config.long_description_horizon.as_secs())
                .unwrap_or(i64::MAX);
            Utc::now().timestamp().saturating_add(horizon)
        });

        let adapter = match StorageAdapter::resolve(&self.store) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("Failed to inspect EPG store: {}", e);
                None
            }
        };

        let backend = ExecutionBackend::select(self.config.execution_mode);
        info!(
            "Starting import of {} sources ({:?} mode)",
            self.queue.len(),
            backend
        );

        self.state = Some(RunState {
            backend,
            event_count: 0,
            current_source: None,
            reader: None,
            committer: adapter.map(|adapter| Committer::new(adapter, long_desc_until)),
        });
        self.status.set_event_count(Some(0));

        if self.state.as_ref().is_some_and(|state| state.committer.is_none()) {
            error!("EPG store offers no way to import events, nothing imported");
            return self.close_import();
        }

        loop {
            if let Some(completion) = self.next_import().await {
                return Some(completion);
            }
        }
    }

    /// Advance to the next queued source
    ///
    /// Returns the completion once the queue is empty and the run closed.
    pub async fn next_import(&mut self) -> Option<ImportCompletion> {
        self.close_reader();

        let state = self.state.as_mut()?;
        state.current_source = None;

        if state.committer.is_none() {
            let skipped = self.queue.clear();
            if skipped > 0 {
                warn!("Skipping {} remaining sources", skipped);
            }
        }

        match self.queue.pop() {
            Some(source) => {
                self.process_source(source).await;
                None
            }
            None => self.close_import(),
        }
    }

    async fn process_source(&mut self, mut source: Source) {
        let description = source.description.clone();
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.current_source = Some(description.clone());
        let backend = state.backend;

        self.status
            .set_phase(ImportPhase::FetchingPrimary, Some(&description));
        info!("Importing '{}'", description);

        if !source.is_fetchable() {
            warn!("Source '{}' has nothing to fetch, skipping", description);
            return;
        }

        let Some(input) = self.fetcher.fetch_primary(&mut source, &mut self.rng).await else {
            return;
        };

        if source.is_legacy_format() {
            let result = backend
                .run_legacy(
                    SharedStore::clone(&self.store),
                    input.path().to_path_buf(),
                    self.config.legacy_epg_path.clone(),
                )
                .await;
            if let Err(e) = result {
                error!("Failed to import snapshot for '{}': {}", description, e);
            }
            self.set_reader(input);
            return;
        }

        if !source.channels.downloadables().is_empty() {
            self.status
                .set_phase(ImportPhase::FetchingChannels, Some(&description));
        }
        let channel_file = self.fetcher.fetch_channels(&source, &mut self.rng).await;

        let parser = match self.parsers.create(&source.parser) {
            Ok(parser) => parser,
            Err(e) => {
                error!("Cannot import '{}': {}", description, e);
                self.set_reader(input);
                return;
            }
        };

        let Some(committer) = self.state.as_mut().and_then(|state| state.committer.take()) else {
            return;
        };

        self.status.set_phase(ImportPhase::Parsing, Some(&description));
        let job = ParseJob {
            source,
            parser,
            filter: Arc::clone(&self.filter),
            input,
            channel_file,
            committer,
            status: self.status.clone(),
        };

        match backend.run(job).await {
            Ok(outcome) => {
                if let Err(e) = &outcome.result {
                    warn!("Abandoning '{}': {}", description, e);
                }
                let count = outcome.committer.event_count();
                info!("'{}' done, {} events so far", description, count);
                if let Some(state) = self.state.as_mut() {
                    state.event_count = count;
                    state.committer = Some(outcome.committer);
                    state.reader = outcome.input;
                }
                self.status.set_event_count(Some(count));
            }
            Err(e) => error!("Lost import of '{}': {}", description, e),
        }
    }

    fn set_reader(&mut self, input: PrimaryInput) {
        if let Some(state) = self.state.as_mut() {
            state.reader = Some(input);
        }
    }

    /// Release the current source's input; no-op when nothing is open
    pub fn close_reader(&mut self) {
        if let Some(input) = self.state.as_mut().and_then(|state| state.reader.take()) {
            debug!("Closing {}", input.path().display());
        }
    }

    /// Finish the run and fire the completion callback
    ///
    /// Returns `None` when no run is open.
    pub fn close_import(&mut self) -> Option<ImportCompletion> {
        self.close_reader();
        let state = self.state.take()?;

        let event_count = state.event_count;
        info!("Imported {} events", event_count);

        let mut epg_file = None;
        if let Some(committer) = state.committer {
            let mut adapter = committer.into_adapter();
            if let Err(e) = adapter.finish() {
                error!("Failed to finish writing EPG data: {}", e);
            }
            epg_file = adapter.need_load();
        }

        let mut reboot = false;
        if event_count > 0 {
            if let Some(file) = &epg_file {
                reboot = true;
                info!("Reloading {}", file.display());
                match legacy::reload_epg_file(&self.store, file, &self.config.legacy_epg_path) {
                    Ok(()) => reboot = false,
                    Err(e) => error!("Reload of {} failed: {}", file.display(), e),
                }
            }
        } else {
            self.mark_time_updated();
        }

        let completion = ImportCompletion {
            reboot,
            epg_file,
            event_count,
        };
        if let Some(on_done) = &self.on_done {
            on_done(&completion);
        }

        self.status.set_event_count(None);
        self.status.set_phase(ImportPhase::Done, None);
        info!("Import finished (reboot required: {})", reboot);
        Some(completion)
    }

    fn mark_time_updated(&self) {
        let result = lock(&self.store).and_then(|mut store| {
            if store.capabilities().time_updated {
                store.time_updated()
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            warn!("Failed to refresh store timestamp: {}", e);
        }
    }
}
