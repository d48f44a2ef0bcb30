#![allow(dead_code)]

use async_trait::async_trait;
use epg_import::channels::{ChannelMap, FixedChannels};
use epg_import::config::Config;
use epg_import::errors::{ImportError, ImportResult, StoreError, StoreResult};
use epg_import::ingestor::{EpgImporter, ExecutionMode, ImportCompletion};
use epg_import::models::{EventData, ServiceRef, Source};
use epg_import::storage::{EpgStore, LegacyFileImporter, SharedStore, StoreCapabilities};
use epg_import::utils::{Downloader, FixedStorageLocator};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SERVICE: &str = "1:0:1:1B1D:802:2:11A0000:0:0:0:";

/// In-memory store with switchable capabilities
#[derive(Default)]
pub struct MemoryStore {
    pub caps: StoreCapabilities,
    pub events: Vec<(Vec<ServiceRef>, EventData)>,
    /// Titles the store refuses
    pub reject_titles: Vec<String>,
    pub time_updated_calls: usize,
    pub load_calls: usize,
    pub fail_load: bool,
    /// Directory a legacy importer writes its file into
    pub legacy_dir: Option<PathBuf>,
    pub legacy_events: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn batch() -> Self {
        Self {
            caps: StoreCapabilities {
                batch_import: true,
                time_updated: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn legacy(dir: &Path, can_load: bool, fail_load: bool) -> Self {
        Self {
            caps: StoreCapabilities {
                load: can_load,
                time_updated: true,
                ..Default::default()
            },
            fail_load,
            legacy_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.events.iter().map(|(_, e)| e.title.clone()).collect()
    }
}

impl EpgStore for MemoryStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.caps
    }

    fn import_events(&mut self, services: &[ServiceRef], events: &[EventData]) -> StoreResult<()> {
        for event in events {
            if self.reject_titles.contains(&event.title) {
                return Err(StoreError::rejected(format!("refusing '{}'", event.title)));
            }
            self.events.push((services.to_vec(), event.clone()));
        }
        Ok(())
    }

    fn load(&mut self) -> StoreResult<()> {
        self.load_calls += 1;
        if self.fail_load {
            return Err(StoreError::rejected("load() failed"));
        }
        Ok(())
    }

    fn time_updated(&mut self) -> StoreResult<()> {
        self.time_updated_calls += 1;
        Ok(())
    }

    fn legacy_importer(&mut self) -> Option<Box<dyn LegacyFileImporter>> {
        let dir = self.legacy_dir.clone()?;
        Some(Box::new(CountingLegacyFile {
            path: dir.join("epg.new"),
            count: Arc::clone(&self.legacy_events),
        }))
    }
}

/// Legacy importer that appends one line per event
struct CountingLegacyFile {
    path: PathBuf,
    count: Arc<Mutex<usize>>,
}

impl LegacyFileImporter for CountingLegacyFile {
    fn import_events(&mut self, services: &[ServiceRef], events: &[EventData]) -> StoreResult<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for event in events {
            writeln!(file, "{} {}", services.join(","), event.title)?;
            *self.count.lock().unwrap() += 1;
        }
        Ok(())
    }

    fn epg_file(&self) -> PathBuf {
        self.path.clone()
    }

    fn finish(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Serves canned bodies by URL; anything else fails
#[derive(Default)]
pub struct FakeDownloader {
    bodies: HashMap<String, Vec<u8>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn fetch(&self, url: &str, destination: &Path) -> ImportResult<PathBuf> {
        self.requested.lock().unwrap().push(url.to_string());
        let body = self
            .bodies
            .get(url)
            .ok_or_else(|| ImportError::fetch(url, "connection refused"))?;
        tokio::fs::write(destination, body).await?;
        Ok(destination.to_path_buf())
    }
}

pub struct Programme<'a> {
    pub channel: &'a str,
    pub start: i64,
    pub minutes: i64,
    pub title: &'a str,
}

fn xmltv_time(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .unwrap()
        .format("%Y%m%d%H%M%S +0000")
        .to_string()
}

/// Minimal XMLTV document; every programme carries the description "X"
pub fn guide(programmes: &[Programme<'_>]) -> String {
    let mut doc = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tv>\n");
    for p in programmes {
        doc.push_str(&format!(
            "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n    <title>{}</title>\n    <desc>X</desc>\n  </programme>\n",
            xmltv_time(p.start),
            xmltv_time(p.start + p.minutes * 60),
            p.channel,
            p.title
        ));
    }
    doc.push_str("</tv>\n");
    doc
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn channels(ids: &[&str]) -> Box<FixedChannels> {
    let map: ChannelMap = ids.iter().map(|id| (*id, SERVICE)).collect();
    Box::new(FixedChannels::new(map))
}

pub fn source(description: &str, urls: &[&str]) -> Source {
    Source::new(
        description,
        "xmltv",
        urls.iter().map(|u| u.to_string()).collect(),
        channels(&["bbc1.uk"]),
    )
}

pub fn test_config(dir: &TempDir, mode: ExecutionMode) -> Config {
    let mut config = Config::default();
    config.import.execution_mode = mode;
    config.import.legacy_epg_path = dir.path().join("epg.dat");
    config.scratch.default_path = dir.path().to_path_buf();
    config
}

/// Importer wired to a fake downloader and the temp dir, recording completions
pub fn importer(
    store: SharedStore,
    dir: &TempDir,
    mode: ExecutionMode,
    downloader: Arc<FakeDownloader>,
) -> (EpgImporter, Arc<Mutex<Vec<ImportCompletion>>>) {
    let completions = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&completions);

    let importer = EpgImporter::new(store, &test_config(dir, mode))
        .unwrap()
        .with_downloader(downloader)
        .with_locator(Arc::new(FixedStorageLocator(dir.path().to_path_buf())))
        .with_seed(42)
        .on_done(move |completion| recorded.lock().unwrap().push(completion.clone()));

    (importer, completions)
}
