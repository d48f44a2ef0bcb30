use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{EpgStore, StoreCapabilities};
use crate::errors::{StoreError, StoreResult};
use crate::models::{EventData, ServiceRef};

#[derive(Serialize)]
struct JsonLine<'a> {
    services: &'a [ServiceRef],
    #[serde(flatten)]
    event: &'a EventData,
}

/// Batch store writing one JSON object per event
pub struct JsonLinesStore {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonLinesStore {
    pub fn create<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(File::create(&path)?);
        debug!("Writing events to {}", path.display());
        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> StoreResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl EpgStore for JsonLinesStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            batch_import: true,
            time_updated: true,
            ..Default::default()
        }
    }

    fn import_events(&mut self, services: &[ServiceRef], events: &[EventData]) -> StoreResult<()> {
        for event in events {
            let line = serde_json::to_string(&JsonLine { services, event })
                .map_err(|e| StoreError::rejected(format!("Failed to encode event: {e}")))?;
            writeln!(self.writer, "{line}")?;
            self.written += 1;
        }
        Ok(())
    }

    fn time_updated(&mut self) -> StoreResult<()> {
        info!("No new events, {} left unchanged", self.path.display());
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut store = JsonLinesStore::create(&path).unwrap();

        let event = EventData {
            start: 100,
            duration: 60,
            title: "News".to_string(),
            subtitle: String::new(),
            long_description: String::new(),
            genre: None,
        };
        store
            .import_events(&["1:0:1:A".to_string()], &[event.clone(), event])
            .unwrap();
        store.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(store.written(), 2);
        assert_eq!(lines[0]["services"][0], "1:0:1:A");
        assert_eq!(lines[0]["title"], "News");
        assert_eq!(lines[0]["duration"], 60);
    }
}
