use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use super::{ChannelFilter, ChannelMap, ChannelMapping};
use crate::config::defaults::DEFAULT_CHANNEL_REFRESH_INTERVAL;
use crate::errors::{ImportError, ImportResult};
use crate::utils::DecompressionService;
use crate::utils::url::UrlUtils;
use crate::utils::xml_text::{decode_text, resolve_reference};

/// Channel mapping backed by a `<channels>` XML document
///
/// ```xml
/// <channels>
///   <channel id="bbc1.uk">1:0:1:1B1D:802:2:11A0000:0:0:0:</channel>
/// </channels>
/// ```
///
/// The document is either a local file, reparsed whenever its mtime moves,
/// or one of several mirrored URLs that the fetch stage downloads when the
/// last copy is older than the refresh interval.
pub struct ChannelFile {
    locations: Vec<String>,
    items: Arc<ChannelMap>,
    refresh_interval: Duration,
    local_mtime: Option<SystemTime>,
    downloaded_at: Option<SystemTime>,
}

impl ChannelFile {
    pub fn new(locations: Vec<String>) -> Self {
        Self {
            locations,
            items: Arc::new(ChannelMap::new()),
            refresh_interval: humantime::parse_duration(DEFAULT_CHANNEL_REFRESH_INTERVAL)
                .unwrap_or(Duration::from_secs(24 * 3600)),
            local_mtime: None,
            downloaded_at: None,
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    fn local_path(&self) -> Option<PathBuf> {
        self.locations
            .iter()
            .find(|location| !UrlUtils::is_remote(location))
            .map(PathBuf::from)
    }

    fn reload(&mut self, filter: &dyn ChannelFilter, path: &Path) {
        match parse_channel_file(path, filter) {
            Ok(map) => {
                info!(
                    "Loaded {} channel ids from {}",
                    map.len(),
                    path.display()
                );
                self.items = Arc::new(map);
            }
            Err(e) => warn!(
                "Keeping previous channel mapping, failed to parse {}: {}",
                path.display(),
                e
            ),
        }
    }
}

impl ChannelMapping for ChannelFile {
    fn update(&mut self, filter: &dyn ChannelFilter, downloaded: Option<&Path>) -> ImportResult<()> {
        if let Some(path) = downloaded {
            self.downloaded_at = Some(SystemTime::now());
            self.reload(filter, path);
            return Ok(());
        }

        let Some(local) = self.local_path() else {
            return Ok(());
        };

        let mtime = std::fs::metadata(&local)?.modified()?;
        if self.local_mtime != Some(mtime) {
            debug!("Channel file {} changed, reparsing", local.display());
            self.reload(filter, &local);
            self.local_mtime = Some(mtime);
        }
        Ok(())
    }

    fn items(&self) -> Arc<ChannelMap> {
        Arc::clone(&self.items)
    }

    fn downloadables(&self) -> Vec<String> {
        if self.local_path().is_some() {
            return Vec::new();
        }

        let stale = match self.downloaded_at {
            None => true,
            Some(at) => at
                .elapsed()
                .map(|age| age >= self.refresh_interval)
                .unwrap_or(true),
        };
        if !stale {
            return Vec::new();
        }

        self.locations
            .iter()
            .filter(|location| UrlUtils::is_remote(location))
            .cloned()
            .collect()
    }
}

fn channel_id(element: &BytesStart<'_>) -> Result<String, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {e}"))?;
        if attr.key.as_ref() == b"id" {
            return Ok(decode_text(&attr.value)?.to_lowercase());
        }
    }
    Ok(String::new())
}

/// Parse a channel document into a fresh map, dropping filtered services
pub fn parse_channel_file(path: &Path, filter: &dyn ChannelFilter) -> ImportResult<ChannelMap> {
    let context = path.display().to_string();
    let mut reader = Reader::from_reader(DecompressionService::open_reader(path)?);

    let mut buf = Vec::new();
    let mut map = ChannelMap::new();
    let mut current_id: Option<String> = None;
    let mut text = String::new();
    let mut filtered = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"channel" => {
                current_id = Some(channel_id(&e).map_err(|m| ImportError::parse(&context, m))?);
                text.clear();
            }
            Ok(Event::Text(e)) if current_id.is_some() => {
                text.push_str(&decode_text(&e).map_err(|m| ImportError::parse(&context, m))?);
            }
            Ok(Event::GeneralRef(e)) if current_id.is_some() => {
                text.push_str(&resolve_reference(&e));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"channel" => {
                if let Some(id) = current_id.take() {
                    let service = text.trim();
                    if id.is_empty() || service.is_empty() {
                        debug!("Ignoring incomplete channel entry '{}' in {}", id, context);
                    } else if filter.accepts(service) {
                        map.insert(id, service);
                    } else {
                        filtered += 1;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ImportError::parse(
                    &context,
                    format!("XML error at position {}: {}", reader.buffer_position(), e),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if filtered > 0 {
        debug!("{} services filtered out of {}", filtered, context);
    }
    Ok(map)
}
