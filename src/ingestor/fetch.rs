use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ScratchConfig;
use crate::errors::{ImportError, ImportResult};
use crate::models::Source;
use crate::utils::url::UrlUtils;
use crate::utils::{Downloader, ScratchFile, StorageLocator};

/// Primary content of a source, ready to be opened
#[derive(Debug)]
pub enum PrimaryInput {
    /// Host file used in place; never deleted
    Local(PathBuf),
    Downloaded(ScratchFile),
}

impl PrimaryInput {
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Downloaded(file) => file.path(),
        }
    }
}

/// Resolves primary and channel files for a source
pub struct Fetcher {
    downloader: Arc<dyn Downloader>,
    locator: Arc<dyn StorageLocator>,
    min_free_bytes: u64,
    file_stem: String,
}

impl Fetcher {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        locator: Arc<dyn StorageLocator>,
        scratch: &ScratchConfig,
    ) -> Self {
        Self {
            downloader,
            locator,
            min_free_bytes: scratch.min_free_bytes,
            file_stem: scratch.file_stem.clone(),
        }
    }

    pub fn set_downloader(&mut self, downloader: Arc<dyn Downloader>) {
        self.downloader = downloader;
    }

    pub fn set_locator(&mut self, locator: Arc<dyn StorageLocator>) {
        self.locator = locator;
    }

    fn scratch_name(&self, suffix: &str, url: &str) -> String {
        let mut name = format!("{}{}", self.file_stem, suffix);
        if UrlUtils::has_gzip_suffix(url) {
            name.push_str(".gz");
        }
        name
    }

    /// Download `url` into scratch storage; empty results count as failures
    async fn download(&self, url: &str, name: &str) -> ImportResult<ScratchFile> {
        let destination = self.locator.locate(self.min_free_bytes).join(name);
        // owns the destination from the start so a broken transfer is removed
        let scratch = ScratchFile::new(destination.clone());
        let written = self.downloader.fetch(url, &destination).await?;
        let file = if written == destination {
            scratch
        } else {
            ScratchFile::new(written)
        };

        let size = non_empty_size(file.path()).await?;
        debug!("Downloaded {} bytes to {}", size, file.path().display());
        Ok(file)
    }

    /// Fetch the primary content, failing over across the source's URLs
    ///
    /// Failed URLs are removed from `source.urls`. Local paths go through
    /// the same checks as downloads. `None` means every candidate failed and
    /// the source should be abandoned.
    pub async fn fetch_primary<R: Rng>(
        &self,
        source: &mut Source,
        rng: &mut R,
    ) -> Option<PrimaryInput> {
        loop {
            let url = source.url.clone();
            if url.is_empty() {
                warn!("Source '{}' has no URL to fetch", source.description);
                return None;
            }

            let fetched = if UrlUtils::is_remote(&url) {
                let safe_url = UrlUtils::obfuscate_credentials(&url);
                info!("Downloading '{}' from {}", source.description, safe_url);
                self.download(&url, &self.scratch_name("", &url))
                    .await
                    .map(PrimaryInput::Downloaded)
            } else {
                debug!("Using local file {} for '{}'", url, source.description);
                let path = PathBuf::from(&url);
                non_empty_size(&path).await.map(|_| PrimaryInput::Local(path))
            };

            match fetched {
                Ok(input) => return Some(input),
                Err(e) => {
                    warn!("Fetch of '{}' failed: {}", source.description, e);
                    source.discard_url(&url);
                    match source.pick_alternative(rng) {
                        Some(next) => info!(
                            "Attempting alternative URL {}",
                            UrlUtils::obfuscate_credentials(next)
                        ),
                        None => {
                            warn!(
                                "No more alternatives for '{}', skipping source",
                                source.description
                            );
                            return None;
                        }
                    }
                }
            }
        }
    }

    /// Download one of the channel files the source's mapping asks for
    ///
    /// Candidates are tried in random order. `None` when nothing needed
    /// downloading or every candidate failed.
    pub async fn fetch_channels<R: Rng>(
        &self,
        source: &Source,
        rng: &mut R,
    ) -> Option<ScratchFile> {
        let mut candidates = source.channels.downloadables();

        while !candidates.is_empty() {
            let url = candidates.swap_remove(rng.random_range(0..candidates.len()));
            let safe_url = UrlUtils::obfuscate_credentials(&url);
            debug!("Downloading channels for '{}' from {}", source.description, safe_url);

            match self.download(&url, &self.scratch_name(".channels", &url)).await {
                Ok(file) => return Some(file),
                Err(e) => warn!("Channel download {} failed: {}", safe_url, e),
            }
        }

        None
    }
}

/// Size of `path`; missing and empty files are both failures
async fn non_empty_size(path: &Path) -> ImportResult<u64> {
    let size = tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);
    if size == 0 {
        return Err(ImportError::EmptyDownload {
            path: path.to_path_buf(),
        });
    }
    Ok(size)
}
