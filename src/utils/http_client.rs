use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::DownloadConfig;
use crate::errors::{ImportError, ImportResult};
use crate::utils::url::UrlUtils;

/// Asynchronous download primitive used for feeds and channel files
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` into `destination` and return the written path
    async fn fetch(&self, url: &str, destination: &Path) -> ImportResult<PathBuf>;
}

/// reqwest based downloader that streams the body straight to disk
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create new downloader with connection timeout only
    pub fn new() -> ImportResult<Self> {
        Self::with_connection_timeout(Duration::from_secs(10), None)
    }

    pub fn from_config(config: &DownloadConfig) -> ImportResult<Self> {
        Self::with_connection_timeout(config.connect_timeout, Some(&config.user_agent))
    }

    /// Only the connection is bounded; large guides may take a while to transfer
    pub fn with_connection_timeout(
        connect_timeout: Duration,
        user_agent: Option<&str>,
    ) -> ImportResult<Self> {
        let mut builder = Client::builder().connect_timeout(connect_timeout);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder
            .build()
            .map_err(|e| ImportError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn write_body(
        response: &mut reqwest::Response,
        url: &str,
        destination: &Path,
    ) -> ImportResult<u64> {
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::transport_error(url, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    fn transport_error(url: &str, error: reqwest::Error) -> ImportError {
        let message = UrlUtils::obfuscate_credentials(&error.to_string());
        ImportError::fetch(UrlUtils::obfuscate_credentials(url), message)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str, destination: &Path) -> ImportResult<PathBuf> {
        let safe_url = UrlUtils::obfuscate_credentials(url);

        if url.trim_start().to_ascii_lowercase().starts_with("ftp:") {
            return Err(ImportError::fetch(safe_url, "ftp downloads are not supported"));
        }

        debug!("Downloading {} to {}", safe_url, destination.display());

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        if !response.status().is_success() {
            return Err(ImportError::fetch(
                safe_url,
                format!(
                    "HTTP error: {} {}",
                    response.status().as_u16(),
                    response.status().canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let written = match Self::write_body(&mut response, url, destination).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove) = tokio::fs::remove_file(destination).await {
                    debug!("Partial download {} not removed: {}", destination.display(), remove);
                }
                return Err(e);
            }
        };

        debug!("Downloaded {} bytes from {}", written, safe_url);
        Ok(destination.to_path_buf())
    }
}
