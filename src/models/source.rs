use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::channels::{ChannelFile, ChannelMapping};
use crate::config::defaults::DEFAULT_PARSER;
use crate::utils::url::UrlUtils;

/// Parser id of the pre-parsed whole-file EPG snapshot format
pub const LEGACY_PARSER_ID: &str = "epg.dat";

/// Channel mapping location as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelsConfig {
    Single(String),
    Many(Vec<String>),
}

impl ChannelsConfig {
    pub fn locations(&self) -> Vec<String> {
        match self {
            Self::Single(location) => vec![location.clone()],
            Self::Many(locations) => locations.clone(),
        }
    }
}

/// Serialized form of a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub description: String,
    #[serde(default = "default_parser")]
    pub parser: String,
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<ChannelsConfig>,
}

fn default_parser() -> String {
    DEFAULT_PARSER.to_string()
}

/// One EPG feed: candidate URLs, the parser that reads them and the channel
/// mapping that ties feed channels to store services
pub struct Source {
    pub description: String,
    pub parser: String,
    /// URL currently being fetched
    pub url: String,
    /// Remaining candidates; failed URLs are removed
    pub urls: Vec<String>,
    pub channels: Box<dyn ChannelMapping>,
}

impl Source {
    pub fn new<D, P>(
        description: D,
        parser: P,
        urls: Vec<String>,
        channels: Box<dyn ChannelMapping>,
    ) -> Self
    where
        D: Into<String>,
        P: Into<String>,
    {
        Self {
            description: description.into(),
            parser: parser.into(),
            url: urls.first().cloned().unwrap_or_default(),
            urls,
            channels,
        }
    }

    pub fn from_config(config: &SourceConfig, channel_refresh_interval: Duration) -> Self {
        let locations = config
            .channels
            .as_ref()
            .map(ChannelsConfig::locations)
            .unwrap_or_default();
        let channels = ChannelFile::new(locations).with_refresh_interval(channel_refresh_interval);

        Self::new(
            config.description.clone(),
            config.parser.clone(),
            config.urls.clone(),
            Box::new(channels),
        )
    }

    /// A source can be fetched while it has remote candidates left or when
    /// its current locator is a local path
    pub fn is_fetchable(&self) -> bool {
        !self.urls.is_empty() || (!self.url.is_empty() && !UrlUtils::is_remote(&self.url))
    }

    pub fn is_legacy_format(&self) -> bool {
        self.parser == LEGACY_PARSER_ID
    }

    /// Remove a failed URL from the candidates
    pub fn discard_url(&mut self, url: &str) {
        self.urls.retain(|candidate| candidate != url);
    }

    /// Switch to a random remaining candidate, `None` once exhausted
    pub fn pick_alternative<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&str> {
        let next = self.urls.choose(rng)?.clone();
        self.url = next;
        Some(&self.url)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("description", &self.description)
            .field("parser", &self.parser)
            .field("url", &UrlUtils::obfuscate_credentials(&self.url))
            .field("urls", &self.urls.len())
            .finish_non_exhaustive()
    }
}
