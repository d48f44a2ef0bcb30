//! Channel mapping between feed channel ids and store service references
//!
//! XMLTV feeds identify channels by free-form ids (`bbc1.uk`), the store
//! by service references. A [`ChannelMapping`] resolves that translation
//! before a feed is parsed; it may need an auxiliary file that the fetch
//! stage downloads first.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::ImportResult;
use crate::models::ServiceRef;

pub mod channel_file;

pub use channel_file::ChannelFile;

/// Materialized channel id to services table consumed by parsers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    entries: HashMap<String, Vec<ServiceRef>>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are case-insensitive; one id may feed several services
    pub fn insert<I: AsRef<str>, S: Into<ServiceRef>>(&mut self, id: I, service: S) {
        self.entries
            .entry(id.as_ref().to_lowercase())
            .or_default()
            .push(service.into());
    }

    pub fn services(&self, id: &str) -> Option<&[ServiceRef]> {
        self.entries.get(&id.to_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I, S> FromIterator<(I, S)> for ChannelMap
where
    I: AsRef<str>,
    S: Into<ServiceRef>,
{
    fn from_iter<T: IntoIterator<Item = (I, S)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (id, service) in iter {
            map.insert(id, service);
        }
        map
    }
}

/// Decides which service references the host wants EPG data for
pub trait ChannelFilter: Send + Sync {
    fn accepts(&self, service: &str) -> bool;
}

impl<F> ChannelFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accepts(&self, service: &str) -> bool {
        self(service)
    }
}

/// Filter that keeps every service
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ChannelFilter for AcceptAll {
    fn accepts(&self, _service: &str) -> bool {
        true
    }
}

/// Channel mapping resource attached to a source
pub trait ChannelMapping: Send {
    /// Refresh the mapping, preferring a freshly downloaded file when given
    fn update(&mut self, filter: &dyn ChannelFilter, downloaded: Option<&Path>) -> ImportResult<()>;

    /// Current materialized mapping
    fn items(&self) -> Arc<ChannelMap>;

    /// Remote files worth downloading before the next update
    fn downloadables(&self) -> Vec<String>;
}

/// Mapping supplied up front by the host; never downloads anything
#[derive(Debug, Clone, Default)]
pub struct FixedChannels {
    items: Arc<ChannelMap>,
}

impl FixedChannels {
    pub fn new(items: ChannelMap) -> Self {
        Self {
            items: Arc::new(items),
        }
    }
}

impl ChannelMapping for FixedChannels {
    fn update(&mut self, _filter: &dyn ChannelFilter, _downloaded: Option<&Path>) -> ImportResult<()> {
        Ok(())
    }

    fn items(&self) -> Arc<ChannelMap> {
        Arc::clone(&self.items)
    }

    fn downloadables(&self) -> Vec<String> {
        Vec::new()
    }
}
