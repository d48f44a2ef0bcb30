//! Pluggable EPG parsers
//!
//! A parser turns an open byte stream plus the resolved channel map into a
//! lazy, single-pass sequence of [`ParseStep`]s. Parsers are looked up by
//! the id a source is configured with, after alias resolution.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;
use tracing::debug;

use crate::channels::ChannelMap;
use crate::errors::{ImportError, ImportResult};
use crate::models::ProgramEvent;

pub mod xmltv;

pub use xmltv::XmltvParser;

/// Registry name of the built-in XMLTV parser
pub const GEN_XMLTV: &str = "gen_xmltv";

/// Historical parser ids that map onto a registered parser
const PARSER_ALIASES: &[(&str, &str)] = &[("xmltv", GEN_XMLTV), ("genxmltv", GEN_XMLTV)];

/// One pull from an [`EventStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStep {
    Event(ProgramEvent),
    /// Something was consumed but produced no event
    Pending,
}

/// Lazy event sequence; an `Err` item ends the sequence
pub type EventStream = Box<dyn Iterator<Item = ImportResult<ParseStep>> + Send>;

pub trait EpgParser: Send {
    fn iterator(
        &self,
        input: Box<dyn BufRead + Send>,
        channels: Arc<ChannelMap>,
    ) -> ImportResult<EventStream>;
}

pub type ParserFactory = Arc<dyn Fn() -> Box<dyn EpgParser> + Send + Sync>;

/// Parser factories by name
#[derive(Clone)]
pub struct ParserRegistry {
    factories: HashMap<String, ParserFactory>,
}

impl ParserRegistry {
    /// Registry without any parser
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in parsers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(GEN_XMLTV, || Box::new(XmltvParser::new()) as Box<dyn EpgParser>);
        registry
    }

    pub fn register<N, F>(&mut self, name: N, factory: F)
    where
        N: Into<String>,
        F: Fn() -> Box<dyn EpgParser> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Map a configured parser id through the alias table
    pub fn resolve_name(id: &str) -> &str {
        PARSER_ALIASES
            .iter()
            .find(|(alias, _)| *alias == id)
            .map(|(_, target)| *target)
            .unwrap_or(id)
    }

    pub fn create(&self, id: &str) -> ImportResult<Box<dyn EpgParser>> {
        let name = Self::resolve_name(id);
        debug!("Resolved parser '{}' to '{}'", id, name);
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ImportError::UnknownParser {
                name: id.to_string(),
            })
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
