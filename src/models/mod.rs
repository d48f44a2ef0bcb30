//! Data models shared by every pipeline stage

pub mod program;
pub mod source;

pub use program::{EventData, ProgramEvent, ServiceRef};
pub use source::{ChannelsConfig, Source, SourceConfig, LEGACY_PARSER_ID};
