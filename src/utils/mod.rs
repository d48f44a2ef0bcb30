//! Utility modules for the epg-import pipeline
//!
//! Reusable I/O helpers shared by the fetch and decode stages.

pub mod decompression;
pub mod http_client;
pub mod scratch;
pub mod url;
pub mod xml_text;

pub use decompression::{CompressionFormat, DecompressionService};
pub use http_client::{Downloader, HttpDownloader};
pub use scratch::{
    DiskStorageLocator, FixedStorageLocator, ScratchFile, SpaceProbe, StorageLocator, SysinfoProbe,
};
