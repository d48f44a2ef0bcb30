/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Import defaults
pub const DEFAULT_LONG_DESCRIPTION_HORIZON: &str = "7d";
pub const DEFAULT_LEGACY_EPG_PATH: &str = "/hdd/epg.dat";
pub const DEFAULT_CHANNEL_REFRESH_INTERVAL: &str = "1d";

// Scratch storage defaults
pub const DEFAULT_SCRATCH_PATH: &str = "/tmp";
pub const DEFAULT_SCRATCH_CANDIDATES: &[&str] = &[
    "/media/DOMExtender",
    "/media/cf",
    "/media/usb",
    "/media/hdd",
];
pub const DEFAULT_SCRATCH_MIN_FREE_BYTES: u64 = 9_000_000;
pub const DEFAULT_SCRATCH_FLOOR_BYTES: u64 = 50_000_000;
pub const DEFAULT_SCRATCH_FILE_STEM: &str = "epgimport";

// Download defaults
pub const DEFAULT_CONNECT_TIMEOUT: &str = "10s";
pub const DEFAULT_USER_AGENT: &str = concat!("epg-import/", env!("CARGO_PKG_VERSION"));

// Source defaults
pub const DEFAULT_PARSER: &str = "xmltv";
