pub mod channels;
pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod parsers;
pub mod storage;
pub mod utils;
