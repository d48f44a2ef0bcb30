use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Gzip member header
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression formats the decode stage understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

/// Transparent decompression for fetched artifacts
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        if data.starts_with(&GZIP_MAGIC) {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::Uncompressed
        }
    }

    /// Compression implied by the file name
    pub fn format_from_name(path: &Path) -> CompressionFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => CompressionFormat::Gzip,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Compression of a file on disk, by name first and then by content
    pub fn detect_file_format(path: &Path) -> io::Result<CompressionFormat> {
        if Self::format_from_name(path) == CompressionFormat::Gzip {
            return Ok(CompressionFormat::Gzip);
        }
        let mut reader = BufReader::new(File::open(path)?);
        Ok(Self::detect_compression_format(reader.fill_buf()?))
    }

    /// Open a file for reading, decompressing it on the fly when needed
    ///
    /// `.gz` names are always decoded. Other files are sniffed for the gzip
    /// header so feeds served compressed under a plain name still work.
    pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
        let mut reader = BufReader::new(File::open(path)?);

        let format = match Self::format_from_name(path) {
            CompressionFormat::Gzip => CompressionFormat::Gzip,
            CompressionFormat::Uncompressed => {
                Self::detect_compression_format(reader.fill_buf()?)
            }
        };
        debug!("Opening {} (compression: {:?})", path.display(), format);

        Ok(match format {
            CompressionFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
            CompressionFormat::Uncompressed => Box::new(reader),
        })
    }

    /// Stream `source` into `destination`, decompressing on the way
    pub fn copy_decompressed(source: &Path, destination: &Path) -> io::Result<u64> {
        let mut reader = Self::open_reader(source)?;
        let mut writer = io::BufWriter::new(File::create(destination)?);
        let copied = io::copy(&mut reader, &mut writer)?;
        io::Write::flush(&mut writer)?;
        Ok(copied)
    }
}
