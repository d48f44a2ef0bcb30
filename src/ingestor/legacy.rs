//! Legacy EPG snapshot handling
//!
//! Snapshot files bypass parsing entirely. They are placed at the location
//! the store reloads from and the store is asked to `load()` them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{ImportError, ImportResult};
use crate::storage::{lock, SharedStore};
use crate::utils::{CompressionFormat, DecompressionService};

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn link_or_copy(source: &Path, target: &Path) -> io::Result<()> {
    if let Err(e) = std::os::unix::fs::symlink(source, target) {
        debug!("Symlink to {} failed ({}), copying", target.display(), e);
        fs::copy(source, target)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn link_or_copy(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

/// Whether both paths name the same file once links are resolved
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Put `source` at `target`, decompressing gzip snapshots on the way
///
/// A snapshot already sitting at `target` is left in place, or unpacked
/// over itself when compressed.
pub fn install_snapshot(source: &Path, target: &Path) -> io::Result<()> {
    let format = DecompressionService::detect_file_format(source)?;

    if same_file(source, target) {
        if format == CompressionFormat::Gzip {
            let mut unpacked = target.as_os_str().to_owned();
            unpacked.push(".unpacked");
            let unpacked = PathBuf::from(unpacked);
            let bytes = DecompressionService::copy_decompressed(source, &unpacked)?;
            fs::rename(&unpacked, target)?;
            debug!("Unpacked {} bytes in place at {}", bytes, target.display());
        }
        return Ok(());
    }

    remove_if_exists(target)?;
    match format {
        CompressionFormat::Gzip => {
            let bytes = DecompressionService::copy_decompressed(source, target)?;
            debug!("Unpacked {} bytes into {}", bytes, target.display());
        }
        CompressionFormat::Uncompressed => link_or_copy(source, target)?,
    }
    Ok(())
}

/// Import a fetched snapshot: install it and have the store load it
pub fn import_snapshot(store: &SharedStore, source: &Path, target: &Path) -> ImportResult<()> {
    let mut guard = lock(store)?;
    if !guard.capabilities().load {
        return Err(ImportError::configuration(format!(
            "Store cannot load EPG snapshots, skipping {}",
            source.display()
        )));
    }

    install_snapshot(source, target)?;
    info!("Loading EPG snapshot {}", target.display());
    guard.load()?;
    Ok(())
}

/// Reload the file a legacy importer wrote, linking it into place first
pub fn reload_epg_file(store: &SharedStore, epg_file: &Path, target: &Path) -> ImportResult<()> {
    let mut guard = lock(store)?;
    if !guard.capabilities().load {
        return Err(ImportError::configuration(
            "Store has no load(), restart required to pick up the new EPG file",
        ));
    }

    if !same_file(epg_file, target) {
        remove_if_exists(target)?;
        link_or_copy(epg_file, target)?;
    }
    guard.load()?;
    remove_if_exists(epg_file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{StoreError, StoreResult};
    use crate::storage::{shared, EpgStore, StoreCapabilities};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Loader {
        can_load: bool,
        fail: bool,
        target: PathBuf,
        loaded: Vec<Vec<u8>>,
    }

    impl EpgStore for Loader {
        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities {
                load: self.can_load,
                ..Default::default()
            }
        }

        fn load(&mut self) -> StoreResult<()> {
            if self.fail {
                return Err(StoreError::rejected("cache busy"));
            }
            self.loaded.push(fs::read(&self.target)?);
            Ok(())
        }
    }

    fn loader(dir: &TempDir, can_load: bool, fail: bool) -> (SharedStore, Arc<Mutex<Loader>>) {
        let inner = Arc::new(Mutex::new(Loader {
            can_load,
            fail,
            target: dir.path().join("epg.dat"),
            loaded: Vec::new(),
        }));
        let store: SharedStore = inner.clone();
        (store, inner)
    }

    #[test]
    fn test_gzip_snapshot_is_unpacked_and_loaded() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("epgimport.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"snapshot").unwrap();
        fs::write(&source, encoder.finish().unwrap()).unwrap();

        let (store, inner) = loader(&dir, true, false);
        import_snapshot(&store, &source, &dir.path().join("epg.dat")).unwrap();
        assert_eq!(inner.lock().unwrap().loaded, vec![b"snapshot".to_vec()]);
    }

    #[test]
    fn test_plain_snapshot_replaces_existing_target() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("epgimport");
        let target = dir.path().join("epg.dat");
        fs::write(&source, b"fresh").unwrap();
        fs::write(&target, b"stale").unwrap();

        let (store, inner) = loader(&dir, true, false);
        import_snapshot(&store, &source, &target).unwrap();
        assert_eq!(inner.lock().unwrap().loaded, vec![b"fresh".to_vec()]);
    }

    #[test]
    fn test_snapshot_at_load_location_is_kept() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("epg.dat");
        fs::write(&target, b"only copy").unwrap();

        let (store, inner) = loader(&dir, true, false);
        import_snapshot(&store, &target, &target).unwrap();
        assert!(target.exists());
        assert_eq!(inner.lock().unwrap().loaded, vec![b"only copy".to_vec()]);
    }

    #[test]
    fn test_gzip_snapshot_at_load_location_is_unpacked_in_place() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("epg.dat");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"packed").unwrap();
        fs::write(&target, encoder.finish().unwrap()).unwrap();

        let (store, inner) = loader(&dir, true, false);
        import_snapshot(&store, &target, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"packed");
        assert_eq!(inner.lock().unwrap().loaded, vec![b"packed".to_vec()]);
    }

    #[test]
    fn test_store_without_load_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("epgimport");
        fs::write(&source, b"fresh").unwrap();

        let store = shared(Loader {
            can_load: false,
            fail: false,
            target: dir.path().join("epg.dat"),
            loaded: Vec::new(),
        });
        let err = import_snapshot(&store, &source, &dir.path().join("epg.dat")).unwrap_err();
        assert!(matches!(err, ImportError::Configuration { .. }));
        assert!(!dir.path().join("epg.dat").exists());
    }

    #[test]
    fn test_reload_removes_written_file_only_on_success() {
        let dir = TempDir::new().unwrap();
        let written = dir.path().join("epg.new");
        let target = dir.path().join("epg.dat");

        fs::write(&written, b"events").unwrap();
        let (failing, _) = loader(&dir, true, true);
        assert!(reload_epg_file(&failing, &written, &target).is_err());
        assert!(written.exists());

        let (store, inner) = loader(&dir, true, false);
        reload_epg_file(&store, &written, &target).unwrap();
        assert!(!written.exists());
        assert_eq!(inner.lock().unwrap().loaded, vec![b"events".to_vec()]);
    }
}
