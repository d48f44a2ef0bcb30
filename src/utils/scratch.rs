//! Scratch storage selection
//!
//! Downloads are written to a scratch directory before parsing. Set-top
//! style hosts often have a tiny `/tmp`, so the location is picked by free
//! space: the default path when it has room, otherwise the first mounted
//! candidate that does.

use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::{debug, warn};

use crate::config::ScratchConfig;

/// Picks the directory downloads are written to
pub trait StorageLocator: Send + Sync {
    fn locate(&self, min_free: u64) -> PathBuf;
}

/// Free-space and mount-table queries used by [`DiskStorageLocator`]
pub trait SpaceProbe: Send + Sync {
    /// Bytes available at `path`, `None` when the path cannot be inspected
    fn free_space(&self, path: &Path) -> Option<u64>;

    /// Whether `path` is listed in the mount table
    fn is_mount_point(&self, path: &Path) -> bool;
}

/// [`SpaceProbe`] backed by the system disk list
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl SpaceProbe for SysinfoProbe {
    fn free_space(&self, path: &Path) -> Option<u64> {
        let path = path.canonicalize().ok()?;
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }

    fn is_mount_point(&self, path: &Path) -> bool {
        Disks::new_with_refreshed_list()
            .list()
            .iter()
            .any(|disk| disk.mount_point() == path)
    }
}

/// Default path first, then mounted candidates, then the default again
pub struct DiskStorageLocator<P = SysinfoProbe> {
    default_path: PathBuf,
    candidates: Vec<PathBuf>,
    floor_bytes: u64,
    probe: P,
}

impl DiskStorageLocator<SysinfoProbe> {
    pub fn from_config(config: &ScratchConfig) -> Self {
        Self::with_probe(config, SysinfoProbe)
    }
}

impl<P: SpaceProbe> DiskStorageLocator<P> {
    pub fn with_probe(config: &ScratchConfig, probe: P) -> Self {
        Self {
            default_path: config.default_path.clone(),
            candidates: config.candidates.clone(),
            floor_bytes: config.floor_bytes,
            probe,
        }
    }
}

impl<P: SpaceProbe> StorageLocator for DiskStorageLocator<P> {
    fn locate(&self, min_free: u64) -> PathBuf {
        match self.probe.free_space(&self.default_path) {
            Some(free) if free > min_free && free > self.floor_bytes => {
                return self.default_path.clone();
            }
            Some(free) => debug!(
                "Scratch path {} has only {} bytes free",
                self.default_path.display(),
                free
            ),
            None => warn!("Failed to stat scratch path {}", self.default_path.display()),
        }

        for candidate in &self.candidates {
            if !self.probe.is_mount_point(candidate) {
                continue;
            }
            if let Some(free) = self.probe.free_space(candidate)
                && free > min_free
            {
                debug!("Using scratch mount {} ({} bytes free)", candidate.display(), free);
                return candidate.clone();
            }
        }

        self.default_path.clone()
    }
}

/// Always returns the same directory
#[derive(Debug, Clone)]
pub struct FixedStorageLocator(pub PathBuf);

impl StorageLocator for FixedStorageLocator {
    fn locate(&self, _min_free: u64) -> PathBuf {
        self.0.clone()
    }
}

/// Intermediate file owned by the pipeline, removed when dropped
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed intermediate {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove intermediate {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeProbe {
        free: HashMap<PathBuf, u64>,
        mounts: Vec<PathBuf>,
    }

    impl SpaceProbe for FakeProbe {
        fn free_space(&self, path: &Path) -> Option<u64> {
            self.free.get(path).copied()
        }

        fn is_mount_point(&self, path: &Path) -> bool {
            self.mounts.iter().any(|mount| mount == path)
        }
    }

    fn locator(free: &[(&str, u64)], mounts: &[&str]) -> DiskStorageLocator<FakeProbe> {
        let probe = FakeProbe {
            free: free.iter().map(|(p, f)| (PathBuf::from(p), *f)).collect(),
            mounts: mounts.iter().map(PathBuf::from).collect(),
        };
        DiskStorageLocator::with_probe(&ScratchConfig::default(), probe)
    }

    #[test]
    fn test_default_path_with_room() {
        let loc = locator(&[("/tmp", 80_000_000)], &[]);
        assert_eq!(loc.locate(9_000_000), PathBuf::from("/tmp"));
    }

    #[test]
    fn test_default_below_floor_uses_mounted_candidate() {
        let loc = locator(
            &[("/tmp", 20_000_000), ("/media/usb", 900_000_000), ("/media/cf", 900_000_000)],
            &["/media/usb"],
        );
        assert_eq!(loc.locate(9_000_000), PathBuf::from("/media/usb"));
    }

    #[test]
    fn test_unstatable_default_probes_candidates_in_order() {
        let loc = locator(
            &[("/media/cf", 10_000_000), ("/media/hdd", 10_000_000)],
            &["/media/hdd", "/media/cf"],
        );
        assert_eq!(loc.locate(9_000_000), PathBuf::from("/media/cf"));
    }

    #[test]
    fn test_falls_back_to_default() {
        let loc = locator(&[("/media/hdd", 1_000)], &["/media/hdd"]);
        assert_eq!(loc.locate(9_000_000), PathBuf::from("/tmp"));
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("epgimport");
        std::fs::write(&path, b"x").unwrap();

        let scratch = ScratchFile::new(path.clone());
        assert!(scratch.path().exists());
        drop(scratch);
        assert!(!path.exists());

        drop(ScratchFile::new(dir.path().join("never-written")));
    }
}
