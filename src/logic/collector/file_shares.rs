//! File Share Collector - Recent files, network drives, mounted shares
//!
//! Every mechanism is tried independently. The source only fails when all
//! of its mechanisms failed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{raw_record, CancelFlag, CategorySource, Collected, CollectionError, Platform, UnsupportedSource};
use crate::logic::record::Category;

/// Network file systems reported as `network_drive`
const NETWORK_FILE_SYSTEMS: &[&str] = &[
    "nfs", "nfs4", "cifs", "smbfs", "smb3", "afpfs", "webdav", "davfs", "fuse.sshfs", "sshfs", "9p",
];

pub fn source_for(platform: &Platform) -> Box<dyn CategorySource> {
    match platform {
        Platform::Windows => Box::new(WindowsFileShares::new()),
        Platform::MacOs => Box::new(UnixFileShares::new(macos_recent_dirs())),
        Platform::Linux => Box::new(UnixFileShares::new(linux_recent_dirs())),
        Platform::Unsupported(os) => Box::new(UnsupportedSource::new(Category::FileShare, os)),
    }
}

fn linux_recent_dirs() -> Vec<PathBuf> {
    dirs::data_dir()
        .map(|d| vec![d.join("RecentDocuments")])
        .unwrap_or_default()
}

fn macos_recent_dirs() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|h| vec![h.join("Library").join("Recent Servers")])
        .unwrap_or_default()
}

// ============================================================================
// SHARED MECHANISMS
// ============================================================================

/// Tracks per-mechanism failures for one run
#[derive(Default)]
struct Mechanisms {
    attempted: usize,
    failures: Vec<String>,
}

impl Mechanisms {
    fn record(&mut self, name: &str, result: Result<(), CollectionError>) {
        self.attempted += 1;
        if let Err(e) = result {
            log::warn!("File share mechanism `{}` failed: {}", name, e);
            self.failures.push(format!("{}: {}", name, e));
        }
    }

    fn finish(self, out: Collected, cancel: &CancelFlag) -> Result<Collected, CollectionError> {
        if self.attempted > 0 && self.failures.len() == self.attempted {
            return Err(CollectionError::Api(self.failures.join("; ")));
        }
        if cancel.is_cancelled() {
            return Ok(out.into_cancelled());
        }
        Ok(out)
    }
}

fn mtime_rfc3339(modified: std::io::Result<SystemTime>) -> Option<String> {
    modified.ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339())
}

/// One `recent_file` entry per file in a recent-items directory
fn scan_recent_dir(dir: &Path, cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
    if !dir.exists() {
        log::debug!("Recent items directory {:?} does not exist", dir);
        return Ok(());
    }

    let entries = fs::read_dir(dir).map_err(|e| CollectionError::from_io("recent items", e))?;
    for entry in entries.filter_map(|e| e.ok()) {
        if cancel.is_cancelled() {
            break;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }

        out.push(raw_record(json!({
            "path": entry.file_name().to_string_lossy(),
            "timestamp": mtime_rfc3339(meta.modified()),
            "size_bytes": meta.len(),
            "type": "recent_file",
            "source": "recent_folder",
        })));
    }
    Ok(())
}

// ============================================================================
// WINDOWS
// ============================================================================

pub struct WindowsFileShares {
    recent_dir: Option<PathBuf>,
}

impl WindowsFileShares {
    pub fn new() -> Self {
        Self {
            recent_dir: dirs::data_dir().map(|d| d.join("Microsoft").join("Windows").join("Recent")),
        }
    }

    fn scan_drive_letters(&self, cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
        for letter in ('D'..='Z').rev() {
            if cancel.is_cancelled() {
                break;
            }
            let root = format!("{}:\\", letter);
            let Ok(meta) = fs::metadata(&root) else { continue };
            out.push(raw_record(json!({
                "path": format!("{}:", letter),
                "timestamp": mtime_rfc3339(meta.modified()),
                "type": "network_drive",
                "source": "drive_check",
            })));
        }
        Ok(())
    }

    #[cfg(windows)]
    fn scan_mount_points(&self, cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
        use winreg::enums::HKEY_CURRENT_USER;
        use winreg::RegKey;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = hkcu
            .open_subkey("Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\MountPoints2")
            .map_err(|e| CollectionError::from_io("MountPoints2", e))?;

        let now = Utc::now().to_rfc3339();
        for name in key.enum_keys().filter_map(|k| k.ok()) {
            if cancel.is_cancelled() {
                break;
            }
            out.push(raw_record(json!({
                "path": name,
                "timestamp": now,
                "type": "mounted_share",
                "source": "registry",
            })));
        }
        Ok(())
    }

    #[cfg(not(windows))]
    fn scan_mount_points(&self, _cancel: &CancelFlag, _out: &mut Collected) -> Result<(), CollectionError> {
        Err(CollectionError::UnsupportedPlatform("registry requires Windows".to_string()))
    }
}

impl CategorySource for WindowsFileShares {
    fn category(&self) -> Category {
        Category::FileShare
    }

    fn name(&self) -> &'static str {
        "recent_folder+drive_check+registry"
    }

    fn collect(&self, cancel: &CancelFlag) -> Result<Collected, CollectionError> {
        let mut out = Collected::new();
        let mut mechanisms = Mechanisms::default();

        if let Some(dir) = &self.recent_dir {
            mechanisms.record("recent_folder", scan_recent_dir(dir, cancel, &mut out));
        }
        mechanisms.record("drive_check", self.scan_drive_letters(cancel, &mut out));
        mechanisms.record("registry", self.scan_mount_points(cancel, &mut out));

        mechanisms.finish(out, cancel)
    }
}

// ============================================================================
// MACOS / LINUX
// ============================================================================

pub struct UnixFileShares {
    recent_dirs: Vec<PathBuf>,
    include_mounts: bool,
}

impl UnixFileShares {
    pub fn new(recent_dirs: Vec<PathBuf>) -> Self {
        Self { recent_dirs, include_mounts: true }
    }

    /// Skip the mount table (tests run without network mounts)
    #[cfg(test)]
    pub fn without_mounts(mut self) -> Self {
        self.include_mounts = false;
        self
    }

    fn scan_network_mounts(&self, cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        for disk in disks.list() {
            if cancel.is_cancelled() {
                break;
            }
            let fs_type = disk.file_system().to_string_lossy().to_lowercase();
            if !is_network_fs(&fs_type) {
                continue;
            }
            let mount = disk.mount_point();
            out.push(raw_record(json!({
                "path": mount.to_string_lossy(),
                "timestamp": fs::metadata(mount).ok().and_then(|m| mtime_rfc3339(m.modified())),
                "file_system": fs_type,
                "type": "network_drive",
                "source": "mount_table",
            })));
        }
        Ok(())
    }
}

impl CategorySource for UnixFileShares {
    fn category(&self) -> Category {
        Category::FileShare
    }

    fn name(&self) -> &'static str {
        "recent_folder+mount_table"
    }

    fn collect(&self, cancel: &CancelFlag) -> Result<Collected, CollectionError> {
        let mut out = Collected::new();
        let mut mechanisms = Mechanisms::default();

        for dir in &self.recent_dirs {
            mechanisms.record("recent_folder", scan_recent_dir(dir, cancel, &mut out));
        }
        if self.include_mounts {
            mechanisms.record("mount_table", self.scan_network_mounts(cancel, &mut out));
        }

        mechanisms.finish(out, cancel)
    }
}

fn is_network_fs(fs_type: &str) -> bool {
    NETWORK_FILE_SYSTEMS.contains(&fs_type) || fs_type.starts_with("fuse.sshfs")
}
