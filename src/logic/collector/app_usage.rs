//! App Usage Collector - Running processes and installed applications
//!
//! Running processes come from the process table on every platform.
//! Installed applications come from the registry (Windows), `.desktop`
//! entries (Linux) or application bundles (macOS).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::json;
use sysinfo::{ProcessRefreshKind, System};

use super::{raw_record, CancelFlag, CategorySource, Collected, CollectionError, Platform, UnsupportedSource};
use crate::logic::record::Category;

pub fn source_for(platform: &Platform) -> Box<dyn CategorySource> {
    match platform {
        Platform::Windows => Box::new(AppUsageCollector::new(Installed::Registry)),
        Platform::MacOs => Box::new(AppUsageCollector::new(Installed::Bundles(vec![
            PathBuf::from("/Applications"),
        ]))),
        Platform::Linux => {
            let mut dirs = vec![
                PathBuf::from("/usr/share/applications"),
                PathBuf::from("/usr/local/share/applications"),
            ];
            if let Some(data) = dirs::data_dir() {
                dirs.push(data.join("applications"));
            }
            Box::new(AppUsageCollector::new(Installed::DesktopEntries(dirs)))
        }
        Platform::Unsupported(os) => Box::new(UnsupportedSource::new(Category::AppUsage, os)),
    }
}

/// Where installed applications are discovered
#[derive(Debug, Clone)]
pub enum Installed {
    Registry,
    DesktopEntries(Vec<PathBuf>),
    Bundles(Vec<PathBuf>),
}

pub struct AppUsageCollector {
    installed: Installed,
    include_processes: bool,
}

impl AppUsageCollector {
    pub fn new(installed: Installed) -> Self {
        Self { installed, include_processes: true }
    }

    #[cfg(test)]
    pub fn without_processes(mut self) -> Self {
        self.include_processes = false;
        self
    }
}

impl CategorySource for AppUsageCollector {
    fn category(&self) -> Category {
        Category::AppUsage
    }

    fn name(&self) -> &'static str {
        match self.installed {
            Installed::Registry => "process_table+registry",
            Installed::DesktopEntries(_) => "process_table+desktop_entries",
            Installed::Bundles(_) => "process_table+applications_folder",
        }
    }

    fn collect(&self, cancel: &CancelFlag) -> Result<Collected, CollectionError> {
        let mut out = Collected::new();
        let mut failures = Vec::new();

        if self.include_processes {
            if let Err(e) = collect_processes(cancel, &mut out) {
                log::warn!("Process table unavailable: {}", e);
                failures.push(e);
            }
        }

        let installed = match &self.installed {
            Installed::Registry => collect_registry_apps(cancel, &mut out),
            Installed::DesktopEntries(dirs) => collect_desktop_entries(dirs, cancel, &mut out),
            Installed::Bundles(dirs) => collect_bundles(dirs, cancel, &mut out),
        };
        if let Err(e) = installed {
            log::warn!("Installed application scan failed: {}", e);
            failures.push(e);
        }

        let attempted = usize::from(self.include_processes) + 1;
        if failures.len() == attempted {
            return Err(failures.remove(0));
        }

        if cancel.is_cancelled() {
            return Ok(out.into_cancelled());
        }
        Ok(out)
    }
}

// ============================================================================
// RUNNING PROCESSES
// ============================================================================

fn collect_processes(cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
    let mut sys = System::new_all();
    // CPU usage needs two samples
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes_specifics(ProcessRefreshKind::everything());

    if sys.processes().is_empty() {
        return Err(CollectionError::Api("process table is empty".to_string()));
    }

    let total_memory = sys.total_memory() as f64;
    let mut processes: Vec<_> = sys.processes().values().collect();
    processes.sort_by_key(|p| p.pid());

    for process in processes {
        if cancel.is_cancelled() {
            break;
        }
        // Only processes with an executable path
        let Some(exe) = process.exe() else { continue };

        let memory_percent = if total_memory > 0.0 {
            process.memory() as f64 / total_memory * 100.0
        } else {
            0.0
        };

        out.push(raw_record(json!({
            "name": process.name(),
            "path": exe.to_string_lossy(),
            "pid": process.pid().as_u32(),
            "start_time": process.start_time(),
            "cpu_percent": process.cpu_usage() as f64,
            "memory_percent": memory_percent,
            "type": "running_process",
            "source": "process_table",
        })));
    }

    log::debug!("Collected {} running processes", out.records.len());
    Ok(())
}

// ============================================================================
// INSTALLED APPLICATIONS
// ============================================================================

#[cfg(windows)]
fn collect_registry_apps(cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    const UNINSTALL_KEYS: &[&str] = &[
        "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
        "SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
    ];

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let mut opened = 0;

    for path in UNINSTALL_KEYS {
        let Ok(key) = hklm.open_subkey(path) else { continue };
        opened += 1;

        for name in key.enum_keys().filter_map(|k| k.ok()) {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let Ok(sub) = key.open_subkey(&name) else { continue };
            // Entries without a display name are updates/components
            let Ok(display_name) = sub.get_value::<String, _>("DisplayName") else { continue };

            out.push(raw_record(json!({
                "name": display_name,
                "path": name,
                "install_date": sub.get_value::<String, _>("InstallDate").ok(),
                "publisher": sub.get_value::<String, _>("Publisher").ok(),
                "version": sub.get_value::<String, _>("DisplayVersion").ok(),
                "type": "installed_app",
                "source": "registry",
            })));
        }
    }

    if opened == 0 {
        return Err(CollectionError::PermissionDenied("Uninstall registry keys".to_string()));
    }
    Ok(())
}

#[cfg(not(windows))]
fn collect_registry_apps(_cancel: &CancelFlag, _out: &mut Collected) -> Result<(), CollectionError> {
    Err(CollectionError::UnsupportedPlatform("registry requires Windows".to_string()))
}

fn modified_rfc3339(path: &Path) -> Option<String> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
}

/// `Name=` from the `[Desktop Entry]` group, unless hidden
fn parse_desktop_entry(content: &str) -> Option<String> {
    let mut in_entry = false;
    let mut name = None;

    for line in content.lines().map(str::trim) {
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        if line == "NoDisplay=true" || line == "Hidden=true" {
            return None;
        }
        if name.is_none() {
            if let Some(value) = line.strip_prefix("Name=") {
                name = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
        }
    }
    name
}

fn collect_desktop_entries(dirs: &[PathBuf], cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            log::debug!("Skipping application directory {:?}", dir);
            continue;
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |e| e == "desktop"))
            .collect();
        paths.sort();

        for path in paths {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let Ok(content) = fs::read_to_string(&path) else { continue };
            let Some(name) = parse_desktop_entry(&content) else { continue };

            out.push(raw_record(json!({
                "name": name,
                "path": path.to_string_lossy(),
                "timestamp": modified_rfc3339(&path),
                "type": "installed_app",
                "source": "desktop_entries",
            })));
        }
    }
    Ok(())
}

fn collect_bundles(dirs: &[PathBuf], cancel: &CancelFlag, out: &mut Collected) -> Result<(), CollectionError> {
    for dir in dirs {
        let entries = fs::read_dir(dir).map_err(|e| CollectionError::from_io("applications folder", e))?;
        let mut bundles: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |e| e == "app"))
            .collect();
        bundles.sort();

        for bundle in bundles {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let Some(name) = bundle.file_stem().map(|s| s.to_string_lossy().to_string()) else { continue };
            out.push(raw_record(json!({
                "name": name,
                "path": bundle.to_string_lossy(),
                "timestamp": modified_rfc3339(&bundle),
                "type": "installed_app",
                "source": "applications_folder",
            })));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EDITOR_ENTRY: &str = "[Desktop Entry]\nType=Application\nName=Text Editor\nName[de]=Texteditor\nExec=gedit\n";

    #[test]
    fn test_parse_desktop_entry() {
        assert_eq!(parse_desktop_entry(EDITOR_ENTRY), Some("Text Editor".to_string()));
        assert_eq!(parse_desktop_entry("[Desktop Entry]\nName=X\nNoDisplay=true\n"), None);
        assert_eq!(parse_desktop_entry("[Desktop Action new]\nName=New Window\n"), None);
    }

    #[test]
    fn test_desktop_entries_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("editor.desktop"), EDITOR_ENTRY).unwrap();
        fs::write(dir.path().join("hidden.desktop"), "[Desktop Entry]\nName=H\nHidden=true\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "Name=ignored").unwrap();

        let source = AppUsageCollector::new(Installed::DesktopEntries(vec![dir.path().to_path_buf()]))
            .without_processes();
        let collected = source.collect(&CancelFlag::new()).unwrap();

        assert_eq!(collected.records.len(), 1);
        let raw = &collected.records[0];
        assert_eq!(raw["name"], "Text Editor");
        assert_eq!(raw["type"], "installed_app");
        assert_eq!(raw["source"], "desktop_entries");
    }

    #[test]
    fn test_bundle_scan_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = AppUsageCollector::new(Installed::Bundles(vec![dir.path().join("missing")]))
            .without_processes();
        assert!(source.collect(&CancelFlag::new()).is_err());
    }

    #[test]
    fn test_bundle_scan() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Safari.app")).unwrap();
        fs::create_dir(dir.path().join("Utilities")).unwrap();

        let source = AppUsageCollector::new(Installed::Bundles(vec![dir.path().to_path_buf()]))
            .without_processes();
        let collected = source.collect(&CancelFlag::new()).unwrap();
        assert_eq!(collected.records.len(), 1);
        assert_eq!(collected.records[0]["name"], "Safari");
    }
}
