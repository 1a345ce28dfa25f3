//! System Info - Basic facts about the workstation being reported on

use serde::{Deserialize, Serialize};
use sysinfo::System;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub platform_version: String,
    pub machine: String,
    pub processor: String,
    pub hostname: String,
    pub username: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        let processor = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            platform: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            platform_version: System::os_version().unwrap_or_else(|| UNKNOWN.to_string()),
            machine: std::env::consts::ARCH.to_string(),
            processor,
            hostname: host_name().unwrap_or_else(|| UNKNOWN.to_string()),
            username: current_username().unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// (label, value) pairs in display order
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("platform", self.platform.as_str()),
            ("platform_version", self.platform_version.as_str()),
            ("machine", self.machine.as_str()),
            ("processor", self.processor.as_str()),
            ("hostname", self.hostname.as_str()),
            ("username", self.username.as_str()),
        ]
    }
}

/// Machine host name
pub fn host_name() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
}

/// Invoking user, from the environment
pub fn current_username() -> Option<String> {
    ["USERNAME", "USER"]
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_fills_every_field() {
        let info = SystemInfo::collect();
        for (label, value) in info.fields() {
            assert!(!value.is_empty(), "{} is empty", label);
        }
        assert_eq!(info.machine, std::env::consts::ARCH);
    }
}
