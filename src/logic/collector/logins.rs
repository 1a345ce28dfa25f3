//! Login Collector - Active sessions per account
//!
//! A session is an account owning running processes; its start is the
//! earliest start time among those processes. The invoking user gets an
//! extra `current` record stamped with the collection time.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use sysinfo::{ProcessRefreshKind, System, Users};

use super::{raw_record, CancelFlag, CategorySource, Collected, CollectionError, Platform, UnsupportedSource};
use crate::logic::record::Category;
use crate::logic::system_info::{current_username, host_name};

pub fn source_for(platform: &Platform) -> Box<dyn CategorySource> {
    match platform {
        Platform::Windows | Platform::MacOs | Platform::Linux => Box::new(SessionCollector),
        Platform::Unsupported(os) => Box::new(UnsupportedSource::new(Category::Login, os)),
    }
}

/// Process-owner sessions via `sysinfo`
pub struct SessionCollector;

#[derive(Debug, Default)]
struct SessionAcc {
    earliest_start: Option<u64>,
    process_count: u64,
}

impl CategorySource for SessionCollector {
    fn category(&self) -> Category {
        Category::Login
    }

    fn name(&self) -> &'static str {
        "process_table"
    }

    fn collect(&self, cancel: &CancelFlag) -> Result<Collected, CollectionError> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessRefreshKind::everything());
        let users = Users::new_with_refreshed_list();

        if sys.processes().is_empty() {
            return Err(CollectionError::Api("process table is empty".to_string()));
        }

        let host = host_name().unwrap_or_else(|| "localhost".to_string());
        let mut sessions: BTreeMap<String, SessionAcc> = BTreeMap::new();
        let mut out = Collected::new();

        for process in sys.processes().values() {
            if cancel.is_cancelled() {
                break;
            }

            let Some(user) = process.user_id().and_then(|uid| users.get_user_by_id(uid)) else {
                continue;
            };

            let acc = sessions.entry(user.name().to_string()).or_default();
            acc.process_count += 1;
            let start = process.start_time();
            if start > 0 {
                acc.earliest_start = Some(acc.earliest_start.map_or(start, |e| e.min(start)));
            }
        }

        log::debug!("Found {} accounts with running processes", sessions.len());

        for (username, acc) in sessions {
            out.push(session_record(&username, &host, &acc));
        }

        if let Some(username) = current_username() {
            out.push(raw_record(json!({
                "timestamp": Utc::now().to_rfc3339(),
                "username": username,
                "host": host,
                "type": "current",
                "source": "environment",
            })));
        }

        if cancel.is_cancelled() {
            return Ok(out.into_cancelled());
        }
        Ok(out)
    }
}

fn session_record(username: &str, host: &str, acc: &SessionAcc) -> super::RawRecord {
    raw_record(json!({
        "timestamp": acc.earliest_start,
        "username": username,
        "host": host,
        "process_count": acc.process_count,
        "type": "session",
        "source": "process_table",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_record_shape() {
        let acc = SessionAcc { earliest_start: Some(1_700_000_000), process_count: 3 };
        let raw = session_record("alice", "ws-01", &acc);

        assert_eq!(raw["username"], "alice");
        assert_eq!(raw["timestamp"], 1_700_000_000);
        assert_eq!(raw["process_count"], 3);
        assert_eq!(raw["type"], "session");
    }

    #[test]
    fn test_session_without_start_has_null_timestamp() {
        let raw = session_record("svc", "ws-01", &SessionAcc::default());
        assert!(raw["timestamp"].is_null());
    }

    #[test]
    fn test_unsupported_platform_fails() {
        let source = source_for(&Platform::Unsupported("plan9".into()));
        assert_eq!(source.category(), Category::Login);
        assert!(matches!(
            source.collect(&CancelFlag::new()),
            Err(CollectionError::UnsupportedPlatform(_))
        ));
    }
}
