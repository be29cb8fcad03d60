//! Matched error lines and the request fields derived from them

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One matched line. The derived fields are filled in when the line looks
/// like a common/combined access log entry and are used only for alert text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub raw: String,
    pub client: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub status: Option<u16>,
}

fn access_log_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // client ident user [time] "METHOD path proto" status
        Regex::new(r#"^(\S+) \S+ \S+ \[[^\]]*\] "(\S+) (\S+)[^"]*" (\d{3})\b"#)
            .unwrap_or_else(|e| unreachable!("static access log regex: {e}"))
    })
}

impl ErrorEvent {
    pub fn parse(line: &str) -> Self {
        match access_log_regex().captures(line) {
            Some(caps) => Self {
                raw: line.to_string(),
                client: caps.get(1).map(|m| m.as_str().to_string()),
                method: caps.get(2).map(|m| m.as_str().to_string()),
                path: caps.get(3).map(|m| m.as_str().to_string()),
                status: caps.get(4).and_then(|m| m.as_str().parse().ok()),
            },
            None => Self {
                raw: line.to_string(),
                client: None,
                method: None,
                path: None,
                status: None,
            },
        }
    }
}

/// Per-field tallies over a burst of events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub by_status: BTreeMap<u16, usize>,
    pub by_client: BTreeMap<String, usize>,
    pub by_path: BTreeMap<String, usize>,
}

impl EventSummary {
    pub fn from_events(events: &[ErrorEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            if let Some(status) = event.status {
                *summary.by_status.entry(status).or_default() += 1;
            }
            if let Some(client) = &event.client {
                *summary.by_client.entry(client.clone()).or_default() += 1;
            }
            if let Some(path) = &event.path {
                *summary.by_path.entry(path.clone()).or_default() += 1;
            }
        }
        summary
    }

    /// The `n` most frequent keys, ties broken by key order
    pub fn top<'a>(counts: &'a BTreeMap<String, usize>, n: usize) -> Vec<(&'a str, usize)> {
        let mut entries: Vec<(&str, usize)> =
            counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }
}
