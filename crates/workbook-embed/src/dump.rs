//! JSON-lines dump of frame traffic, for debugging and replay.
//!
//! Each line is a [`DumpEntry`]: a timestamp, the direction, the posting
//! origin for inbound traffic, and the raw message.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Posted by the frame to the host
    In,
    /// Posted by the host to the frame
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpEntry {
    /// ISO 8601 timestamp when the message was logged
    pub ts: String,
    pub dir: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub msg: Value,
}

impl DumpEntry {
    pub fn new(dir: Direction, origin: Option<&str>, msg: Value) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            dir,
            origin: origin.map(str::to_string),
            msg,
        }
    }
}

pub struct MessageDump {
    file: Mutex<File>,
}

impl MessageDump {
    /// Create (or truncate) the dump file at `path`.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one entry. Write failures are logged, never propagated.
    pub fn record(&self, entry: &DumpEntry) {
        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize dump entry: {}", e);
                return;
            }
        };
        let mut file = lock(&self.file);
        if let Err(e) = writeln!(file, "{}", json).and_then(|_| file.flush()) {
            warn!("Failed to write dump entry: {}", e);
        }
    }
}

/// Read every entry of a dump file. Blank lines are skipped.
pub fn read_dump(path: &Path) -> anyhow::Result<Vec<DumpEntry>> {
    let file = File::open(path).with_context(|| format!("opening dump {}", path.display()))?;
    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid dump entry", path.display(), index + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_record_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.jsonl");
        let dump = MessageDump::create(&path).unwrap();

        dump.record(&DumpEntry::new(
            Direction::In,
            Some("https://app.example.com"),
            json!({"type": "workbook:loaded"}),
        ));
        dump.record(&DumpEntry::new(
            Direction::Out,
            None,
            json!({"type": "bookmark:update"}),
        ));

        let entries = read_dump(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].dir, Direction::In);
        assert_eq!(entries[0].origin.as_deref(), Some("https://app.example.com"));
        assert_eq!(entries[1].dir, Direction::Out);
        assert_eq!(entries[1].origin, None);
        assert_eq!(entries[1].msg["type"], "bookmark:update");
    }

    #[test]
    fn test_read_dump_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(
            &path,
            "{\"ts\":\"t\",\"dir\":\"in\",\"msg\":{}}\n\n{oops\n",
        )
        .unwrap();

        let err = read_dump(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":3:"));
    }
}
