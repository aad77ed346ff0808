use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{JobRecord, RenderedMessage};

/// Rendered messages plus when they were produced.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub timestamp: String,
    pub message_count: usize,
    pub messages: Vec<String>,
}

/// Writes JSON copies of each stage's output, for replay and debugging.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn default_dir() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobfeed") {
            proj_dirs.data_dir().join("snapshots")
        } else {
            PathBuf::from("snapshots")
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_raw(&self, records: &[Value]) -> Result<PathBuf> {
        self.write("raw", records)
    }

    pub fn save_normalized(&self, jobs: &[JobRecord]) -> Result<PathBuf> {
        self.write("normalized", jobs)
    }

    pub fn save_messages(&self, messages: &[RenderedMessage]) -> Result<PathBuf> {
        let snapshot = MessageSnapshot {
            timestamp: chrono::Local::now().to_rfc3339(),
            message_count: messages.len(),
            messages: messages.iter().map(|m| m.text.clone()).collect(),
        };
        self.write("messages", &snapshot)
    }

    fn write<T: Serialize + ?Sized>(&self, kind: &str, data: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create snapshot directory: {}", self.dir.display()))?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}_{}.json", kind, stamp));
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&path, json).with_context(|| format!("Failed to write snapshot: {}", path.display()))?;

        Ok(path)
    }
}

/// Load a raw snapshot: a JSON array of job records.
pub fn load_raw(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Snapshot is not valid JSON: {}", path.display()))?;

    match value {
        Value::Array(records) => Ok(records),
        Value::Object(obj) if obj.contains_key("error") => Err(anyhow!(
            "Snapshot records a scrape error: {}",
            obj["error"]
        )),
        _ => Err(anyhow!("Snapshot must be a JSON array of jobs: {}", path.display())),
    }
}

pub fn load_messages(path: &Path) -> Result<MessageSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid message snapshot: {}", path.display()))
}
