use crate::error::{Result, ScraperError};
use crate::types::RawDocument;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Insertion-ordered key/value store where a later write for a key replaces
/// the earlier value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedAccumulator<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for KeyedAccumulator<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> KeyedAccumulator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `key` was already present and got replaced.
    pub fn merge(&mut self, key: impl Into<String>, value: T) -> bool {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => {
                self.entries.push((key, value));
                false
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}

/// Raw upstream documents captured during one contest-group run, kept on
/// disk for traceability until the retention sweep removes them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    group_key: String,
    stamp: String,
    documents: KeyedAccumulator<RawDocument>,
}

impl Snapshot {
    pub fn new(group_key: impl Into<String>, stamp: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            stamp: stamp.into(),
            documents: KeyedAccumulator::new(),
        }
    }

    pub fn merge(&mut self, key: &str, document: RawDocument) {
        if self.documents.merge(key, document) {
            debug!("Snapshot {}: replaced document for {}", self.group_key, key);
        }
    }

    pub fn documents(&self) -> &KeyedAccumulator<RawDocument> {
        &self.documents
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.group_key, self.stamp)
    }

    /// Write under `dir`. A file left by an earlier run in the same minute
    /// keeps its keys unless this snapshot overwrites them.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());

        let mut merged = match fs::read_to_string(&path) {
            Ok(existing) => match serde_json::from_str::<Value>(&existing) {
                Ok(Value::Object(map)) => map,
                _ => {
                    warn!("Replacing unreadable snapshot {}", path.display());
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        for (key, document) in self.documents.iter() {
            merged.insert(key.to_string(), document.clone());
        }

        fs::write(&path, serde_json::to_string_pretty(&Value::Object(merged))?)?;
        debug!("Saved snapshot {}", path.display());
        Ok(path)
    }
}

/// Delete `*.json` files in `dir` last modified more than `max_age` before `now`.
pub fn sweep_expired(dir: &Path, max_age: Duration, now: SystemTime) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| {
        ScraperError::config(format!(
            "Failed to read snapshot directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut removed = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            fs::remove_file(&path)?;
            info!("Deleted old snapshot: {}", path.display());
            removed.push(path);
        }
    }
    Ok(removed)
}
