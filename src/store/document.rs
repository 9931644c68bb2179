//! Document store boundary and bundled implementations.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::PulseError;
use crate::types::MeditationSession;

/// Append-only collection store. Queries return newest first.
pub trait DocumentStore {
    /// Append a record and return its id
    fn append(&mut self, collection: &str, record: &MeditationSession) -> Result<String, PulseError>;

    /// Latest `limit` records for a user
    fn query_recent(
        &self,
        collection: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MeditationSession>, PulseError>;

    /// All records for a user with `timestamp >= since`
    fn query_range(
        &self,
        collection: &str,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MeditationSession>, PulseError>;
}

fn newest_first(mut records: Vec<MeditationSession>) -> Vec<MeditationSession> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// Process-local store, mostly for tests and the CLI dry runs
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: HashMap<String, Vec<MeditationSession>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn for_user(&self, collection: &str, user_id: &str) -> Vec<MeditationSession> {
        self.collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn append(&mut self, collection: &str, record: &MeditationSession) -> Result<String, PulseError> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record.id.clone())
    }

    fn query_recent(
        &self,
        collection: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MeditationSession>, PulseError> {
        let mut records = newest_first(self.for_user(collection, user_id));
        records.truncate(limit);
        Ok(records)
    }

    fn query_range(
        &self,
        collection: &str,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MeditationSession>, PulseError> {
        let mut records = self.for_user(collection, user_id);
        records.retain(|r| r.timestamp >= since);
        Ok(newest_first(records))
    }
}

/// Directory of NDJSON files, one per collection (`<root>/<collection>.ndjson`)
#[derive(Debug, Clone)]
pub struct JsonFileDocumentStore {
    root: PathBuf,
}

impl JsonFileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.ndjson"))
    }

    fn read_user(&self, collection: &str, user_id: &str) -> Result<Vec<MeditationSession>, PulseError> {
        let mut records = read_ndjson(&self.collection_path(collection))?;
        records.retain(|r| r.user_id == user_id);
        Ok(records)
    }
}

/// Read sessions from an NDJSON file. A missing file reads as empty.
pub(crate) fn read_ndjson(path: &Path) -> Result<Vec<MeditationSession>, PulseError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|e| {
            PulseError::ParseError(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

impl DocumentStore for JsonFileDocumentStore {
    fn append(&mut self, collection: &str, record: &MeditationSession) -> Result<String, PulseError> {
        fs::create_dir_all(&self.root)?;
        let path = self.collection_path(collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;

        debug!(path = %path.display(), id = %record.id, "session appended");
        Ok(record.id.clone())
    }

    fn query_recent(
        &self,
        collection: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MeditationSession>, PulseError> {
        let mut records = newest_first(self.read_user(collection, user_id)?);
        records.truncate(limit);
        Ok(records)
    }

    fn query_range(
        &self,
        collection: &str,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MeditationSession>, PulseError> {
        let mut records = self.read_user(collection, user_id)?;
        records.retain(|r| r.timestamp >= since);
        Ok(newest_first(records))
    }
}
