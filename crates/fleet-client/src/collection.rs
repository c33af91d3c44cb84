//! File-backed local record collection.
//!
//! Records are kept as opaque JSON values: the sync layer only needs the
//! collection to be a JSON array, and never looks at individual fields.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use fleet_core::{CollectionError, RecordCollection};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonFileCollection {
    path: PathBuf,
    records: Vec<Value>,
}

impl JsonFileCollection {
    /// An empty collection that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Load `path`; a missing file is an empty collection.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CollectionError> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(data) => parse_records(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CollectionError::Persist(e)),
        };
        debug!(path = %path.display(), records = records.len(), "collection loaded");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn add(&mut self, record: Value) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordCollection for JsonFileCollection {
    type Records = Vec<Value>;

    fn serialize(&self) -> Result<Bytes, CollectionError> {
        serde_json::to_vec(&self.records)
            .map(Bytes::from)
            .map_err(|e| CollectionError::Serialize(e.to_string()))
    }

    fn deserialize(&self, payload: &[u8]) -> Result<Self::Records, CollectionError> {
        parse_records(payload)
    }

    fn replace_all(&mut self, records: Self::Records) {
        self.records = records;
    }

    fn persist_to_disk(&self) -> Result<(), CollectionError> {
        let data = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| CollectionError::Serialize(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// A JSON array of anything; `null` and blank input count as empty.
fn parse_records(data: &[u8]) -> Result<Vec<Value>, CollectionError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice::<Option<Vec<Value>>>(data)
        .map(Option::unwrap_or_default)
        .map_err(|e| CollectionError::Deserialize(e.to_string()))
}
