use super::PersistenceAdapter;
use crate::attributes::Attributes;
use crate::error::{Result, TodozError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    /// Creation sequence within the namespace.
    #[serde(default)]
    seq: u64,
    attributes: Attributes,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// File-backed adapter: one JSON document per namespace.
///
/// ```text
/// <root>/
/// ├── todos.json      # {uuid: {seq, attributes, created_at, updated_at}}
/// └── config.json     # see crate::config
/// ```
///
/// Every call reads the document from disk so several processes (or several
/// CLI invocations) observe each other's writes.
pub struct FileAdapter {
    root: PathBuf,
    namespace: String,
}

impl FileAdapter {
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the namespace document.
    pub fn data_path(&self) -> PathBuf {
        self.root.join(format!("{}.json", self.namespace))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(TodozError::Io)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<HashMap<Uuid, StoredRecord>> {
        let path = self.data_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&path).map_err(TodozError::Io)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let records = serde_json::from_str(&content).map_err(TodozError::Serialization)?;
        Ok(records)
    }

    fn store(&self, records: &HashMap<Uuid, StoredRecord>) -> Result<()> {
        self.ensure_dir()?;
        let content = serde_json::to_string_pretty(records).map_err(TodozError::Serialization)?;

        // Atomic replace: temp file, then rename over the document.
        let path = self.data_path();
        let tmp = self.root.join(format!(".{}.json.tmp", self.namespace));
        fs::write(&tmp, content).map_err(TodozError::Io)?;
        fs::rename(&tmp, &path).map_err(TodozError::Io)?;
        tracing::trace!(path = %path.display(), records = records.len(), "wrote namespace");
        Ok(())
    }
}

impl PersistenceAdapter for FileAdapter {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn create(&self, attributes: &Attributes) -> Result<Uuid> {
        let mut records = self.load()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let seq = records.values().map(|r| r.seq).max().unwrap_or(0) + 1;
        records.insert(
            id,
            StoredRecord {
                seq,
                attributes: attributes.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        self.store(&records)?;
        Ok(id)
    }

    fn read(&self, id: &Uuid) -> Result<Attributes> {
        let records = self.load()?;
        records
            .get(id)
            .map(|r| r.attributes.clone())
            .ok_or(TodozError::NotFound(*id))
    }

    fn update(&self, id: &Uuid, attributes: &Attributes) -> Result<()> {
        let mut records = self.load()?;
        let record = records.get_mut(id).ok_or(TodozError::NotFound(*id))?;
        record.attributes = attributes.clone();
        record.updated_at = Utc::now();
        self.store(&records)
    }

    fn delete(&self, id: &Uuid) -> Result<()> {
        let mut records = self.load()?;
        if records.remove(id).is_none() {
            return Err(TodozError::NotFound(*id));
        }
        self.store(&records)
    }

    fn list(&self) -> Result<Vec<(Uuid, Attributes)>> {
        let mut records: Vec<_> = self.load()?.into_iter().collect();
        records.sort_by(|(a_id, a), (b_id, b)| {
            a.seq
                .cmp(&b.seq)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a_id.cmp(b_id))
        });
        Ok(records
            .into_iter()
            .map(|(id, record)| (id, record.attributes))
            .collect())
    }
}
