//! Directory-backed File Store: `<dir>/<ModelName>.json`, pretty-printed.

use super::FileStore;
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

#[derive(Clone, Debug)]
pub struct DirFileStore {
    dir: PathBuf,
}

impl DirFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirFileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }
}

#[async_trait]
impl FileStore for DirFileStore {
    /// Write to a sibling temp file then rename, so readers never see a partial document.
    async fn write_definition(&self, name: &str, json: &Value) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        let tmp = self.dir.join(format!(".{}.{}.tmp", name, EXTENSION));
        let mut body = serde_json::to_string_pretty(json)?;
        body.push('\n');
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    async fn list_definition_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true);
            if !hidden && path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    async fn read_definition(&self, path: &Path) -> Result<Value, StorageError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
