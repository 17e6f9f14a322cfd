// One JSON file per collection: `{ "<collection>": [ ... ] }`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use super::{Collection, Store};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Store for JsonFileStore {
    fn load(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let path = self.path(collection);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&path, e)),
        };

        let mut doc: Map<String, Value> =
            serde_json::from_str(&text).map_err(|source| StoreError::Json {
                collection: collection.name(),
                source,
            })?;
        match doc.remove(collection.name()) {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    fn save(&self, collection: Collection, entities: &[Value]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let mut doc = Map::new();
        doc.insert(collection.name().to_string(), Value::Array(entities.to_vec()));
        let text = serde_json::to_string_pretty(&doc).map_err(|source| StoreError::Json {
            collection: collection.name(),
            source,
        })?;

        // Each save gets its own temp file beside the target and renames it
        // over the target, so concurrent saves never share a partial file.
        // The temp file is removed on drop if anything fails.
        let path = self.path(collection);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| io_error(&path, e.error))?;
        Ok(())
    }
}
