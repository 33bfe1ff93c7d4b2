//! Typed persistence over named collections. Each collection is one JSON
//! document; every mutation is a whole-collection read-modify-write that
//! persists synchronously before returning.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[cfg(test)]
mod tests;

/// A persisted entity type bound to its collection name.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Raw collection payloads. `load` distinguishes a collection that has never
/// been written (`Ok(None)`) from a medium that cannot be read
/// (`Err(Storage)`); callers must never see the latter as empty data.
pub trait StorageBackend: Send + Sync {
    fn load(&self, collection: &str) -> StoreResult<Option<String>>;

    fn store(&self, collection: &str, payload: &str) -> StoreResult<()>;

    /// Remove every collection.
    fn wipe(&self) -> StoreResult<()>;
}

/// One `<collection>.json` file per collection under a data directory.
pub struct JsonDirBackend {
    dir: PathBuf,
}

impl JsonDirBackend {
    pub fn new(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(StoreError::Storage)?;
        Ok(Self { dir })
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    fn check_dir(&self) -> StoreResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("data directory missing: {}", self.dir.display()),
            )))
        }
    }
}

impl StorageBackend for JsonDirBackend {
    fn load(&self, collection: &str) -> StoreResult<Option<String>> {
        // a missing file is an empty collection; a missing directory is not
        self.check_dir()?;
        match std::fs::read_to_string(self.path(collection)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Storage(e)),
        }
    }

    fn store(&self, collection: &str, payload: &str) -> StoreResult<()> {
        self.check_dir()?;
        std::fs::write(self.path(collection), payload).map_err(StoreError::Storage)
    }

    fn wipe(&self) -> StoreResult<()> {
        self.check_dir()?;
        for entry in std::fs::read_dir(&self.dir).map_err(StoreError::Storage)? {
            let entry = entry.map_err(StoreError::Storage)?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                std::fs::remove_file(&path).map_err(StoreError::Storage)?;
            }
        }
        Ok(())
    }
}

/// In-process backend for tests and ephemeral stores.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, collection: &str) -> StoreResult<Option<String>> {
        Ok(self.collections.read().get(collection).cloned())
    }

    fn store(&self, collection: &str, payload: &str) -> StoreResult<()> {
        self.collections
            .write()
            .insert(collection.to_string(), payload.to_string());
        Ok(())
    }

    fn wipe(&self) -> StoreResult<()> {
        self.collections.write().clear();
        Ok(())
    }
}

/// Typed CRUD and predicate queries over the backend's collections.
/// Collection order is insertion order; `remove` keeps survivors in place.
pub struct EntityStore {
    backend: Box<dyn StorageBackend>,
}

impl EntityStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Disk-backed store rooted at `dir`, created on first use.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self::new(JsonDirBackend::new(dir)?))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    fn read_all<T: Record>(&self) -> StoreResult<Vec<T>> {
        match self.backend.load(T::COLLECTION)? {
            Some(data) => serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
                collection: T::COLLECTION.to_string(),
                source: e,
            }),
            None => Ok(Vec::new()),
        }
    }

    fn write_all<T: Record>(&mut self, records: &[T]) -> StoreResult<()> {
        let payload =
            serde_json::to_string_pretty(records).map_err(|e| StoreError::Encode {
                collection: T::COLLECTION.to_string(),
                source: e,
            })?;
        self.backend.store(T::COLLECTION, &payload)
    }

    /// Append a record; the id must not already be present.
    pub fn insert<T: Record>(&mut self, record: T) -> StoreResult<T> {
        let mut records = self.read_all::<T>()?;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(StoreError::DuplicateId {
                collection: T::COLLECTION,
                id: record.id().to_string(),
            });
        }
        records.push(record.clone());
        self.write_all(&records)?;
        Ok(record)
    }

    pub fn get<T: Record>(&self, id: &str) -> StoreResult<Option<T>> {
        Ok(self.read_all::<T>()?.into_iter().find(|r| r.id() == id))
    }

    /// Like [`get`](Self::get) but absent records are an error.
    pub fn require<T: Record>(&self, id: &str) -> StoreResult<T> {
        self.get::<T>(id)?
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id))
    }

    pub fn all<T: Record>(&self) -> StoreResult<Vec<T>> {
        self.read_all()
    }

    /// Full scan in insertion order. An empty collection yields an empty
    /// vec, never an error.
    pub fn find<T: Record>(&self, pred: impl Fn(&T) -> bool) -> StoreResult<Vec<T>> {
        Ok(self.read_all::<T>()?.into_iter().filter(|r| pred(r)).collect())
    }

    /// Read-modify-write of one record: the closure mutates only the fields
    /// the caller touches, everything else is carried over untouched.
    pub fn update<T: Record>(&mut self, id: &str, apply: impl FnOnce(&mut T)) -> StoreResult<T> {
        let mut records = self.read_all::<T>()?;
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id))?;
        apply(record);
        let updated = record.clone();
        self.write_all(&records)?;
        Ok(updated)
    }

    /// Overwrite the entire collection.
    pub fn replace_all<T: Record>(&mut self, records: Vec<T>) -> StoreResult<()> {
        self.write_all(&records)
    }

    /// Delete the matching record, reporting whether anything was removed.
    pub fn remove<T: Record>(&mut self, id: &str) -> StoreResult<bool> {
        let mut records = self.read_all::<T>()?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records)?;
        Ok(true)
    }

    pub fn count<T: Record>(&self) -> StoreResult<usize> {
        Ok(self.read_all::<T>()?.len())
    }

    /// Drop every collection in the backend.
    pub fn wipe(&mut self) -> StoreResult<()> {
        self.backend.wipe()
    }
}
