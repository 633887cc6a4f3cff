//! Opaque key-value storage for console state.
//!
//! The console persists three keys: [`COLOR_KEY`], [`AVAILABLE_KEY`] and
//! [`HISTORY_KEY`]. Values are JSON. Writes are last-writer-wins with no
//! transactions.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, from_reader, to_writer_pretty};

use crate::error::{Error, Result};

/// Key holding `"light"` or `"dark"`.
pub const COLOR_KEY: &str = "color";
/// Key holding the last probed availability.
pub const AVAILABLE_KEY: &str = "ollama-available";
/// Key holding the bounded conversation history.
pub const HISTORY_KEY: &str = "history";

/// A get/set store of JSON values.
pub trait KeyValueStore: Send {
    /// Returns the value under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Replaces the value under `key`.
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

/// A store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A store backed by one JSON object on disk, rewritten on every set.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Opens the file at `path`; a missing file starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match File::open(&path) {
            Ok(file) => from_reader(BufReader::new(file)).map_err(|err| {
                Error::serialization("failed to parse store file", Some(Box::new(err)))
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(Error::io("failed to open store file", err)),
        };
        Ok(Self { path, values })
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create store file", err))?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, values).map_err(|err| {
            Error::serialization("failed to write store file", Some(Box::new(err)))
        })?;
        writer
            .flush()
            .map_err(|err| Error::io("failed to write store file", err))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    /// Memory only changes once the file has been written.
    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.clone();
        values.insert(key.to_string(), value);
        self.save(&values)?;
        self.values = values;
        Ok(())
    }
}

/// Shared handle to the process-wide store.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<Mutex<Box<dyn KeyValueStore>>>,
}

impl Storage {
    /// Wrap a store for sharing between components.
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(store))),
        }
    }

    /// A fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn KeyValueStore>> {
        // Values are replaced whole, so a poisoned lock still guards consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key)
    }

    /// Replaces the value under `key`.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock().set(key, value)
    }
}
