//! Key-value persistence used by the status store. Implementations must make
//! `update` atomic per key so concurrent writers never lose each other's changes.
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(serde_json::Error),

    #[error("decode error: {0}")]
    Decode(serde_json::Error),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}

/// Callback for [`KeyValueStore::update`]. Receives the current value and
/// returns the new one. Returning `None` removes the key.
pub type UpdateFn<'a> = dyn FnMut(Option<Vec<u8>>) -> Result<Option<Vec<u8>>, StoreError> + 'a;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<(), StoreError>;
}

pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(key)?
        .map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::Decode))
        .transpose()
}

pub fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value).map_err(StoreError::Encode)?;
    store.set(key, bytes)
}

/// Keeps everything in process memory. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        match f(data.get(key).cloned())? {
            Some(value) => data.insert(key.to_string(), value),
            None => data.remove(key),
        };
        Ok(())
    }
}

/// Stores one JSON file per key under a directory. Writes go to a temporary
/// file which is then renamed over the old one.
pub struct FilesystemStore {
    base_dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StoreError> {
        fs::create_dir_all(base_dir.as_ref())?;
        Ok(FilesystemStore {
            base_dir: base_dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }

    fn read(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(path: &Path, value: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn remove(path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl KeyValueStore for FilesystemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        let _guard = self.lock.lock();
        Self::read(&path)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let _guard = self.lock.lock();
        Self::write(&path, &value)
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let _guard = self.lock.lock();
        match f(Self::read(&path)?)? {
            Some(value) => Self::write(&path, &value),
            None => Self::remove(&path),
        }
    }
}
