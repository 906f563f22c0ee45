use std::fs;
use std::path::PathBuf;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No value stored under key '{0}'")]
    MissingKey(String),
    #[error("Store io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn sub_graph_key(scale: u32, block_id: usize) -> String {
    format!("sub_graphs/s{}/block_{}", scale, block_id)
}

pub fn features_key(scale: u32, block_id: usize) -> String {
    format!("features/s{}/block_{}", scale, block_id)
}

/// Keyed per-block artifact store.
///
/// A key is only readable after a fully successful `put`; partially written
/// values are never observable, so a failed block can simply be retried.
pub trait BlockStore: Sync {
    fn put_bytes(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>>;

    fn exists(&self, key: &str) -> bool;
}

/// Typed json convenience over any [`BlockStore`], including trait objects.
///
/// The generic `put`/`get` cannot live on `BlockStore` itself without making it
/// object-unsafe, so they are provided here via a blanket impl over `?Sized` —
/// giving identical `store.put(..)` / `store.get(..)` on concrete stores and on
/// `&dyn BlockStore` alike.
pub trait BlockStoreExt: BlockStore {
    fn put<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.put_bytes(key, serde_json::to_vec(value)?)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        Ok(serde_json::from_slice(&self.get_bytes(key)?)?)
    }
}

impl<S: BlockStore + ?Sized> BlockStoreExt for S {}

/// In-memory store for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl BlockStore for MemoryStore {
    fn put_bytes(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.slots.write().insert(key.to_string(), value);
        Ok(())
    }

    fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.slots
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::MissingKey(key.to_string()))
    }

    fn exists(&self, key: &str) -> bool {
        self.slots.read().contains_key(key)
    }
}

/// Directory-backed store: one json file per key.
///
/// Writes land in a `.tmp` sibling first and are published with an atomic
/// rename, so a crashed writer leaves no readable partial value behind.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl BlockStore for DirStore {
    fn put_bytes(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Err(StoreError::MissingKey(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn exists(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }
}
