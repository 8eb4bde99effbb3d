//! Durable local key-value storage for the todo collection.
//!
//! [`Storage`] is the raw string key-value seam, [`Persistence`] is the typed
//! layer the store talks to.

use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
};

use thiserror::Error;
use tidy_api::v1::{Todo, TodoId};

use crate::achievements::AchievementLedger;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait Storage: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // atomic replace
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

pub struct Persistence {
    backend: Box<dyn Storage>,
}

impl Persistence {
    pub const TODOS_KEY: &'static str = "todo_data_v3";
    pub const ORDER_KEY: &'static str = "todo_manual_order";
    pub const ACHIEVEMENTS_KEY: &'static str = "todo_achievements";

    pub fn new(backend: impl Storage + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::default())
    }

    pub fn load_todos(&self) -> Result<Vec<Todo>, StorageError> {
        match self.backend.get(Self::TODOS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// `None` when no order was ever stored.
    pub fn load_order(&self) -> Result<Option<Vec<TodoId>>, StorageError> {
        match self.backend.get(Self::ORDER_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Rewrites the collection, and the manual order when it is non-empty.
    ///
    /// An empty collection always resets the stored order so no ids outlive
    /// their todos.
    pub fn save(&mut self, todos: &[Todo], order: &[TodoId]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(todos)?;
        self.backend.set(Self::TODOS_KEY, &raw)?;

        if !order.is_empty() || todos.is_empty() {
            let order = serde_json::to_string(order)?;
            self.backend.set(Self::ORDER_KEY, &order)?;
        }

        Ok(())
    }

    pub fn load_ledger(&self) -> Result<AchievementLedger, StorageError> {
        match self.backend.get(Self::ACHIEVEMENTS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(AchievementLedger::default()),
        }
    }

    pub fn save_ledger(&mut self, ledger: &AchievementLedger) -> Result<(), StorageError> {
        let raw = serde_json::to_string(ledger)?;
        self.backend.set(Self::ACHIEVEMENTS_KEY, &raw)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.backend.remove(Self::TODOS_KEY)?;
        self.backend.remove(Self::ORDER_KEY)?;
        self.backend.remove(Self::ACHIEVEMENTS_KEY)
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}
