// Persistence for the demon and player collections.
//
// A backend only knows how to load and save a whole collection of JSON
// entities. `Repository` layers typed access on top and applies the
// degrade-to-empty policy for failed reads. There is no locking: every
// mutation is a full read-modify-write and the last save wins.
//
// Entries that do not deserialise are never dropped: they ride along in
// `Records` and are written back verbatim, at their original position.

pub mod json_file;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::metrics;
use crate::models::{Demon, Player};

pub use json_file::JsonFileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Demons,
    Players,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Demons => "demons",
            Collection::Players => "players",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Demons => "demons.json",
            Collection::Players => "players.json",
        }
    }
}

/// Whole-collection key-value persistence.
///
/// `save` must be all-or-nothing: on error the previously saved collection
/// stays intact. A collection that was never saved loads as empty.
pub trait Store: Send + Sync {
    fn load(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;
    fn save(&self, collection: Collection, entities: &[Value]) -> Result<(), StoreError>;
}

/// In-process store, used by tests and when no data directory is wanted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<Collection, Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(map.get(&collection).cloned().unwrap_or_default())
    }

    fn save(&self, collection: Collection, entities: &[Value]) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| StoreError::Task(e.to_string()))?;
        map.insert(collection, entities.to_vec());
        Ok(())
    }
}

/// A loaded collection: the entities that parsed, plus the raw entries that
/// did not, keyed by their index in the stored list.
#[derive(Debug, Clone, PartialEq)]
pub struct Records<T> {
    items: Vec<T>,
    unparsed: Vec<(usize, Value)>,
}

impl<T> Records<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }

    /// Number of stored entries carried through untouched.
    pub fn unparsed_count(&self) -> usize {
        self.unparsed.len()
    }
}

impl<T> Default for Records<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unparsed: Vec::new(),
        }
    }
}

impl<T> From<Vec<T>> for Records<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            unparsed: Vec::new(),
        }
    }
}

impl<T> Deref for Records<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T> DerefMut for Records<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

/// Typed access to the collections of a [`Store`].
///
/// Backend calls run on the blocking thread pool.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All demons in rank order. Read failures are logged and yield an empty list.
    pub async fn demons(&self) -> Records<Demon> {
        let demons: Records<Demon> = self.load_or_empty(Collection::Demons).await;
        metrics::DEMONS_TOTAL.set(demons.len() as i64);
        demons
    }

    /// All players in creation order. Read failures are logged and yield an empty list.
    pub async fn players(&self) -> Records<Player> {
        let players: Records<Player> = self.load_or_empty(Collection::Players).await;
        metrics::PLAYERS_TOTAL.set(players.len() as i64);
        players
    }

    pub async fn save_demons(&self, demons: &Records<Demon>) -> Result<(), StoreError> {
        self.save(Collection::Demons, demons).await?;
        metrics::DEMONS_TOTAL.set(demons.len() as i64);
        Ok(())
    }

    pub async fn save_players(&self, players: &Records<Player>) -> Result<(), StoreError> {
        self.save(Collection::Players, players).await?;
        metrics::PLAYERS_TOTAL.set(players.len() as i64);
        Ok(())
    }

    async fn load_or_empty<T: DeserializeOwned>(&self, collection: Collection) -> Records<T> {
        let store = self.store.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(collection))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))
            .and_then(|r| r);

        let values = match loaded {
            Ok(values) => values,
            Err(e) => {
                tracing::error!("Error reading {} collection: {e}", collection.name());
                metrics::PERSISTENCE_FAILURES_TOTAL
                    .with_label_values(&[collection.name(), "load"])
                    .inc();
                return Records::default();
            }
        };

        let mut records = Records::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(entity) => records.items.push(entity),
                Err(e) => {
                    tracing::warn!(
                        index,
                        "Carrying unreadable {} entry unchanged: {e}",
                        collection.name()
                    );
                    records.unparsed.push((index, value));
                }
            }
        }
        records
    }

    async fn save<T: Serialize>(
        &self,
        collection: Collection,
        records: &Records<T>,
    ) -> Result<(), StoreError> {
        let mut values = records
            .items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::Json {
                collection: collection.name(),
                source,
            })?;
        // Ascending indices, so earlier reinserts restore later positions.
        for (index, raw) in &records.unparsed {
            values.insert((*index).min(values.len()), raw.clone());
        }

        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || store.save(collection, &values))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))
            .and_then(|r| r);

        if let Err(e) = &result {
            tracing::error!("Error writing {} collection: {e}", collection.name());
            metrics::PERSISTENCE_FAILURES_TOTAL
                .with_label_values(&[collection.name(), "save"])
                .inc();
        }
        result
    }
}
