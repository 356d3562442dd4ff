//! Write-through cache composed over a store adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use diesel::sqlite::SqliteConnection;

use super::traits::{Repository, StoreAdapter};
use crate::config::LoadingStrategy;
use crate::db::ConnectionProvider;
use crate::error::AppResult;
use crate::events::{EventSink, RepositoryEvent};
use crate::models::{Entity, EntityId};
use validator::Validate;

/// Repository that mirrors store rows in memory according to its
/// [`LoadingStrategy`].
///
/// The cache is only touched after the store confirmed a write, so a failed
/// call leaves it as it was. Clones share one cache. Concurrent writers to
/// the same id are not coordinated: the store keeps the last write and the
/// cache keeps whichever caller finished last.
pub struct CachedRepository<S: StoreAdapter> {
    pub(super) provider: Arc<dyn ConnectionProvider>,
    pub(super) store: Arc<S>,
    pub(super) strategy: LoadingStrategy,
    pub(super) cache: Arc<DashMap<EntityId, S::Entity>>,
    /// Set once the whole table sits in the cache
    complete: Arc<AtomicBool>,
    pub(super) sink: Arc<dyn EventSink>,
}

impl<S: StoreAdapter> Clone for CachedRepository<S> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            strategy: self.strategy,
            cache: Arc::clone(&self.cache),
            complete: Arc::clone(&self.complete),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S: StoreAdapter> CachedRepository<S> {
    /// Creates the repository; `Eager` loads the whole table before returning.
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        store: S,
        strategy: LoadingStrategy,
        sink: Arc<dyn EventSink>,
    ) -> AppResult<Self> {
        let repository = Self {
            provider,
            store: Arc::new(store),
            strategy,
            cache: Arc::new(DashMap::new()),
            complete: Arc::new(AtomicBool::new(false)),
            sink,
        };

        if strategy == LoadingStrategy::Eager {
            repository.load_all()?;
        }

        tracing::debug!(
            entity = S::NAME,
            strategy = %strategy,
            store = %repository.provider.describe(),
            "Repository ready"
        );
        Ok(repository)
    }

    pub fn strategy(&self) -> LoadingStrategy {
        self.strategy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of entities currently held in memory.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, id: EntityId) -> bool {
        self.cache.contains_key(&id)
    }

    /// Forget one entity so the next read goes to the store.
    pub fn evict(&self, id: EntityId) {
        self.cache.remove(&id);
        self.complete.store(false, Ordering::Release);
    }

    pub(super) fn connect(&self) -> AppResult<SqliteConnection> {
        self.provider.connect()
    }

    pub(super) fn remember(&self, entity: &S::Entity) {
        if !self.strategy.caches() {
            return;
        }
        if let Some(id) = entity.id() {
            self.cache.insert(id, entity.clone());
        }
    }

    fn cached(&self, id: EntityId) -> Option<S::Entity> {
        if !self.strategy.caches() {
            return None;
        }
        self.cache.get(&id).map(|entry| entry.value().clone())
    }

    fn load_all(&self) -> AppResult<HashMap<EntityId, S::Entity>> {
        let mut conn = self.connect()?;
        let rows = self.store.fetch_all(&mut conn)?;
        self.sink.record(&RepositoryEvent::Loaded {
            entity: S::NAME,
            count: rows.len(),
        });

        let all: HashMap<EntityId, S::Entity> = rows
            .into_iter()
            .filter_map(|entity| entity.id().map(|id| (id, entity)))
            .collect();

        if self.strategy.caches() {
            self.cache.clear();
            for (id, entity) in &all {
                self.cache.insert(*id, entity.clone());
            }
            self.complete.store(true, Ordering::Release);
        }
        Ok(all)
    }

    fn reject(&self, reason: String) {
        self.sink.record(&RepositoryEvent::WriteRejected {
            entity: S::NAME,
            reason,
        });
    }
}

impl<S: StoreAdapter> Repository<EntityId, S::Entity> for CachedRepository<S> {
    fn find_one(&self, id: EntityId) -> AppResult<Option<S::Entity>> {
        if let Some(hit) = self.cached(id) {
            self.sink.record(&RepositoryEvent::CacheHit {
                entity: S::NAME,
                id,
            });
            return Ok(Some(hit));
        }
        self.sink.record(&RepositoryEvent::CacheMiss {
            entity: S::NAME,
            id,
        });

        let mut conn = self.connect()?;
        let found = self.store.fetch_one(&mut conn, id)?;
        if let Some(entity) = &found {
            self.remember(entity);
        }
        Ok(found)
    }

    /// Serves the cache once it holds the whole table; the first call of a
    /// lazy repository loads it. Passthrough always reads the store.
    fn find_all(&self) -> AppResult<HashMap<EntityId, S::Entity>> {
        if !self.strategy.caches() || !self.complete.load(Ordering::Acquire) {
            return self.load_all();
        }
        Ok(self
            .cache
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    fn save(&self, entity: &S::Entity) -> AppResult<Option<S::Entity>> {
        if let Some(id) = entity.id() {
            self.reject(format!("already persisted with id {}", id));
            return Ok(None);
        }
        entity.validate()?;

        let mut conn = self.connect()?;
        match self.store.insert(&mut conn, entity) {
            Ok(saved) => {
                let id = saved.persisted_id(S::NAME)?;
                self.remember(&saved);
                self.sink.record(&RepositoryEvent::Saved {
                    entity: S::NAME,
                    id,
                });
                Ok(Some(saved))
            }
            Err(error) if error.is_conflict() => {
                self.reject(error.to_string());
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn update(&self, entity: &S::Entity) -> AppResult<Option<S::Entity>> {
        let id = entity.persisted_id(S::NAME)?;
        entity.validate()?;

        let mut conn = self.connect()?;
        match self.store.update(&mut conn, id, entity)? {
            Some(updated) => {
                self.remember(&updated);
                self.sink.record(&RepositoryEvent::Updated {
                    entity: S::NAME,
                    id,
                });
                Ok(Some(updated))
            }
            None => {
                // Row is gone from the store; keep memory in line with it
                self.cache.remove(&id);
                Ok(None)
            }
        }
    }

    fn delete(&self, id: EntityId) -> AppResult<Option<S::Entity>> {
        let mut conn = self.connect()?;
        let removed = self.store.remove(&mut conn, id)?;

        self.cache.remove(&id);
        if removed.is_some() {
            self.sink.record(&RepositoryEvent::Deleted {
                entity: S::NAME,
                id,
            });
        }
        Ok(removed)
    }
}
