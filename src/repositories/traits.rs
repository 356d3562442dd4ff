//! Capabilities shared by every repository.

use std::collections::HashMap;

use diesel::sqlite::SqliteConnection;

use crate::error::AppResult;
use crate::models::{Entity, EntityId, Player};

/// Uniform operation set over a store-backed collection.
///
/// A missing id is `Ok(None)`, never an error. Every other failure is an
/// `Err`. `update` returns the entity as written.
pub trait Repository<Id, E> {
    fn find_one(&self, id: Id) -> AppResult<Option<E>>;

    fn find_all(&self) -> AppResult<HashMap<Id, E>>;

    /// Persists a transient entity and returns it with its new id.
    ///
    /// `Ok(None)` when the entity already has an id or the store reports
    /// that the row already exists.
    fn save(&self, entity: &E) -> AppResult<Option<E>>;

    /// `Ok(None)` when no row carries the entity's id.
    fn update(&self, entity: &E) -> AppResult<Option<E>>;

    fn delete(&self, id: Id) -> AppResult<Option<E>>;
}

/// Minimal store capability a [`CachedRepository`](super::CachedRepository)
/// is composed over. Each call receives the connection to run on.
pub trait StoreAdapter: Send + Sync + 'static {
    type Entity: Entity;

    /// Entity kind used in events and error messages.
    const NAME: &'static str;

    fn fetch_one(
        &self,
        conn: &mut SqliteConnection,
        id: EntityId,
    ) -> AppResult<Option<Self::Entity>>;

    fn fetch_all(&self, conn: &mut SqliteConnection) -> AppResult<Vec<Self::Entity>>;

    /// Writes a transient entity and returns it with the generated id.
    fn insert(&self, conn: &mut SqliteConnection, entity: &Self::Entity)
    -> AppResult<Self::Entity>;

    fn update(
        &self,
        conn: &mut SqliteConnection,
        id: EntityId,
        entity: &Self::Entity,
    ) -> AppResult<Option<Self::Entity>>;

    fn remove(&self, conn: &mut SqliteConnection, id: EntityId)
    -> AppResult<Option<Self::Entity>>;
}

/// Read access to players, which is all a race needs to resolve its
/// references.
pub trait PlayerLookup: Send + Sync {
    fn find_player(&self, id: EntityId) -> AppResult<Option<Player>>;
}
