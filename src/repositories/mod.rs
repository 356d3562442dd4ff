//! Repository layer for data access operations.
//!
//! Every repository is a [`CachedRepository`] composed over a store adapter.
//! Races additionally resolve their player references through the player
//! repository.

mod cached;
mod player_store;
mod race_store;
mod team_store;
mod traits;
mod user_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use cached::CachedRepository;
pub use player_store::PlayerStore;
pub use race_store::RaceStore;
pub use team_store::TeamStore;
pub use traits::{PlayerLookup, Repository, StoreAdapter};
pub use user_store::UserStore;

use std::sync::Arc;

use crate::config::{LoadingStrategy, Settings};
use crate::db::{ConnectionProvider, SqliteConnectionProvider};
use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::events::{EventSink, TracingEventSink};

pub type TeamRepository = CachedRepository<TeamStore>;
pub type PlayerRepository = CachedRepository<PlayerStore>;
pub type UserRepository = CachedRepository<UserStore>;
pub type RaceRepository = CachedRepository<RaceStore>;

/// Maps a diesel failure of `operation` into an `AppError`.
pub(crate) fn store_error(operation: &'static str) -> impl FnOnce(diesel::result::Error) -> AppError {
    move |error| DatabaseErrorConverter::convert_diesel_error(error, operation)
}

/// Aggregates all repositories over one store.
///
/// Cloning is cheap and clones share their caches. The race repository reads
/// players through a clone of `players`, so both see the same player cache.
#[derive(Clone)]
pub struct Repositories {
    pub teams: TeamRepository,
    pub players: PlayerRepository,
    pub users: UserRepository,
    pub races: RaceRepository,
}

impl Repositories {
    /// Creates every repository with the same loading strategy and sink.
    ///
    /// # Errors
    /// Eager loading reads each table here, so store failures surface now.
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        strategy: LoadingStrategy,
        sink: Arc<dyn EventSink>,
    ) -> AppResult<Self> {
        let players = PlayerRepository::new(provider.clone(), PlayerStore, strategy, sink.clone())?;
        let lookup: Arc<dyn PlayerLookup> = Arc::new(players.clone());

        Ok(Self {
            teams: TeamRepository::new(provider.clone(), TeamStore, strategy, sink.clone())?,
            users: UserRepository::new(provider.clone(), UserStore, strategy, sink.clone())?,
            races: RaceRepository::new(
                provider,
                RaceStore::new(lookup, sink.clone()),
                strategy,
                sink,
            )?,
            players,
        })
    }

    /// Wires the repositories from loaded settings, logging through `tracing`.
    ///
    /// Applies pending migrations first when `database.auto_migrate` is set.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let provider = SqliteConnectionProvider::new(settings.database.clone())?;
        if settings.database.auto_migrate {
            provider.migrate()?;
        }
        Self::new(
            Arc::new(provider),
            settings.repository.loading,
            TracingEventSink::shared(),
        )
    }
}
