use std::collections::BTreeSet;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::impl_entity;
use super::Player;
use crate::error::{AppError, AppResult};
use crate::repositories::PlayerLookup;

/// A race and the ids of the players entered in it.
///
/// Only player ids are held; [`Race::resolve_players`] turns them into full
/// players on demand. The set makes a (race, player) pair unique.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct Race {
    pub id: Option<i32>,
    #[validate(range(min = 0, message = "Engine type must not be negative"))]
    pub engine_type: i32,
    pub players: BTreeSet<i32>,
}

impl Race {
    pub fn new(engine_type: i32) -> Self {
        Self {
            id: None,
            engine_type,
            players: BTreeSet::new(),
        }
    }

    pub fn with_players(mut self, players: impl IntoIterator<Item = i32>) -> Self {
        self.players.extend(players);
        self
    }

    /// Always the size of the player set.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Returns `false` when the player was already entered.
    pub fn add_player(&mut self, player_id: i32) -> bool {
        self.players.insert(player_id)
    }

    pub fn remove_player(&mut self, player_id: i32) -> bool {
        self.players.remove(&player_id)
    }

    /// Looks up every referenced player, skipping ids that no longer resolve.
    pub fn resolve_players(&self, lookup: &dyn PlayerLookup) -> AppResult<Vec<Player>> {
        let mut resolved = Vec::with_capacity(self.players.len());
        for player_id in &self.players {
            if let Some(player) = lookup.find_player(*player_id)? {
                resolved.push(player);
            }
        }
        Ok(resolved)
    }
}

impl_entity!(Race);

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::races)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RaceRow {
    pub id: i32,
    pub engine_type: i32,
    pub player_count: i32,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::races)]
pub struct RaceChanges {
    pub engine_type: i32,
    pub player_count: i32,
}

impl RaceChanges {
    /// Converts a player count for the `player_count` column.
    pub fn count_column(count: usize) -> AppResult<i32> {
        i32::try_from(count).map_err(|_| {
            AppError::validation(
                "players",
                format!("{} players exceed the storable player count", count),
            )
        })
    }
}

impl TryFrom<&Race> for RaceChanges {
    type Error = AppError;

    fn try_from(race: &Race) -> AppResult<Self> {
        Ok(Self {
            engine_type: race.engine_type,
            player_count: Self::count_column(race.player_count())?,
        })
    }
}

/// One "player participates in race" row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::race_players)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RacePlayer {
    pub race_id: i32,
    pub player_id: i32,
}
