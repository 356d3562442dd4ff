//! Single-table store for players, plus the lookup races resolve through.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::cached::CachedRepository;
use super::store_error;
use super::traits::{PlayerLookup, Repository, StoreAdapter};
use crate::error::AppResult;
use crate::models::{EntityId, Player, PlayerChanges, PlayerRow};
use crate::schema::players;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerStore;

impl StoreAdapter for PlayerStore {
    type Entity = Player;

    const NAME: &'static str = "player";

    fn fetch_one(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<Player>> {
        players::table
            .find(id)
            .select(PlayerRow::as_select())
            .first(conn)
            .optional()
            .map(|row| row.map(Player::from))
            .map_err(store_error("player.fetch_one"))
    }

    fn fetch_all(&self, conn: &mut SqliteConnection) -> AppResult<Vec<Player>> {
        players::table
            .select(PlayerRow::as_select())
            .order(players::id)
            .load(conn)
            .map(|rows| rows.into_iter().map(Player::from).collect())
            .map_err(store_error("player.fetch_all"))
    }

    fn insert(&self, conn: &mut SqliteConnection, player: &Player) -> AppResult<Player> {
        diesel::insert_into(players::table)
            .values(PlayerChanges::from(player))
            .returning(PlayerRow::as_returning())
            .get_result(conn)
            .map(Player::from)
            .map_err(store_error("player.insert"))
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        id: EntityId,
        player: &Player,
    ) -> AppResult<Option<Player>> {
        diesel::update(players::table.find(id))
            .set(PlayerChanges::from(player))
            .returning(PlayerRow::as_returning())
            .get_result(conn)
            .optional()
            .map(|row| row.map(Player::from))
            .map_err(store_error("player.update"))
    }

    /// Join rows naming this player are left behind and surface as dangling
    /// references when their race is next loaded.
    fn remove(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<Player>> {
        diesel::delete(players::table.find(id))
            .returning(PlayerRow::as_returning())
            .get_result(conn)
            .optional()
            .map(|row| row.map(Player::from))
            .map_err(store_error("player.remove"))
    }
}

impl PlayerLookup for CachedRepository<PlayerStore> {
    fn find_player(&self, id: EntityId) -> AppResult<Option<Player>> {
        self.find_one(id)
    }
}
