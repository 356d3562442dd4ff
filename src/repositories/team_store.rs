//! Single-table store for teams.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::store_error;
use super::traits::StoreAdapter;
use crate::error::AppResult;
use crate::models::{EntityId, Team, TeamChanges, TeamRow};
use crate::schema::teams;

#[derive(Debug, Clone, Copy, Default)]
pub struct TeamStore;

impl StoreAdapter for TeamStore {
    type Entity = Team;

    const NAME: &'static str = "team";

    fn fetch_one(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<Team>> {
        teams::table
            .find(id)
            .select(TeamRow::as_select())
            .first(conn)
            .optional()
            .map(|row| row.map(Team::from))
            .map_err(store_error("team.fetch_one"))
    }

    fn fetch_all(&self, conn: &mut SqliteConnection) -> AppResult<Vec<Team>> {
        teams::table
            .select(TeamRow::as_select())
            .order(teams::id)
            .load(conn)
            .map(|rows| rows.into_iter().map(Team::from).collect())
            .map_err(store_error("team.fetch_all"))
    }

    fn insert(&self, conn: &mut SqliteConnection, team: &Team) -> AppResult<Team> {
        diesel::insert_into(teams::table)
            .values(TeamChanges::from(team))
            .returning(TeamRow::as_returning())
            .get_result(conn)
            .map(Team::from)
            .map_err(store_error("team.insert"))
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        id: EntityId,
        team: &Team,
    ) -> AppResult<Option<Team>> {
        diesel::update(teams::table.find(id))
            .set(TeamChanges::from(team))
            .returning(TeamRow::as_returning())
            .get_result(conn)
            .optional()
            .map(|row| row.map(Team::from))
            .map_err(store_error("team.update"))
    }

    fn remove(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<Team>> {
        diesel::delete(teams::table.find(id))
            .returning(TeamRow::as_returning())
            .get_result(conn)
            .optional()
            .map(|row| row.map(Team::from))
            .map_err(store_error("team.remove"))
    }
}
