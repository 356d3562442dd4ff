use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::impl_entity;

/// A driver entered in races.
///
/// `team` is a loose reference: nothing checks that the team exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Player {
    pub id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "Code must be 1-64 characters"))]
    pub code: String,
    pub team: i32,
}

impl Player {
    pub fn new(name: impl Into<String>, code: impl Into<String>, team: i32) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: code.into(),
            team,
        }
    }
}

impl_entity!(Player);

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::players)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PlayerRow {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub team: i32,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::players)]
pub struct PlayerChanges<'a> {
    pub name: &'a str,
    pub code: &'a str,
    pub team: i32,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Self {
            id: Some(row.id),
            name: row.name,
            code: row.code,
            team: row.team,
        }
    }
}

impl<'a> From<&'a Player> for PlayerChanges<'a> {
    fn from(player: &'a Player) -> Self {
        Self {
            name: &player.name,
            code: &player.code,
            team: player.team,
        }
    }
}
