use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::impl_entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Team {
    pub id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl_entity!(Team);

/// Row read back from `teams`
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::teams)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TeamRow {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::teams)]
pub struct TeamChanges<'a> {
    pub name: &'a str,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Self {
            id: Some(row.id),
            name: row.name,
        }
    }
}

impl<'a> From<&'a Team> for TeamChanges<'a> {
    fn from(team: &'a Team) -> Self {
        Self { name: &team.name }
    }
}
