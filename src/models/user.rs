use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::impl_entity;

/// Stored credentials. The password is kept exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct User {
    pub id: Option<i32>,
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "Password is required"))]
    pub password: String,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            password: password.into(),
        }
    }
}

impl_entity!(User);

/// User model for reading from database
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChanges<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: Some(row.id),
            username: row.username,
            password: row.password,
        }
    }
}

impl<'a> From<&'a User> for UserChanges<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            username: &user.username,
            password: &user.password,
        }
    }
}
