//! Single-table store for users.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::cached::CachedRepository;
use super::store_error;
use super::traits::StoreAdapter;
use crate::error::AppResult;
use crate::models::{EntityId, User, UserChanges, UserRow};
use crate::schema::users;

#[derive(Debug, Clone, Copy, Default)]
pub struct UserStore;

impl UserStore {
    pub fn fetch_by_username(
        &self,
        conn: &mut SqliteConnection,
        username: &str,
    ) -> AppResult<Option<User>> {
        users::table
            .filter(users::username.eq(username))
            .select(UserRow::as_select())
            .first(conn)
            .optional()
            .map(|row| row.map(User::from))
            .map_err(store_error("user.fetch_by_username"))
    }
}

impl StoreAdapter for UserStore {
    type Entity = User;

    const NAME: &'static str = "user";

    fn fetch_one(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<User>> {
        users::table
            .find(id)
            .select(UserRow::as_select())
            .first(conn)
            .optional()
            .map(|row| row.map(User::from))
            .map_err(store_error("user.fetch_one"))
    }

    fn fetch_all(&self, conn: &mut SqliteConnection) -> AppResult<Vec<User>> {
        users::table
            .select(UserRow::as_select())
            .order(users::id)
            .load(conn)
            .map(|rows| rows.into_iter().map(User::from).collect())
            .map_err(store_error("user.fetch_all"))
    }

    fn insert(&self, conn: &mut SqliteConnection, user: &User) -> AppResult<User> {
        diesel::insert_into(users::table)
            .values(UserChanges::from(user))
            .returning(UserRow::as_returning())
            .get_result(conn)
            .map(User::from)
            .map_err(store_error("user.insert"))
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        id: EntityId,
        user: &User,
    ) -> AppResult<Option<User>> {
        diesel::update(users::table.find(id))
            .set(UserChanges::from(user))
            .returning(UserRow::as_returning())
            .get_result(conn)
            .optional()
            .map(|row| row.map(User::from))
            .map_err(store_error("user.update"))
    }

    fn remove(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<User>> {
        diesel::delete(users::table.find(id))
            .returning(UserRow::as_returning())
            .get_result(conn)
            .optional()
            .map(|row| row.map(User::from))
            .map_err(store_error("user.remove"))
    }
}

impl CachedRepository<UserStore> {
    /// Finds a user by exact username, checking memory before the store.
    pub fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        if self.strategy.caches() {
            let hit = self
                .cache
                .iter()
                .find(|entry| entry.value().username == username)
                .map(|entry| entry.value().clone());
            if hit.is_some() {
                return Ok(hit);
            }
        }

        let mut conn = self.connect()?;
        let found = self.store.fetch_by_username(&mut conn, username)?;
        if let Some(user) = &found {
            self.remember(user);
        }
        Ok(found)
    }
}
