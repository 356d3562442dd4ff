//! Moto-Repo Library
//!
//! Cached repositories over a SQLite store for teams, players, users and
//! races, with races linked to players through a join table.

use shadow_rs::shadow;
shadow!(build);

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logger;
pub mod models;
pub mod repositories;
pub mod schema;

pub use crate::config::LoadingStrategy;
pub use error::{AppError, AppResult};
pub use repositories::{Repositories, Repository};

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}
