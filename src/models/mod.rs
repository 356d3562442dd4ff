mod entity;
mod player;
mod race;
mod team;
mod user;

pub use entity::{Entity, EntityId};
pub use player::{Player, PlayerChanges, PlayerRow};
pub use race::{Race, RaceChanges, RacePlayer, RaceRow};
pub use team::{Team, TeamChanges, TeamRow};
pub use user::{User, UserChanges, UserRow};
