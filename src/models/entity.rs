use std::fmt::Debug;

use validator::Validate;

use crate::error::{AppError, AppResult};

/// Store-assigned identifier shared by every entity kind.
pub type EntityId = i32;

/// A value with a nullable identity that the store assigns exactly once.
///
/// Equality is derived per kind and covers the id plus every attribute.
pub trait Entity: Validate + Clone + Debug + PartialEq + Send + Sync + 'static {
    fn id(&self) -> Option<EntityId>;

    /// Record the identity the store generated for this value.
    fn assign_id(&mut self, id: EntityId);

    /// The identity of a persisted value, or a validation error for a
    /// transient one.
    fn persisted_id(&self, entity: &str) -> AppResult<EntityId> {
        self.id().ok_or_else(|| {
            AppError::validation(
                format!("{}.id", entity),
                "entity has not been saved and carries no id",
            )
        })
    }
}

/// Implements `Entity` for a struct with an `id: Option<EntityId>` field.
macro_rules! impl_entity {
    ($ty:ty) => {
        impl $crate::models::Entity for $ty {
            fn id(&self) -> Option<$crate::models::EntityId> {
                self.id
            }

            fn assign_id(&mut self, id: $crate::models::EntityId) {
                self.id = Some(id);
            }
        }
    };
}

pub(crate) use impl_entity;
