use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::fsm::StateMachineError;
use crate::math::Vec3;

mod manager;
mod smoother;
mod vehicle;

pub use manager::{EntityCommands, EntityManager};
pub use smoother::Smoother;
pub use vehicle::{Vehicle, VehicleBody, VehicleParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    #[error("invalid time delta {delta}: expected a finite, non-negative number of seconds")]
    InvalidDelta { delta: f32 },
    #[error("entity {0} is already registered")]
    DuplicateId(EntityId),
    #[error("entity {entity} failed to update: {source}")]
    StateMachine {
        entity: EntityId,
        #[source]
        source: StateMachineError,
    },
}

/// An autonomous object driven once per simulation tick by the
/// [`EntityManager`].
pub trait GameEntity: Any {
    fn id(&self) -> EntityId;

    fn position(&self) -> Vec3;

    /// Structural changes to the registry go through `commands`; they are
    /// applied once the current update pass has finished.
    fn update(&mut self, delta: f32, commands: &mut EntityCommands<'_>) -> Result<(), EntityError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn GameEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameEntity")
            .field("id", &self.id())
            .field("position", &self.position())
            .finish()
    }
}
