//! Behavioral core of the stage engine: per-entity state machines, the entity
//! registry that drives autonomous vehicles every tick, and the action registry
//! that binds world geometry to player-triggered behavior.

pub mod action;
pub mod config;
pub mod entity;
pub mod fsm;
pub mod math;
pub mod world;

pub use action::{
    Action, ActionCallback, ActionKind, ActionManager, ActionTrigger, InteractionId,
    InteractiveObject, StaticId, StaticObject, TriggerId,
};
pub use config::{ConfigError, SimulationConfig};
pub use entity::{
    EntityCommands, EntityError, EntityId, EntityManager, GameEntity, Smoother, Vehicle,
    VehicleBody, VehicleParams,
};
pub use fsm::{State, StateMachine, StateMachineError, StateRef, Transition};
pub use math::Vec3;
pub use world::{ObjectId, StaticMesh, WorldHandle, WorldObject};
