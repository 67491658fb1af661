mod binding;
mod manager;
mod registry;

pub use binding::{Action, ActionCallback, ActionKind, ActionTrigger, InteractiveObject, StaticObject};
pub use manager::{ActionManager, InteractionId, StaticId, TriggerId};
