use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::world::WorldHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Fired by the player explicitly, e.g. "press to open".
    Interaction,
    /// Fired by a spatial trigger.
    Script,
}

impl ActionKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Interaction => "interaction",
            Self::Script => "script",
        }
    }
}

/// Callback bound to an action. `C` is whatever context the owning stage
/// hands to the proximity subsystem when it fires.
pub type ActionCallback<C> = Rc<dyn Fn(&mut C)>;

/// Immutable behavior descriptor: a label, a kind and a callback.
pub struct Action<C> {
    kind: ActionKind,
    label: String,
    callback: ActionCallback<C>,
}

impl<C> Action<C> {
    pub fn new(kind: ActionKind, label: impl Into<String>, callback: impl Fn(&mut C) + 'static) -> Self {
        Self::from_callback(kind, label, Rc::new(callback))
    }

    pub fn from_callback(kind: ActionKind, label: impl Into<String>, callback: ActionCallback<C>) -> Self {
        Self {
            kind,
            label: label.into(),
            callback,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Invokes the callback with `context`, untouched.
    pub fn run(&self, context: &mut C) {
        (self.callback)(context);
    }
}

impl<C> Clone for Action<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            label: self.label.clone(),
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<C> fmt::Debug for Action<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// World geometry the player can act on directly.
pub struct InteractiveObject<C> {
    object: WorldHandle,
    action: Action<C>,
}

impl<C> InteractiveObject<C> {
    pub fn new(object: WorldHandle, action: Action<C>) -> Self {
        Self { object, action }
    }

    pub fn object(&self) -> &WorldHandle {
        &self.object
    }

    pub fn action(&self) -> &Action<C> {
        &self.action
    }
}

impl<C> Clone for InteractiveObject<C> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            action: self.action.clone(),
        }
    }
}

impl<C> fmt::Debug for InteractiveObject<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractiveObject")
            .field("object", &self.object)
            .field("action", &self.action)
            .finish()
    }
}

/// Geometry tracked for bookkeeping only, e.g. collidable scenery.
#[derive(Debug, Clone)]
pub struct StaticObject {
    object: WorldHandle,
}

impl StaticObject {
    pub fn new(object: WorldHandle) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &WorldHandle {
        &self.object
    }
}

/// Invisible spherical volume bound to a script action.
pub struct ActionTrigger<C> {
    position: Vec3,
    distance: f32,
    action: Action<C>,
    is_active: bool,
}

impl<C> ActionTrigger<C> {
    pub fn new(position: Vec3, distance: f32, is_active: bool, action: Action<C>) -> Self {
        Self {
            position,
            distance,
            action,
            is_active,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn action(&self) -> &Action<C> {
        &self.action
    }

    /// Auto-fire triggers run as soon as the player enters them; the rest wait
    /// for an explicit activation.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.position.distance_squared(point) <= self.distance * self.distance
    }
}

impl<C> Clone for ActionTrigger<C> {
    fn clone(&self) -> Self {
        Self {
            position: self.position,
            distance: self.distance,
            action: self.action.clone(),
            is_active: self.is_active,
        }
    }
}

impl<C> fmt::Debug for ActionTrigger<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTrigger")
            .field("position", &self.position)
            .field("distance", &self.distance)
            .field("is_active", &self.is_active)
            .field("action", &self.action)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_actions_share_the_callback() {
        let action = Action::new(ActionKind::Script, "count", |count: &mut u32| *count += 1);
        let copy = action.clone();
        let mut count = 0;

        action.run(&mut count);
        copy.run(&mut count);

        assert_eq!(count, 2);
        assert_eq!(copy.label(), "count");
        assert_eq!(copy.kind(), ActionKind::Script);
    }

    #[test]
    fn trigger_contains_points_on_its_boundary() {
        let trigger = ActionTrigger::new(
            Vec3::new(0.0, 7.5, 75.0),
            10.0,
            true,
            Action::new(ActionKind::Script, "Change Stage", |_: &mut ()| {}),
        );

        assert!(trigger.contains(Vec3::new(0.0, 7.5, 65.0)));
        assert!(trigger.contains(Vec3::new(3.0, 7.5, 72.0)));
        assert!(!trigger.contains(Vec3::new(0.0, 7.5, 64.9)));
    }

    #[test]
    fn action_kind_tokens_match_serde_names() {
        let encoded = serde_json::to_string(&ActionKind::Interaction).expect("encode");
        assert_eq!(encoded, format!("\"{}\"", ActionKind::Interaction.as_token()));
    }
}
