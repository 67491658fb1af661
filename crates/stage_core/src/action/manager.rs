use std::fmt;

use tracing::{debug, info};

use super::binding::{Action, ActionKind, ActionTrigger, InteractiveObject, StaticObject};
use super::registry::Registry;
use crate::math::Vec3;
use crate::world::WorldHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InteractionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StaticId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerId(pub u64);

/// Registry and factory for everything the player can interact with, walk
/// into, or bump against. It never polls; a proximity subsystem reads the
/// collections and fires the bound actions.
///
/// The three collections are independent. Ids are unique across all of them.
pub struct ActionManager<C> {
    next_id: u64,
    interactive_objects: Registry<InteractionId, InteractiveObject<C>>,
    static_objects: Registry<StaticId, StaticObject>,
    triggers: Registry<TriggerId, ActionTrigger<C>>,
}

impl<C> Default for ActionManager<C> {
    fn default() -> Self {
        Self {
            next_id: 0,
            interactive_objects: Registry::default(),
            static_objects: Registry::default(),
            triggers: Registry::default(),
        }
    }
}

impl<C> fmt::Debug for ActionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionManager")
            .field("interactive_objects", &self.interactive_objects)
            .field("static_objects", &self.static_objects)
            .field("triggers", &self.triggers)
            .finish()
    }
}

impl<C> ActionManager<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_interaction(
        &mut self,
        label: impl Into<String>,
        object: WorldHandle,
        callback: impl Fn(&mut C) + 'static,
    ) -> InteractionId {
        let action = Action::new(ActionKind::Interaction, label, callback);
        self.add_interactive_object(InteractiveObject::new(object, action))
    }

    pub fn create_static(&mut self, object: WorldHandle) -> StaticId {
        self.add_static_object(StaticObject::new(object))
    }

    pub fn create_trigger(
        &mut self,
        label: impl Into<String>,
        position: Vec3,
        distance: f32,
        is_active: bool,
        callback: impl Fn(&mut C) + 'static,
    ) -> TriggerId {
        let action = Action::new(ActionKind::Script, label, callback);
        self.add_trigger(ActionTrigger::new(position, distance, is_active, action))
    }

    pub fn add_interactive_object(&mut self, interactive_object: InteractiveObject<C>) -> InteractionId {
        let id = InteractionId(self.allocate());
        debug!(
            id = id.0,
            label = interactive_object.action().label(),
            object = interactive_object.object().debug_name(),
            "interaction_registered"
        );
        self.interactive_objects.push(id, interactive_object);
        id
    }

    /// Returns false when `id` is not registered.
    pub fn remove_interactive_object(&mut self, id: InteractionId) -> bool {
        let removed = self.interactive_objects.remove(id).is_some();
        debug!(id = id.0, removed, "interaction_remove");
        removed
    }

    pub fn remove_interactive_objects(&mut self) {
        let removed = self.interactive_objects.clear();
        debug!(removed, "interactions_cleared");
    }

    pub fn add_static_object(&mut self, static_object: StaticObject) -> StaticId {
        let id = StaticId(self.allocate());
        debug!(
            id = id.0,
            object = static_object.object().debug_name(),
            "static_registered"
        );
        self.static_objects.push(id, static_object);
        id
    }

    /// Returns false when `id` is not registered.
    pub fn remove_static_object(&mut self, id: StaticId) -> bool {
        let removed = self.static_objects.remove(id).is_some();
        debug!(id = id.0, removed, "static_remove");
        removed
    }

    pub fn remove_static_objects(&mut self) {
        let removed = self.static_objects.clear();
        debug!(removed, "statics_cleared");
    }

    pub fn add_trigger(&mut self, trigger: ActionTrigger<C>) -> TriggerId {
        let id = TriggerId(self.allocate());
        debug!(
            id = id.0,
            label = trigger.action().label(),
            distance = trigger.distance(),
            auto_fire = trigger.is_active(),
            "trigger_registered"
        );
        self.triggers.push(id, trigger);
        id
    }

    /// Returns false when `id` is not registered.
    pub fn remove_trigger(&mut self, id: TriggerId) -> bool {
        let removed = self.triggers.remove(id).is_some();
        debug!(id = id.0, removed, "trigger_remove");
        removed
    }

    pub fn remove_triggers(&mut self) {
        let removed = self.triggers.clear();
        debug!(removed, "triggers_cleared");
    }

    /// Empties all three collections, typically on stage teardown.
    pub fn clear(&mut self) {
        let interactions = self.interactive_objects.clear();
        let statics = self.static_objects.clear();
        let triggers = self.triggers.clear();
        info!(interactions, statics, triggers, "action_registry_cleared");
    }

    pub fn interactive_object(&self, id: InteractionId) -> Option<&InteractiveObject<C>> {
        self.interactive_objects.get(id)
    }

    pub fn static_object(&self, id: StaticId) -> Option<&StaticObject> {
        self.static_objects.get(id)
    }

    pub fn trigger(&self, id: TriggerId) -> Option<&ActionTrigger<C>> {
        self.triggers.get(id)
    }

    pub fn interactive_objects(&self) -> impl Iterator<Item = (InteractionId, &InteractiveObject<C>)> + '_ {
        self.interactive_objects.iter()
    }

    pub fn static_objects(&self) -> impl Iterator<Item = (StaticId, &StaticObject)> + '_ {
        self.static_objects.iter()
    }

    pub fn triggers(&self) -> impl Iterator<Item = (TriggerId, &ActionTrigger<C>)> + '_ {
        self.triggers.iter()
    }

    pub fn interactive_object_count(&self) -> usize {
        self.interactive_objects.len()
    }

    pub fn static_object_count(&self) -> usize {
        self.static_objects.len()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }
}
