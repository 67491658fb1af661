use tracing::{debug, info, warn};

use super::{EntityError, EntityId, EntityIdAllocator, GameEntity, Vehicle, VehicleParams};
use crate::math::Vec3;

/// Structural changes requested while an update pass is running.
///
/// Removals are applied first, then additions, each in the order they were
/// queued.
#[derive(Debug)]
pub struct EntityCommands<'a> {
    allocator: &'a mut EntityIdAllocator,
    pending_additions: Vec<Box<dyn GameEntity>>,
    pending_removals: Vec<EntityId>,
}

impl<'a> EntityCommands<'a> {
    pub(crate) fn new(allocator: &'a mut EntityIdAllocator) -> Self {
        Self {
            allocator,
            pending_additions: Vec::new(),
            pending_removals: Vec::new(),
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    pub fn add(&mut self, entity: Box<dyn GameEntity>) {
        self.pending_additions.push(entity);
    }

    /// Queues a removal. An entity still waiting in the addition queue is
    /// dropped from it instead and never registered. Returns false if `id` is
    /// already queued for removal.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if let Some(index) = self
            .pending_additions
            .iter()
            .position(|entity| entity.id() == id)
        {
            self.pending_additions.remove(index);
            return true;
        }
        if self.pending_removals.contains(&id) {
            return false;
        }
        self.pending_removals.push(id);
        true
    }

    pub fn pending_removals(&self) -> &[EntityId] {
        &self.pending_removals
    }

    pub fn is_empty(&self) -> bool {
        self.pending_additions.is_empty() && self.pending_removals.is_empty()
    }
}

/// Owns every registered entity and drives them once per tick in insertion
/// order.
#[derive(Debug, Default)]
pub struct EntityManager {
    allocator: EntityIdAllocator,
    entities: Vec<Box<dyn GameEntity>>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    pub fn create_vehicle(
        &mut self,
        velocity: Vec3,
        mass: f32,
        max_speed: f32,
        max_force: f32,
        max_turn_rate: f32,
        num_samples_for_smoothing: usize,
    ) -> EntityId {
        let id = self.allocator.allocate();
        let vehicle = Vehicle::new(
            id,
            VehicleParams {
                velocity,
                mass,
                max_speed,
                max_force,
                max_turn_rate,
                num_samples_for_smoothing,
            },
        );
        self.entities.push(Box::new(vehicle));
        debug!(entity = %id, mass, max_speed, max_force, "vehicle_created");
        id
    }

    /// Runs one update pass. Every entity registered when the pass starts is
    /// visited exactly once, even if an earlier one fails. Changes queued
    /// through [`EntityCommands`] take effect after the pass. The first error
    /// raised during the pass is returned.
    pub fn update(&mut self, delta: f32) -> Result<(), EntityError> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(EntityError::InvalidDelta { delta });
        }

        let mut commands = EntityCommands::new(&mut self.allocator);
        let mut result = Ok(());
        for entity in self.entities.iter_mut() {
            if let Err(error) = entity.update(delta, &mut commands) {
                warn!(entity = %entity.id(), error = %error, "entity_update_failed");
                result = result.and(Err(error));
            }
        }

        let EntityCommands {
            pending_additions,
            pending_removals,
            ..
        } = commands;
        for id in pending_removals {
            self.remove_entity(id);
        }
        for entity in pending_additions {
            if let Err(error) = self.add_entity(entity) {
                result = result.and(Err(error));
            }
        }

        result
    }

    /// Registers an entity built elsewhere. Ids must be unique within this
    /// manager; use [`allocate_id`](Self::allocate_id) to obtain one.
    pub fn add_entity(&mut self, entity: Box<dyn GameEntity>) -> Result<EntityId, EntityError> {
        let id = entity.id();
        if self.contains(id) {
            return Err(EntityError::DuplicateId(id));
        }
        self.entities.push(entity);
        debug!(entity = %id, "entity_added");
        Ok(id)
    }

    /// Removes and drops the entity. Later entities keep their relative order.
    /// Returns false if `id` is not registered.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(index) = self.entities.iter().position(|entity| entity.id() == id) else {
            debug!(entity = %id, "entity_remove_missed");
            return false;
        };
        self.entities.remove(index);
        debug!(entity = %id, "entity_removed");
        true
    }

    pub fn remove_entities(&mut self) {
        let removed = self.entities.len();
        self.entities.clear();
        info!(removed, "entities_cleared");
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.iter().any(|entity| entity.id() == id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().map(|entity| entity.id())
    }

    pub fn entities(&self) -> &[Box<dyn GameEntity>] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&(dyn GameEntity + 'static)> {
        self.entities
            .iter()
            .find(|entity| entity.id() == id)
            .map(|entity| &**entity)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut (dyn GameEntity + 'static)> {
        self.entities
            .iter_mut()
            .find(|entity| entity.id() == id)
            .map(|entity| &mut **entity)
    }

    pub fn entity_as<T: GameEntity>(&self, id: EntityId) -> Option<&T> {
        self.entity(id)?.as_any().downcast_ref::<T>()
    }

    pub fn entity_as_mut<T: GameEntity>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entity_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn vehicle(&self, id: EntityId) -> Option<&Vehicle> {
        self.entity_as::<Vehicle>(id)
    }

    pub fn vehicle_mut(&mut self, id: EntityId) -> Option<&mut Vehicle> {
        self.entity_as_mut::<Vehicle>(id)
    }

    /// Other entities within `radius` of `id`, in registry order.
    pub fn neighbors_within(&self, id: EntityId, radius: f32) -> Vec<EntityId> {
        let Some(origin) = self.entity(id).map(|entity| entity.position()) else {
            return Vec::new();
        };
        let radius_squared = radius * radius;
        self.entities
            .iter()
            .filter(|entity| entity.id() != id)
            .filter(|entity| entity.position().distance_squared(origin) <= radius_squared)
            .map(|entity| entity.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::fsm::{State, StateMachineError, Transition};
    use crate::entity::VehicleBody;

    type VisitLog = Rc<RefCell<Vec<EntityId>>>;

    /// What a tracker does during its update.
    #[derive(Clone, Copy)]
    enum TrackerAction {
        Nothing,
        RemoveSelf,
        Remove(EntityId),
        SpawnTracker,
        SpawnThenRemove,
        Fail,
    }

    struct Tracker {
        id: EntityId,
        position: Vec3,
        visits: VisitLog,
        action: TrackerAction,
    }

    impl Tracker {
        fn boxed(id: EntityId, visits: &VisitLog) -> Box<dyn GameEntity> {
            Self::with_action(id, visits, TrackerAction::Nothing)
        }

        fn with_action(id: EntityId, visits: &VisitLog, action: TrackerAction) -> Box<dyn GameEntity> {
            Box::new(Self {
                id,
                position: Vec3::ZERO,
                visits: Rc::clone(visits),
                action,
            })
        }
    }

    impl GameEntity for Tracker {
        fn id(&self) -> EntityId {
            self.id
        }

        fn position(&self) -> Vec3 {
            self.position
        }

        fn update(
            &mut self,
            _delta: f32,
            commands: &mut EntityCommands<'_>,
        ) -> Result<(), EntityError> {
            self.visits.borrow_mut().push(self.id);
            match self.action {
                TrackerAction::Nothing => {}
                TrackerAction::RemoveSelf => {
                    commands.remove(self.id);
                }
                TrackerAction::Remove(other) => {
                    commands.remove(other);
                }
                TrackerAction::SpawnTracker => {
                    let id = commands.allocate_id();
                    commands.add(Tracker::boxed(id, &self.visits));
                    self.action = TrackerAction::Nothing;
                }
                TrackerAction::SpawnThenRemove => {
                    let id = commands.allocate_id();
                    commands.add(Tracker::boxed(id, &self.visits));
                    assert!(commands.remove(id));
                    assert!(commands.is_empty());
                }
                TrackerAction::Fail => {
                    return Err(EntityError::InvalidDelta { delta: -1.0 });
                }
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn add_trackers(manager: &mut EntityManager, visits: &VisitLog, count: usize) -> Vec<EntityId> {
        (0..count)
            .map(|_| {
                let id = manager.allocate_id();
                manager.add_entity(Tracker::boxed(id, visits)).expect("add tracker")
            })
            .collect()
    }

    fn take_visits(visits: &VisitLog) -> Vec<EntityId> {
        std::mem::take(&mut *visits.borrow_mut())
    }

    #[test]
    fn update_visits_registered_entities_once_in_insertion_order() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let ids = add_trackers(&mut manager, &visits, 4);

        manager.update(0.016).expect("update");

        assert_eq!(take_visits(&visits), ids);
    }

    #[test]
    fn removal_preserves_order_and_removed_entities_are_not_visited() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let ids = add_trackers(&mut manager, &visits, 4);

        assert!(manager.remove_entity(ids[1]));
        let readded = manager.allocate_id();
        manager
            .add_entity(Tracker::boxed(readded, &visits))
            .expect("add");
        assert!(manager.remove_entity(ids[3]));

        manager.update(0.016).expect("update");

        assert_eq!(take_visits(&visits), vec![ids[0], ids[2], readded]);
    }

    #[test]
    fn removing_a_missing_entity_changes_nothing() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let ids = add_trackers(&mut manager, &visits, 3);

        assert!(!manager.remove_entity(EntityId(999)));
        assert!(manager.remove_entity(ids[0]));
        assert!(!manager.remove_entity(ids[0]));

        assert_eq!(manager.ids().collect::<Vec<_>>(), vec![ids[1], ids[2]]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let ids = add_trackers(&mut manager, &visits, 1);

        let error = manager
            .add_entity(Tracker::boxed(ids[0], &visits))
            .expect_err("duplicate");
        assert_eq!(error, EntityError::DuplicateId(ids[0]));
        assert_eq!(manager.entity_count(), 1);
    }

    #[test]
    fn remove_entities_clears_the_registry() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        add_trackers(&mut manager, &visits, 3);

        manager.remove_entities();
        manager.update(0.016).expect("update");

        assert!(manager.is_empty());
        assert!(take_visits(&visits).is_empty());
    }

    #[test]
    fn self_removal_during_update_is_deferred_until_the_pass_ends() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let first = manager.allocate_id();
        manager
            .add_entity(Tracker::with_action(first, &visits, TrackerAction::RemoveSelf))
            .expect("add");
        let second = manager.allocate_id();
        manager.add_entity(Tracker::boxed(second, &visits)).expect("add");

        manager.update(0.016).expect("first pass");
        assert_eq!(take_visits(&visits), vec![first, second]);
        assert!(!manager.contains(first));

        manager.update(0.016).expect("second pass");
        assert_eq!(take_visits(&visits), vec![second]);
    }

    #[test]
    fn entity_removed_mid_pass_by_another_is_still_visited_in_that_pass() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let killer = manager.allocate_id();
        let victim = EntityId(killer.0 + 1);
        manager
            .add_entity(Tracker::with_action(killer, &visits, TrackerAction::Remove(victim)))
            .expect("add killer");
        assert_eq!(manager.allocate_id(), victim);
        manager.add_entity(Tracker::boxed(victim, &visits)).expect("add victim");

        manager.update(0.016).expect("update");

        assert_eq!(take_visits(&visits), vec![killer, victim]);
        assert_eq!(manager.ids().collect::<Vec<_>>(), vec![killer]);
    }

    #[test]
    fn entities_spawned_during_update_join_the_next_pass() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let spawner = manager.allocate_id();
        manager
            .add_entity(Tracker::with_action(spawner, &visits, TrackerAction::SpawnTracker))
            .expect("add");

        manager.update(0.016).expect("first pass");
        assert_eq!(take_visits(&visits), vec![spawner]);
        assert_eq!(manager.entity_count(), 2);

        manager.update(0.016).expect("second pass");
        let second_pass = take_visits(&visits);
        assert_eq!(second_pass.len(), 2);
        assert_eq!(second_pass[0], spawner);
    }

    #[test]
    fn entity_spawned_then_removed_in_the_same_pass_is_never_registered() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let spawner = manager.allocate_id();
        manager
            .add_entity(Tracker::with_action(spawner, &visits, TrackerAction::SpawnThenRemove))
            .expect("add");

        manager.update(0.016).expect("first pass");
        assert_eq!(manager.entity_count(), 1);

        manager.update(0.016).expect("second pass");
        assert_eq!(take_visits(&visits), vec![spawner, spawner]);
    }

    #[test]
    fn failing_entity_does_not_stop_the_pass() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        let failing = manager.allocate_id();
        manager
            .add_entity(Tracker::with_action(failing, &visits, TrackerAction::Fail))
            .expect("add failing");
        let remover = manager.allocate_id();
        manager
            .add_entity(Tracker::with_action(remover, &visits, TrackerAction::RemoveSelf))
            .expect("add remover");
        let last = manager.allocate_id();
        manager.add_entity(Tracker::boxed(last, &visits)).expect("add last");

        let error = manager.update(0.016).expect_err("first entity fails");

        assert_eq!(error, EntityError::InvalidDelta { delta: -1.0 });
        assert_eq!(take_visits(&visits), vec![failing, remover, last]);
        assert_eq!(manager.ids().collect::<Vec<_>>(), vec![failing, last]);
    }

    #[test]
    fn invalid_delta_is_rejected_before_any_entity_runs() {
        let visits = VisitLog::default();
        let mut manager = EntityManager::new();
        add_trackers(&mut manager, &visits, 2);

        assert_eq!(
            manager.update(-1.0),
            Err(EntityError::InvalidDelta { delta: -1.0 })
        );
        assert!(matches!(
            manager.update(f32::NAN),
            Err(EntityError::InvalidDelta { .. })
        ));
        assert!(take_visits(&visits).is_empty());
    }

    #[test]
    fn create_vehicle_registers_and_returns_a_typed_vehicle() {
        let mut manager = EntityManager::new();
        let id = manager.create_vehicle(Vec3::new(1.0, 0.0, 0.0), 2.0, 5.0, 3.0, 1.5, 8);

        let vehicle = manager.vehicle(id).expect("vehicle registered");
        assert_eq!(vehicle.body().id(), id);
        assert_eq!(vehicle.body().velocity, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(vehicle.body().mass(), 2.0);
        assert_eq!(vehicle.body().max_speed(), 5.0);
        assert_eq!(vehicle.body().max_force(), 3.0);
        assert_eq!(vehicle.body().max_turn_rate(), 1.5);
        assert_eq!(vehicle.smoothing_samples(), 8);
        assert_eq!(manager.entity_count(), 1);
    }

    #[test]
    fn vehicles_move_during_update() {
        let mut manager = EntityManager::new();
        let id = manager.create_vehicle(Vec3::new(2.0, 0.0, 0.0), 1.0, 5.0, 3.0, 1.5, 4);

        manager.update(0.5).expect("update");

        let vehicle = manager.vehicle(id).expect("vehicle");
        assert_eq!(vehicle.position(), Vec3::new(1.0, 0.0, 0.0));
    }

    struct AlwaysRevert;

    impl State<VehicleBody> for AlwaysRevert {
        fn name(&self) -> &'static str {
            "always_revert"
        }

        fn execute(&self, _owner: &mut VehicleBody) -> Transition<VehicleBody> {
            Transition::Revert
        }
    }

    #[test]
    fn state_machine_failure_names_the_entity() {
        let mut manager = EntityManager::new();
        let id = manager.create_vehicle(Vec3::ZERO, 1.0, 1.0, 1.0, 1.0, 1);
        manager
            .vehicle_mut(id)
            .expect("vehicle")
            .change_state(Rc::new(AlwaysRevert));

        let error = manager.update(0.1).expect_err("revert without history");

        assert_eq!(
            error,
            EntityError::StateMachine {
                entity: id,
                source: StateMachineError::NoPreviousState {
                    owner: id,
                    current: "always_revert",
                },
            }
        );
    }

    #[test]
    fn neighbors_within_excludes_self_and_distant_entities() {
        let mut manager = EntityManager::new();
        let center = manager.create_vehicle(Vec3::ZERO, 1.0, 1.0, 1.0, 1.0, 1);
        let near = manager.create_vehicle(Vec3::ZERO, 1.0, 1.0, 1.0, 1.0, 1);
        let far = manager.create_vehicle(Vec3::ZERO, 1.0, 1.0, 1.0, 1.0, 1);
        manager.vehicle_mut(near).expect("near").body_mut().position = Vec3::new(1.0, 0.0, 1.0);
        manager.vehicle_mut(far).expect("far").body_mut().position = Vec3::new(20.0, 0.0, 0.0);

        assert_eq!(manager.neighbors_within(center, 2.0), vec![near]);
        assert!(manager.neighbors_within(EntityId(42), 100.0).is_empty());
    }
}
