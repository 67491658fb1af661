use std::collections::{BTreeSet, VecDeque};

use stage_core::{ActionManager, EntityManager, StaticMesh, Vec3, WorldHandle};
use thiserror::Error;
use tracing::info;

const ARRIVAL_THRESHOLD: f32 = 0.05;
const DEFAULT_PLAYER_SPEED: f32 = 6.0;

#[derive(Debug, Error)]
pub(crate) enum StageError {
    #[error("stage {stage}: {message}")]
    Setup { stage: String, message: String },
}

/// Requests raised by action callbacks. The director and the active stage
/// consume them after the proximity pass.
#[derive(Debug, Default)]
pub(crate) struct StageEffects {
    requested_stage: Option<String>,
    flags: BTreeSet<String>,
    notices: Vec<String>,
}

impl StageEffects {
    pub(crate) fn change_stage(&mut self, stage_id: impl Into<String>) {
        self.requested_stage = Some(stage_id.into());
    }

    pub(crate) fn take_stage_change(&mut self) -> Option<String> {
        self.requested_stage.take()
    }

    pub(crate) fn raise(&mut self, flag: impl Into<String>) {
        self.flags.insert(flag.into());
    }

    /// Flags stay raised until the stage is torn down.
    pub(crate) fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub(crate) fn notify(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
    }

    pub(crate) fn drain_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn clear(&mut self) {
        self.requested_stage = None;
        self.flags.clear();
        self.notices.clear();
    }
}

/// Scripted stand-in for the player avatar: walks a route at constant speed.
#[derive(Debug, Clone)]
pub(crate) struct Player {
    pub(crate) position: Vec3,
    pub(crate) speed: f32,
    pub(crate) auto_interact: bool,
    route: VecDeque<Vec3>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            speed: DEFAULT_PLAYER_SPEED,
            auto_interact: false,
            route: VecDeque::new(),
        }
    }
}

impl Player {
    pub(crate) fn place(&mut self, position: Vec3) {
        self.position = position;
        self.route.clear();
    }

    pub(crate) fn set_route(&mut self, waypoints: impl IntoIterator<Item = Vec3>) {
        self.route = waypoints.into_iter().collect();
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.route.is_empty()
    }

    pub(crate) fn advance(&mut self, delta: f32) {
        let mut budget = self.speed * delta;
        while budget > 0.0 {
            let Some(&target) = self.route.front() else {
                return;
            };
            let (next, arrived, used) = step_toward(self.position, target, budget);
            self.position = next;
            budget -= used;
            if arrived {
                self.route.pop_front();
            } else {
                return;
            }
        }
    }
}

/// Moves at most `max_step` toward `target`. Returns the new position, whether
/// the target was reached, and the distance actually travelled.
fn step_toward(current: Vec3, target: Vec3, max_step: f32) -> (Vec3, bool, f32) {
    let distance = current.distance(target);
    if distance <= ARRIVAL_THRESHOLD || distance <= max_step {
        return (target, true, distance);
    }
    let direction = (target - current) / distance;
    (current + direction * max_step, false, max_step)
}

/// Everything a stage owns while it is loaded. Torn down as a whole before the
/// next stage is set up.
#[derive(Debug, Default)]
pub(crate) struct StageContext {
    pub(crate) entities: EntityManager,
    pub(crate) actions: ActionManager<StageEffects>,
    pub(crate) effects: StageEffects,
    pub(crate) player: Player,
    next_object_id: u64,
}

impl StageContext {
    /// Registers a placeholder scene object. The real renderer would hand back
    /// its own handle here.
    pub(crate) fn spawn_mesh(&mut self, name: &str, position: Vec3) -> WorldHandle {
        let id = self.next_object_id;
        self.next_object_id = self.next_object_id.saturating_add(1);
        WorldHandle::from_object(StaticMesh::new(id, name, position))
    }

    pub(crate) fn spawn_hidden_mesh(&mut self, name: &str, position: Vec3) -> WorldHandle {
        let id = self.next_object_id;
        self.next_object_id = self.next_object_id.saturating_add(1);
        WorldHandle::from_object(StaticMesh::new(id, name, position).hidden())
    }

    pub(crate) fn teardown(&mut self) {
        let entities = self.entities.entity_count();
        self.entities.remove_entities();
        self.actions.clear();
        self.effects.clear();
        self.player = Player::default();
        self.next_object_id = 0;
        info!(entities, "stage_context_cleared");
    }
}

/// One playable stage. Mirrors the lifecycle the director drives:
/// `setup` once, `start` once, `update` every tick, `destroy` before teardown.
pub(crate) trait Stage {
    fn id(&self) -> &str;

    fn setup(&mut self, ctx: &mut StageContext) -> Result<(), StageError>;

    fn start(&mut self, _ctx: &mut StageContext) {}

    fn update(&mut self, _ctx: &mut StageContext, _delta: f32) {}

    fn destroy(&mut self, _ctx: &mut StageContext) {}
}
