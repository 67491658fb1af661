use std::any::Any;
use std::fmt;

use tracing::debug;

use super::{EntityCommands, EntityError, EntityId, GameEntity, Smoother};
use crate::fsm::{StateMachine, StateMachineError, StateRef};
use crate::math::Vec3;

const MIN_SPEED_SQUARED: f32 = 1e-8;
const FACING_TOLERANCE_RADIANS: f32 = 1e-4;

/// Construction parameters for a [`Vehicle`]. Values are taken as given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleParams {
    pub velocity: Vec3,
    pub mass: f32,
    pub max_speed: f32,
    pub max_force: f32,
    /// Radians per second.
    pub max_turn_rate: f32,
    pub num_samples_for_smoothing: usize,
}

/// Physical state of a vehicle. States operate on this, not on the
/// [`Vehicle`] wrapper, so the machine can borrow it mutably.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleBody {
    id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    heading: Vec3,
    side: Vec3,
    smoothed_heading: Vec3,
    mass: f32,
    max_speed: f32,
    max_force: f32,
    max_turn_rate: f32,
    steering_force: Vec3,
    /// Destination used by steering states.
    pub target: Option<Vec3>,
    /// Set while a state is steering the vehicle back to a fixed point.
    pub recalled: bool,
    retire_requested: bool,
}

impl VehicleBody {
    fn new(id: EntityId, params: VehicleParams) -> Self {
        let direction = params.velocity.normalize_or_zero();
        let heading = if direction == Vec3::ZERO {
            Vec3::Z
        } else {
            direction
        };
        Self {
            id,
            position: Vec3::ZERO,
            velocity: params.velocity,
            heading,
            side: Vec3::Y.cross(heading),
            smoothed_heading: heading,
            mass: params.mass,
            max_speed: params.max_speed,
            max_force: params.max_force,
            max_turn_rate: params.max_turn_rate,
            steering_force: Vec3::ZERO,
            target: None,
            recalled: false,
            retire_requested: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn heading(&self) -> Vec3 {
        self.heading
    }

    pub fn side(&self) -> Vec3 {
        self.side
    }

    pub fn smoothed_heading(&self) -> Vec3 {
        self.smoothed_heading
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn max_turn_rate(&self) -> f32 {
        self.max_turn_rate
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn steering_force(&self) -> Vec3 {
        self.steering_force
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.steering_force += force;
    }

    /// Steering force toward `target` at full speed.
    pub fn seek(&mut self, target: Vec3) {
        let desired = (target - self.position).normalize_or_zero() * self.max_speed;
        self.apply_force(desired - self.velocity);
    }

    /// Like [`seek`](Self::seek) but slows down inside `slowing_radius`.
    pub fn arrive(&mut self, target: Vec3, slowing_radius: f32) {
        let to_target = target - self.position;
        let distance = to_target.length();
        if distance <= f32::EPSILON {
            self.apply_force(-self.velocity);
            return;
        }
        let speed = if distance < slowing_radius {
            self.max_speed * distance / slowing_radius
        } else {
            self.max_speed
        };
        let desired = to_target / distance * speed;
        self.apply_force(desired - self.velocity);
    }

    /// Turns the heading toward `target` by at most `max_turn_rate * delta`.
    /// Returns true once the vehicle faces the target.
    pub fn rotate_heading_to_face(&mut self, target: Vec3, delta: f32) -> bool {
        let to_target = (target - self.position).normalize_or_zero();
        if to_target == Vec3::ZERO {
            return true;
        }
        if self.heading.angle_between(to_target) < FACING_TOLERANCE_RADIANS {
            return true;
        }

        let speed = self.speed();
        self.heading = self
            .heading
            .rotate_toward(to_target, self.max_turn_rate * delta);
        self.velocity = self.heading * speed;
        self.side = Vec3::Y.cross(self.heading);
        self.heading.angle_between(to_target) < FACING_TOLERANCE_RADIANS
    }

    /// Asks the owning manager to remove this vehicle after the current pass.
    pub fn retire(&mut self) {
        self.retire_requested = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retire_requested
    }

    fn integrate(&mut self, delta: f32) {
        let force = self.steering_force.truncate(self.max_force);
        self.steering_force = Vec3::ZERO;

        let acceleration = force / self.mass;
        self.velocity = (self.velocity + acceleration * delta).truncate(self.max_speed);
        self.position += self.velocity * delta;

        if self.velocity.length_squared() > MIN_SPEED_SQUARED {
            self.heading = self.velocity.normalize_or_zero();
            self.side = Vec3::Y.cross(self.heading);
        }
    }
}

/// A steered, autonomous entity with its own state machine.
pub struct Vehicle {
    body: VehicleBody,
    state_machine: StateMachine<VehicleBody>,
    smoother: Smoother,
}

impl Vehicle {
    pub fn new(id: EntityId, params: VehicleParams) -> Self {
        Self {
            body: VehicleBody::new(id, params),
            state_machine: StateMachine::new(id),
            smoother: Smoother::new(params.num_samples_for_smoothing),
        }
    }

    pub fn body(&self) -> &VehicleBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut VehicleBody {
        &mut self.body
    }

    pub fn state_machine(&self) -> &StateMachine<VehicleBody> {
        &self.state_machine
    }

    pub fn state_machine_mut(&mut self) -> &mut StateMachine<VehicleBody> {
        &mut self.state_machine
    }

    pub fn smoothing_samples(&self) -> usize {
        self.smoother.capacity()
    }

    pub fn change_state(&mut self, state: StateRef<VehicleBody>) {
        self.state_machine.change_state(&mut self.body, state);
    }

    pub fn revert_to_previous_state(&mut self) -> Result<(), StateMachineError> {
        self.state_machine.revert_to_previous_state(&mut self.body)
    }

    pub fn set_global_state(&mut self, state: Option<StateRef<VehicleBody>>) {
        self.state_machine.set_global_state(state);
    }

    pub fn is_in_state(&self, state: &StateRef<VehicleBody>) -> bool {
        self.state_machine.is_in_state(state)
    }
}

impl fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vehicle")
            .field("body", &self.body)
            .field("state", &self.state_machine.current_state_name())
            .finish()
    }
}

impl GameEntity for Vehicle {
    fn id(&self) -> EntityId {
        self.body.id
    }

    fn position(&self) -> Vec3 {
        self.body.position
    }

    fn update(&mut self, delta: f32, commands: &mut EntityCommands<'_>) -> Result<(), EntityError> {
        self.state_machine
            .update(&mut self.body)
            .map_err(|source| EntityError::StateMachine {
                entity: self.body.id,
                source,
            })?;

        self.body.integrate(delta);
        self.body.smoothed_heading = self.smoother.update(self.body.heading);

        if self.body.retire_requested && commands.remove(self.body.id) {
            debug!(entity = %self.body.id, "vehicle_retired");
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
