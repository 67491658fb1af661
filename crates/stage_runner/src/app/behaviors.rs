//! Steering states shared by the built-in and file-described stages.

use std::rc::Rc;

use stage_core::{State, StateRef, Transition, Vec3, VehicleBody};
use tracing::debug;

const DEFAULT_ARRIVAL_RADIUS: f32 = 1.0;
const SLOWING_RADIUS: f32 = 3.0;

/// Brakes to a stop and stays there.
#[derive(Debug, Default)]
pub(crate) struct Idle;

impl State<VehicleBody> for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn enter(&self, owner: &mut VehicleBody) {
        owner.target = None;
    }

    fn execute(&self, owner: &mut VehicleBody) -> Transition<VehicleBody> {
        let braking = -owner.velocity * owner.mass();
        owner.apply_force(braking);
        Transition::Stay
    }
}

/// Cycles through `waypoints`. Progress lives on the body's target so one
/// state value can drive any number of vehicles.
#[derive(Debug)]
pub(crate) struct Patrol {
    waypoints: Vec<Vec3>,
    arrival_radius: f32,
}

impl Patrol {
    pub(crate) fn new(waypoints: Vec<Vec3>, arrival_radius: f32) -> Self {
        Self {
            waypoints,
            arrival_radius: if arrival_radius > 0.0 {
                arrival_radius
            } else {
                DEFAULT_ARRIVAL_RADIUS
            },
        }
    }

    fn next_waypoint(&self, current: Option<Vec3>) -> Option<Vec3> {
        let index = current
            .and_then(|target| self.waypoints.iter().position(|point| *point == target))
            .map_or(0, |index| (index + 1) % self.waypoints.len());
        self.waypoints.get(index).copied()
    }
}

impl State<VehicleBody> for Patrol {
    fn name(&self) -> &'static str {
        "patrol"
    }

    fn enter(&self, owner: &mut VehicleBody) {
        let resumes_route = owner
            .target
            .is_some_and(|target| self.waypoints.contains(&target));
        if !resumes_route {
            owner.target = self.waypoints.first().copied();
        }
    }

    fn execute(&self, owner: &mut VehicleBody) -> Transition<VehicleBody> {
        let Some(target) = owner.target else {
            owner.target = self.next_waypoint(None);
            return Transition::Stay;
        };
        if owner.position.distance(target) <= self.arrival_radius {
            owner.target = self.next_waypoint(Some(target));
            debug!(entity = %owner.id(), "waypoint_reached");
        }
        if let Some(target) = owner.target {
            owner.seek(target);
        }
        Transition::Stay
    }
}

/// Heads back to `home` and hands control back to whatever ran before.
#[derive(Debug)]
pub(crate) struct ReturnHome {
    home: Vec3,
    settle_radius: f32,
}

impl ReturnHome {
    pub(crate) fn new(home: Vec3, settle_radius: f32) -> Self {
        Self {
            home,
            settle_radius,
        }
    }
}

impl State<VehicleBody> for ReturnHome {
    fn name(&self) -> &'static str {
        "return_home"
    }

    fn enter(&self, owner: &mut VehicleBody) {
        owner.target = Some(self.home);
        owner.recalled = true;
    }

    fn execute(&self, owner: &mut VehicleBody) -> Transition<VehicleBody> {
        if owner.position.distance(self.home) <= self.settle_radius {
            return Transition::Revert;
        }
        owner.arrive(self.home, SLOWING_RADIUS);
        Transition::Stay
    }

    fn exit(&self, owner: &mut VehicleBody) {
        owner.recalled = false;
    }
}

/// Global state: sends a vehicle home once it strays past `radius`.
pub(crate) struct StayInBounds {
    center: Vec3,
    radius: f32,
    return_home: StateRef<VehicleBody>,
}

impl StayInBounds {
    pub(crate) fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius,
            return_home: Rc::new(ReturnHome::new(center, radius * 0.5)),
        }
    }
}

impl State<VehicleBody> for StayInBounds {
    fn name(&self) -> &'static str {
        "stay_in_bounds"
    }

    fn execute(&self, owner: &mut VehicleBody) -> Transition<VehicleBody> {
        if !owner.recalled && owner.position.distance(self.center) > self.radius {
            debug!(entity = %owner.id(), "vehicle_out_of_bounds");
            return Transition::change_to(&self.return_home);
        }
        Transition::Stay
    }
}
