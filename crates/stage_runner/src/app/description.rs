//! Data-driven stages loaded from a JSON stage file.

use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use stage_core::{SimulationConfig, StateRef, Vec3, VehicleBody};
use thiserror::Error;
use tracing::{debug, info};

use super::behaviors::{Idle, Patrol, StayInBounds};
use super::stage::{Stage, StageContext, StageEffects, StageError};

#[derive(Debug, Error)]
pub(crate) enum StageLoadError {
    #[error("read stage file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse stage file{}: {source}", at_field(.field))]
    Parse {
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {field}: {message}")]
    Invalid { field: String, message: String },
}

fn at_field(field: &str) -> String {
    if field.is_empty() || field == "." {
        String::new()
    } else {
        format!(" at {field}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageFile {
    #[serde(default)]
    pub(crate) simulation: Option<SimulationConfig>,
    #[serde(default)]
    pub(crate) start_stage: Option<String>,
    pub(crate) stages: Vec<StageDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageDescription {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) player: PlayerSpec,
    #[serde(default)]
    pub(crate) statics: Vec<MeshSpec>,
    #[serde(default)]
    pub(crate) interactions: Vec<InteractionSpec>,
    #[serde(default)]
    pub(crate) triggers: Vec<TriggerSpec>,
    #[serde(default)]
    pub(crate) vehicles: Vec<VehicleSpec>,
    #[serde(default)]
    pub(crate) bounds: Option<BoundsSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PlayerSpec {
    pub(crate) spawn: Vec3,
    pub(crate) route: Vec<Vec3>,
    pub(crate) speed: f32,
    pub(crate) auto_interact: bool,
}

impl Default for PlayerSpec {
    fn default() -> Self {
        Self {
            spawn: Vec3::ZERO,
            route: Vec::new(),
            speed: 6.0,
            auto_interact: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MeshSpec {
    pub(crate) name: String,
    pub(crate) position: Vec3,
    #[serde(default = "visible_by_default")]
    pub(crate) visible: bool,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct InteractionSpec {
    pub(crate) label: String,
    pub(crate) object: MeshSpec,
    #[serde(default)]
    pub(crate) effects: Vec<EffectSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TriggerSpec {
    pub(crate) label: String,
    pub(crate) position: Vec3,
    pub(crate) distance: f32,
    #[serde(default)]
    pub(crate) auto_fire: bool,
    #[serde(default)]
    pub(crate) effects: Vec<EffectSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EffectSpec {
    ChangeStage(String),
    Raise(String),
    Notice(String),
}

impl EffectSpec {
    fn apply(&self, effects: &mut StageEffects) {
        match self {
            Self::ChangeStage(stage) => effects.change_stage(stage.clone()),
            Self::Raise(flag) => effects.raise(flag.clone()),
            Self::Notice(text) => effects.notify(text.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct VehicleSpec {
    pub(crate) position: Vec3,
    #[serde(default)]
    pub(crate) velocity: Vec3,
    pub(crate) mass: f32,
    pub(crate) max_speed: f32,
    pub(crate) max_force: f32,
    pub(crate) max_turn_rate: f32,
    #[serde(default)]
    pub(crate) smoothing_samples: usize,
    #[serde(default)]
    pub(crate) behavior: BehaviorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum BehaviorSpec {
    #[default]
    Idle,
    Patrol {
        waypoints: Vec<Vec3>,
        #[serde(default)]
        arrival_radius: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BoundsSpec {
    pub(crate) center: Vec3,
    pub(crate) radius: f32,
}

pub(crate) fn load_stage_file(path: &Path) -> Result<StageFile, StageLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| StageLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_stage_file(&raw)?;
    info!(
        path = %path.display(),
        stages = file.stages.len(),
        "stage_file_loaded"
    );
    Ok(file)
}

pub(crate) fn parse_stage_file(raw: &str) -> Result<StageFile, StageLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let file = serde_path_to_error::deserialize::<_, StageFile>(&mut deserializer).map_err(
        |error| {
            let field = error.path().to_string();
            StageLoadError::Parse {
                field,
                source: error.into_inner(),
            }
        },
    )?;
    validate_stage_file(&file)?;
    Ok(file)
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> StageLoadError {
    StageLoadError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

fn expected_actual(field: impl Into<String>, expected: impl Display, actual: impl Display) -> StageLoadError {
    invalid(field, format!("expected {expected}, got {actual}"))
}

fn check_vec(field: &str, value: Vec3) -> Result<(), StageLoadError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(expected_actual(field, "finite vector", format!("{value:?}")))
    }
}

fn check_positive(field: &str, value: f32) -> Result<(), StageLoadError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(expected_actual(field, "positive number", value))
    }
}

fn validate_stage_file(file: &StageFile) -> Result<(), StageLoadError> {
    if let Some(simulation) = &file.simulation {
        simulation
            .validate()
            .map_err(|error| invalid("simulation", error.to_string()))?;
    }
    if file.stages.is_empty() {
        return Err(invalid("stages", "at least one stage is required"));
    }

    let mut seen = HashSet::new();
    for (index, stage) in file.stages.iter().enumerate() {
        if stage.id.trim().is_empty() {
            return Err(invalid(format!("stages[{index}].id"), "must not be empty"));
        }
        if !seen.insert(stage.id.as_str()) {
            return Err(invalid(
                format!("stages[{index}].id"),
                format!("duplicate stage id '{}'", stage.id),
            ));
        }
        validate_stage(&format!("stages[{index}]"), stage)?;
    }

    if let Some(start) = &file.start_stage {
        if !seen.contains(start.as_str()) {
            return Err(invalid(
                "start_stage",
                format!("unknown stage id '{start}'"),
            ));
        }
    }
    Ok(())
}

fn validate_stage(prefix: &str, stage: &StageDescription) -> Result<(), StageLoadError> {
    check_vec(&format!("{prefix}.player.spawn"), stage.player.spawn)?;
    check_positive(&format!("{prefix}.player.speed"), stage.player.speed)?;
    for (index, point) in stage.player.route.iter().enumerate() {
        check_vec(&format!("{prefix}.player.route[{index}]"), *point)?;
    }
    for (index, mesh) in stage.statics.iter().enumerate() {
        check_vec(&format!("{prefix}.statics[{index}].position"), mesh.position)?;
    }
    for (index, interaction) in stage.interactions.iter().enumerate() {
        check_vec(
            &format!("{prefix}.interactions[{index}].object.position"),
            interaction.object.position,
        )?;
    }
    for (index, trigger) in stage.triggers.iter().enumerate() {
        check_vec(&format!("{prefix}.triggers[{index}].position"), trigger.position)?;
        check_positive(&format!("{prefix}.triggers[{index}].distance"), trigger.distance)?;
    }
    for (index, vehicle) in stage.vehicles.iter().enumerate() {
        let field = format!("{prefix}.vehicles[{index}]");
        check_vec(&format!("{field}.position"), vehicle.position)?;
        check_vec(&format!("{field}.velocity"), vehicle.velocity)?;
        check_positive(&format!("{field}.mass"), vehicle.mass)?;
        check_positive(&format!("{field}.max_speed"), vehicle.max_speed)?;
        check_positive(&format!("{field}.max_force"), vehicle.max_force)?;
        check_positive(&format!("{field}.max_turn_rate"), vehicle.max_turn_rate)?;
        if let BehaviorSpec::Patrol { waypoints, .. } = &vehicle.behavior {
            if waypoints.is_empty() {
                return Err(invalid(
                    format!("{field}.behavior.patrol.waypoints"),
                    "patrol needs at least one waypoint",
                ));
            }
            for (point_index, point) in waypoints.iter().enumerate() {
                check_vec(
                    &format!("{field}.behavior.patrol.waypoints[{point_index}]"),
                    *point,
                )?;
            }
        }
    }
    if let Some(bounds) = &stage.bounds {
        check_vec(&format!("{prefix}.bounds.center"), bounds.center)?;
        check_positive(&format!("{prefix}.bounds.radius"), bounds.radius)?;
    }
    Ok(())
}

/// A stage built entirely from its description.
#[derive(Debug)]
pub(crate) struct DescribedStage {
    description: StageDescription,
}

impl DescribedStage {
    pub(crate) fn new(description: StageDescription) -> Self {
        Self { description }
    }
}

fn bind_effects(effects: &[EffectSpec]) -> impl Fn(&mut StageEffects) + 'static {
    let effects: Rc<[EffectSpec]> = effects.into();
    move |context: &mut StageEffects| {
        for effect in effects.iter() {
            effect.apply(context);
        }
    }
}

impl Stage for DescribedStage {
    fn id(&self) -> &str {
        &self.description.id
    }

    fn setup(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let description = &self.description;

        for mesh in &description.statics {
            let handle = if mesh.visible {
                ctx.spawn_mesh(&mesh.name, mesh.position)
            } else {
                ctx.spawn_hidden_mesh(&mesh.name, mesh.position)
            };
            ctx.actions.create_static(handle);
        }

        for interaction in &description.interactions {
            let object = &interaction.object;
            let handle = if object.visible {
                ctx.spawn_mesh(&object.name, object.position)
            } else {
                ctx.spawn_hidden_mesh(&object.name, object.position)
            };
            ctx.actions.create_interaction(
                interaction.label.clone(),
                handle,
                bind_effects(&interaction.effects),
            );
        }

        for trigger in &description.triggers {
            ctx.actions.create_trigger(
                trigger.label.clone(),
                trigger.position,
                trigger.distance,
                trigger.auto_fire,
                bind_effects(&trigger.effects),
            );
        }

        let idle: StateRef<VehicleBody> = Rc::new(Idle);
        let bounds: Option<StateRef<VehicleBody>> = description.bounds.as_ref().map(|bounds| {
            Rc::new(StayInBounds::new(bounds.center, bounds.radius)) as StateRef<VehicleBody>
        });
        for (index, spec) in description.vehicles.iter().enumerate() {
            let id = ctx.entities.create_vehicle(
                spec.velocity,
                spec.mass,
                spec.max_speed,
                spec.max_force,
                spec.max_turn_rate,
                spec.smoothing_samples,
            );
            let vehicle = ctx.entities.vehicle_mut(id).ok_or_else(|| StageError::Setup {
                stage: description.id.clone(),
                message: format!("vehicle {index} missing after creation"),
            })?;
            vehicle.body_mut().position = spec.position;
            vehicle.set_global_state(bounds.clone());
            let state = match &spec.behavior {
                BehaviorSpec::Idle => Rc::clone(&idle),
                BehaviorSpec::Patrol {
                    waypoints,
                    arrival_radius,
                } => Rc::new(Patrol::new(waypoints.clone(), *arrival_radius)) as StateRef<VehicleBody>,
            };
            vehicle.change_state(state);
            // A revert from the opening behavior lands in idle.
            vehicle
                .state_machine_mut()
                .set_previous_state(Rc::clone(&idle));
        }

        ctx.player.place(description.player.spawn);
        ctx.player.speed = description.player.speed;
        ctx.player.auto_interact = description.player.auto_interact;
        ctx.player.set_route(description.player.route.iter().copied());

        debug!(
            stage = %description.id,
            statics = description.statics.len(),
            interactions = description.interactions.len(),
            triggers = description.triggers.len(),
            vehicles = description.vehicles.len(),
            "described_stage_setup"
        );
        Ok(())
    }
}
