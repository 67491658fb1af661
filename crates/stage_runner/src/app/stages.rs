use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use stage_core::{EntityId, InteractionId, StateRef, Vec3, VehicleBody};
use tracing::{info, warn};

use super::behaviors::{Idle, Patrol, StayInBounds};
use super::description::{DescribedStage, StageDescription};
use super::stage::{Stage, StageContext, StageEffects, StageError};

pub(crate) const ENTRANCE_STAGE: &str = "008";
pub(crate) const DOOR_STAGE: &str = "009";

const DOOR_OPEN_FLAG: &str = "door_open";

type StageFactory = Box<dyn Fn() -> Box<dyn Stage>>;

/// Stage ids mapped to constructors. Ids are compared as plain strings.
#[derive(Default)]
pub(crate) struct StageCatalog {
    factories: BTreeMap<String, StageFactory>,
}

impl fmt::Debug for StageCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageCatalog")
            .field("stages", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StageCatalog {
    pub(crate) fn with_builtin_stages() -> Self {
        let mut catalog = Self::default();
        catalog.register(ENTRANCE_STAGE, || Box::new(EntranceStage));
        catalog.register(DOOR_STAGE, || Box::new(DoorStage::default()));
        catalog
    }

    pub(crate) fn register(&mut self, id: &str, factory: impl Fn() -> Box<dyn Stage> + 'static) {
        if self
            .factories
            .insert(id.to_string(), Box::new(factory))
            .is_some()
        {
            warn!(stage = id, "stage_definition_replaced");
        }
    }

    pub(crate) fn register_descriptions(&mut self, descriptions: Vec<StageDescription>) {
        for description in descriptions {
            let id = description.id.clone();
            let description = Rc::new(description);
            self.register(&id, move || {
                Box::new(DescribedStage::new(StageDescription::clone(&description)))
            });
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub(crate) fn create(&self, id: &str) -> Option<Box<dyn Stage>> {
        self.factories.get(id).map(|factory| factory())
    }
}

/// Entrance hall. Walking up the stairs into the landing volume moves the
/// player on to the door stage.
#[derive(Debug)]
struct EntranceStage;

impl Stage for EntranceStage {
    fn id(&self) -> &str {
        ENTRANCE_STAGE
    }

    fn setup(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let floor = ctx.spawn_mesh("floor", Vec3::ZERO);
        let stairs = ctx.spawn_mesh("stairs", Vec3::new(0.0, 3.75, 60.0));
        ctx.actions.create_static(floor);
        ctx.actions.create_static(stairs);

        ctx.actions.create_trigger(
            "Change Stage",
            Vec3::new(0.0, 7.5, 75.0),
            10.0,
            true,
            |effects: &mut StageEffects| effects.change_stage(DOOR_STAGE),
        );
        Ok(())
    }

    fn start(&mut self, ctx: &mut StageContext) {
        ctx.player.place(Vec3::new(0.0, 0.0, 0.0));
        ctx.player.speed = 12.0;
        ctx.player.set_route([Vec3::new(0.0, 0.0, 50.0), Vec3::new(0.0, 7.5, 75.0)]);
    }
}

/// Guarded door. Opening it calls the guards off and reveals the way back.
#[derive(Debug, Default)]
struct DoorStage {
    door: Option<InteractionId>,
    guards: Vec<EntityId>,
    door_open: bool,
}

impl DoorStage {
    const CENTER: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    const DOOR: Vec3 = Vec3::new(0.0, 0.0, 12.0);
    const EXIT: Vec3 = Vec3::new(0.0, 0.0, 24.0);
    const BOUNDS_RADIUS: f32 = 15.0;

    fn spawn_guard(
        ctx: &mut StageContext,
        position: Vec3,
        patrol: &StateRef<VehicleBody>,
        bounds: &StateRef<VehicleBody>,
    ) -> Result<EntityId, StageError> {
        let id = ctx
            .entities
            .create_vehicle(Vec3::ZERO, 1.0, 4.0, 12.0, std::f32::consts::PI, 8);
        let vehicle = ctx.entities.vehicle_mut(id).ok_or_else(|| StageError::Setup {
            stage: DOOR_STAGE.to_string(),
            message: format!("guard {id} missing after creation"),
        })?;
        vehicle.body_mut().position = position;
        vehicle.set_global_state(Some(Rc::clone(bounds)));
        vehicle.change_state(Rc::clone(patrol));
        Ok(id)
    }

    fn open_door(&mut self, ctx: &mut StageContext) {
        self.door_open = true;
        if let Some(door) = self.door.take() {
            ctx.actions.remove_interactive_object(door);
        }

        let idle: StateRef<VehicleBody> = Rc::new(Idle);
        for guard in &self.guards {
            if let Some(vehicle) = ctx.entities.vehicle_mut(*guard) {
                vehicle.change_state(Rc::clone(&idle));
            }
        }

        ctx.actions.create_trigger(
            "Leave Stage",
            Self::EXIT,
            2.0,
            true,
            |effects: &mut StageEffects| {
                effects.notify("You step back into the entrance hall.");
                effects.change_stage(ENTRANCE_STAGE);
            },
        );
        ctx.player.set_route([Self::EXIT]);
        info!(stage = DOOR_STAGE, guards = self.guards.len(), "door_opened");
    }
}

impl Stage for DoorStage {
    fn id(&self) -> &str {
        DOOR_STAGE
    }

    fn setup(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let left_wall = ctx.spawn_mesh("left wall", Vec3::new(-6.0, 0.0, 12.0));
        let right_wall = ctx.spawn_mesh("right wall", Vec3::new(6.0, 0.0, 12.0));
        ctx.actions.create_static(left_wall);
        ctx.actions.create_static(right_wall);

        let door = ctx.spawn_mesh("door", Self::DOOR);
        self.door = Some(ctx.actions.create_interaction(
            "open door",
            door,
            |effects: &mut StageEffects| {
                effects.raise(DOOR_OPEN_FLAG);
                effects.notify("The door swings open.");
            },
        ));

        let patrol: StateRef<VehicleBody> = Rc::new(Patrol::new(
            vec![
                Vec3::new(-8.0, 0.0, -8.0),
                Vec3::new(8.0, 0.0, -8.0),
                Vec3::new(8.0, 0.0, 8.0),
                Vec3::new(-8.0, 0.0, 8.0),
            ],
            1.0,
        ));
        let bounds: StateRef<VehicleBody> =
            Rc::new(StayInBounds::new(Self::CENTER, Self::BOUNDS_RADIUS));
        self.guards = vec![
            Self::spawn_guard(ctx, Vec3::new(-8.0, 0.0, -8.0), &patrol, &bounds)?,
            Self::spawn_guard(ctx, Vec3::new(8.0, 0.0, 8.0), &patrol, &bounds)?,
        ];
        Ok(())
    }

    fn start(&mut self, ctx: &mut StageContext) {
        ctx.player.place(Self::CENTER);
        ctx.player.auto_interact = true;
        ctx.player.set_route([Vec3::new(0.0, 0.0, 10.5)]);
    }

    fn update(&mut self, ctx: &mut StageContext, _delta: f32) {
        if !self.door_open && ctx.effects.has_flag(DOOR_OPEN_FLAG) {
            self.open_door(ctx);
        }
    }

    fn destroy(&mut self, _ctx: &mut StageContext) {
        self.door = None;
        self.guards.clear();
    }
}
