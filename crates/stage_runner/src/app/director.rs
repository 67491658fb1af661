use std::collections::BTreeSet;

use stage_core::{EntityError, InteractionId, TriggerId};
use thiserror::Error;
use tracing::{info, warn};

use super::proximity::{ProximitySensor, SenseReport};
use super::stage::{Stage, StageContext, StageError};
use super::stages::StageCatalog;

pub(crate) const DEFAULT_INTERACTION_REACH: f32 = 2.0;

#[derive(Debug, Error)]
pub(crate) enum DirectorError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),
    #[error("no stage is loaded")]
    NoActiveStage,
    #[error(transparent)]
    Setup(#[from] StageError),
    #[error("stage {stage}: entity update failed")]
    Entities {
        stage: String,
        #[source]
        source: EntityError,
    },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct TickOutcome {
    pub(crate) sensed: SenseReport,
    pub(crate) interacted: Option<InteractionId>,
    pub(crate) activated: Vec<TriggerId>,
    pub(crate) stage_changed_to: Option<String>,
}

/// Owns the active stage and its context. Stage changes requested during a
/// tick are applied at the end of that tick.
pub(crate) struct StageDirector {
    catalog: StageCatalog,
    context: StageContext,
    sensor: ProximitySensor,
    active: Option<Box<dyn Stage>>,
    last_interaction: Option<InteractionId>,
    activated: BTreeSet<TriggerId>,
    stage_changes: u64,
}

impl StageDirector {
    pub(crate) fn new(catalog: StageCatalog) -> Self {
        Self {
            catalog,
            context: StageContext::default(),
            sensor: ProximitySensor::new(DEFAULT_INTERACTION_REACH),
            active: None,
            last_interaction: None,
            activated: BTreeSet::new(),
            stage_changes: 0,
        }
    }

    pub(crate) fn active_stage_id(&self) -> Option<&str> {
        self.active.as_ref().map(|stage| stage.id())
    }

    pub(crate) fn context(&self) -> &StageContext {
        &self.context
    }

    pub(crate) fn stage_changes(&self) -> u64 {
        self.stage_changes
    }

    /// Tears down whatever is loaded, then sets up and starts `id`.
    pub(crate) fn load(&mut self, id: &str) -> Result<(), DirectorError> {
        let mut next = self
            .catalog
            .create(id)
            .ok_or_else(|| DirectorError::UnknownStage(id.to_string()))?;

        let previous = self.unload();
        if let Err(error) = next.setup(&mut self.context) {
            self.context.teardown();
            return Err(error.into());
        }
        next.start(&mut self.context);
        info!(
            from = previous.as_deref().unwrap_or("none"),
            stage = id,
            entities = self.context.entities.entity_count(),
            interactions = self.context.actions.interactive_object_count(),
            statics = self.context.actions.static_object_count(),
            triggers = self.context.actions.trigger_count(),
            "stage_loaded"
        );
        self.active = Some(next);
        Ok(())
    }

    /// Returns the id of the stage that was unloaded, if any.
    pub(crate) fn unload(&mut self) -> Option<String> {
        let mut stage = self.active.take()?;
        stage.destroy(&mut self.context);
        self.context.teardown();
        self.sensor.reset();
        self.last_interaction = None;
        self.activated.clear();
        let id = stage.id().to_string();
        info!(stage = %id, "stage_unloaded");
        Some(id)
    }

    /// One fixed step: move the player, run the entities, sense proximity, let
    /// the stage react, then apply any requested stage change.
    pub(crate) fn tick(&mut self, delta: f32) -> Result<TickOutcome, DirectorError> {
        let stage = self.active.as_mut().ok_or(DirectorError::NoActiveStage)?;
        let ctx = &mut self.context;

        ctx.player.advance(delta);
        ctx.entities
            .update(delta)
            .map_err(|source| DirectorError::Entities {
                stage: stage.id().to_string(),
                source,
            })?;

        let mut outcome = TickOutcome {
            sensed: self.sensor.sense(ctx),
            ..TickOutcome::default()
        };

        if ctx.player.auto_interact {
            match outcome.sensed.reachable {
                Some(id) if self.last_interaction != Some(id) => {
                    if self.sensor.interact(ctx, id) {
                        outcome.interacted = Some(id);
                    }
                    self.last_interaction = Some(id);
                }
                Some(_) => {}
                None => self.last_interaction = None,
            }

            // Manual triggers fire once the scripted player stops inside them.
            let waiting = &outcome.sensed.awaiting_activation;
            self.activated.retain(|id| waiting.contains(id));
            if ctx.player.is_idle() {
                for id in waiting {
                    if self.activated.insert(*id) && self.sensor.activate(ctx, *id) {
                        outcome.activated.push(*id);
                    }
                }
            }
        }

        stage.update(ctx, delta);

        for notice in ctx.effects.drain_notices() {
            info!(stage = stage.id(), text = %notice, "notice");
        }

        if let Some(next) = ctx.effects.take_stage_change() {
            if self.catalog.contains(&next) {
                self.load(&next)?;
                self.stage_changes += 1;
                outcome.stage_changed_to = Some(next);
            } else {
                warn!(stage = %next, "stage_change_to_unknown_stage_ignored");
            }
        }

        Ok(outcome)
    }
}
