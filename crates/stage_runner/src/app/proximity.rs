use std::collections::BTreeSet;

use stage_core::{InteractionId, TriggerId};
use tracing::{debug, info};

use super::stage::StageContext;

/// What the sensor saw during one pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct SenseReport {
    /// Auto-fire triggers the player entered this pass, in registry order.
    pub(crate) fired: Vec<TriggerId>,
    /// Manual triggers the player is standing in.
    pub(crate) awaiting_activation: Vec<TriggerId>,
    /// Closest visible interactive object within reach.
    pub(crate) reachable: Option<InteractionId>,
}

/// Polls the action registry against the player position. Auto-fire triggers
/// are edge triggered: they run once on entry and re-arm when the player
/// leaves the volume.
#[derive(Debug, Clone)]
pub(crate) struct ProximitySensor {
    interaction_reach: f32,
    occupied: BTreeSet<TriggerId>,
}

impl ProximitySensor {
    pub(crate) fn new(interaction_reach: f32) -> Self {
        Self {
            interaction_reach,
            occupied: BTreeSet::new(),
        }
    }

    pub(crate) fn sense(&mut self, ctx: &mut StageContext) -> SenseReport {
        let player = ctx.player.position;
        let mut report = SenseReport::default();
        let mut inside = BTreeSet::new();

        for (id, trigger) in ctx.actions.triggers() {
            if !trigger.contains(player) {
                continue;
            }
            inside.insert(id);
            if !trigger.is_active() {
                report.awaiting_activation.push(id);
                continue;
            }
            if self.occupied.contains(&id) {
                continue;
            }
            info!(trigger = id.0, label = trigger.action().label(), "trigger_fired");
            trigger.action().run(&mut ctx.effects);
            report.fired.push(id);
        }
        self.occupied = inside;

        let reach_squared = self.interaction_reach * self.interaction_reach;
        report.reachable = ctx
            .actions
            .interactive_objects()
            .filter(|(_, interactive)| interactive.object().is_visible())
            .map(|(id, interactive)| {
                (id, interactive.object().position().distance_squared(player))
            })
            .filter(|(_, distance_squared)| *distance_squared <= reach_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);

        report
    }

    /// Runs a manual trigger. Only succeeds while the player stands inside it.
    pub(crate) fn activate(&self, ctx: &mut StageContext, id: TriggerId) -> bool {
        let player = ctx.player.position;
        let Some(trigger) = ctx.actions.trigger(id) else {
            debug!(trigger = id.0, "activate_unknown_trigger");
            return false;
        };
        if !trigger.contains(player) {
            return false;
        }
        info!(trigger = id.0, label = trigger.action().label(), "trigger_activated");
        trigger.action().run(&mut ctx.effects);
        true
    }

    /// Runs the action bound to an interactive object within reach.
    pub(crate) fn interact(&self, ctx: &mut StageContext, id: InteractionId) -> bool {
        let player = ctx.player.position;
        let Some(interactive) = ctx.actions.interactive_object(id) else {
            debug!(interaction = id.0, "interact_unknown_object");
            return false;
        };
        if interactive.object().position().distance(player) > self.interaction_reach {
            return false;
        }
        info!(
            interaction = id.0,
            label = interactive.action().label(),
            object = interactive.object().debug_name(),
            "interaction_performed"
        );
        interactive.action().run(&mut ctx.effects);
        true
    }

    /// Forgets which triggers the player was standing in.
    pub(crate) fn reset(&mut self) {
        self.occupied.clear();
    }
}

#[cfg(test)]
mod tests {
    use stage_core::Vec3;

    use super::*;
    use crate::app::stage::StageEffects;

    fn context_with_exit_trigger() -> (StageContext, TriggerId) {
        let mut ctx = StageContext::default();
        let id = ctx.actions.create_trigger(
            "Change Stage",
            Vec3::new(0.0, 7.5, 75.0),
            10.0,
            true,
            |effects: &mut StageEffects| effects.change_stage("009"),
        );
        (ctx, id)
    }

    #[test]
    fn auto_fire_trigger_runs_once_per_entry() {
        let (mut ctx, id) = context_with_exit_trigger();
        let mut sensor = ProximitySensor::new(2.0);

        ctx.player.position = Vec3::new(0.0, 7.5, 70.0);
        assert_eq!(sensor.sense(&mut ctx).fired, vec![id]);
        assert_eq!(ctx.effects.take_stage_change().as_deref(), Some("009"));

        assert!(sensor.sense(&mut ctx).fired.is_empty());
        assert!(ctx.effects.take_stage_change().is_none());

        ctx.player.position = Vec3::ZERO;
        sensor.sense(&mut ctx);
        ctx.player.position = Vec3::new(0.0, 7.5, 75.0);
        assert_eq!(sensor.sense(&mut ctx).fired, vec![id]);
    }

    #[test]
    fn manual_trigger_waits_for_activation() {
        let mut ctx = StageContext::default();
        let lever = ctx.actions.create_trigger(
            "pull lever",
            Vec3::ZERO,
            2.0,
            false,
            |effects: &mut StageEffects| effects.raise("lever"),
        );
        let mut sensor = ProximitySensor::new(2.0);

        let report = sensor.sense(&mut ctx);
        assert!(report.fired.is_empty());
        assert_eq!(report.awaiting_activation, vec![lever]);
        assert!(!ctx.effects.has_flag("lever"));

        assert!(sensor.activate(&mut ctx, lever));
        assert!(ctx.effects.has_flag("lever"));

        ctx.player.position = Vec3::new(5.0, 0.0, 0.0);
        assert!(!sensor.activate(&mut ctx, lever));
    }

    #[test]
    fn nearest_visible_interaction_is_reachable() {
        let mut ctx = StageContext::default();
        let far_door = ctx.spawn_mesh("far door", Vec3::new(1.5, 0.0, 0.0));
        let near_door = ctx.spawn_mesh("near door", Vec3::new(0.5, 0.0, 0.0));
        let hidden = ctx.spawn_hidden_mesh("hidden door", Vec3::new(0.1, 0.0, 0.0));
        ctx.actions.create_interaction("open door", far_door, |_| {});
        let near = ctx
            .actions
            .create_interaction("open door", near_door, |effects: &mut StageEffects| {
                effects.raise("door_open")
            });
        ctx.actions.create_interaction("open door", hidden, |_| {});
        let mut sensor = ProximitySensor::new(2.0);

        let report = sensor.sense(&mut ctx);

        assert_eq!(report.reachable, Some(near));
        assert!(sensor.interact(&mut ctx, near));
        assert!(ctx.effects.has_flag("door_open"));
    }

    #[test]
    fn interaction_out_of_reach_does_nothing() {
        let mut ctx = StageContext::default();
        let door = ctx.spawn_mesh("door", Vec3::new(10.0, 0.0, 0.0));
        let id = ctx
            .actions
            .create_interaction("open door", door, |effects: &mut StageEffects| {
                effects.raise("door_open")
            });
        let sensor = ProximitySensor::new(2.0);

        assert!(!sensor.interact(&mut ctx, id));
        assert!(!ctx.effects.has_flag("door_open"));
        assert!(!sensor.interact(&mut ctx, InteractionId(99)));
    }
}
