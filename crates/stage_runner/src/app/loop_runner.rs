use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use stage_core::{ConfigError, SimulationConfig};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::description::{load_stage_file, StageLoadError};
use super::director::{DirectorError, StageDirector};
use super::stages::{StageCatalog, ENTRANCE_STAGE};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoopConfig {
    pub(crate) simulation: SimulationConfig,
    /// Fixed ticks to simulate before exiting.
    pub(crate) run_ticks: u64,
    /// Simulated wall-clock time between frames.
    pub(crate) frame_delta: Duration,
    pub(crate) status_interval_ticks: u64,
    pub(crate) stage_file: Option<PathBuf>,
    /// Overrides the stage file's `start_stage` when set.
    pub(crate) start_stage: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            run_ticks: 60 * 30,
            frame_delta: Duration::from_micros(33_334),
            status_interval_ticks: 60 * 5,
            stage_file: None,
            start_stage: None,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("invalid simulation config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    StageFile(#[from] StageLoadError),
    #[error(transparent)]
    Director(#[from] DirectorError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) frames: u64,
    pub(crate) dropped_backlog: Duration,
    pub(crate) stage_changes: u64,
    pub(crate) triggers_fired: u64,
    pub(crate) interactions: u64,
    pub(crate) final_stage: Option<String>,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_headless(app.config, app.catalog) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                frames = summary.frames,
                dropped_backlog_ms = summary.dropped_backlog.as_millis() as u64,
                stage_changes = summary.stage_changes,
                triggers_fired = summary.triggers_fired,
                interactions = summary.interactions,
                final_stage = summary.final_stage.as_deref().unwrap_or("none"),
                "run_complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn run_headless(
    mut config: LoopConfig,
    mut catalog: StageCatalog,
) -> Result<RunSummary, AppError> {
    let mut start_stage = ENTRANCE_STAGE.to_string();
    if let Some(path) = &config.stage_file {
        let file = load_stage_file(path)?;
        if let Some(simulation) = file.simulation {
            config.simulation = simulation;
        }
        if let Some(stage) = file.start_stage {
            start_stage = stage;
        }
        catalog.register_descriptions(file.stages);
    }
    if let Some(stage) = config.start_stage.take() {
        start_stage = stage;
    }

    config.simulation.validate()?;
    let fixed_dt = config.simulation.fixed_dt();
    let fixed_dt_seconds = config.simulation.fixed_dt_seconds();
    let max_frame_delta = config.simulation.max_frame_delta();
    let max_ticks_per_frame = config.simulation.max_ticks_per_frame;
    let frame_delta = normalize_non_zero_duration(config.frame_delta, fixed_dt);
    info!(
        target_tps = config.simulation.target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        frame_delta_ms = frame_delta.as_secs_f64() * 1000.0,
        run_ticks = config.run_ticks,
        start_stage = %start_stage,
        "loop_config"
    );

    let mut director = StageDirector::new(catalog);
    director.load(&start_stage)?;

    let mut summary = RunSummary::default();
    let mut accumulator = Duration::ZERO;
    while summary.ticks < config.run_ticks {
        accumulator = accumulator.saturating_add(clamp_frame_delta(frame_delta, max_frame_delta));
        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);

        let remaining = config.run_ticks - summary.ticks;
        let ticks = u64::from(step_plan.ticks_to_run).min(remaining);
        for _ in 0..ticks {
            let outcome = director.tick(fixed_dt_seconds)?;
            summary.ticks += 1;
            summary.triggers_fired += (outcome.sensed.fired.len() + outcome.activated.len()) as u64;
            summary.interactions += u64::from(outcome.interacted.is_some());
            if let Some(stage) = outcome.stage_changed_to {
                debug!(tick = summary.ticks, stage = %stage, "stage_switched");
            }
            if config.status_interval_ticks > 0 && summary.ticks % config.status_interval_ticks == 0 {
                let ctx = director.context();
                info!(
                    tick = summary.ticks,
                    stage = director.active_stage_id().unwrap_or("none"),
                    entities = ctx.entities.entity_count(),
                    triggers = ctx.actions.trigger_count(),
                    interactions = ctx.actions.interactive_object_count(),
                    "sim_status"
                );
            }
        }
        accumulator = step_plan.remaining_accumulator;
        summary.frames += 1;

        if step_plan.dropped_backlog > Duration::ZERO {
            summary.dropped_backlog += step_plan.dropped_backlog;
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }
    }

    summary.stage_changes = director.stage_changes();
    summary.final_stage = director.active_stage_id().map(str::to_string);
    director.unload();
    Ok(summary)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

/// Splits the accumulated time into whole ticks. When more ticks are due than
/// one frame may run, the leftover backlog is dropped instead of carried.
fn plan_sim_steps(accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let due = accumulator.as_nanos() / fixed_dt.as_nanos().max(1);
    if due > u128::from(max_ticks_per_frame) {
        return StepPlan {
            ticks_to_run: max_ticks_per_frame,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator
                .saturating_sub(fixed_dt.saturating_mul(max_ticks_per_frame)),
        };
    }

    // `due` fits: it is at most `max_ticks_per_frame`.
    let ticks_to_run = due as u32;
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator.saturating_sub(fixed_dt.saturating_mul(ticks_to_run)),
        dropped_backlog: Duration::ZERO,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
