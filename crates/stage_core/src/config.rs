use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed-timestep settings for whoever drives [`EntityManager::update`].
///
/// [`EntityManager::update`]: crate::EntityManager::update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub target_tps: u32,
    pub max_frame_delta_ms: u64,
    pub max_ticks_per_frame: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta_ms: 250,
            max_ticks_per_frame: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("target_tps must be at least 1")]
    ZeroTickRate,
    #[error("max_ticks_per_frame must be at least 1")]
    ZeroTicksPerFrame,
    #[error("max_frame_delta_ms ({max_frame_delta_ms}) must cover at least one tick ({tick_ms:.3} ms)")]
    FrameDeltaBelowTick {
        max_frame_delta_ms: u64,
        tick_ms: f64,
    },
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_tps == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.max_ticks_per_frame == 0 {
            return Err(ConfigError::ZeroTicksPerFrame);
        }
        if self.max_frame_delta() < self.fixed_dt() {
            return Err(ConfigError::FrameDeltaBelowTick {
                max_frame_delta_ms: self.max_frame_delta_ms,
                tick_ms: self.fixed_dt().as_secs_f64() * 1000.0,
            });
        }
        Ok(())
    }

    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt().as_secs_f32()
    }

    pub fn max_frame_delta(&self) -> Duration {
        Duration::from_millis(self.max_frame_delta_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert!((config.fixed_dt_seconds() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn zero_rates_are_rejected() {
        let config = SimulationConfig {
            target_tps: 0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickRate));

        let config = SimulationConfig {
            max_ticks_per_frame: 0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTicksPerFrame));
    }

    #[test]
    fn frame_delta_shorter_than_a_tick_is_rejected() {
        let config = SimulationConfig {
            target_tps: 10,
            max_frame_delta_ms: 50,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FrameDeltaBelowTick {
                max_frame_delta_ms: 50,
                ..
            })
        ));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "target_tps": 30 }"#).expect("parse");
        assert_eq!(config.target_tps, 30);
        assert_eq!(config.max_ticks_per_frame, 5);
        assert_eq!(config.max_frame_delta_ms, 250);
    }
}
