use std::env;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::loop_runner::LoopConfig;
use super::stages::StageCatalog;

const TICKS_ENV_VAR: &str = "STAGE_RUNNER_TICKS";
const STAGE_FILE_ENV_VAR: &str = "STAGE_RUNNER_STAGE_FILE";
const START_STAGE_ENV_VAR: &str = "STAGE_RUNNER_START_STAGE";
const LOG_ENV_VAR: &str = "STAGE_RUNNER_LOG";
const DEFAULT_LOG_FILTER: &str = "warn,stage_runner=info,stage_core=info";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) catalog: StageCatalog,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "stage_runner_startup");

    let config = apply_env_overrides(LoopConfig::default(), |name| env::var(name));
    AppWiring {
        config,
        catalog: StageCatalog::with_builtin_stages(),
    }
}

fn init_tracing() {
    let directives = log_directives(|name| env::var(name));
    let filter =
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

/// `STAGE_RUNNER_LOG` wins over `RUST_LOG`; blank values are skipped.
fn log_directives(lookup: impl Fn(&str) -> Result<String, env::VarError>) -> String {
    [LOG_ENV_VAR, "RUST_LOG"]
        .into_iter()
        .filter_map(|name| lookup(name).ok())
        .map(|raw| raw.trim().to_string())
        .find(|raw| !raw.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn apply_env_overrides(
    mut config: LoopConfig,
    lookup: impl Fn(&str) -> Result<String, env::VarError>,
) -> LoopConfig {
    if let Some(raw) = read_env_var(&lookup, TICKS_ENV_VAR) {
        match raw.trim().parse::<u64>() {
            Ok(ticks) if ticks > 0 => config.run_ticks = ticks,
            _ => warn!(
                env_var = TICKS_ENV_VAR,
                value = raw.as_str(),
                fallback = config.run_ticks,
                "invalid tick count env var value; falling back to default"
            ),
        }
    }

    if let Some(raw) = read_env_var(&lookup, STAGE_FILE_ENV_VAR) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            warn!(env_var = STAGE_FILE_ENV_VAR, "empty stage file env var; ignoring");
        } else {
            config.stage_file = Some(PathBuf::from(trimmed));
        }
    }

    if let Some(raw) = read_env_var(&lookup, START_STAGE_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.start_stage = Some(trimmed.to_string());
        }
    }

    config
}

fn read_env_var(
    lookup: &impl Fn(&str) -> Result<String, env::VarError>,
    name: &'static str,
) -> Option<String> {
    match lookup(name) {
        Ok(value) => Some(value),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(env_var = name, error = %err, "unable to read env var; falling back to default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::ffi::OsString;

    use super::*;

    fn lookup_from(
        vars: &[(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<&'static str, &'static str> = vars.iter().copied().collect();
        move |name| {
            vars.get(name)
                .map(|value| value.to_string())
                .ok_or(env::VarError::NotPresent)
        }
    }

    #[test]
    fn no_env_vars_keeps_defaults() {
        let config = apply_env_overrides(LoopConfig::default(), lookup_from(&[]));
        assert_eq!(config, LoopConfig::default());
    }

    #[test]
    fn valid_overrides_are_applied() {
        let config = apply_env_overrides(
            LoopConfig::default(),
            lookup_from(&[
                (TICKS_ENV_VAR, " 120 "),
                (STAGE_FILE_ENV_VAR, "stages/demo.json"),
                (START_STAGE_ENV_VAR, "009"),
            ]),
        );

        assert_eq!(config.run_ticks, 120);
        assert_eq!(config.stage_file, Some(PathBuf::from("stages/demo.json")));
        assert_eq!(config.start_stage.as_deref(), Some("009"));
    }

    #[test]
    fn invalid_tick_count_falls_back() {
        for raw in ["soon", "0", "-5"] {
            let config = apply_env_overrides(
                LoopConfig::default(),
                lookup_from(&[(TICKS_ENV_VAR, raw), (STAGE_FILE_ENV_VAR, "   ")]),
            );
            assert_eq!(config.run_ticks, LoopConfig::default().run_ticks);
            assert_eq!(config.stage_file, None);
        }
    }

    #[test]
    fn log_directives_prefer_runner_variable_then_rust_log() {
        assert_eq!(log_directives(lookup_from(&[])), DEFAULT_LOG_FILTER);
        assert_eq!(
            log_directives(lookup_from(&[("RUST_LOG", "debug")])),
            "debug"
        );
        assert_eq!(
            log_directives(lookup_from(&[
                ("RUST_LOG", "debug"),
                (LOG_ENV_VAR, " stage_core=trace "),
            ])),
            "stage_core=trace"
        );
        assert_eq!(
            log_directives(lookup_from(&[(LOG_ENV_VAR, "  "), ("RUST_LOG", "warn")])),
            "warn"
        );
    }

    #[test]
    fn default_log_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn unreadable_env_var_is_ignored() {
        let config = apply_env_overrides(LoopConfig::default(), |_| {
            Err(env::VarError::NotUnicode(OsString::from("bad")))
        });
        assert_eq!(config, LoopConfig::default());
    }
}
