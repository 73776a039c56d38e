use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use messenger::{DispatchOptions, DispatchPolicy, DEFAULT_MAX_DEPTH};
use serde::Deserialize;
use shared::protocol::topics;

pub const DEFAULT_CONFIG_FILE: &str = "mvc.toml";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_filter: String,
    pub dispatch_policy: DispatchPolicy,
    pub max_dispatch_depth: usize,
    pub controller_topics: Vec<String>,
    pub initial_variable1: i64,
    pub initial_variable2: i64,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.into(),
            dispatch_policy: DispatchPolicy::Isolate,
            max_dispatch_depth: DEFAULT_MAX_DEPTH,
            controller_topics: topics::CONTROLLER_DEFAULTS
                .iter()
                .map(|topic| topic.to_string())
                .collect(),
            initial_variable1: 0,
            initial_variable2: 0,
            history_limit: 256,
        }
    }
}

impl Settings {
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            policy: self.dispatch_policy,
            max_depth: self.max_dispatch_depth,
        }
    }

    /// `--bare` keeps the controller off every topic.
    pub fn apply_cli(&mut self, bare: bool) {
        if bare {
            self.controller_topics.clear();
        }
    }
}

/// Settings plus the environment overrides that were present but unusable.
/// Loading happens before logging is installed, so the caller reports them.
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub ignored_env: Vec<&'static str>,
}

/// `--log-filter`, then `RUST_LOG`, then the settings value.
pub fn resolve_log_filter(cli: Option<String>, env: Option<String>, settings: &Settings) -> String {
    cli.or(env)
        .filter(|filter| !filter.trim().is_empty())
        .unwrap_or_else(|| {
            if settings.log_filter.trim().is_empty() {
                DEFAULT_LOG_FILTER.to_string()
            } else {
                settings.log_filter.clone()
            }
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    log_filter: Option<String>,
    dispatch_policy: Option<String>,
    max_dispatch_depth: Option<usize>,
    controller_topics: Option<Vec<String>>,
    initial_variable1: Option<i64>,
    initial_variable2: Option<i64>,
    history_limit: Option<usize>,
}

/// Defaults, then the TOML file, then `APP__*` environment variables.
///
/// An explicit `path` must exist; the default `mvc.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<LoadedSettings> {
    let mut settings = Settings::default();

    let file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    };

    if let Some(file) = file {
        let raw = fs::read_to_string(&file)
            .with_context(|| format!("failed to read config file '{}'", file.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", file.display()))?;
    }

    let ignored_env = apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(LoadedSettings {
        settings,
        ignored_env,
    })
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileConfig = toml::from_str(raw)?;

    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.dispatch_policy {
        settings.dispatch_policy = v.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(v) = file_cfg.max_dispatch_depth {
        if v == 0 {
            bail!("max_dispatch_depth must be at least 1");
        }
        settings.max_dispatch_depth = v;
    }
    if let Some(v) = file_cfg.controller_topics {
        settings.controller_topics = v;
    }
    if let Some(v) = file_cfg.initial_variable1 {
        settings.initial_variable1 = v;
    }
    if let Some(v) = file_cfg.initial_variable2 {
        settings.initial_variable2 = v;
    }
    if let Some(v) = file_cfg.history_limit {
        settings.history_limit = v;
    }

    Ok(())
}

/// Applies `APP__*` overrides and returns the keys whose values could not be used.
pub(crate) fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<&'static str> {
    let mut ignored = Vec::new();

    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = lookup("APP__DISPATCH_POLICY") {
        match v.parse() {
            Ok(policy) => settings.dispatch_policy = policy,
            Err(_) => ignored.push("APP__DISPATCH_POLICY"),
        }
    }

    if let Some(v) = lookup("APP__MAX_DISPATCH_DEPTH") {
        match v.trim().parse::<usize>() {
            Ok(depth) if depth > 0 => settings.max_dispatch_depth = depth,
            _ => ignored.push("APP__MAX_DISPATCH_DEPTH"),
        }
    }

    if let Some(v) = lookup("APP__CONTROLLER_TOPICS") {
        settings.controller_topics = v
            .split(',')
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(v) = lookup("APP__VARIABLE1") {
        match v.trim().parse::<i64>() {
            Ok(parsed) => settings.initial_variable1 = parsed,
            Err(_) => ignored.push("APP__VARIABLE1"),
        }
    }
    if let Some(v) = lookup("APP__VARIABLE2") {
        match v.trim().parse::<i64>() {
            Ok(parsed) => settings.initial_variable2 = parsed,
            Err(_) => ignored.push("APP__VARIABLE2"),
        }
    }

    ignored
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
