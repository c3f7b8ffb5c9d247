//! `flamecheck.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{DiffMode, FlameError, FlameResult};

pub const TARGET_ENV: &str = "FLAMECHECK_TARGET";
pub const STORE_DIR_ENV: &str = "FLAMECHECK_STORE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Base directory for flamecheck runtime artifacts.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Profiling runs per invocation.
    #[serde(default = "default_samples")]
    pub samples: usize,

    #[serde(default)]
    pub diff_mode: DiffMode,

    /// Profile store directory; defaults to `<base_dir>/profiles`.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Default target when none is given on the command line.
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Driver argv; `{target}` is substituted, otherwise the target is appended.
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".flamecheck")
}

fn default_samples() -> usize {
    crate::DEFAULT_SAMPLES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            samples: default_samples(),
            diff_mode: DiffMode::default(),
            store_dir: None,
            target: None,
            probe: ProbeConfig::default(),
        }
    }
}

impl Config {
    pub fn load_optional(path: &Path) -> Self {
        let cfg = match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        };
        cfg.with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(target) = var(TARGET_ENV).filter(|v| !v.is_empty()) {
            self.target = Some(target);
        }
        if let Some(dir) = var(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
            self.store_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn validate(&self) -> FlameResult<()> {
        if self.samples == 0 {
            return Err(FlameError::Config("samples must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("profiles"))
    }

    pub fn resolve_target(&self, explicit: Option<&str>) -> FlameResult<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.target.clone())
            .ok_or_else(|| {
                FlameError::InvalidArgument(format!(
                    "no target given (pass one or set {TARGET_ENV})"
                ))
            })
    }
}
