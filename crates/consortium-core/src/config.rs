//! Configuration loading and typed config structures.
//!
//! A run is described by one YAML file, `consortium-config.yaml` by
//! default. This module mirrors its structure in strongly-typed structs;
//! every section has serde defaults so a minimal file only needs the
//! environment and its agents. Semantic checks (unknown models, missing
//! biomass, rule fields) happen later in [`crate::setup`].
//!
//! ```yaml
//! simulation: { name: glucose-acetate, seed: 7, interval: 0.1, max_ticks: 200 }
//! environment:
//!   volume: 10
//!   counts: { D-Glucose: 400, Acetate: 0, E.coli: 0.5 }
//! models:
//!   ecoli_core: models/ecoli_core.yaml
//! agents:
//!   - kind: metabolic
//!     name: E.coli
//!     model: ecoli_core
//!     kinetics: { D-Glucose: { km: 0.5, vmax: 10 } }
//!     reaction_map: { D-Glucose: EX_glc__D_e }
//! thresholds:
//!   - { substrate: Acetate, range: { upper: 10 }, direction: add,
//!       parent: E.coli, name: E.coli 2, mass: 0.25 }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use consortium_agents::LinearYieldModel;
use consortium_types::{AgentSpec, MergeStrategy, ThresholdSpec};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run-level settings (name, seed, timing, merge policy).
    #[serde(default)]
    pub simulation: RunConfig,

    /// Initial pool.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Model references, each a file path or an inline definition.
    #[serde(default)]
    pub models: BTreeMap<String, ModelSource>,

    /// Seed agents.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,

    /// Threshold rules, evaluated in order.
    #[serde(default)]
    pub thresholds: Vec<ThresholdSpec>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Run-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Human-readable run name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Seed for the merge permutation RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Simulation time per tick.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Number of ticks to run (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Real-time milliseconds to wait between ticks.
    #[serde(default)]
    pub pacing_ms: u64,

    /// How concurrent writes to one key are combined.
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            seed: default_seed(),
            interval: default_interval(),
            max_ticks: default_max_ticks(),
            pacing_ms: 0,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

/// Initial pool configuration.
///
/// Exactly one of `counts` and `concentrations` may be given; an empty
/// environment starts with no entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvironmentConfig {
    /// Volume of the well-mixed environment.
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Initial counts per key.
    #[serde(default)]
    pub counts: Option<BTreeMap<String, f64>>,

    /// Initial concentrations per key.
    #[serde(default)]
    pub concentrations: Option<BTreeMap<String, f64>>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            counts: None,
            concentrations: None,
        }
    }
}

/// Where a model definition comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelSource {
    /// A YAML or JSON file, relative to the config file.
    Path(PathBuf),
    /// A definition written directly in the config.
    Inline(Box<LinearYieldModel>),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `CONSORTIUM_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_name() -> String {
    String::from("consortium")
}

const fn default_seed() -> u64 {
    42
}

const fn default_interval() -> f64 {
    0.1
}

const fn default_max_ticks() -> u64 {
    100
}

const fn default_volume() -> f64 {
    1.0
}

fn default_log_level() -> String {
    String::from("info")
}
