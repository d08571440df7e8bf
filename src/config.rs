use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{MissingFeaturePolicy, ScoreWeights};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub estimator: EstimatorSettings,
    #[serde(default)]
    pub reference: ReferenceSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default = "default_min_rent")]
    pub min_rent: u32,
    #[serde(default = "default_max_rent")]
    pub max_rent: u32,
    #[serde(default)]
    pub missing_policy: MissingFeaturePolicy,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            min_rent: default_min_rent(),
            max_rent: default_max_rent(),
            missing_policy: MissingFeaturePolicy::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_min_rent() -> u32 { 800 }
fn default_max_rent() -> u32 { 1500 }
fn default_limit() -> usize { 50 }
fn default_max_limit() -> usize { 500 }

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_weight")]
    pub price: f64,
    #[serde(default = "default_weight")]
    pub work: f64,
    #[serde(default = "default_weight")]
    pub danger: f64,
    #[serde(default = "default_weight")]
    pub air: f64,
    #[serde(default = "default_weight")]
    pub green: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            price: default_weight(),
            work: default_weight(),
            danger: default_weight(),
            air: default_weight(),
            green: default_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoreWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            price: config.price,
            work: config.work,
            danger: config.danger,
            air: config.air,
            green: config.green,
        }
    }
}

fn default_weight() -> f64 { 1.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorSettings {
    #[serde(default = "default_min_readings")]
    pub min_readings: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self { min_readings: default_min_readings() }
    }
}

fn default_min_readings() -> usize { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceSettings {
    #[serde(default = "default_zones_path")]
    pub zones_path: PathBuf,
    #[serde(default = "default_green_path")]
    pub green_path: PathBuf,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            zones_path: default_zones_path(),
            green_path: default_green_path(),
        }
    }
}

fn default_zones_path() -> PathBuf { PathBuf::from("data/zonedecentramento.geojson") }
fn default_green_path() -> PathBuf { PathBuf::from("data/green_zones.json") }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            artifact_dir: default_artifact_dir(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_artifact_dir() -> PathBuf { PathBuf::from("artifacts") }
fn default_memory_capacity() -> usize { 64 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with RENTSCORE__)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., RENTSCORE__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("RENTSCORE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
