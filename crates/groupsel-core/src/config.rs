//! Runtime configuration for grouped gather/scatter.
//!
//! Settings can be configured via:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Config file (`~/.config/groupsel/config.toml`)
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```ignore
//! use groupsel_core::config::GroupSelectConfig;
//!
//! // Parse from CLI args
//! let config = GroupSelectConfig::from_args();
//!
//! // Or build explicitly
//! let config = GroupSelectConfig::builder()
//!     .cols_per_warp(128)
//!     .validate_indices(true)
//!     .build()?;
//! ```
//!
//! The ops read `cols_per_warp` and `validate_indices`. `backend` is a routing
//! policy for callers holding both backends; the ops themselves run on
//! whichever backend their tensors live on.
//!
//! # Example TOML
//!
//! ```toml
//! cols_per_warp = 128
//! validate_indices = false
//!
//! [backend]
//! kind = "adaptive"
//! min_gpu_elements = 65536
//! ```

use clap::Parser;
use directories::ProjectDirs;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compute::ComputeBackend;
use crate::error::{GroupSelectError, GroupSelectResult};
use crate::plan::DEFAULT_COLS_PER_WARP;

/// Global configuration instance
static GLOBAL_CONFIG: OnceCell<GroupSelectConfig> = OnceCell::new();

/// CLI arguments for kernel configuration
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Grouped index-select configuration")]
pub struct ConfigArgs {
    /// Columns processed by one warp per row chunk
    #[arg(long, env = "GROUPSEL_COLS_PER_WARP")]
    pub cols_per_warp: Option<usize>,

    /// Check index bounds on the host before dispatching
    #[arg(long, env = "GROUPSEL_VALIDATE_INDICES")]
    pub validate_indices: Option<bool>,

    /// Backend routing: gpu, cpu, adaptive or adaptive:<min_gpu_elements>
    #[arg(long, env = "GROUPSEL_BACKEND")]
    pub backend: Option<ComputeBackend>,

    /// Path to config file
    #[arg(long, env = "GROUPSEL_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

/// Configuration as stored in the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    pub cols_per_warp: Option<usize>,
    pub validate_indices: Option<bool>,
    pub backend: Option<ComputeBackend>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSelectConfig {
    cols_per_warp: usize,
    validate_indices: bool,
    backend: ComputeBackend,
}

impl Default for GroupSelectConfig {
    fn default() -> Self {
        Self {
            cols_per_warp: DEFAULT_COLS_PER_WARP,
            validate_indices: false,
            backend: ComputeBackend::default(),
        }
    }
}

impl GroupSelectConfig {
    /// Parse configuration from CLI arguments
    pub fn from_args() -> GroupSelectResult<Self> {
        Self::from_config_args(ConfigArgs::parse())
    }

    /// Parse configuration from CLI arguments, ignoring anything unparsable.
    ///
    /// Use this when mixing with other CLI parsers
    pub fn from_args_relaxed() -> Self {
        let args = ConfigArgs::try_parse().unwrap_or_default();
        Self::from_config_args(args).unwrap_or_else(|e| {
            log::warn!("ignoring invalid configuration: {}", e);
            Self::default()
        })
    }

    /// Resolve configuration from already parsed arguments.
    ///
    /// Priority: CLI/env (clap merges both) > config file > defaults.
    pub fn from_config_args(args: ConfigArgs) -> GroupSelectResult<Self> {
        let file_config = match args.config_file.as_deref() {
            Some(path) => Self::read_config_file(path)?,
            None => Self::load_default_config_file(),
        };

        let defaults = Self::default();
        let config = Self {
            cols_per_warp: args
                .cols_per_warp
                .or(file_config.cols_per_warp)
                .unwrap_or(defaults.cols_per_warp),
            validate_indices: args
                .validate_indices
                .or(file_config.validate_indices)
                .unwrap_or(defaults.validate_indices),
            backend: args
                .backend
                .or(file_config.backend)
                .unwrap_or(defaults.backend),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> GroupSelectConfigBuilder {
        GroupSelectConfigBuilder::new()
    }

    /// Columns per warp used by the planner.
    pub fn cols_per_warp(&self) -> usize {
        self.cols_per_warp
    }

    /// Whether index bounds are checked on the host before dispatch.
    pub fn validate_indices(&self) -> bool {
        self.validate_indices
    }

    /// Routing policy for callers that hold both backends.
    ///
    /// Library ops are generic over a single backend and never read this;
    /// pick the backend per call with [`ComputeBackend::run_routed`].
    pub fn backend(&self) -> ComputeBackend {
        self.backend
    }

    fn validate(&self) -> GroupSelectResult<()> {
        if self.cols_per_warp == 0 {
            return Err(GroupSelectError::InvalidConfig(
                "cols_per_warp must be positive".into(),
            ));
        }
        if self.cols_per_warp > u32::MAX as usize {
            return Err(GroupSelectError::InvalidConfig(format!(
                "cols_per_warp {} exceeds the device range",
                self.cols_per_warp
            )));
        }
        Ok(())
    }

    /// Get the global configuration instance
    ///
    /// Initializes from CLI/env/file on first call. Use `set_global` to customize.
    pub fn global() -> &'static GroupSelectConfig {
        GLOBAL_CONFIG.get_or_init(GroupSelectConfig::from_args_relaxed)
    }

    /// Set the global configuration
    ///
    /// Returns Err if already initialized
    pub fn set_global(config: GroupSelectConfig) -> Result<(), GroupSelectConfig> {
        GLOBAL_CONFIG.set(config)
    }

    pub fn log_summary(&self) {
        log::info!(
            "groupsel config: cols_per_warp={} validate_indices={} backend={}",
            self.cols_per_warp,
            self.validate_indices,
            self.backend
        );
    }

    fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "groupsel").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn read_config_file(path: &Path) -> GroupSelectResult<ConfigFile> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| GroupSelectError::ConfigParse(e.to_string()))
    }

    /// The default location is optional; a missing or broken file is ignored.
    fn load_default_config_file() -> ConfigFile {
        let Some(path) = Self::default_config_path() else {
            return ConfigFile::default();
        };
        if !path.exists() {
            return ConfigFile::default();
        }
        Self::read_config_file(&path).unwrap_or_else(|e| {
            log::warn!("ignoring config file {}: {}", path.display(), e);
            ConfigFile::default()
        })
    }

    /// Save current configuration to a file
    pub fn save_to_file(&self, path: &Path) -> GroupSelectResult<()> {
        let config = ConfigFile {
            cols_per_warp: Some(self.cols_per_warp),
            validate_indices: Some(self.validate_indices),
            backend: Some(self.backend),
        };

        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| GroupSelectError::ConfigParse(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, toml_str)?;
        Ok(())
    }

    /// Save to default config location
    pub fn save_to_default(&self) -> GroupSelectResult<()> {
        match Self::default_config_path() {
            Some(path) => self.save_to_file(&path),
            None => Err(GroupSelectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))),
        }
    }
}

/// Builder for GroupSelectConfig
#[derive(Debug, Clone, Default)]
pub struct GroupSelectConfigBuilder {
    cols_per_warp: Option<usize>,
    validate_indices: Option<bool>,
    backend: Option<ComputeBackend>,
}

impl GroupSelectConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cols_per_warp(mut self, cols_per_warp: usize) -> Self {
        self.cols_per_warp = Some(cols_per_warp);
        self
    }

    pub fn validate_indices(mut self, validate: bool) -> Self {
        self.validate_indices = Some(validate);
        self
    }

    pub fn backend(mut self, backend: ComputeBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> GroupSelectResult<GroupSelectConfig> {
        let defaults = GroupSelectConfig::default();
        let config = GroupSelectConfig {
            cols_per_warp: self.cols_per_warp.unwrap_or(defaults.cols_per_warp),
            validate_indices: self.validate_indices.unwrap_or(defaults.validate_indices),
            backend: self.backend.unwrap_or(defaults.backend),
        };
        config.validate()?;
        Ok(config)
    }
}
