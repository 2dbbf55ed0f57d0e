// Sat Oct 17 2026 - Alex

use crate::jit::{CallConvention, OptLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Cranelift,
    Program,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub call_convention: CallConvention,
    pub fast_skip: bool,
    /// Emulated vector width of the program backend; `0` disables it.
    pub lane_width: usize,
    pub opt_level: OptLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cranelift,
            call_convention: CallConvention::Host,
            fast_skip: true,
            lane_width: 16,
            opt_level: OptLevel::Speed,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_call_convention(mut self, call_convention: CallConvention) -> Self {
        self.call_convention = call_convention;
        self
    }

    pub fn with_fast_skip(mut self, enabled: bool) -> Self {
        self.fast_skip = enabled;
        self
    }

    pub fn with_lane_width(mut self, lanes: usize) -> Self {
        self.lane_width = lanes;
        self
    }

    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.opt_level = opt_level;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lane_width == 1 || self.lane_width > 64 {
            return Err(ConfigError::ValidationError(format!(
                "lane_width must be 0 or between 2 and 64, got {}",
                self.lane_width
            )));
        }

        if self.backend == BackendKind::Cranelift && !self.call_convention.is_supported() {
            return Err(ConfigError::ValidationError(format!(
                "calling convention {} is not available on this target",
                self.call_convention
            )));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&contents)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = self.to_json()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        fs::write(path, contents).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
