//! Runtime settings for the Execution Context.
use crate::expression::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(default)]
pub struct Settings {
    /// `cyclic_parameters` also reports everything reading from a cycle.
    pub enrich_cycles: bool,
    /// Start with a frozen graph; `update_dependencies` is then a no-op.
    pub freeze_graph: bool,
    pub max_expression_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enrich_cycles: true,
            freeze_graph: false,
            max_expression_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
