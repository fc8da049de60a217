//! Loading and saving condition set definitions.
//!
//! Two formats: TOML for user-editable definition files, JSON for the
//! external object store. Round-tripping preserves condition and
//! criterion ordering exactly, so a reloaded set evaluates identically.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::definition::{ConditionSetDefinition, DefinitionConfig, DefinitionError};

/// Errors raised while reading or writing definition files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid definition file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not serialize {path:?}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
    #[error("invalid condition set document {path:?}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("structural problem in {path:?}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: DefinitionError,
    },
}

/// Load a TOML definition file and validate every set in it.
pub fn load_config(path: &Path) -> Result<DefinitionConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: DefinitionConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    for set in &config.condition_sets {
        set.validate().map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(config)
}

/// Save a definition config as pretty TOML.
pub fn save_config(path: &Path, config: &DefinitionConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load one condition set from the object store's JSON representation.
pub fn load_set_json(path: &Path) -> Result<ConditionSetDefinition, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let set: ConditionSetDefinition =
        serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
    set.validate().map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(set)
}

/// Save one condition set as the object store's JSON representation.
pub fn save_set_json(path: &Path, set: &ConditionSetDefinition) -> Result<(), ConfigError> {
    let contents = serde_json::to_string_pretty(set).map_err(|e| ConfigError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Default directory for user-created definition files.
pub fn default_definitions_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vigil").join("condition-sets"))
}
