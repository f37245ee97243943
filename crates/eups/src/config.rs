// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! User configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shell::Shell;
use crate::vro::{Strategy, VroPolicy};
use crate::{DEFAULT_TAG, Error, Result};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_VAR: &str = "EUPS_CONFIG";

/// Name of the command that sets products up, as used in messages.
pub const DEFAULT_SETUP_CMD_NAME: &str = "setup";

/// Settings read from `~/.eups/config.yaml` or `$EUPS_CONFIG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Selector to strategy list. See [`VroPolicy`].
    pub vro: BTreeMap<String, Vec<Strategy>>,
    /// Tag followed by the `default` strategy unless a stack names its own.
    pub default_tag: String,
    pub setup_cmd_name: String,
    /// Shell dialect for rendered commands, detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<Shell>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vro: BTreeMap::new(),
            default_tag: DEFAULT_TAG.to_string(),
            setup_cmd_name: DEFAULT_SETUP_CMD_NAME.to_string(),
            shell: None,
        }
    }
}

impl Config {
    /// The configuration file in effect: `$EUPS_CONFIG`, else
    /// `~/.eups/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => dirs::home_dir().map(|home| home.join(".eups").join("config.yaml")),
        }
    }

    /// Load the configuration in effect, or the defaults if there is none.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = match std::fs::read_to_string(path) {
            Ok(yaml) => yaml,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no configuration at {}", path.display());
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(Error::ReadFailed {
                    path: path.to_path_buf(),
                    error,
                });
            }
        };
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&yaml).map_err(|error| Error::InvalidYaml {
            path: path.to_path_buf(),
            error,
        })
    }

    pub fn vro_policy(&self) -> VroPolicy {
        VroPolicy::new(self.vro.clone())
    }
}
