use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "ldap_target_ctl.toml";
pub const SYSTEM_CONFIG_DIR: &str = "/etc/ldap_target_ctl";
pub const DEFAULT_EMCLI_PATH: &str = "emcli";

/// Pod name to the beacons allowed to run checks originating from it.
pub type BeaconMap = BTreeMap<String, Vec<String>>;
/// OTES entity number to department code.
pub type EntityMap = BTreeMap<u32, String>;

#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    table: toml::Table,
    oem_url: String,
    emcli_path: String,
    beacons: BeaconMap,
    entities: EntityMap,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no acceptable {CONFIG_FILE_NAME} file found (searched: {searched})")]
    NotFound { searched: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("otes.entities key {key:?} in {path} is not an entity number")]
    InvalidEntityNumber { path: PathBuf, key: String },
    #[error("{key} in {path} must not be empty")]
    EmptyValue { path: PathBuf, key: &'static str },
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    oem: OemSection,
    #[serde(default)]
    emcli: EmcliSection,
    otes: OtesSection,
}

#[derive(Debug, Deserialize)]
struct OemSection {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct EmcliSection {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OtesSection {
    beacons: BTreeMap<String, Vec<String>>,
    entities: BTreeMap<String, String>,
}

/// Candidate locations in search order: working directory, user home,
/// system-wide directory, then the directory holding the executable.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(4);

    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(format!(".{CONFIG_FILE_NAME}")));
    }
    candidates.push(Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME));
    if let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join(CONFIG_FILE_NAME));
    }

    candidates
}

/// Returns the first candidate that exists as a regular file.
pub fn locate(candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates
                .iter()
                .map(|candidate| candidate.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

impl Config {
    pub fn discover() -> Result<Self, ConfigError> {
        let path = locate(&default_candidates())?;
        Self::from_path(path)
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let config = Self::from_toml_str(&contents, path)?;
        debug!(path = %config.path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str, path: PathBuf) -> Result<Self, ConfigError> {
        let table: toml::Table = contents.parse().map_err(|err: toml::de::Error| {
            ConfigError::Parse {
                path: path.clone(),
                message: err.message().to_string(),
            }
        })?;

        let raw: RawConfig = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|err: toml::de::Error| ConfigError::Parse {
                path: path.clone(),
                message: err.message().to_string(),
            })?;

        let oem_url = raw.oem.url.trim().to_string();
        if oem_url.is_empty() {
            return Err(ConfigError::EmptyValue {
                path,
                key: "oem.url",
            });
        }

        let emcli_path = raw
            .emcli
            .path
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EMCLI_PATH.to_string());

        let entities = raw
            .otes
            .entities
            .into_iter()
            .map(|(key, department)| {
                key.trim()
                    .parse::<u32>()
                    .map(|number| (number, department))
                    .map_err(|_| ConfigError::InvalidEntityNumber {
                        path: path.clone(),
                        key,
                    })
            })
            .collect::<Result<EntityMap, _>>()?;

        Ok(Self {
            path,
            table,
            oem_url,
            emcli_path,
            beacons: raw.otes.beacons,
            entities,
        })
    }

    /// Raw string lookup; `section` may be dotted (`"otes.beacons"`).
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let mut table = &self.table;
        for part in section.split('.') {
            table = table.get(part)?.as_table()?;
        }
        table.get(key)?.as_str()
    }

    pub fn oem_url(&self) -> &str {
        &self.oem_url
    }

    pub fn emcli_path(&self) -> &str {
        &self.emcli_path
    }

    pub fn beacons(&self) -> &BeaconMap {
        &self.beacons
    }

    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }
}
