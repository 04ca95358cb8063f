//! Operator input validation against the fixed lifecycle set and the
//! configured entity and pod maps

use std::fmt;

use crate::{
    config::{BeaconMap, EntityMap},
    errors::ValidationError,
};

pub const LIFECYCLE_KEYS: [&str; 6] = ["none", "development", "test", "staging", "production", "mc"];

/// Lifecycle classifications known to the monitoring platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    None,
    Development,
    Test,
    Staging,
    #[default]
    Production,
    MissionCritical,
}

impl Lifecycle {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" => Ok(Self::None),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            "mc" => Ok(Self::MissionCritical),
            _ => Err(ValidationError::lifecycle(value, &LIFECYCLE_KEYS)),
        }
    }

    /// The value the platform stores under `Lifecycle Status`.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::None => "None",
            // Platform spelling.
            Self::Development => "Developement",
            Self::Test => "Test",
            Self::Staging => "Stage",
            Self::Production => "Production",
            Self::MissionCritical => "Mission Critical",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An entity number known to the configured entity map, with its department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub number: u32,
    pub department: String,
}

pub fn resolve_entity(entities: &EntityMap, value: &str) -> Result<Entity, ValidationError> {
    let number = value
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::entity_number(value, entities.keys()))?;

    entities
        .get(&number)
        .map(|department| Entity {
            number,
            department: department.clone(),
        })
        .ok_or_else(|| ValidationError::entity_number(value, entities.keys()))
}

pub fn resolve_pod<'a>(beacons: &'a BeaconMap, pod: &str) -> Result<&'a [String], ValidationError> {
    beacons
        .get(pod)
        .map(Vec::as_slice)
        .ok_or_else(|| ValidationError::pod(pod, beacons.keys()))
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}
