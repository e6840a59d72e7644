//! Seed a registry from a JSON fixture
//!
//! The registry lives in memory, so a fixture is the only way to start the
//! server with devices already in place.

use super::{DeviceRegistry, StoreAreaRequest, StoreDeviceRequest, StoreLocationRequest, UserId};
use crate::error::{HomeError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub id: UserId,
    #[serde(default)]
    pub locations: Vec<SeedLocation>,
    #[serde(default)]
    pub devices: Vec<SeedDevice>,
}

#[derive(Debug, Deserialize)]
pub struct SeedLocation {
    pub name: String,
    #[serde(default)]
    pub areas: Vec<String>,
}

/// Device entry; `location` and `area` refer to seeded records by name. An
/// area name shared by several locations needs `location` to pick one.
#[derive(Debug, Deserialize)]
pub struct SeedDevice {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub brightness: Option<i64>,
    pub location: Option<String>,
    pub area: Option<String>,
}

fn default_status() -> String {
    "off".to_string()
}

/// Counts of created records
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub locations: usize,
    pub areas: usize,
    pub devices: usize,
}

/// Find a seeded area by name, within `location` when one is given
fn resolve_area(
    areas: &HashMap<(String, String), u64>,
    location: Option<&str>,
    name: &str,
) -> Result<u64> {
    let mut matches = areas
        .iter()
        .filter(|((l, a), _)| a == name && location.map_or(true, |wanted| l == wanted))
        .map(|(_, id)| *id);

    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (None, _) => Err(HomeError::invalid_input(format!(
            "seed references unknown area '{name}'"
        ))),
        (Some(_), Some(_)) => Err(HomeError::invalid_input(format!(
            "seed area '{name}' exists in several locations; set the device location"
        ))),
    }
}

impl DeviceRegistry {
    /// Load a fixture file and seed the registry with it
    pub async fn seed_from_path(&self, path: &Path) -> Result<SeedSummary> {
        let raw = tokio::fs::read_to_string(path).await?;
        let seed: SeedFile = serde_json::from_str(&raw)?;
        let summary = self.seed(seed).await?;
        info!(
            path = %path.display(),
            locations = summary.locations,
            areas = summary.areas,
            devices = summary.devices,
            "Registry seeded"
        );
        Ok(summary)
    }

    /// Seed the registry through the regular validated create paths
    pub async fn seed(&self, seed: SeedFile) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for user in seed.users {
            let mut locations = HashMap::new();
            let mut areas: HashMap<(String, String), u64> = HashMap::new();

            for entry in user.locations {
                let location = self
                    .create_location(user.id, StoreLocationRequest { name: entry.name })
                    .await?;
                summary.locations += 1;

                for area_name in entry.areas {
                    let area = self
                        .create_area(
                            user.id,
                            StoreAreaRequest {
                                location_id: Some(location.id),
                                name: area_name,
                            },
                        )
                        .await?;
                    areas.insert((location.name.clone(), area.name.clone()), area.id);
                    summary.areas += 1;
                }
                locations.insert(location.name.clone(), location.id);
            }

            for device in user.devices {
                let area_id = match &device.area {
                    Some(name) => Some(resolve_area(&areas, device.location.as_deref(), name)?),
                    None => None,
                };
                let (location_id, location) = match &device.location {
                    Some(name) => match locations.get(name) {
                        Some(id) => (Some(*id), None),
                        None => (None, Some(name.clone())),
                    },
                    None => (None, None),
                };

                self.create_device(
                    user.id,
                    StoreDeviceRequest {
                        name: device.name,
                        location,
                        location_id,
                        area_id,
                        device_type: device.device_type,
                        status: device.status,
                        brightness: device.brightness,
                    },
                )
                .await?;
                summary.devices += 1;
            }
        }

        Ok(summary)
    }
}
