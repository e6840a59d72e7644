//! Registry records: devices, areas and locations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Owning user identifier, issued by the upstream auth layer
pub type UserId = u64;

/// Brightness applied to dimmers when none is given
pub const DEFAULT_DIMMER_BRIGHTNESS: u8 = 50;

/// Brightness every switch carries
pub const SWITCH_BRIGHTNESS: u8 = 100;

/// Kind of device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Switch,
    Dimmer,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Switch => "switch",
            DeviceType::Dimmer => "dimmer",
        }
    }

    /// Brightness implied by the type: switches are pinned at 100
    pub fn effective_brightness(&self, requested: u8) -> u8 {
        match self {
            DeviceType::Switch => SWITCH_BRIGHTNESS,
            DeviceType::Dimmer => requested.min(100),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "switch" => Ok(DeviceType::Switch),
            "dimmer" => Ok(DeviceType::Dimmer),
            other => Err(format!("unknown device type '{other}'")),
        }
    }
}

/// On/off state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    On,
    Off,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::On => "on",
            DeviceStatus::Off => "off",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "on" => Ok(DeviceStatus::On),
            "off" => Ok(DeviceStatus::Off),
            other => Err(format!("unknown device status '{other}'")),
        }
    }
}

/// A controllable device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: u64,
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub brightness: u8,
    /// Display label kept alongside the relations (area name, location name or free text)
    pub location: Option<String>,
    pub location_id: Option<u64>,
    pub area_id: Option<u64>,
    /// Soft-delete marker
    pub hidden: bool,
    pub webhook_token: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Visible devices are the only ones eligible for listing and dispatch
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }

    /// Re-derive brightness from the device type
    pub fn enforce_brightness_invariant(&mut self) {
        self.brightness = self.device_type.effective_brightness(self.brightness);
    }
}

/// A room or zone inside a location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Area {
    pub id: u64,
    pub user_id: UserId,
    pub location_id: u64,
    pub name: String,
}

/// A house, flat or office owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: u64,
    pub user_id: UserId,
    pub name: String,
}

/// Device joined with its resolved relations
#[derive(Debug, Clone)]
pub struct DeviceWithRelations {
    pub device: Device,
    pub location: Option<Location>,
    pub area: Option<Area>,
}
