//! Device registry: the store of truth for devices, areas and locations
//!
//! All records are scoped by owning user. Devices are never removed; a soft
//! delete flips `hidden`, and hidden devices disappear from every query except
//! the owner-checked update path.

pub mod dashboard;
pub mod models;
pub mod requests;
pub mod seed;

pub use models::{
    Area, Device, DeviceStatus, DeviceType, DeviceWithRelations, Location, UserId,
    DEFAULT_DIMMER_BRIGHTNESS, SWITCH_BRIGHTNESS,
};
pub use requests::{
    FieldErrors, StoreAreaRequest, StoreDeviceRequest, StoreLocationRequest, UpdateDeviceRequest,
};

use crate::config::ScopeMode;
use crate::error::{HomeError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// Which devices a query may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceScope {
    /// Visible devices owned by one user
    Owner(UserId),
    /// Every visible device
    AllVisible,
}

impl DeviceScope {
    /// Build the scope for a caller under the configured mode
    pub fn for_caller(mode: ScopeMode, user_id: UserId) -> Self {
        match mode {
            ScopeMode::Owner => DeviceScope::Owner(user_id),
            ScopeMode::Global => DeviceScope::AllVisible,
        }
    }

    fn admits(&self, device: &Device) -> bool {
        if !device.is_visible() {
            return false;
        }
        match self {
            DeviceScope::Owner(user_id) => device.user_id == *user_id,
            DeviceScope::AllVisible => true,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    devices: BTreeMap<u64, Device>,
    areas: BTreeMap<u64, Area>,
    locations: BTreeMap<u64, Location>,
    next_device_id: u64,
    next_area_id: u64,
    next_location_id: u64,
}

impl RegistryState {
    fn allocate(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }

    fn user_location(&self, user_id: UserId, location_id: u64) -> Option<&Location> {
        self.locations
            .get(&location_id)
            .filter(|location| location.user_id == user_id)
    }

    fn user_area(&self, user_id: UserId, area_id: u64) -> Option<&Area> {
        self.areas.get(&area_id).filter(|area| area.user_id == user_id)
    }

    fn with_relations(&self, device: &Device) -> DeviceWithRelations {
        DeviceWithRelations {
            device: device.clone(),
            location: device
                .location_id
                .and_then(|id| self.locations.get(&id))
                .cloned(),
            area: device.area_id.and_then(|id| self.areas.get(&id)).cloned(),
        }
    }
}

/// Placement of a device once its references have been resolved
struct Placement {
    location: Option<String>,
    location_id: Option<u64>,
    area_id: Option<u64>,
}

/// Brightness as stored for a type, after form rules: dimmers default to 50
/// and must be within 0..=100, switches are always 100
fn form_brightness(
    device_type: DeviceType,
    requested: Option<i64>,
    errors: &mut FieldErrors,
) -> u8 {
    match device_type {
        DeviceType::Switch => SWITCH_BRIGHTNESS,
        DeviceType::Dimmer => {
            let value = requested.unwrap_or(i64::from(DEFAULT_DIMMER_BRIGHTNESS));
            match u8::try_from(value) {
                Ok(v) if v <= 100 => v,
                _ => {
                    errors.add("brightness", "The brightness must be between 0 and 100.");
                    DEFAULT_DIMMER_BRIGHTNESS
                }
            }
        }
    }
}

/// In-memory device registry
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a location; names are unique per user
    pub async fn create_location(
        &self,
        user_id: UserId,
        request: StoreLocationRequest,
    ) -> Result<Location> {
        let request = request.normalized();
        let mut errors = FieldErrors::from_validation(request.validate());

        let mut state = self.state.write().await;
        if !errors.has("name")
            && state
                .locations
                .values()
                .any(|l| l.user_id == user_id && l.name == request.name)
        {
            errors.add("name", "The name has already been taken.");
        }
        errors.into_result()?;

        let location = Location {
            id: RegistryState::allocate(&mut state.next_location_id),
            user_id,
            name: request.name,
        };
        state.locations.insert(location.id, location.clone());

        info!(user_id, location_id = location.id, "Location created");
        Ok(location)
    }

    /// Create an area inside one of the user's locations; names are unique per
    /// (user, location)
    pub async fn create_area(&self, user_id: UserId, request: StoreAreaRequest) -> Result<Area> {
        let request = request.normalized();
        let mut errors = FieldErrors::from_validation(request.validate());

        let mut state = self.state.write().await;
        let location_id = match request.location_id {
            Some(id) if state.user_location(user_id, id).is_some() => Some(id),
            Some(_) => {
                errors.add("location_id", "The selected location id is invalid.");
                None
            }
            None => {
                errors.add("location_id", "The location id field is required.");
                None
            }
        };

        if let Some(location_id) = location_id {
            if !errors.has("name")
                && state.areas.values().any(|a| {
                    a.user_id == user_id && a.location_id == location_id && a.name == request.name
                })
            {
                errors.add("name", "The name has already been taken.");
            }
        }
        errors.into_result()?;

        let location_id = location_id
            .ok_or_else(|| HomeError::internal("validated area has no location"))?;
        let area = Area {
            id: RegistryState::allocate(&mut state.next_area_id),
            user_id,
            location_id,
            name: request.name,
        };
        state.areas.insert(area.id, area.clone());

        info!(user_id, area_id = area.id, location_id, "Area created");
        Ok(area)
    }

    /// Create a device with a fresh webhook token
    pub async fn create_device(
        &self,
        user_id: UserId,
        request: StoreDeviceRequest,
    ) -> Result<Device> {
        let request = request.normalized();
        let mut errors = FieldErrors::from_validation(request.validate());

        let mut state = self.state.write().await;

        let placement = if let Some(area_id) = request.area_id {
            match state.user_area(user_id, area_id) {
                Some(area) => Placement {
                    location: Some(area.name.clone()),
                    location_id: Some(area.location_id),
                    area_id: Some(area.id),
                },
                None => {
                    errors.add("area_id", "The selected area id is invalid.");
                    Placement {
                        location: None,
                        location_id: None,
                        area_id: None,
                    }
                }
            }
        } else if let Some(location_id) = request.location_id {
            match state.user_location(user_id, location_id) {
                Some(location) => Placement {
                    location: Some(location.name.clone()),
                    location_id: Some(location.id),
                    area_id: None,
                },
                None => {
                    errors.add("location_id", "The selected location id is invalid.");
                    Placement {
                        location: None,
                        location_id: None,
                        area_id: None,
                    }
                }
            }
        } else {
            Placement {
                location: request.location.clone(),
                location_id: None,
                area_id: None,
            }
        };

        let device_type = request.device_type.parse::<DeviceType>().ok();
        let status = request.status.parse::<DeviceStatus>().ok();
        let brightness = device_type
            .map(|t| form_brightness(t, request.brightness, &mut errors))
            .unwrap_or(SWITCH_BRIGHTNESS);
        errors.into_result()?;

        let (device_type, status) = device_type
            .zip(status)
            .ok_or_else(|| HomeError::internal("validated device has no type or status"))?;

        let now = Utc::now();
        let device = Device {
            id: RegistryState::allocate(&mut state.next_device_id),
            user_id,
            name: request.name,
            device_type,
            status,
            brightness,
            location: placement.location,
            location_id: placement.location_id,
            area_id: placement.area_id,
            hidden: false,
            webhook_token: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        state.devices.insert(device.id, device.clone());

        info!(
            user_id,
            device_id = device.id,
            device_type = %device.device_type,
            "Device created"
        );
        Ok(device)
    }

    /// Update one of the user's devices; the area moves the device's location
    pub async fn update_device(
        &self,
        user_id: UserId,
        device_id: u64,
        request: UpdateDeviceRequest,
    ) -> Result<Device> {
        let mut state = self.state.write().await;
        Self::authorize_owner(&state, user_id, device_id)?;

        let request = request.normalized();
        let mut errors = FieldErrors::from_validation(request.validate());

        let area = match request.area_id {
            Some(area_id) => match state.user_area(user_id, area_id) {
                Some(area) => Some(area.clone()),
                None => {
                    errors.add("area_id", "The selected area id is invalid.");
                    None
                }
            },
            None => {
                errors.add("area_id", "The area id field is required.");
                None
            }
        };

        let device_type = request.device_type.parse::<DeviceType>().ok();
        let status = request.status.parse::<DeviceStatus>().ok();
        let brightness = device_type
            .map(|t| form_brightness(t, request.brightness, &mut errors))
            .unwrap_or(SWITCH_BRIGHTNESS);
        errors.into_result()?;

        let (area, (device_type, status)) = area
            .zip(device_type.zip(status))
            .ok_or_else(|| HomeError::internal("validated update is incomplete"))?;

        let device = state
            .devices
            .get_mut(&device_id)
            .ok_or_else(|| HomeError::not_found(format!("device {device_id}")))?;
        device.name = request.name;
        device.device_type = device_type;
        device.status = status;
        device.brightness = brightness;
        device.location = Some(area.name.clone());
        device.location_id = Some(area.location_id);
        device.area_id = Some(area.id);
        device.updated_at = Utc::now();

        info!(user_id, device_id, "Device updated");
        Ok(device.clone())
    }

    /// Soft-delete one of the user's devices
    pub async fn hide_device(&self, user_id: UserId, device_id: u64) -> Result<Device> {
        let mut state = self.state.write().await;
        Self::authorize_owner(&state, user_id, device_id)?;

        let device = state
            .devices
            .get_mut(&device_id)
            .ok_or_else(|| HomeError::not_found(format!("device {device_id}")))?;
        device.hidden = true;
        device.updated_at = Utc::now();

        info!(user_id, device_id, "Device hidden");
        Ok(device.clone())
    }

    fn authorize_owner(state: &RegistryState, user_id: UserId, device_id: u64) -> Result<()> {
        let device = state
            .devices
            .get(&device_id)
            .ok_or_else(|| HomeError::not_found(format!("device {device_id}")))?;
        if device.user_id != user_id {
            return Err(HomeError::permission_denied(format!(
                "device {device_id} belongs to another user"
            )));
        }
        Ok(())
    }

    /// Look up a visible device by its webhook token
    pub async fn device_by_webhook_token(&self, token: &str) -> Result<Device> {
        let token = Uuid::parse_str(token)
            .map_err(|_| HomeError::not_found("webhook token"))?;

        let state = self.state.read().await;
        state
            .devices
            .values()
            .find(|d| d.webhook_token == token && d.is_visible())
            .cloned()
            .ok_or_else(|| HomeError::not_found("webhook token"))
    }

    /// Fetch a single device by id, hidden or not
    pub async fn device(&self, device_id: u64) -> Option<Device> {
        self.state.read().await.devices.get(&device_id).cloned()
    }

    /// Visible devices in scope with their location and area, ordered by id
    pub async fn visible_devices(&self, scope: DeviceScope) -> Vec<DeviceWithRelations> {
        let state = self.state.read().await;
        state
            .devices
            .values()
            .filter(|d| scope.admits(d))
            .map(|d| state.with_relations(d))
            .collect()
    }

    /// Resolve a spoken device name: exact match first, then a case-insensitive
    /// substring match. Ties go to the lowest id. A blank name resolves nothing.
    pub async fn resolve_device(&self, scope: DeviceScope, name: &str) -> Option<Device> {
        if name.trim().is_empty() {
            return None;
        }
        let state = self.state.read().await;
        let mut candidates = state.devices.values().filter(|d| scope.admits(d));

        if let Some(exact) = candidates.clone().find(|d| d.name == name) {
            return Some(exact.clone());
        }

        let needle = name.to_lowercase();
        let found = candidates
            .find(|d| d.name.to_lowercase().contains(&needle))
            .cloned();
        debug!(query = name, found = found.as_ref().map(|d| d.id), "Fuzzy device lookup");
        found
    }

    /// Apply a state change to a visible device. Only status and brightness
    /// are written; every other field keeps its stored value. Brightness is
    /// re-derived from the stored type.
    pub async fn apply_device_state(
        &self,
        device_id: u64,
        status: DeviceStatus,
        brightness: Option<u8>,
    ) -> Result<Device> {
        let mut state = self.state.write().await;
        let stored = state
            .devices
            .get_mut(&device_id)
            .filter(|d| d.is_visible())
            .ok_or_else(|| HomeError::not_found(format!("device {device_id}")))?;

        stored.status = status;
        if let Some(brightness) = brightness {
            stored.brightness = brightness;
        }
        stored.enforce_brightness_invariant();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    /// All locations of a user ordered by name, each with its areas ordered by name
    pub async fn locations_with_areas(&self, user_id: UserId) -> Vec<(Location, Vec<Area>)> {
        let state = self.state.read().await;
        let mut locations: Vec<_> = state
            .locations
            .values()
            .filter(|l| l.user_id == user_id)
            .map(|l| {
                let mut areas: Vec<_> = state
                    .areas
                    .values()
                    .filter(|a| a.location_id == l.id)
                    .cloned()
                    .collect();
                areas.sort_by(|a, b| a.name.cmp(&b.name));
                (l.clone(), areas)
            })
            .collect();
        locations.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        locations
    }

    /// A user's area, if it exists
    pub async fn user_area(&self, user_id: UserId, area_id: u64) -> Option<Area> {
        self.state.read().await.user_area(user_id, area_id).cloned()
    }

    /// A user's location, if it exists
    pub async fn user_location(&self, user_id: UserId, location_id: u64) -> Option<Location> {
        self.state
            .read()
            .await
            .user_location(user_id, location_id)
            .cloned()
    }
}
