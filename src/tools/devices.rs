//! `get_devices` and `control_device`

use super::{ControlDeviceArgs, DeviceAction, DeviceProjection, DeviceState, DispatchFailure, GetDevicesArgs};
use crate::registry::{
    DeviceRegistry, DeviceScope, DeviceStatus, DeviceType, DEFAULT_DIMMER_BRIGHTNESS,
};
use tracing::{info, warn};

/// Placeholder for a device without a location
pub const NO_LOCATION: &str = "Sin ubicación";

/// Placeholder for a device without an area
pub const NO_AREA: &str = "Sin área";

/// List visible devices in scope, optionally filtered by location or area name
pub async fn get_devices(
    registry: &DeviceRegistry,
    scope: DeviceScope,
    args: GetDevicesArgs,
) -> Vec<DeviceProjection> {
    let filter = args
        .location_filter
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty());

    registry
        .visible_devices(scope)
        .await
        .into_iter()
        .filter(|row| match &filter {
            Some(needle) => {
                let in_location = row
                    .location
                    .as_ref()
                    .is_some_and(|l| l.name.to_lowercase().contains(needle));
                let in_area = row
                    .area
                    .as_ref()
                    .is_some_and(|a| a.name.to_lowercase().contains(needle));
                in_location || in_area
            }
            None => true,
        })
        .map(|row| DeviceProjection {
            id: row.device.id,
            name: row.device.name,
            status: row.device.status,
            brightness: row.device.brightness,
            device_type: row.device.device_type,
            location: row
                .location
                .map(|l| l.name)
                .unwrap_or_else(|| NO_LOCATION.to_string()),
            area: row.area.map(|a| a.name).unwrap_or_else(|| NO_AREA.to_string()),
        })
        .collect()
}

/// Resolve a device by spoken name and apply one action to it
///
/// Returns the stored device name with its post-mutation state. Exactly one
/// device is persisted on success; nothing is written on failure.
pub async fn control_device(
    registry: &DeviceRegistry,
    scope: DeviceScope,
    args: ControlDeviceArgs,
) -> Result<(String, DeviceState), DispatchFailure> {
    let device = registry
        .resolve_device(scope, &args.device_name)
        .await
        .ok_or_else(|| DispatchFailure::DeviceNotFound(args.device_name.clone()))?;

    let (status, brightness) = match args.action {
        DeviceAction::TurnOn => (DeviceStatus::On, None),
        DeviceAction::TurnOff => (DeviceStatus::Off, None),
        DeviceAction::SetBrightness => {
            if device.device_type != DeviceType::Dimmer {
                return Err(DispatchFailure::UnsupportedOperation(device.name));
            }
            let requested = args
                .brightness
                .unwrap_or(i64::from(DEFAULT_DIMMER_BRIGHTNESS));
            (DeviceStatus::On, Some(requested.clamp(0, 100) as u8))
        }
    };

    let device = registry
        .apply_device_state(device.id, status, brightness)
        .await
        .map_err(|e| {
            warn!(error = %e, device = %args.device_name, "Device vanished before save");
            DispatchFailure::DeviceNotFound(args.device_name.clone())
        })?;

    info!(
        device_id = device.id,
        action = ?args.action,
        status = %device.status,
        brightness = device.brightness,
        "Device controlled by voice"
    );

    Ok((
        device.name,
        DeviceState {
            status: device.status,
            brightness: device.brightness,
        },
    ))
}
