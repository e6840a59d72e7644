//! Dashboard view of a user's devices, locations and areas

use super::{Area, DeviceRegistry, Location, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Query filters accepted by the dashboard; blank values mean no filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub location: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub area: Option<u64>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Device row as rendered on the dashboard
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardDevice {
    pub id: u64,
    pub name: String,
    pub location: Option<String>,
    pub location_id: Option<u64>,
    pub area_id: Option<u64>,
    #[serde(rename = "type")]
    pub device_type: String,
    pub status: String,
    pub brightness: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardArea {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardLocation {
    pub id: u64,
    pub name: String,
    pub areas: Vec<DashboardArea>,
}

/// Filters actually applied after ownership checks
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AppliedFilters {
    pub location: Option<u64>,
    pub area: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub devices: Vec<DashboardDevice>,
    pub locations: Vec<DashboardLocation>,
    pub filters: AppliedFilters,
}

fn webhook_url(public_url: &Url, token: &uuid::Uuid) -> String {
    public_url
        .join(&format!("webhooks/devices/{token}"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{public_url}webhooks/devices/{token}"))
}

impl DeviceRegistry {
    /// Build the dashboard for a user. An owned area filter takes precedence
    /// over a location filter; filters on foreign records are ignored.
    pub async fn dashboard(
        &self,
        user_id: UserId,
        filter: &DashboardFilter,
        public_url: &Url,
    ) -> DashboardView {
        let area: Option<Area> = match filter.area {
            Some(id) => self.user_area(user_id, id).await,
            None => None,
        };
        let location: Option<Location> = match (area.as_ref(), filter.location) {
            (None, Some(id)) => self.user_location(user_id, id).await,
            _ => None,
        };

        let mut rows: Vec<_> = self
            .visible_devices(super::DeviceScope::Owner(user_id))
            .await
            .into_iter()
            .filter(|row| match (&area, &location) {
                (Some(area), _) => row.device.area_id == Some(area.id),
                (None, Some(location)) => row.device.location_id == Some(location.id),
                (None, None) => true,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.device
                .created_at
                .cmp(&a.device.created_at)
                .then(b.device.id.cmp(&a.device.id))
        });

        let devices = rows
            .into_iter()
            .map(|row| {
                let label = row
                    .area
                    .as_ref()
                    .map(|a| a.name.clone())
                    .or_else(|| row.location.as_ref().map(|l| l.name.clone()))
                    .or_else(|| row.device.location.clone());
                DashboardDevice {
                    id: row.device.id,
                    name: row.device.name.clone(),
                    location: label,
                    location_id: row.device.location_id,
                    area_id: row.device.area_id,
                    device_type: row.device.device_type.to_string(),
                    status: row.device.status.to_string(),
                    brightness: row.device.brightness,
                    created_at: row.device.created_at,
                    updated_at: row.device.updated_at,
                    webhook_url: webhook_url(public_url, &row.device.webhook_token),
                }
            })
            .collect();

        let locations = self
            .locations_with_areas(user_id)
            .await
            .into_iter()
            .map(|(location, areas)| DashboardLocation {
                id: location.id,
                name: location.name,
                areas: areas
                    .into_iter()
                    .map(|a| DashboardArea {
                        id: a.id,
                        name: a.name,
                    })
                    .collect(),
            })
            .collect();

        DashboardView {
            devices,
            locations,
            filters: AppliedFilters {
                location: location.map(|l| l.id).or(area.as_ref().map(|a| a.location_id)),
                area: area.map(|a| a.id),
            },
        }
    }
}
