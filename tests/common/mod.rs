//! Common test utilities
//!
//! rstest fixtures for a seeded registry shared by the dispatcher, assistant
//! and HTTP tests.

#![allow(dead_code)]

use rstest::*;
use serde_json::json;
use smarthome_voice::registry::seed::SeedFile;
use smarthome_voice::registry::DeviceRegistry;

/// Owner of the seeded home
pub const OWNER: u64 = 1;

/// A second user with a single device
pub const NEIGHBOUR: u64 = 2;

/// Two users: the owner has a house with a living room and a kitchen, plus a
/// garden device with only a free-text location
pub fn home_seed() -> SeedFile {
    serde_json::from_value(json!({
        "users": [
            {
                "id": OWNER,
                "locations": [
                    { "name": "Casa", "areas": ["Sala", "Cocina"] },
                    { "name": "Oficina", "areas": [] }
                ],
                "devices": [
                    { "name": "Luz Sala", "type": "dimmer", "status": "off", "brightness": 40, "area": "Sala" },
                    { "name": "Luz Cocina", "type": "switch", "status": "on", "area": "Cocina" },
                    { "name": "Lámpara Escritorio", "type": "dimmer", "status": "on", "brightness": 70, "location": "Oficina" },
                    { "name": "Bomba de agua", "type": "switch", "status": "off", "location": "Jardín" }
                ]
            },
            {
                "id": NEIGHBOUR,
                "locations": [{ "name": "Depto", "areas": ["Sala"] }],
                "devices": [
                    { "name": "Luz Vecino", "type": "switch", "status": "off", "area": "Sala" }
                ]
            }
        ]
    }))
    .expect("valid seed")
}

/// Registry seeded with [`home_seed`]
#[fixture]
pub async fn seeded_registry() -> DeviceRegistry {
    let registry = DeviceRegistry::new();
    registry.seed(home_seed()).await.expect("seed applies");
    registry
}
