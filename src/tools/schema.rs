//! Tool schemas advertised to the model
//!
//! The realtime API takes tools in a flat form, chat completions wraps the same
//! definition under `function`. Field names and enum values are the contract
//! the dispatcher decodes.

use super::{CONTROL_DEVICE, GET_DEVICES};
use serde_json::{json, Value};

/// A tool definition independent of the API flavour
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolDefinition {
    /// `{type, name, description, parameters}`
    pub fn realtime(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }

    /// `{type, function: {name, description, parameters}}`
    pub fn chat(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GET_DEVICES,
            description: "Obtiene la lista de dispositivos, su estado, tipo y ubicación.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "location_filter": {
                        "type": "string",
                        "description": "Filtrar por nombre de ubicación (opcional)"
                    }
                }
            }),
        },
        ToolDefinition {
            name: CONTROL_DEVICE,
            description: "Controla un dispositivo (encender, apagar, cambiar brillo).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "device_name": {
                        "type": "string",
                        "description": "El nombre aproximado del dispositivo a controlar."
                    },
                    "action": {
                        "type": "string",
                        "enum": ["turn_on", "turn_off", "set_brightness"],
                        "description": "La acción a realizar."
                    },
                    "brightness": {
                        "type": "integer",
                        "description": "El nivel de brillo (0-100) si la acción es set_brightness."
                    }
                },
                "required": ["device_name", "action"]
            }),
        },
    ]
}

/// Tools in realtime session form
pub fn realtime_tools() -> Vec<Value> {
    definitions().iter().map(ToolDefinition::realtime).collect()
}

/// Tools in chat completions form
pub fn chat_tools() -> Vec<Value> {
    definitions().iter().map(ToolDefinition::chat).collect()
}
