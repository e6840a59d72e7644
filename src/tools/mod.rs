//! Voice tool implementations for device listing and control
//!
//! Tool calls arrive from the model as a name plus loosely typed JSON
//! arguments. They are decoded once into [`ToolCall`] and every outcome,
//! including unknown tools and bad arguments, is returned as a [`ToolResult`]
//! value the model can read.

pub mod devices;
pub mod schema;

use crate::registry::{DeviceRegistry, DeviceScope, DeviceStatus, DeviceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the device listing tool
pub const GET_DEVICES: &str = "get_devices";

/// Name of the device control tool
pub const CONTROL_DEVICE: &str = "control_device";

/// Arguments of `get_devices`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetDevicesArgs {
    /// Case-insensitive substring of a location or area name
    #[serde(default)]
    pub location_filter: Option<String>,
}

/// Action requested by `control_device`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    TurnOn,
    TurnOff,
    SetBrightness,
}

/// Arguments of `control_device`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlDeviceArgs {
    /// Approximate device name as spoken by the user
    pub device_name: String,
    pub action: DeviceAction,
    /// Only read for `set_brightness`
    #[serde(default)]
    pub brightness: Option<i64>,
}

/// A decoded tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    GetDevices(GetDevicesArgs),
    ControlDevice(ControlDeviceArgs),
}

impl ToolCall {
    /// Decode a tool call from its name and JSON arguments; `null` means `{}`
    pub fn parse(name: &str, arguments: Value) -> Result<Self, DispatchFailure> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let invalid = |e: serde_json::Error| DispatchFailure::InvalidArguments {
            tool: name.to_string(),
            detail: e.to_string(),
        };

        match name {
            GET_DEVICES => serde_json::from_value(arguments)
                .map(ToolCall::GetDevices)
                .map_err(invalid),
            CONTROL_DEVICE => serde_json::from_value(arguments)
                .map(ToolCall::ControlDevice)
                .map_err(invalid),
            other => Err(DispatchFailure::UnknownTool(other.to_string())),
        }
    }

    /// Decode a tool call whose arguments are a JSON-encoded string, as the
    /// chat completions API sends them. A blank string means `{}`.
    pub fn parse_encoded(name: &str, arguments: &str) -> Result<Self, DispatchFailure> {
        if arguments.trim().is_empty() {
            return Self::parse(name, Value::Null);
        }
        let value = serde_json::from_str(arguments).map_err(|e| {
            DispatchFailure::InvalidArguments {
                tool: name.to_string(),
                detail: e.to_string(),
            }
        })?;
        Self::parse(name, value)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetDevices(_) => GET_DEVICES,
            ToolCall::ControlDevice(_) => CONTROL_DEVICE,
        }
    }
}

/// Recoverable dispatch failures; rendered to the model as `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchFailure {
    #[error("No encontré ningún dispositivo llamado '{0}'.")]
    DeviceNotFound(String),

    #[error("El dispositivo '{0}' no soporta ajuste de brillo.")]
    UnsupportedOperation(String),

    #[error("Función desconocida")]
    UnknownTool(String),

    #[error("Argumentos inválidos para '{tool}': {detail}")]
    InvalidArguments { tool: String, detail: String },
}

/// Post-mutation state reported back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub status: DeviceStatus,
    pub brightness: u8,
}

/// Device as listed by `get_devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProjection {
    pub id: u64,
    pub name: String,
    pub status: DeviceStatus,
    pub brightness: u8,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub location: String,
    pub area: String,
}

/// Outcome of a tool call, serialized untagged onto the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Devices(Vec<DeviceProjection>),
    Updated {
        success: bool,
        message: String,
        device_state: DeviceState,
    },
    Error {
        error: String,
    },
}

impl ToolResult {
    pub fn updated(name: &str, state: DeviceState) -> Self {
        ToolResult::Updated {
            success: true,
            message: format!("Dispositivo '{name}' actualizado."),
            device_state: state,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error { .. })
    }

    /// JSON value sent back to the model
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }
}

impl From<DispatchFailure> for ToolResult {
    fn from(failure: DispatchFailure) -> Self {
        ToolResult::Error {
            error: failure.to_string(),
        }
    }
}

/// Routes decoded tool calls to their implementations against the registry
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: DeviceRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Dispatch a raw tool call. Never fails: every failure is a result value.
    pub async fn dispatch(&self, scope: DeviceScope, name: &str, arguments: Value) -> ToolResult {
        match ToolCall::parse(name, arguments) {
            Ok(call) => self.execute(scope, call).await,
            Err(failure) => {
                warn!(tool = name, %failure, "Rejected tool call");
                failure.into()
            }
        }
    }

    /// Run an already decoded tool call
    pub async fn execute(&self, scope: DeviceScope, call: ToolCall) -> ToolResult {
        debug!(tool = call.name(), ?scope, "Dispatching tool call");

        let result = match call {
            ToolCall::GetDevices(args) => {
                ToolResult::Devices(devices::get_devices(&self.registry, scope, args).await)
            }
            ToolCall::ControlDevice(args) => {
                match devices::control_device(&self.registry, scope, args).await {
                    Ok((name, state)) => ToolResult::updated(&name, state),
                    Err(failure) => failure.into(),
                }
            }
        };

        if let ToolResult::Error { error } = &result {
            debug!(%error, "Tool call returned an error result");
        }
        result
    }
}
