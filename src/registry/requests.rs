//! Form requests for registry mutations
//!
//! Each request is trimmed, then checked with `validator`. Cross-record rules
//! (ownership of referenced locations and areas, name uniqueness) are enforced
//! by the registry itself because they need the store.

use crate::error::HomeError;
use serde::Deserialize;
use std::collections::HashMap;
use validator::{Validate, ValidationError, ValidationErrors};

fn validate_device_type(value: &str) -> Result<(), ValidationError> {
    match value {
        "switch" | "dimmer" => Ok(()),
        _ => Err(ValidationError::new("in")
            .with_message("The selected type is invalid.".into())),
    }
}

fn validate_device_status(value: &str) -> Result<(), ValidationError> {
    match value {
        "on" | "off" => Ok(()),
        _ => Err(ValidationError::new("in")
            .with_message("The selected status is invalid.".into())),
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Create a device
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StoreDeviceRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "The name field is required and may not exceed 255 characters."))]
    pub name: String,

    /// Free-text location label, used when no location or area is referenced
    #[validate(length(max = 255))]
    pub location: Option<String>,

    pub location_id: Option<u64>,

    pub area_id: Option<u64>,

    #[serde(rename = "type", default)]
    #[validate(custom(function = "validate_device_type"))]
    pub device_type: String,

    #[serde(default)]
    #[validate(custom(function = "validate_device_status"))]
    pub status: String,

    pub brightness: Option<i64>,
}

impl StoreDeviceRequest {
    /// Trim free-text fields before validation
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.location = trim_optional(self.location);
        self
    }
}

/// Update a device; an area is mandatory on update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateDeviceRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "The name field is required and may not exceed 255 characters."))]
    pub name: String,

    pub area_id: Option<u64>,

    #[serde(rename = "type", default)]
    #[validate(custom(function = "validate_device_type"))]
    pub device_type: String,

    #[serde(default)]
    #[validate(custom(function = "validate_device_status"))]
    pub status: String,

    pub brightness: Option<i64>,
}

impl UpdateDeviceRequest {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Create an area inside one of the caller's locations
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StoreAreaRequest {
    pub location_id: Option<u64>,

    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "The name field is required and may not exceed 255 characters."))]
    pub name: String,
}

impl StoreAreaRequest {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Create a location
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StoreLocationRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "The name field is required and may not exceed 255 characters."))]
    pub name: String,
}

impl StoreLocationRequest {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Collects field errors across validator output and registry checks
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, Vec<String>>);

impl FieldErrors {
    pub fn from_validation(result: Result<(), ValidationErrors>) -> Self {
        let mut errors = Self::default();
        if let Err(validation) = result {
            for (field, field_errors) in validation.field_errors() {
                for error in field_errors.iter() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {field} field is invalid ({}).", error.code));
                    let field = match &*field {
                        "device_type" => "type".to_string(),
                        other => other.to_string(),
                    };
                    errors.add(field, message);
                }
            }
        }
        errors
    }

    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Fail with a validation error when anything was collected
    pub fn into_result(self) -> Result<(), HomeError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(HomeError::Validation(self.0))
        }
    }
}
