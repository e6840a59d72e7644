//! Smart-home device management with a voice assistant
//!
//! This crate keeps a per-user registry of devices, areas and locations and
//! exposes two voice tools over it, `get_devices` and `control_device`. The
//! tools are served to the OpenAI realtime API through ephemeral sessions and
//! to a turn-based chat loop that can also transcribe and speak.
//!
//! # Features
//!
//! - Typed tool dispatch with model-readable error results
//! - Bounded tool-call loop with best-effort speech synthesis
//! - Realtime session creation with server-side voice activity detection
//! - Owner-scoped device registry with soft delete and status webhooks

// Core modules
pub mod assistant;
pub mod config;
pub mod error;
pub mod http_transport;
pub mod logging;
pub mod openai;
pub mod registry;
pub mod tools;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{HomeError, Result};
