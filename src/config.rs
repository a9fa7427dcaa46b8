//! Registry configuration parameters
//!
//! Tunables for the dynamic IO registry.  Persisted with postcard through a
//! [`ConfigPort`](crate::ports::ConfigPort) or edited as JSON.

use serde::{Deserialize, Serialize};

use crate::identifiers::{NetworkName, truncated};
use crate::ports::ConfigError;
use crate::queue::{DEFAULT_MAX_DEPTH, EventMask};

/// Upper bound accepted for `event_queue_depth`.
pub const MAX_EVENT_QUEUE_DEPTH: u32 = 100_000;

/// Core registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    // --- IO paths ---
    /// Network used when an IO path stops before the network component
    pub default_network_name: NetworkName,

    // --- Event queue ---
    /// Pending events kept before new ones are rejected (0 = default)
    pub event_queue_depth: u32,
    /// Event kinds the queue accepts
    pub event_mask: EventMask,

    // --- Network lifecycle ---
    /// Remove a network when its last memory block is deleted
    pub remove_empty_networks: bool,
    /// Grow local memory blocks to fit the layout in an info block
    pub resize_mblks: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_network_name: truncated("iocafenet"),

            event_queue_depth: DEFAULT_MAX_DEPTH as u32,
            event_mask: EventMask::NETWORK | EventMask::DEVICE,

            remove_empty_networks: true,
            // Server side: blocks arrive with their final size.
            resize_mblks: false,
        }
    }
}

impl RegistryConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_network_name.is_empty() {
            return Err(ConfigError::ValidationFailed("default_network_name is empty"));
        }
        if self.default_network_name.contains(['*', ' ']) {
            return Err(ConfigError::ValidationFailed(
                "default_network_name contains '*' or ' '",
            ));
        }
        if self.event_queue_depth > MAX_EVENT_QUEUE_DEPTH {
            return Err(ConfigError::ValidationFailed("event_queue_depth too large"));
        }
        if self.event_mask.0 & !EventMask::ALL.0 != 0 {
            return Err(ConfigError::ValidationFailed("event_mask has unknown bits"));
        }
        Ok(())
    }

    /// Serialize for persistent storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::IoError)
    }

    /// Deserialize and validate a persisted config.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }
}
