//! Port traits: the boundary between the registry and the application.
//!
//! ```text
//!   connection thread ──▶ CommRoot ──▶ NetworkListener (application)
//!                                 └──▶ EventQueue ──▶ application thread
//! ```
//!
//! A listener is called synchronously from the connection thread that
//! mutates the registry, with the registry guard held.  It must not call
//! back into the [`CommRoot`](crate::comm::CommRoot).  Applications that
//! need to do real work should use the event queue instead.

use crate::config::RegistryConfig;
use crate::network::DynamicNetwork;
use crate::queue::QueuedEvent;

// ───────────────────────────────────────────────────────────────
// Network listener (registry → application, synchronous)
// ───────────────────────────────────────────────────────────────

/// Receives network, device and memory block notifications as they happen.
pub trait NetworkListener: Send {
    /// `network` is `None` for memory block events raised before the block
    /// is attached to a network.  For `NetworkDisconnected` it is the
    /// network about to be removed.
    fn on_network_event(&mut self, network: Option<&DynamicNetwork>, event: &QueuedEvent);
}

impl<F> NetworkListener for F
where
    F: FnMut(Option<&DynamicNetwork>, &QueuedEvent) + Send,
{
    fn on_network_event(&mut self, network: Option<&DynamicNetwork>, event: &QueuedEvent) {
        self(network, event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (registry ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the registry configuration.
///
/// Implementations must run [`RegistryConfig::validate`] before saving.
pub trait ConfigPort {
    /// Returns [`RegistryConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<RegistryConfig, ConfigError>;

    fn save(&mut self, config: &RegistryConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed validation; names the field.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
