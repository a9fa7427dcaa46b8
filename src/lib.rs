//! Dynamic IO network registry.
//!
//! A server with no prior knowledge of its devices learns about them from
//! the memory blocks their connections create.  Each device publishes an
//! "info" block describing its signals; the registry files those signals
//! under network, device and memory block names so an application can
//! resolve an IO path such as `dip_switch_3.exp.gina1.cafenet` to a live
//! value, while connection threads keep adding and removing blocks.
//!
//! ```text
//!   CommRoot ── Mutex ──▶ DynamicRoot ──▶ DynamicNetwork ──▶ DynamicSignal
//!      │                      │                 └──────────▶ shortcuts ──▶ MemoryBlock
//!      │                      └──▶ NetworkListener / EventQueue
//!      └── memory blocks
//! ```

pub mod comm;
pub mod config;
pub mod hash;
pub mod identifiers;
pub mod info;
pub mod mblk;
pub mod network;
pub mod ports;
pub mod queue;
pub mod root;
pub mod shortcut;
pub mod signal;
pub mod types;

mod error;

pub use comm::{BoundSignal, CommRoot, CommState};
pub use config::RegistryConfig;
pub use error::{Error, Exhausted, Malformed, NotFound, Result};
pub use identifiers::{Expect, Identifiers, iopath_to_identifiers, iopath_to_identifiers_with_default};
pub use mblk::{MblkHandle, MblkInfo, MemoryBlock};
pub use network::{DynamicNetwork, NetworkState};
pub use ports::{ConfigError, ConfigPort, NetworkListener};
pub use queue::{EventKind, EventMask, EventQueue, QueuedEvent};
pub use root::DynamicRoot;
pub use signal::DynamicSignal;
pub use types::{SignalType, SignalValue};
