//! Unified error types for the dynamic IO registry.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! connection threads' error handling uniform.  All variants are `Copy` so a
//! failed registration can be logged and reported without allocation.
//!
//! Lookup misses are normally reported as `None` rather than
//! [`Error::NotFound`]; devices connect and disconnect continuously, so a miss
//! is an expected outcome.  `NotFound` is only returned by operations that
//! must report a status (e.g. removing a network that is already gone).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible registry operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A signal, network, shortcut or memory block does not exist.
    NotFound(NotFound),
    /// Bad signal metadata or IO path string.
    Malformed(Malformed),
    /// Event queue at capacity or a memory block buffer could not grow.
    ResourceExhausted(Exhausted),
    /// Operation on an object mid-teardown or a subsystem not initialized.
    InvalidState(&'static str),
}

impl Error {
    /// `true` for lookup misses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(e) => write!(f, "not found: {e}"),
            Self::Malformed(e) => write!(f, "malformed: {e}"),
            Self::ResourceExhausted(e) => write!(f, "resource exhausted: {e}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Lookup misses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    Signal,
    Network,
    Shortcut,
    MemoryBlock,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => write!(f, "signal"),
            Self::Network => write!(f, "network"),
            Self::Shortcut => write!(f, "memory block shortcut"),
            Self::MemoryBlock => write!(f, "memory block"),
        }
    }
}

impl From<NotFound> for Error {
    fn from(e: NotFound) -> Self {
        Self::NotFound(e)
    }
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// IO path is empty where a component is mandatory.
    IoPath,
    /// Info block is not valid JSON.
    InfoJson,
    /// Info block JSON does not have the expected mblk/groups/signals shape.
    InfoStructure,
    /// Signal type name is not one of the known type names.
    UnknownType,
    /// Signal would extend past the end of its memory block.
    SignalOutOfRange,
    /// A name does not fit its fixed-size buffer.
    NameTooLong,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoPath => write!(f, "IO path"),
            Self::InfoJson => write!(f, "info block is not valid JSON"),
            Self::InfoStructure => write!(f, "unexpected info block structure"),
            Self::UnknownType => write!(f, "unknown signal type"),
            Self::SignalOutOfRange => write!(f, "signal outside memory block"),
            Self::NameTooLong => write!(f, "name too long"),
        }
    }
}

impl From<Malformed> for Error {
    fn from(e: Malformed) -> Self {
        Self::Malformed(e)
    }
}

// ---------------------------------------------------------------------------
// Resource exhaustion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhausted {
    /// Event queue holds `max_depth` events already.
    QueueFull,
    /// Memory block buffer could not be grown.
    BufferCapacity,
}

impl fmt::Display for Exhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "event queue full"),
            Self::BufferCapacity => write!(f, "memory block capacity"),
        }
    }
}

impl From<Exhausted> for Error {
    fn from(e: Exhausted) -> Self {
        Self::ResourceExhausted(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
