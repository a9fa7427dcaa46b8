//! Communication event queue.
//!
//! Connection threads produce events while they hold the registry guard;
//! one application thread consumes them later without it.  The queue
//! therefore has its own lock.
//!
//! ```text
//! ┌──────────────┐                ┌──────────────┐     ┌──────────────┐
//! │ connection A │──queue_event──▶│              │     │              │
//! │ connection B │──queue_event──▶│  EventQueue  │────▶│ application  │
//! │ connection C │──queue_event──▶│  (bounded)   │     │  (consumer)  │
//! └──────────────┘                └──────┬───────┘     └──────▲───────┘
//!                                        └────── wake ────────┘
//! ```
//!
//! The queue is bounded: once `max_depth` events are pending, further events
//! are rejected (the newest is dropped) and the producer gets
//! `ResourceExhausted(QueueFull)`.

use std::collections::VecDeque;
use std::sync::Mutex;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Exhausted, Result};
use crate::identifiers::{Name, NetworkName, truncated};

/// Depth used when 0 is requested.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Why an event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NewMemoryBlock,
    MblkConnectedAsSource,
    MblkConnectedAsTarget,
    MemoryBlockDeleted,
    NewNetwork,
    NetworkDisconnected,
    NewDevice,
    DeviceDisconnected,
}

impl EventKind {
    /// Mask bits, any of which lets this kind through.
    pub const fn accepted_by(self) -> EventMask {
        match self {
            Self::NewMemoryBlock => EventMask(EventMask::NEW_MBLK.0 | EventMask::ALL_MBLK.0),
            Self::MblkConnectedAsSource | Self::MblkConnectedAsTarget => {
                EventMask(EventMask::MBLK_CONNECT.0 | EventMask::ALL_MBLK.0)
            }
            Self::MemoryBlockDeleted => EventMask::ALL_MBLK,
            Self::NewNetwork | Self::NetworkDisconnected => EventMask::NETWORK,
            Self::NewDevice | Self::DeviceDisconnected => EventMask::DEVICE,
        }
    }
}

/// Which event kinds a queue accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMask(pub u8);

impl EventMask {
    pub const NONE: Self = Self(0);
    /// `NewMemoryBlock`.
    pub const NEW_MBLK: Self = Self(0x01);
    /// `NewDevice`, `DeviceDisconnected`.
    pub const DEVICE: Self = Self(0x02);
    /// `NewNetwork`, `NetworkDisconnected`.
    pub const NETWORK: Self = Self(0x04);
    /// `MblkConnectedAsSource`, `MblkConnectedAsTarget`.
    pub const MBLK_CONNECT: Self = Self(0x08);
    /// Every memory block event, deletions included.
    pub const ALL_MBLK: Self = Self(0x10);
    pub const ALL: Self = Self(0x1F);

    pub const fn contains_any(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn accepts(self, kind: EventKind) -> bool {
        self.contains_any(kind.accepted_by())
    }
}

impl core::ops::BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::NETWORK | Self::DEVICE
    }
}

/// One queued notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub kind: EventKind,
    pub network_name: NetworkName,
    pub device_name: Name,
    pub device_nr: u32,
    pub mblk_name: Name,
}

impl QueuedEvent {
    pub fn new(
        kind: EventKind,
        network_name: &str,
        device_name: &str,
        device_nr: u32,
        mblk_name: &str,
    ) -> Self {
        Self {
            kind,
            network_name: truncated(network_name),
            device_name: truncated(device_name),
            device_nr,
            mblk_name: truncated(mblk_name),
        }
    }
}

pub struct EventQueue {
    events: Mutex<VecDeque<QueuedEvent>>,
    max_depth: usize,
    mask: EventMask,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl EventQueue {
    /// `max_depth` 0 selects [`DEFAULT_MAX_DEPTH`].
    pub fn new(max_depth: usize, mask: EventMask) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_depth: if max_depth == 0 {
                DEFAULT_MAX_DEPTH
            } else {
                max_depth
            },
            mask,
            wake: Signal::new(),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// Append an event and wake the consumer.  Kinds outside the mask are
    /// dropped silently and count as success.
    pub fn queue_event(&self, event: QueuedEvent) -> Result<()> {
        if !self.mask.accepts(event.kind) {
            return Ok(());
        }
        {
            let mut events = self
                .events
                .lock()
                .map_err(|_| Error::InvalidState("event queue lock poisoned"))?;
            if events.len() >= self.max_depth {
                warn!(
                    "event queue overflow ({}), dropped {:?} {}",
                    self.max_depth, event.kind, event.network_name
                );
                return Err(Exhausted::QueueFull.into());
            }
            events.push_back(event);
        }
        self.wake.signal(());
        Ok(())
    }

    /// Oldest event, left in the queue.
    pub fn get_event(&self) -> Option<QueuedEvent> {
        self.events.lock().ok()?.front().cloned()
    }

    /// Remove and return the oldest event.
    pub fn pop_event(&self) -> Option<QueuedEvent> {
        let event = self.events.lock().ok()?.pop_front();
        if event.is_some() {
            self.wake.signal(());
        }
        event
    }

    pub fn len(&self) -> usize {
        self.events.lock().map_or(0, |events| events.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending event.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        self.wake.reset();
    }

    /// Block the calling thread until at least one event is pending.
    pub fn wait(&self) {
        while self.is_empty() {
            futures_lite::future::block_on(self.wake.wait());
        }
    }

    /// Async form of [`wait`](Self::wait).
    pub async fn wait_async(&self) {
        while self.is_empty() {
            self.wake.wait().await;
        }
    }
}

impl core::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("max_depth", &self.max_depth)
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}
