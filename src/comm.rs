//! Communication root: the registry guard and memory block lifecycle.
//!
//! Connection threads report memory blocks as they arrive and go; the
//! application resolves IO paths to live signals.  Both sides go through one
//! mutex around the dynamic root and the block list, so every registry
//! mutation and every multi-step lookup is serialized:
//!
//! ```text
//!   connection threads                        application thread
//!   ──────────────────                        ──────────────────
//!   add_memory_block ──┐                 ┌── bind_signal / get / set
//!   remove_memory_block┤                 │
//!                      ▼                 ▼
//!               ┌─────────────────────────────┐
//!               │ Mutex<CommState>            │
//!               │   DynamicRoot + block list  │
//!               └──────────────┬──────────────┘
//!                              │ events
//!                              ▼
//!                         EventQueue (own lock) ──▶ application thread
//! ```
//!
//! Signal values are read and written through the block's own buffer lock,
//! so a [`BoundSignal`] can be used without taking the registry guard.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{Error, NotFound, Result};
use crate::identifiers::{Expect, Identifiers, NetworkName, iopath_to_identifiers_with_default, truncated};
use crate::mblk::{MblkHandle, MemoryBlock};
use crate::ports::{ConfigError, ConfigPort, NetworkListener};
use crate::queue::{EventKind, EventMask, EventQueue};
use crate::root::DynamicRoot;
use crate::signal::DynamicSignal;
use crate::types::{SignalValue, state};

/// Everything behind the registry guard.
#[derive(Debug)]
pub struct CommState {
    droot: DynamicRoot,
    mblks: Vec<MblkHandle>,
}

impl CommState {
    pub fn droot(&self) -> &DynamicRoot {
        &self.droot
    }

    pub fn droot_mut(&mut self) -> &mut DynamicRoot {
        &mut self.droot
    }

    /// Memory blocks currently registered, in arrival order.
    pub fn memory_blocks(&self) -> &[MblkHandle] {
        &self.mblks
    }

    /// Resolve identifiers to a signal and its memory block.
    ///
    /// Uses the network's shortcut list first; failing that, scans every
    /// registered block and adds a shortcut for next time.  A signal whose
    /// block is not (yet) known is still returned, unconnected.
    pub fn bind(&mut self, ids: &Identifiers) -> Option<BoundSignal> {
        if ids.is_empty() {
            return None;
        }
        let (net_id, sig_id) = self.droot.find_signal(ids)?;
        let network = self.droot.network_mut(net_id)?;
        let signal = network.signal(sig_id)?.clone();

        let mblk: Option<MblkHandle> = match network.find_mblk_shortcut(
            &signal.mblk_name,
            &signal.device_name,
            signal.device_nr,
        ) {
            Some(mblk) => Some(mblk),
            None => {
                let found = self
                    .mblks
                    .iter()
                    .find(|m| {
                        let info = m.info();
                        info.network_name == ids.network_name
                            && info.matches(&signal.mblk_name, &signal.device_name, signal.device_nr)
                    })
                    .cloned();
                if let Some(mblk) = &found {
                    network.add_mblk_shortcut(mblk);
                }
                found
            }
        };
        // A block too small for the signal is treated as not yet arrived.
        let mblk = mblk.filter(|m| {
            let fits = m.nbytes() >= signal.end();
            if !fits {
                debug!("{} does not fit in its {} byte block", signal.name, m.nbytes());
            }
            fits
        });

        Some(BoundSignal {
            network_name: truncated(network.name()),
            mblk: mblk.as_ref().map_or_else(Weak::new, Arc::downgrade),
            signal,
        })
    }

    /// Every signal matching `ids`, wildcards expanded, in chain order.
    pub fn find_signals(&self, ids: &Identifiers) -> Vec<DynamicSignal> {
        self.droot
            .network_by_name(&ids.network_name)
            .map(|n| n.signals_matching(ids).map(|(_, s)| s.clone()).collect())
            .unwrap_or_default()
    }
}

/// A signal resolved to its memory block.
#[derive(Debug, Clone)]
pub struct BoundSignal {
    pub network_name: NetworkName,
    pub signal: DynamicSignal,
    mblk: Weak<MemoryBlock>,
}

impl BoundSignal {
    /// The block is still alive.
    pub fn is_connected(&self) -> bool {
        self.mblk.strong_count() > 0
    }

    /// State bits and value; `(0, Unavailable)` once the block is gone.
    pub fn read(&self) -> (u8, SignalValue) {
        match self.mblk.upgrade() {
            Some(mblk) => mblk.read_value(
                self.signal.addr as usize,
                self.signal.n as usize,
                self.signal.signal_type,
            ),
            None => (0, SignalValue::Unavailable),
        }
    }

    pub fn write(&self, value: &SignalValue, state_bits: u8) -> Result<()> {
        let mblk = self
            .mblk
            .upgrade()
            .ok_or(Error::NotFound(NotFound::MemoryBlock))?;
        mblk.write_value(
            self.signal.addr as usize,
            self.signal.n as usize,
            self.signal.signal_type,
            value,
            state_bits,
        )
    }
}

/// One communication root.  Owns the dynamic registry; dropping it tears the
/// registry down root first.
#[derive(Debug)]
pub struct CommRoot {
    state: Mutex<CommState>,
}

impl CommRoot {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            state: Mutex::new(CommState {
                droot: DynamicRoot::new(config),
                mblks: Vec::new(),
            }),
        }
    }

    /// Build a root from persisted configuration.
    pub fn from_config_port(port: &dyn ConfigPort) -> core::result::Result<Self, ConfigError> {
        let config = port.load()?;
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Take the registry guard.  Hold it across multi-step lookups.
    pub fn lock(&self) -> Result<MutexGuard<'_, CommState>> {
        self.state
            .lock()
            .map_err(|_| Error::InvalidState("registry lock poisoned"))
    }

    pub fn config(&self) -> Result<RegistryConfig> {
        Ok(self.lock()?.droot.config().clone())
    }

    pub fn set_listener(&self, listener: Option<Box<dyn NetworkListener>>) -> Result<()> {
        self.lock()?.droot.set_listener(listener);
        Ok(())
    }

    // ── Event queue ──────────────────────────────────────────────

    /// Start queueing events, replacing (and dropping) any previous queue.
    /// `max_depth` 0 uses the configured depth.
    pub fn initialize_event_queue(&self, max_depth: usize, mask: EventMask) -> Result<Arc<EventQueue>> {
        let mut state = self.lock()?;
        let depth = if max_depth == 0 {
            state.droot.config().event_queue_depth as usize
        } else {
            max_depth
        };
        let queue = Arc::new(EventQueue::new(depth, mask));
        if let Some(old) = state.droot.queue() {
            old.clear();
        }
        state.droot.set_queue(Some(queue.clone()));
        Ok(queue)
    }

    /// Queue with the configured depth and mask.
    pub fn initialize_default_event_queue(&self) -> Result<Arc<EventQueue>> {
        let mask = self.lock()?.droot.config().event_mask;
        self.initialize_event_queue(0, mask)
    }

    /// Stop queueing and drop pending events.
    pub fn release_event_queue(&self) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(old) = state.droot.queue() {
            old.clear();
        }
        state.droot.set_queue(None);
        Ok(())
    }

    pub fn event_queue(&self) -> Option<Arc<EventQueue>> {
        self.lock().ok()?.droot.queue().cloned()
    }

    // ── Memory block lifecycle ───────────────────────────────────

    /// A connection created a memory block.
    ///
    /// Raises `NewMemoryBlock`.  An info block registers the device's
    /// signals (and resizes local blocks if configured); other blocks get a
    /// shortcut in their network if it exists.  A malformed info block is
    /// still registered as a block, but its error is returned.
    pub fn add_memory_block(&self, mblk: MblkHandle) -> Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if state.mblks.iter().any(|m| Arc::ptr_eq(m, &mblk)) {
            return Ok(());
        }
        state.mblks.push(mblk.clone());

        let net_id = state.droot.find_network(&mblk.info().network_name);
        state
            .droot
            .emit(net_id, EventKind::NewMemoryBlock, Some(mblk.info()));

        if !mblk.is_info() {
            state.droot.attach_mblk(&mblk);
            return Ok(());
        }

        let info = mblk.info();
        let resize = state.droot.config().resize_mblks;
        let CommState { droot, mblks } = state;
        let device_block = |name: &str| {
            mblks.iter().find(|m| {
                m.info().network_name == info.network_name
                    && m.info().matches(name, &info.device_name, info.device_nr)
            })
        };

        // Blocks about to be grown place no bound on the layout.
        let layouts = droot.add_dynamic_info_bounded(&mblk, |name| {
            if resize {
                None
            } else {
                device_block(name).map(|m| m.nbytes())
            }
        })?;
        if resize {
            for layout in &layouts {
                let target = device_block(&layout.mblk_name);
                if let Some(target) = target {
                    target.resize(layout.max_addr as usize)?;
                }
            }
        }
        Ok(())
    }

    /// A connection is releasing a memory block.
    ///
    /// Raises `MemoryBlockDeleted`, then removes every signal and shortcut
    /// sourced from the block.
    pub fn remove_memory_block(&self, mblk: &MemoryBlock) -> Result<()> {
        let mut state = self.lock()?;
        let pos = state
            .mblks
            .iter()
            .position(|m| core::ptr::eq(Arc::as_ptr(m), mblk))
            .ok_or(Error::NotFound(NotFound::MemoryBlock))?;
        let removed = state.mblks.remove(pos);

        let net_id = state.droot.find_network(&removed.info().network_name);
        state
            .droot
            .emit(net_id, EventKind::MemoryBlockDeleted, Some(removed.info()));
        state.droot.mblk_is_deleted(&removed);
        Ok(())
    }

    /// Registered block with the given identity.
    pub fn find_memory_block(
        &self,
        mblk_name: &str,
        device_name: &str,
        device_nr: u32,
        network_name: &str,
    ) -> Option<MblkHandle> {
        self.lock()
            .ok()?
            .mblks
            .iter()
            .find(|m| m.info().network_name == network_name && m.info().matches(mblk_name, device_name, device_nr))
            .cloned()
    }

    // ── IO paths ─────────────────────────────────────────────────

    /// Split an IO path, filling in the configured default network.
    pub fn identifiers(&self, iopath: &str, expect: Expect) -> Result<Identifiers> {
        let state = self.lock()?;
        Ok(iopath_to_identifiers_with_default(
            iopath,
            expect,
            &state.droot.config().default_network_name,
        ))
    }

    /// Resolve `signal.mblk.device.network` to a live signal.
    ///
    /// With `network_name` set (the caller's own network), access is limited
    /// to subnets of the same top level network: if the requested network's
    /// top level differs, the caller's network is used instead.
    pub fn bind_signal(&self, iopath: &str, network_name: Option<&str>) -> Option<BoundSignal> {
        let mut state = self.lock().ok()?;
        let mut ids = iopath_to_identifiers_with_default(
            iopath,
            Expect::Signal,
            &state.droot.config().default_network_name,
        );
        if let Some(own) = network_name.filter(|n| !n.is_empty())
            && top_level(own) != top_level(&ids.network_name)
        {
            ids.network_name = truncated(own);
        }
        let bound = state.bind(&ids);
        if bound.is_none() {
            debug!("{} does not resolve", iopath);
        }
        bound
    }

    /// Read a signal by IO path; `Unavailable` if it does not resolve.
    pub fn get(&self, iopath: &str) -> SignalValue {
        self.bind_signal(iopath, None)
            .map_or(SignalValue::Unavailable, |b| b.read().1)
    }

    /// Write a connected signal by IO path.
    pub fn set(&self, iopath: &str, value: &SignalValue) -> Result<()> {
        let bound = self
            .bind_signal(iopath, None)
            .ok_or(Error::NotFound(NotFound::Signal))?;
        bound.write(value, state::CONNECTED)
    }

    /// Every signal matching an IO path, `*` and device number 0 as wildcards.
    pub fn find_signals(&self, iopath: &str) -> Vec<DynamicSignal> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        let ids = iopath_to_identifiers_with_default(
            iopath,
            Expect::Signal,
            &state.droot.config().default_network_name,
        );
        state.find_signals(&ids)
    }

    /// Tear down: every network, shortcut and pending event is released.
    /// Blocks stay alive for their connections but are forgotten here.
    pub fn release(&self) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(queue) = state.droot.queue() {
            queue.clear();
        }
        state.droot.set_queue(None);
        state.droot.set_listener(None);
        state.droot.clear();
        state.mblks.clear();
        info!("communication root released");
        Ok(())
    }
}

impl Drop for CommRoot {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut()
            && !state.mblks.is_empty()
        {
            warn!("communication root dropped with {} memory blocks", state.mblks.len());
        }
    }
}

/// Network name without its first (most specific) label.
fn top_level(network_name: &str) -> &str {
    network_name
        .split_once('.')
        .map_or(network_name, |(_, top)| top)
}
