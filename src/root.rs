//! Dynamic root: every network known to one communication root.
//!
//! ```text
//!   DynamicRoot
//!   ├── networks: HashIndex<DynamicNetwork, 128>   keyed by network name
//!   ├── listener: Option<Box<dyn NetworkListener>>
//!   └── queue:    Option<Arc<EventQueue>>
//! ```
//!
//! Networks appear when a device's info block is registered and disappear
//! when their last memory block is deleted (or explicitly removed).  Every
//! announcement goes first to the listener, then to the event queue.
//!
//! No locking here; [`CommRoot`](crate::comm::CommRoot) wraps the whole root
//! in its guard.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{Error, NotFound, Result};
use crate::hash::{HashIndex, SlotId};
use crate::identifiers::Identifiers;
use crate::info::{BlockLayout, parse_info};
use crate::mblk::{MblkHandle, MblkInfo, MemoryBlock};
use crate::network::{DynamicNetwork, NetworkState};
use crate::ports::NetworkListener;
use crate::queue::{EventKind, EventQueue, QueuedEvent};
use crate::signal::{DynamicSignal, SignalId};

/// Buckets in the root's network table.
pub const NETWORK_HASH_TAB_SZ: usize = 128;

/// Handle to a network inside the root's table.
pub type NetworkId = SlotId;

pub struct DynamicRoot {
    networks: HashIndex<DynamicNetwork, NETWORK_HASH_TAB_SZ>,
    config: RegistryConfig,
    listener: Option<Box<dyn NetworkListener>>,
    queue: Option<Arc<EventQueue>>,
}

impl DynamicRoot {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            networks: HashIndex::new(),
            config,
            listener: None,
            queue: None,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn set_listener(&mut self, listener: Option<Box<dyn NetworkListener>>) {
        self.listener = listener;
    }

    pub fn set_queue(&mut self, queue: Option<Arc<EventQueue>>) {
        self.queue = queue;
    }

    pub fn queue(&self) -> Option<&Arc<EventQueue>> {
        self.queue.as_ref()
    }

    // ── Networks ─────────────────────────────────────────────────

    /// Find or create the network called `name`.  New networks start in
    /// [`NetworkState::New`] and are announced by the first info block.
    pub fn add_network(&mut self, name: &str) -> Result<NetworkId> {
        if let Some(id) = self.find_network(name) {
            return Ok(id);
        }
        let network = DynamicNetwork::new(name)?;
        info!("network {} created", name);
        Ok(self.networks.insert(network))
    }

    pub fn find_network(&self, name: &str) -> Option<NetworkId> {
        self.networks.find(name, |_| true)
    }

    pub fn network(&self, id: NetworkId) -> Option<&DynamicNetwork> {
        self.networks.get(id)
    }

    pub fn network_mut(&mut self, id: NetworkId) -> Option<&mut DynamicNetwork> {
        self.networks.get_mut(id)
    }

    pub fn network_by_name(&self, name: &str) -> Option<&DynamicNetwork> {
        self.find_network(name).and_then(|id| self.networks.get(id))
    }

    pub fn networks(&self) -> impl Iterator<Item = &DynamicNetwork> + '_ {
        self.networks.iter().map(|(_, n)| n)
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Remove a network with all its signals and shortcuts.  An announced
    /// network that has not yet reported its disconnect does so now.
    pub fn remove_network(&mut self, id: NetworkId) -> Result<DynamicNetwork> {
        let state = self
            .networks
            .get(id)
            .map(DynamicNetwork::state)
            .ok_or(Error::NotFound(NotFound::Network))?;
        if state == NetworkState::Active {
            self.emit(Some(id), EventKind::NetworkDisconnected, None);
        }
        let mut network = self
            .networks
            .remove(id)
            .ok_or(Error::NotFound(NotFound::Network))?;
        info!("network {} removed", network.name());
        network.clear();
        Ok(network)
    }

    // ── Signals ──────────────────────────────────────────────────

    /// First signal matching `ids` in the network `ids` names.
    pub fn find_signal(&self, ids: &Identifiers) -> Option<(NetworkId, SignalId)> {
        let net_id = self.find_network(&ids.network_name)?;
        let network = self.networks.get(net_id)?;
        network.find_first_signal(ids).map(|sig| (net_id, sig))
    }

    pub fn signal(&self, net_id: NetworkId, sig_id: SignalId) -> Option<&DynamicSignal> {
        self.networks.get(net_id)?.signal(sig_id)
    }

    // ── Memory block lifecycle ───────────────────────────────────

    /// Register the signal table in an info block.
    ///
    /// The block content is parsed before anything is touched, so a
    /// malformed block leaves every network as it was.  On success the
    /// network exists, holds the block's signals and a shortcut to the info
    /// block, and `NewNetwork` (first time only) and `NewDevice` have been
    /// raised.  Returns the parsed layouts for block resizing.
    pub fn add_dynamic_info(&mut self, mblk: &MblkHandle) -> Result<Vec<BlockLayout>> {
        self.add_dynamic_info_bounded(mblk, |_| None)
    }

    /// Same as [`add_dynamic_info`](Self::add_dynamic_info), with block
    /// sizes known.  `block_size` returns the size of the device's block of
    /// the given name if it is registered; signals that would run past its
    /// end are skipped with a warning.
    pub fn add_dynamic_info_bounded(
        &mut self,
        mblk: &MblkHandle,
        block_size: impl Fn(&str) -> Option<usize>,
    ) -> Result<Vec<BlockLayout>> {
        let mblk_info = mblk.info().clone();
        let layouts = parse_info(&mblk.snapshot()).inspect_err(|e| {
            warn!(
                "info block of {}{}.{} rejected: {}",
                mblk_info.device_name, mblk_info.device_nr, mblk_info.network_name, e
            );
        })?;

        let net_id = self.add_network(&mblk_info.network_name)?;
        let Some(network) = self.networks.get_mut(net_id) else {
            return Err(Error::InvalidState("network vanished during registration"));
        };

        let mut count = 0;
        for layout in &layouts {
            let limit = block_size(&layout.mblk_name);
            for spec in &layout.signals {
                let mut signal = DynamicSignal::new(
                    &spec.name,
                    &layout.mblk_name,
                    &mblk_info.device_name,
                    mblk_info.device_nr,
                    spec.addr,
                    spec.n,
                    spec.signal_type,
                );
                signal.ncolumns = spec.ncolumns;
                if let Some(nbytes) = limit
                    && signal.end() > nbytes
                {
                    warn!(
                        "{}.{}.{}{} ends at {}, past the {} byte block; skipped",
                        signal.name,
                        signal.mblk_name,
                        signal.device_name,
                        signal.device_nr,
                        signal.end(),
                        nbytes
                    );
                    continue;
                }
                network.add_signal(signal);
                count += 1;
            }
        }

        if network
            .find_mblk_shortcut(&mblk_info.mblk_name, &mblk_info.device_name, mblk_info.device_nr)
            .is_none()
        {
            network.add_mblk_shortcut(mblk);
        }

        let announce = network.state() != NetworkState::Active;
        network.set_state(NetworkState::Active);
        info!(
            "device {}{} registered {} signals in network {}",
            mblk_info.device_name, mblk_info.device_nr, count, mblk_info.network_name
        );

        if announce {
            self.emit(Some(net_id), EventKind::NewNetwork, None);
        }
        self.emit(Some(net_id), EventKind::NewDevice, Some(&mblk_info));
        Ok(layouts)
    }

    /// Add a shortcut to a non-info block in an existing network.
    pub fn attach_mblk(&mut self, mblk: &MblkHandle) -> Option<NetworkId> {
        let net_id = self.find_network(&mblk.info().network_name)?;
        self.networks.get_mut(net_id)?.add_mblk_shortcut(mblk);
        Some(net_id)
    }

    /// Forget everything sourced from `mblk`.
    ///
    /// Deleting an info block raises `DeviceDisconnected`.  When the network
    /// loses its last memory block it raises `NetworkDisconnected` once,
    /// drops any signals left over from blocks that never arrived and, if
    /// `remove_empty_networks` is set, is removed.
    pub fn mblk_is_deleted(&mut self, mblk: &MemoryBlock) {
        let mblk_info = mblk.info();
        let Some(net_id) = self.find_network(&mblk_info.network_name) else {
            return;
        };

        if mblk.is_info() {
            info!(
                "device {}{} disconnected from network {}",
                mblk_info.device_name, mblk_info.device_nr, mblk_info.network_name
            );
            self.emit(Some(net_id), EventKind::DeviceDisconnected, Some(mblk_info));
        }

        let Some(network) = self.networks.get_mut(net_id) else {
            return;
        };
        network.mblk_is_deleted(mblk);
        if !network.shortcuts().is_empty() {
            return;
        }

        if network.state() == NetworkState::Active {
            self.emit(Some(net_id), EventKind::NetworkDisconnected, None);
        }
        if let Some(network) = self.networks.get_mut(net_id) {
            network.set_state(NetworkState::Draining);
            network.clear();
        }
        if self.config.remove_empty_networks {
            let _ = self.remove_network(net_id);
        } else {
            debug!("network {} kept with no memory blocks", mblk_info.network_name);
        }
    }

    /// Raise an event: listener first, then the queue.  A full queue drops
    /// the event; the registry state stays authoritative.
    pub(crate) fn emit(
        &mut self,
        net_id: Option<NetworkId>,
        kind: EventKind,
        mblk: Option<&MblkInfo>,
    ) {
        let network = net_id.and_then(|id| self.networks.get(id));
        let network_name = match (mblk, network) {
            (Some(m), _) => m.network_name.as_str(),
            (None, Some(n)) => n.name(),
            (None, None) => "",
        };
        let event = match mblk {
            Some(m) => QueuedEvent::new(kind, network_name, &m.device_name, m.device_nr, &m.mblk_name),
            None => QueuedEvent::new(kind, network_name, "", 0, ""),
        };

        if let Some(listener) = self.listener.as_mut() {
            listener.on_network_event(network, &event);
        }
        if let Some(queue) = &self.queue {
            let _ = queue.queue_event(event);
        }
    }

    /// Drop every network.  No events are raised.
    pub fn clear(&mut self) {
        self.networks.clear();
    }
}

impl core::fmt::Debug for DynamicRoot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DynamicRoot")
            .field("networks", &self.networks.len())
            .field("config", &self.config)
            .field("listener", &self.listener.is_some())
            .field("queue", &self.queue)
            .finish()
    }
}
