//! Dynamic network: the signals and memory blocks of one IO network.
//!
//! ```text
//!   DynamicNetwork "cafenet"
//!   ├── signals:   HashIndex<DynamicSignal, 64>   keyed by signal name
//!   └── shortcuts: ShortcutList                   blocks feeding the network
//! ```
//!
//! A network owns its signals and shortcuts outright; dropping it drops them.
//! Nothing here locks: callers hold the communication root's guard.

use log::debug;

use crate::error::{Error, Malformed, Result};
use crate::hash::{HashIndex, Keyed};
use crate::identifiers::{Identifiers, NetworkName, truncated};
use crate::mblk::{MblkHandle, MemoryBlock};
use crate::shortcut::{ShortcutId, ShortcutList};
use crate::signal::{DynamicSignal, SignalId};

/// Buckets in a network's signal table.
pub const SIGNAL_HASH_TAB_SZ: usize = 64;

pub type SignalTable = HashIndex<DynamicSignal, SIGNAL_HASH_TAB_SZ>;

/// Announcement state of a network.
///
/// ```text
///   New ──announce──▶ Active ──last block gone──▶ Draining ──remove──▶ (absent)
///    ▲                                               │
///    └──────────────── block registered again ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Created, `NewNetwork` not yet raised.
    New,
    /// Announced and fed by at least one memory block.
    Active,
    /// Lost its last memory block.
    Draining,
}

/// What `mblk_is_deleted` removed from a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub signals: usize,
    pub shortcuts: usize,
}

#[derive(Debug)]
pub struct DynamicNetwork {
    name: NetworkName,
    signals: SignalTable,
    shortcuts: ShortcutList,
    state: NetworkState,
}

impl DynamicNetwork {
    /// Empty network.  Names longer than the name buffer are rejected.
    pub fn new(name: &str) -> Result<Self> {
        let stored: NetworkName = truncated(name);
        if stored.len() != name.len() {
            return Err(Malformed::NameTooLong.into());
        }
        if name.is_empty() {
            return Err(Malformed::IoPath.into());
        }
        Ok(Self {
            name: stored,
            signals: SignalTable::new(),
            shortcuts: ShortcutList::new(),
            state: NetworkState::New,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: NetworkState) {
        self.state = state;
    }

    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    pub fn shortcuts(&self) -> &ShortcutList {
        &self.shortcuts
    }

    // ── Signals ──────────────────────────────────────────────────

    /// Add a signal, or refresh the layout of the one with the same name,
    /// memory block and device.  Never creates a duplicate.
    pub fn add_signal(&mut self, signal: DynamicSignal) -> SignalId {
        let existing = self.signals.find(&signal.name, |s| {
            s.is_from(&signal.mblk_name, &signal.device_name, signal.device_nr)
        });
        if let Some(id) = existing
            && let Some(current) = self.signals.get_mut(id)
        {
            current.addr = signal.addr;
            current.n = signal.n;
            current.ncolumns = signal.ncolumns;
            current.signal_type = signal.signal_type;
            return id;
        }
        debug!(
            "{}: add signal {}.{}.{}{} @{}",
            self.name, signal.name, signal.mblk_name, signal.device_name, signal.device_nr, signal.addr
        );
        self.signals.insert(signal)
    }

    pub fn remove_signal(&mut self, id: SignalId) -> Option<DynamicSignal> {
        self.signals.remove(id)
    }

    pub fn signal(&self, id: SignalId) -> Option<&DynamicSignal> {
        self.signals.get(id)
    }

    /// First signal named `ids.signal_name` passing the wildcard filter.
    /// An empty signal name matches nothing.
    pub fn find_first_signal(&self, ids: &Identifiers) -> Option<SignalId> {
        if ids.signal_name.is_empty() {
            return None;
        }
        let head = self.signals.chain_head(&ids.signal_name)?;
        self.probe_from(Some(head), ids)
    }

    /// Next match after `prev` in the same bucket chain.
    pub fn find_next_signal(&self, prev: SignalId, ids: &Identifiers) -> Option<SignalId> {
        self.probe_from(self.signals.chain_next(prev), ids)
    }

    /// Every match, in chain order.
    pub fn signals_matching<'a>(
        &'a self,
        ids: &'a Identifiers,
    ) -> impl Iterator<Item = (SignalId, &'a DynamicSignal)> + 'a {
        let mut cur = self.find_first_signal(ids);
        core::iter::from_fn(move || {
            let id = cur?;
            cur = self.find_next_signal(id, ids);
            self.signals.get(id).map(|s| (id, s))
        })
    }

    fn probe_from(&self, mut cur: Option<SignalId>, ids: &Identifiers) -> Option<SignalId> {
        while let Some(id) = cur {
            if let Some(sig) = self.signals.get(id)
                && sig.key() == ids.signal_name.as_str()
                && sig.matches(ids)
            {
                return Some(id);
            }
            cur = self.signals.chain_next(id);
        }
        None
    }

    // ── Memory block shortcuts ───────────────────────────────────

    /// Append a shortcut to `mblk` unless one exists already.
    pub fn add_mblk_shortcut(&mut self, mblk: &MblkHandle) -> ShortcutId {
        if let Some(id) = self.shortcuts.find_block(mblk) {
            return id;
        }
        self.shortcuts.push_back(mblk)
    }

    pub fn release_mblk_shortcut(&mut self, id: ShortcutId) -> Result<()> {
        if self.shortcuts.release(id) {
            Ok(())
        } else {
            Err(Error::NotFound(crate::error::NotFound::Shortcut))
        }
    }

    /// Live memory block registered under the given key.
    pub fn find_mblk_shortcut(
        &mut self,
        mblk_name: &str,
        device_name: &str,
        device_nr: u32,
    ) -> Option<MblkHandle> {
        self.shortcuts.find(mblk_name, device_name, device_nr)
    }

    /// Drop every signal sourced from `mblk` and every shortcut that points
    /// to it (or to any block already gone).
    pub fn mblk_is_deleted(&mut self, mblk: &MemoryBlock) -> Removed {
        let info = mblk.info();
        let signals = self
            .signals
            .remove_where(|s| s.is_from(&info.mblk_name, &info.device_name, info.device_nr))
            .len();
        let shortcuts = self.shortcuts.clean(Some(mblk));
        debug!(
            "{}: {}.{}{} deleted, {} signals {} shortcuts released",
            self.name, info.mblk_name, info.device_name, info.device_nr, signals, shortcuts
        );
        Removed { signals, shortcuts }
    }

    /// Release everything the network owns.
    pub fn clear(&mut self) {
        self.signals.clear();
        self.shortcuts.clear();
    }
}

impl Keyed for DynamicNetwork {
    fn key(&self) -> &str {
        &self.name
    }
}
