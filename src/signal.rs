//! Dynamic signal: a named, typed, addressed view into a memory block.
//!
//! Signals are owned by their network's signal table; the owning network is
//! implicit (the table a signal sits in), so no back-reference is stored.

use crate::hash::{Keyed, SlotId};
use crate::identifiers::{Identifiers, Name, SignalName, truncated};
use crate::types::SignalType;

/// Handle to a signal inside its network's signal table.
pub type SignalId = SlotId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicSignal {
    pub name: SignalName,
    pub mblk_name: Name,
    pub device_name: Name,
    pub device_nr: u32,
    /// Byte offset of the state byte within the memory block.
    pub addr: u32,
    /// Element count; string byte length.  0 or 1 is a scalar.
    pub n: u32,
    /// Columns of a matrix signal, 1 otherwise.
    pub ncolumns: u32,
    pub signal_type: SignalType,
}

impl DynamicSignal {
    pub fn new(
        name: &str,
        mblk_name: &str,
        device_name: &str,
        device_nr: u32,
        addr: u32,
        n: u32,
        signal_type: SignalType,
    ) -> Self {
        Self {
            name: truncated(name),
            mblk_name: truncated(mblk_name),
            device_name: truncated(device_name),
            device_nr,
            addr,
            n,
            ncolumns: 1,
            signal_type,
        }
    }

    /// Does this signal come from the given memory block?
    pub fn is_from(&self, mblk_name: &str, device_name: &str, device_nr: u32) -> bool {
        self.mblk_name == mblk_name && self.device_name == device_name && self.device_nr == device_nr
    }

    /// Lookup filter: empty names and device number 0 match anything.
    /// The signal name itself is matched by the caller's bucket probe.
    pub fn matches(&self, ids: &Identifiers) -> bool {
        (ids.mblk_name.is_empty() || ids.mblk_name == self.mblk_name)
            && (ids.device_name.is_empty() || ids.device_name == self.device_name)
            && (ids.device_nr == 0 || ids.device_nr == self.device_nr)
    }

    /// Bytes from `addr` to the end of the value, state byte included.
    pub fn footprint(&self) -> usize {
        self.signal_type.footprint(self.n as usize)
    }

    /// One past the last byte the signal occupies.
    pub fn end(&self) -> usize {
        self.addr as usize + self.footprint()
    }
}

impl Keyed for DynamicSignal {
    fn key(&self) -> &str {
        &self.name
    }
}
