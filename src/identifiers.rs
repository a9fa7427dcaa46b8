//! IO path parsing.
//!
//! An IO path addresses a signal, memory block, device or network, most
//! specific component first:
//!
//! ```text
//!   dip_switch_3 . exp . gina1 . cafenet
//!   └─ signal ─┘  mblk  device   network
//!                        └┬─┘└┬┘
//!                      name  nr
//! ```
//!
//! The network is "the rest of the path", so network names may contain dots
//! (`cafenet.iocafenet.com`).  A component written as `*` is unspecified.
//! Which component the path starts with is decided by [`Expect`].

use core::fmt::{self, Write};

/// Memory block and device names: max 15 characters.
pub const NAME_SZ: usize = 16;
/// Signal names: max 31 characters.
pub const SIGNAL_NAME_SZ: usize = 32;
/// Network names: max 23 characters.
pub const NETWORK_NAME_SZ: usize = 24;

pub type Name = heapless::String<NAME_SZ>;
pub type SignalName = heapless::String<SIGNAL_NAME_SZ>;
pub type NetworkName = heapless::String<NETWORK_NAME_SZ>;

/// What an IO path is expected to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expect {
    Signal,
    MemoryBlock,
    Device,
    Network,
}

/// IO path split into its components.  Empty string or device number 0
/// means "unspecified / any" when used as a lookup filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identifiers {
    pub signal_name: SignalName,
    pub mblk_name: Name,
    pub device_name: Name,
    pub device_nr: u32,
    pub network_name: NetworkName,
}

impl Identifiers {
    /// Build a fully specified identifier set.  Over-long names are truncated
    /// to their buffer size, the same way parsed paths are.
    pub fn new(
        signal_name: &str,
        mblk_name: &str,
        device_name: &str,
        device_nr: u32,
        network_name: &str,
    ) -> Self {
        Self {
            signal_name: truncated(signal_name),
            mblk_name: truncated(mblk_name),
            device_name: truncated(device_name),
            device_nr,
            network_name: truncated(network_name),
        }
    }

    /// `true` if nothing was selected.  Resolution treats this as "no match".
    pub fn is_empty(&self) -> bool {
        self.signal_name.is_empty()
            && self.mblk_name.is_empty()
            && self.device_name.is_empty()
            && self.device_nr == 0
            && self.network_name.is_empty()
    }

    /// Write the identifiers back as an IO path starting at `expect`'s level.
    ///
    /// Unspecified components in the middle are written as `*`; unspecified
    /// trailing components are left out.
    pub fn to_iopath(&self, expect: Expect) -> String {
        let mut device = String::new();
        if !self.device_name.is_empty() || self.device_nr != 0 {
            let _ = write!(device, "{}", self.device_name);
            if self.device_nr != 0 {
                let _ = write!(device, "{}", self.device_nr);
            }
        }

        let parts: [&str; 4] = [
            &self.signal_name,
            &self.mblk_name,
            &device,
            &self.network_name,
        ];
        let first = match expect {
            Expect::Signal => 0,
            Expect::MemoryBlock => 1,
            Expect::Device => 2,
            Expect::Network => 3,
        };
        let parts = &parts[first..];
        let used = parts
            .iter()
            .rposition(|p| !p.is_empty())
            .map_or(0, |i| i + 1);

        let mut path = String::new();
        for (i, part) in parts[..used].iter().enumerate() {
            if i > 0 {
                path.push('.');
            }
            path.push_str(if part.is_empty() { "*" } else { part });
        }
        path
    }
}

impl fmt::Display for Identifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iopath(Expect::Signal))
    }
}

/// Split an IO path into identifiers.
///
/// Components the path does not reach are left empty.  An empty path yields
/// all-empty identifiers, which callers treat as "no match".
pub fn iopath_to_identifiers(iopath: &str, expect: Expect) -> Identifiers {
    iopath_to_identifiers_with_default(iopath, expect, "")
}

/// Same as [`iopath_to_identifiers`], but the network name falls back to
/// `default_network` when the path ends before the network component.
pub fn iopath_to_identifiers_with_default(
    iopath: &str,
    expect: Expect,
    default_network: &str,
) -> Identifiers {
    let mut ids = Identifiers::default();
    let mut rest = iopath;

    'network: {
        if expect == Expect::Signal {
            let (part, more) = next_part(&mut rest);
            ids.signal_name = part;
            if !more {
                break 'network;
            }
        }

        if matches!(expect, Expect::Signal | Expect::MemoryBlock) {
            let (part, more) = next_part(&mut rest);
            ids.mblk_name = part;
            if !more {
                break 'network;
            }
        }

        if expect != Expect::Network {
            let (part, _) = next_part::<NAME_SZ>(&mut rest);
            let (name, nr) = split_device_nr(&part);
            ids.device_name = truncated(name);
            ids.device_nr = nr;
        }
    }

    ids.network_name = truncated(if rest.is_empty() { default_network } else { rest });
    ids
}

/// Split trailing decimal digits off a device name: `gina2` -> (`gina`, 2).
/// No digits means device number 0.
pub fn split_device_nr(device: &str) -> (&str, u32) {
    let digits_at = device
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(device.len(), |(i, _)| i);

    let nr = device[digits_at..].bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
    });
    (&device[..digits_at], nr)
}

/// Take the component before the next '.', advancing `rest` past it.
/// Returns `true` if a '.' followed, i.e. more components may come.
fn next_part<const N: usize>(rest: &mut &str) -> (heapless::String<N>, bool) {
    let (part, more) = match rest.find('.') {
        Some(dot) => {
            let part = &rest[..dot];
            *rest = &rest[dot + 1..];
            (part, true)
        }
        None => {
            let part = *rest;
            *rest = "";
            (part, false)
        }
    };
    let part = if part == "*" { "" } else { part };
    (truncated(part), more)
}

/// Copy as much of `s` as fits in `N - 1` bytes, on a char boundary.
pub(crate) fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.len() + c.len_utf8() > N - 1 || out.push(c).is_err() {
            break;
        }
    }
    out
}
