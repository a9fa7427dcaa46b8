//! Memory block collaborator.
//!
//! A memory block is a named, fixed-size byte buffer published by one device.
//! The transport layer keeps the bytes in sync; the registry only needs the
//! block's metadata and, for the "info" block, its content.  Blocks are shared
//! between the connection that owns them and the registry as
//! [`MblkHandle`] (`Arc`); the registry's shortcuts keep only `Weak` references
//! so a dropped connection never leaves a dangling block behind.

use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::error::{Exhausted, Malformed, Result};
use crate::identifiers::{Name, NetworkName, truncated};
use crate::types::{SignalType, SignalValue, state};

/// Name of the memory block carrying a device's signal table.
pub const INFO_MBLK_NAME: &str = "info";

/// Local memory blocks are never resized below this.
pub const MIN_MBLK_SZ: usize = 32;

/// Shared handle to a memory block.
pub type MblkHandle = Arc<MemoryBlock>;

/// Declared identity of a memory block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MblkInfo {
    pub mblk_name: Name,
    pub device_name: Name,
    pub device_nr: u32,
    pub network_name: NetworkName,
}

impl MblkInfo {
    pub fn new(mblk_name: &str, device_name: &str, device_nr: u32, network_name: &str) -> Self {
        Self {
            mblk_name: truncated(mblk_name),
            device_name: truncated(device_name),
            device_nr,
            network_name: truncated(network_name),
        }
    }

    /// Same block name, device name and device number.
    pub fn matches(&self, mblk_name: &str, device_name: &str, device_nr: u32) -> bool {
        self.mblk_name == mblk_name && self.device_name == device_name && self.device_nr == device_nr
    }
}

/// One memory block: metadata plus the synchronized bytes.
#[derive(Debug)]
pub struct MemoryBlock {
    info: MblkInfo,
    buf: Mutex<Vec<u8>>,
}

impl MemoryBlock {
    /// New zero-filled block of `nbytes` bytes.
    pub fn new(info: MblkInfo, nbytes: usize) -> MblkHandle {
        Arc::new(Self {
            info,
            buf: Mutex::new(vec![0; nbytes]),
        })
    }

    /// New block holding `content`.
    pub fn with_content(info: MblkInfo, content: &[u8]) -> MblkHandle {
        Arc::new(Self {
            info,
            buf: Mutex::new(content.to_vec()),
        })
    }

    pub fn info(&self) -> &MblkInfo {
        &self.info
    }

    pub fn is_info(&self) -> bool {
        self.info.mblk_name == INFO_MBLK_NAME
    }

    /// Current size in bytes, 0 if the buffer lock is poisoned.
    pub fn nbytes(&self) -> usize {
        self.buf.lock().map_or(0, |buf| buf.len())
    }

    /// Copy of the whole buffer.
    pub fn snapshot(&self) -> Vec<u8> {
        self.buf.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    /// Copy bytes starting at `addr` into `out`.  Returns the number copied,
    /// which is short when the read runs past the end.
    pub fn read(&self, addr: usize, out: &mut [u8]) -> usize {
        let Ok(buf) = self.buf.lock() else { return 0 };
        let Some(src) = buf.get(addr..) else { return 0 };
        let n = src.len().min(out.len());
        out[..n].copy_from_slice(&src[..n]);
        n
    }

    /// Write `data` at `addr`.  The whole range must lie inside the block.
    pub fn write(&self, addr: usize, data: &[u8]) -> Result<()> {
        let mut buf = self.lock()?;
        let end = addr
            .checked_add(data.len())
            .ok_or(Malformed::SignalOutOfRange)?;
        let dst = buf.get_mut(addr..end).ok_or(Malformed::SignalOutOfRange)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    /// Grow the block to at least `nbytes` (never below [`MIN_MBLK_SZ`]).
    /// Blocks never shrink.
    pub fn resize(&self, nbytes: usize) -> Result<()> {
        let nbytes = nbytes.max(MIN_MBLK_SZ);
        let mut buf = self.lock()?;
        if nbytes > buf.len() {
            let extra = nbytes - buf.len();
            buf.try_reserve(extra)
                .map_err(|_| Exhausted::BufferCapacity)?;
            buf.resize(nbytes, 0);
        }
        Ok(())
    }

    // ── Typed signal access ──────────────────────────────────────

    /// Read the state byte and value of the signal at `addr`.
    ///
    /// Out-of-range signals read as `(0, Unavailable)`.
    pub fn read_value(&self, addr: usize, n: usize, ty: SignalType) -> (u8, SignalValue) {
        let Ok(buf) = self.buf.lock() else {
            return (0, SignalValue::Unavailable);
        };
        let Some(bytes) = signal_range(addr, n, ty).and_then(|r| buf.get(r)) else {
            return (0, SignalValue::Unavailable);
        };
        let state_bits = bytes[0];
        let body = &bytes[1..];

        let value = match ty {
            SignalType::Boolean if n <= 1 => {
                SignalValue::Boolean(state_bits & state::BOOLEAN_VALUE != 0)
            }
            SignalType::Boolean => SignalValue::Array(
                (0..n)
                    .map(|i| SignalValue::Boolean(body[i / 8] & (1 << (i % 8)) != 0))
                    .collect(),
            ),
            SignalType::Str => {
                let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
                SignalValue::Str(String::from_utf8_lossy(&body[..end]).into_owned())
            }
            _ if n <= 1 => decode_element(ty, body),
            _ => SignalValue::Array(
                body.chunks_exact(ty.size())
                    .map(|chunk| decode_element(ty, chunk))
                    .collect(),
            ),
        };
        (state_bits & !state::BOOLEAN_VALUE, value)
    }

    /// Store `value` (converted to `ty`) and `state_bits` for the signal at
    /// `addr`.  Writing `Unavailable` stores zero state bits and leaves the
    /// value bytes alone.
    pub fn write_value(
        &self,
        addr: usize,
        n: usize,
        ty: SignalType,
        value: &SignalValue,
        state_bits: u8,
    ) -> Result<()> {
        let mut buf = self.lock()?;
        let range = signal_range(addr, n, ty).ok_or(Malformed::SignalOutOfRange)?;
        let bytes = buf.get_mut(range).ok_or(Malformed::SignalOutOfRange)?;

        let state_bits = state_bits & !state::BOOLEAN_VALUE;
        if !value.is_available() {
            bytes[0] = 0;
            return Ok(());
        }

        let value = value.coerce(ty);
        let (head, body) = bytes.split_at_mut(1);
        match (ty, &value) {
            // A scalar has no value bytes; an array written to it keeps its
            // first element.
            (SignalType::Boolean, items) if n <= 1 => {
                let on = elements(items).next().is_some_and(|v| v.as_i64() != 0);
                head[0] = state_bits | if on { state::BOOLEAN_VALUE } else { 0 };
                return Ok(());
            }
            (SignalType::Boolean, items) => {
                body.fill(0);
                for (i, item) in elements(items).take(n).enumerate() {
                    if item.as_i64() != 0 {
                        body[i / 8] |= 1 << (i % 8);
                    }
                }
            }
            (SignalType::Str, SignalValue::Str(s)) => {
                body.fill(0);
                // Keep room for the terminating NUL.
                let len = s.len().min(n.saturating_sub(1));
                body[..len].copy_from_slice(&s.as_bytes()[..len]);
            }
            (_, items) => {
                for (chunk, item) in body.chunks_exact_mut(ty.size()).zip(elements(items)) {
                    encode_element(item, chunk);
                }
            }
        }
        head[0] = state_bits;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.buf
            .lock()
            .map_err(|_| crate::error::Error::InvalidState("memory block lock poisoned"))
    }
}

/// Bytes of a signal at `addr`, state byte included.  `None` on overflow.
fn signal_range(addr: usize, n: usize, ty: SignalType) -> Option<core::ops::Range<usize>> {
    addr.checked_add(ty.footprint(n)).map(|end| addr..end)
}

/// `true` if `weak` refers to `mblk`.
pub fn is_same_block(weak: &Weak<MemoryBlock>, mblk: &MemoryBlock) -> bool {
    core::ptr::eq(weak.as_ptr(), mblk)
}

/// Scalars iterate as themselves, arrays as their items.
fn elements(value: &SignalValue) -> impl Iterator<Item = &SignalValue> {
    let items: &[SignalValue] = match value {
        SignalValue::Array(items) => items,
        scalar => core::slice::from_ref(scalar),
    };
    items.iter()
}

fn decode_element(ty: SignalType, b: &[u8]) -> SignalValue {
    match ty {
        SignalType::Char => SignalValue::Char(b[0] as i8),
        SignalType::UChar => SignalValue::UChar(b[0]),
        SignalType::Short => SignalValue::Short(i16::from_le_bytes([b[0], b[1]])),
        SignalType::UShort => SignalValue::UShort(u16::from_le_bytes([b[0], b[1]])),
        SignalType::Int => SignalValue::Int(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        SignalType::UInt => SignalValue::UInt(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        SignalType::Float => SignalValue::Float(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        SignalType::Long => {
            SignalValue::Long(i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        }
        SignalType::Double => SignalValue::Double(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        SignalType::Boolean => SignalValue::Boolean(b[0] != 0),
        SignalType::Str => SignalValue::Str(String::from_utf8_lossy(b).into_owned()),
    }
}

/// `item` has already been coerced to the chunk's element type.
fn encode_element(item: &SignalValue, chunk: &mut [u8]) {
    match item {
        SignalValue::Char(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::UChar(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::Short(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::UShort(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::Int(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::UInt(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::Long(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::Float(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::Double(v) => chunk.copy_from_slice(&v.to_le_bytes()),
        SignalValue::Unavailable
        | SignalValue::Boolean(_)
        | SignalValue::Str(_)
        | SignalValue::Array(_) => {}
    }
}
