//! Signal table carried in a device's "info" memory block.
//!
//! The block holds JSON (NUL padded to the block size):
//!
//! ```json
//! {"mblk": [
//!   {"name": "exp", "groups": [
//!     {"name": "inputs", "signals": [
//!       {"name": "dip_switch_3", "addr": 30},
//!       {"name": "temperature", "type": "float", "array": 4}
//!     ]}
//!   ]}
//! ]}
//! ```
//!
//! Addresses are assigned by a running cursor per memory block:
//!
//! - every block starts at address 0 with current type `ushort`
//! - a group named `inputs` or `outputs` switches the current type to `boolean`
//! - a signal's `type` becomes the current type for the signals after it
//! - an explicit `addr` (>= 0) moves the cursor
//! - after each signal the cursor advances past its footprint
//!
//! Blocks without a name contribute no signals.  Unknown keys are ignored.

use serde::Deserialize;

use crate::error::{Malformed, Result};
use crate::types::SignalType;

/// One signal as laid out by the info block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSpec {
    pub name: String,
    pub addr: u32,
    pub n: u32,
    pub ncolumns: u32,
    pub signal_type: SignalType,
}

/// Signals of one memory block plus the first address past the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub mblk_name: String,
    pub signals: Vec<SignalSpec>,
    pub max_addr: u32,
}

#[derive(Deserialize)]
struct InfoDoc {
    #[serde(default)]
    mblk: Vec<MblkDef>,
}

#[derive(Deserialize)]
struct MblkDef {
    name: Option<String>,
    #[serde(default)]
    groups: Vec<GroupDef>,
}

#[derive(Deserialize)]
struct GroupDef {
    name: Option<String>,
    #[serde(default)]
    signals: Vec<SignalDef>,
}

#[derive(Deserialize)]
struct SignalDef {
    name: Option<String>,
    #[serde(rename = "type")]
    signal_type: Option<String>,
    addr: Option<i64>,
    array: Option<i64>,
    ncolumns: Option<i64>,
}

/// Parse an info block's content into per-block signal layouts.
pub fn parse_info(content: &[u8]) -> Result<Vec<BlockLayout>> {
    let end = content
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    let doc: InfoDoc = serde_json::from_slice(&content[..end]).map_err(|e| {
        if e.is_data() {
            Malformed::InfoStructure
        } else {
            Malformed::InfoJson
        }
    })?;

    let mut layouts = Vec::with_capacity(doc.mblk.len());
    for mblk in doc.mblk {
        let Some(mblk_name) = mblk.name else { continue };
        layouts.push(layout_block(mblk_name, &mblk.groups)?);
    }
    Ok(layouts)
}

fn layout_block(mblk_name: String, groups: &[GroupDef]) -> Result<BlockLayout> {
    let mut cursor: u32 = 0;
    let mut max_addr: u32 = 0;
    let mut current = SignalType::UShort;
    let mut signals = Vec::new();

    for group in groups {
        if matches!(group.name.as_deref(), Some("inputs" | "outputs")) {
            current = SignalType::Boolean;
        }
        for def in &group.signals {
            if let Some(ty) = &def.signal_type {
                current = SignalType::from_name(ty)?;
            }
            if let Some(addr) = def.addr.filter(|a| *a >= 0) {
                cursor = u32::try_from(addr).map_err(|_| Malformed::SignalOutOfRange)?;
            }
            let n = clamp_count(def.array)?;
            let ncolumns = clamp_count(def.ncolumns)?;

            let footprint = u32::try_from(current.footprint(n as usize))
                .map_err(|_| Malformed::SignalOutOfRange)?;
            let next = cursor
                .checked_add(footprint)
                .ok_or(Malformed::SignalOutOfRange)?;

            if let Some(name) = &def.name {
                signals.push(SignalSpec {
                    name: name.clone(),
                    addr: cursor,
                    n,
                    ncolumns,
                    signal_type: current,
                });
            }
            cursor = next;
            max_addr = max_addr.max(cursor);
        }
    }

    Ok(BlockLayout {
        mblk_name,
        signals,
        max_addr,
    })
}

/// Counts below 1 mean 1.
fn clamp_count(v: Option<i64>) -> Result<u32> {
    let v = v.unwrap_or(1).max(1);
    u32::try_from(v).map_err(|_| Malformed::SignalOutOfRange.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const GINA_INFO: &str = r#"{
        "mblk": [
            {"name": "exp", "groups": [
                {"name": "control", "signals": [
                    {"name": "counter"},
                    {"name": "temperature", "type": "float", "array": 4}
                ]},
                {"name": "inputs", "signals": [
                    {"name": "dip_switch_3", "addr": 30},
                    {"name": "dip_switch_4"},
                    {"name": "leds", "array": 9}
                ]}
            ]},
            {"name": "imp", "groups": [
                {"name": "outputs", "signals": [
                    {"name": "led_builtin"},
                    {"name": "message", "type": "str", "array": 12}
                ]}
            ]}
        ]
    }"#;

    #[test]
    fn address_cursor_rules() {
        let blocks = parse_info(GINA_INFO.as_bytes()).unwrap();
        assert_eq!(blocks.len(), 2);

        let exp = &blocks[0];
        assert_eq!(exp.mblk_name, "exp");
        let addrs: Vec<(&str, u32, SignalType)> = exp
            .signals
            .iter()
            .map(|s| (s.name.as_str(), s.addr, s.signal_type))
            .collect();
        assert_eq!(
            addrs,
            vec![
                ("counter", 0, SignalType::UShort),
                ("temperature", 3, SignalType::Float),
                ("dip_switch_3", 30, SignalType::Boolean),
                ("dip_switch_4", 31, SignalType::Boolean),
                ("leds", 32, SignalType::Boolean),
            ]
        );
        // 9 booleans: 2 bytes of bits + state byte
        assert_eq!(exp.max_addr, 35);

        let imp = &blocks[1];
        assert_eq!(imp.signals[0].addr, 0);
        assert_eq!(imp.signals[1].addr, 1);
        assert_eq!(imp.signals[1].n, 12);
        assert_eq!(imp.max_addr, 14);
    }

    #[test]
    fn nul_padding_is_ignored() {
        let mut content = br#"{"mblk":[{"name":"exp","groups":[]}]}"#.to_vec();
        content.resize(256, 0);
        let blocks = parse_info(&content).unwrap();
        assert_eq!(blocks[0].mblk_name, "exp");
        assert!(blocks[0].signals.is_empty());
    }

    #[test]
    fn unnamed_block_contributes_nothing() {
        let blocks =
            parse_info(br#"{"mblk":[{"groups":[{"signals":[{"name":"x"}]}]}]}"#).unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(
            parse_info(b"{\"mblk\": [").unwrap_err(),
            Error::Malformed(Malformed::InfoJson)
        );
        assert_eq!(
            parse_info(br#"{"mblk": 3}"#).unwrap_err(),
            Error::Malformed(Malformed::InfoStructure)
        );
        assert_eq!(
            parse_info(br#"{"mblk":[{"name":"exp","groups":[{"signals":[{"name":"q","type":"quat"}]}]}]}"#)
                .unwrap_err(),
            Error::Malformed(Malformed::UnknownType)
        );
    }
}
