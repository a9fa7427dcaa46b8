//! Mock adapters for integration tests.
//!
//! Records every listener call so tests can assert on the full event
//! history, and keeps "persisted" config in memory.

use std::sync::{Arc, Mutex};

use iodyn::{ConfigError, ConfigPort, DynamicNetwork, EventKind, NetworkListener, QueuedEvent, RegistryConfig};

// ── Listener call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerCall {
    pub kind: EventKind,
    /// Name of the network handed to the listener, if any.
    pub network: Option<String>,
    pub device_name: String,
    pub device_nr: u32,
    pub mblk_name: String,
}

// ── RecordingListener ─────────────────────────────────────────

/// Listener half handed to the registry; the shared log stays with the test.
pub struct RecordingListener {
    calls: Arc<Mutex<Vec<ListenerCall>>>,
}

#[allow(dead_code)]
impl RecordingListener {
    pub fn new() -> (Self, Arc<Mutex<Vec<ListenerCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl NetworkListener for RecordingListener {
    fn on_network_event(&mut self, network: Option<&DynamicNetwork>, event: &QueuedEvent) {
        self.calls.lock().unwrap().push(ListenerCall {
            kind: event.kind,
            network: network.map(|n| n.name().to_owned()),
            device_name: event.device_name.as_str().to_owned(),
            device_nr: event.device_nr,
            mblk_name: event.mblk_name.as_str().to_owned(),
        });
    }
}

#[allow(dead_code)]
pub fn count(calls: &Arc<Mutex<Vec<ListenerCall>>>, kind: EventKind) -> usize {
    calls.lock().unwrap().iter().filter(|c| c.kind == kind).count()
}

#[allow(dead_code)]
pub fn kinds(calls: &Arc<Mutex<Vec<ListenerCall>>>) -> Vec<EventKind> {
    calls.lock().unwrap().iter().map(|c| c.kind).collect()
}

// ── MemoryConfigStore ─────────────────────────────────────────

/// Config "storage" holding postcard bytes, like a flash partition would.
pub struct MemoryConfigStore {
    pub bytes: Option<Vec<u8>>,
    pub saves: usize,
}

#[allow(dead_code)]
impl MemoryConfigStore {
    pub fn new() -> Self {
        Self {
            bytes: None,
            saves: 0,
        }
    }
}

impl ConfigPort for MemoryConfigStore {
    fn load(&self) -> Result<RegistryConfig, ConfigError> {
        match &self.bytes {
            Some(bytes) => RegistryConfig::from_bytes(bytes),
            None => Ok(RegistryConfig::default()),
        }
    }

    fn save(&mut self, config: &RegistryConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.bytes = Some(config.to_bytes()?);
        self.saves += 1;
        Ok(())
    }
}

// ── Device fixtures ───────────────────────────────────────────

/// Signal table published by the "gina" test board.
pub const GINA_INFO: &str = r#"{
    "mblk": [
        {"name": "exp", "groups": [
            {"name": "control", "signals": [
                {"name": "counter"},
                {"name": "temperature", "type": "float"}
            ]},
            {"name": "inputs", "signals": [
                {"name": "dip_switch_3", "addr": 30},
                {"name": "dip_switch_4"}
            ]}
        ]},
        {"name": "imp", "groups": [
            {"name": "outputs", "signals": [
                {"name": "led_builtin"},
                {"name": "seven_segment", "array": 8}
            ]}
        ]}
    ]
}"#;

/// Blocks of one connected gina board.
#[allow(dead_code)]
pub struct Device {
    pub info: iodyn::MblkHandle,
    pub exp: iodyn::MblkHandle,
    pub imp: iodyn::MblkHandle,
}

#[allow(dead_code)]
impl Device {
    pub fn new(device_nr: u32, network: &str) -> Self {
        use iodyn::{MblkInfo, MemoryBlock};
        Self {
            exp: MemoryBlock::new(MblkInfo::new("exp", "gina", device_nr, network), 64),
            imp: MemoryBlock::new(MblkInfo::new("imp", "gina", device_nr, network), 32),
            info: MemoryBlock::with_content(
                MblkInfo::new("info", "gina", device_nr, network),
                GINA_INFO.as_bytes(),
            ),
        }
    }

    /// Connect in the order a real board does: data blocks, then info.
    pub fn connect(&self, root: &iodyn::CommRoot) {
        root.add_memory_block(self.exp.clone()).unwrap();
        root.add_memory_block(self.imp.clone()).unwrap();
        root.add_memory_block(self.info.clone()).unwrap();
    }

    pub fn disconnect(&self, root: &iodyn::CommRoot) {
        root.remove_memory_block(&self.exp).unwrap();
        root.remove_memory_block(&self.imp).unwrap();
        root.remove_memory_block(&self.info).unwrap();
    }
}
