//! Configuration persisted through a `ConfigPort`.

use iodyn::{CommRoot, ConfigError, ConfigPort, EventMask, RegistryConfig};

use crate::mocks::{Device, MemoryConfigStore};

#[test]
fn empty_store_yields_defaults() {
    let store = MemoryConfigStore::new();
    let root = CommRoot::from_config_port(&store).unwrap();
    assert_eq!(root.config().unwrap(), RegistryConfig::default());
}

#[test]
fn saved_config_drives_the_root() {
    let mut store = MemoryConfigStore::new();
    let config = RegistryConfig {
        remove_empty_networks: false,
        event_queue_depth: 5,
        event_mask: EventMask::ALL,
        ..RegistryConfig::default()
    };
    store.save(&config).unwrap();
    assert_eq!(store.saves, 1);

    let root = CommRoot::from_config_port(&store).unwrap();
    let queue = root.initialize_default_event_queue().unwrap();
    assert_eq!(queue.max_depth(), 5);

    let gina = Device::new(1, "surfnet");
    gina.connect(&root);
    gina.disconnect(&root);
    // Policy off: the empty network stays as a placeholder, with no signals.
    let state = root.lock().unwrap();
    let net = state.droot().network_by_name("surfnet").unwrap();
    assert!(net.signals().is_empty());
    assert!(net.shortcuts().is_empty());
}

#[test]
fn invalid_config_is_not_saved() {
    let mut store = MemoryConfigStore::new();
    let mut config = RegistryConfig::default();
    config.default_network_name.clear();
    assert!(matches!(store.save(&config), Err(ConfigError::ValidationFailed(_))));
    assert!(store.bytes.is_none());
}

#[test]
fn corrupted_store_is_reported() {
    let store = MemoryConfigStore {
        bytes: Some(vec![0xFF; 3]),
        saves: 0,
    };
    assert_eq!(
        CommRoot::from_config_port(&store).unwrap_err(),
        ConfigError::Corrupted
    );
}
