//! Registry lifecycle: devices arriving, resolving IO paths, devices leaving.

use iodyn::{
    CommRoot, EventKind, Expect, MblkInfo, MemoryBlock, NetworkState, RegistryConfig, SignalType,
    SignalValue, iopath_to_identifiers,
};

use crate::mocks::{Device, RecordingListener, count, kinds};

fn root_with_listener() -> (CommRoot, std::sync::Arc<std::sync::Mutex<Vec<crate::mocks::ListenerCall>>>) {
    let root = CommRoot::new(RegistryConfig::default());
    let (listener, calls) = RecordingListener::new();
    root.set_listener(Some(Box::new(listener))).unwrap();
    (root, calls)
}

// ── Scenario: gina1 on cafenet ────────────────────────────────

#[test]
fn dip_switch_resolves_to_its_address() {
    let root = CommRoot::new(RegistryConfig::default());
    let gina = Device::new(1, "cafenet");
    gina.connect(&root);

    let ids = iopath_to_identifiers("dip_switch_3.exp.gina1.cafenet", Expect::Signal);
    let guard = root.lock().unwrap();
    let network = guard.droot().network_by_name("cafenet").unwrap();
    let id = network.find_first_signal(&ids).unwrap();
    let signal = network.signal(id).unwrap();

    assert_eq!(signal.name.as_str(), "dip_switch_3");
    assert_eq!(signal.addr, 30);
    assert_eq!(signal.n, 1);
    assert_eq!(signal.signal_type, SignalType::Boolean);
}

#[test]
fn registration_raises_network_then_device() {
    let (root, calls) = root_with_listener();
    Device::new(1, "cafenet").connect(&root);

    let calls = calls.lock().unwrap();
    let announced: Vec<_> = calls
        .iter()
        .filter(|c| c.kind != EventKind::NewMemoryBlock)
        .collect();
    assert_eq!(announced.len(), 2);
    assert_eq!(announced[0].kind, EventKind::NewNetwork);
    assert_eq!(announced[0].network.as_deref(), Some("cafenet"));
    assert_eq!(announced[1].kind, EventKind::NewDevice);
    assert_eq!(announced[1].device_name, "gina");
    assert_eq!(announced[1].device_nr, 1);
}

#[test]
fn second_device_does_not_reannounce_network() {
    let (root, calls) = root_with_listener();
    Device::new(1, "cafenet").connect(&root);
    Device::new(2, "cafenet").connect(&root);

    assert_eq!(count(&calls, EventKind::NewNetwork), 1);
    assert_eq!(count(&calls, EventKind::NewDevice), 2);
    assert_eq!(count(&calls, EventKind::NewMemoryBlock), 6);
}

// ── Scenario: last block of surfnet ───────────────────────────

#[test]
fn last_block_removed_disconnects_network_exactly_once() {
    let (root, calls) = root_with_listener();
    let gina = Device::new(1, "surfnet");
    gina.connect(&root);
    gina.disconnect(&root);

    assert_eq!(count(&calls, EventKind::NetworkDisconnected), 1);
    assert_eq!(count(&calls, EventKind::DeviceDisconnected), 1);
    assert!(root.lock().unwrap().droot().network_by_name("surfnet").is_none());
}

#[test]
fn network_stays_while_any_device_remains() {
    let (root, calls) = root_with_listener();
    let a = Device::new(1, "surfnet");
    let b = Device::new(2, "surfnet");
    a.connect(&root);
    b.connect(&root);

    a.disconnect(&root);
    assert_eq!(count(&calls, EventKind::NetworkDisconnected), 0);
    {
        let guard = root.lock().unwrap();
        let net = guard.droot().network_by_name("surfnet").unwrap();
        assert_eq!(net.state(), NetworkState::Active);
        // Only gina2's signals are left.
        assert!(net.signals().iter().all(|(_, s)| s.device_nr == 2));
    }

    b.disconnect(&root);
    assert_eq!(count(&calls, EventKind::NetworkDisconnected), 1);
}

#[test]
fn disconnect_order_for_one_device() {
    let (root, calls) = root_with_listener();
    let gina = Device::new(1, "surfnet");
    gina.connect(&root);
    calls.lock().unwrap().clear();

    gina.disconnect(&root);
    assert_eq!(
        kinds(&calls),
        vec![
            EventKind::MemoryBlockDeleted,
            EventKind::MemoryBlockDeleted,
            EventKind::MemoryBlockDeleted,
            EventKind::DeviceDisconnected,
            EventKind::NetworkDisconnected,
        ]
    );
}

// ── Values ────────────────────────────────────────────────────

#[test]
fn values_follow_the_block() {
    let root = CommRoot::new(RegistryConfig::default());
    let gina = Device::new(1, "cafenet");
    gina.connect(&root);

    root.set("temperature.exp.gina1.cafenet", &SignalValue::Double(36.6))
        .unwrap();
    assert_eq!(
        root.get("temperature.exp.gina1.cafenet"),
        SignalValue::Float(36.6)
    );

    let segments = SignalValue::Array((0..8).map(|i| SignalValue::Boolean(i % 2 == 0)).collect());
    root.set("seven_segment.imp.gina1.cafenet", &segments).unwrap();
    assert_eq!(root.get("seven_segment.imp.gina1.cafenet"), segments);

    let bound = root.bind_signal("temperature.exp.gina1.cafenet", None).unwrap();
    gina.disconnect(&root);
    drop(gina);
    assert!(!bound.is_connected());
    assert_eq!(bound.read().1, SignalValue::Unavailable);
    assert_eq!(root.get("temperature.exp.gina1.cafenet"), SignalValue::Unavailable);
}

#[test]
fn wildcard_device_number_lists_every_device() {
    let root = CommRoot::new(RegistryConfig::default());
    let devices: Vec<_> = (1..=4).map(|nr| Device::new(nr, "cafenet")).collect();
    for d in &devices {
        d.connect(&root);
    }
    let found = root.find_signals("dip_switch_3.exp.gina.cafenet");
    let mut nrs: Vec<u32> = found.iter().map(|s| s.device_nr).collect();
    nrs.sort_unstable();
    assert_eq!(nrs, vec![1, 2, 3, 4]);

    let any_block = root.find_signals("dip_switch_3.*.*.cafenet");
    assert_eq!(any_block.len(), 4);
}

// ── Isolation ─────────────────────────────────────────────────

#[test]
fn malformed_info_does_not_touch_other_networks() {
    let root = CommRoot::new(RegistryConfig::default());
    let good = Device::new(1, "cafenet");
    good.connect(&root);

    let bad = MemoryBlock::with_content(
        MblkInfo::new("info", "gina", 9, "cafenet"),
        br#"{"mblk":[{"name":"exp","groups":[{"signals":[{"name":"x","type":"bogus"}]}]}]}"#,
    );
    assert!(root.add_memory_block(bad).is_err());

    let guard = root.lock().unwrap();
    let net = guard.droot().network_by_name("cafenet").unwrap();
    assert!(net.signals().iter().all(|(_, s)| s.device_nr == 1));
    assert_eq!(net.signals().len(), 6);
}

#[test]
fn reconnect_is_idempotent() {
    let root = CommRoot::new(RegistryConfig::default());
    let gina = Device::new(1, "cafenet");
    gina.connect(&root);
    // Info block published again, e.g. after a layout refresh.
    root.lock()
        .unwrap()
        .droot_mut()
        .add_dynamic_info(&gina.info)
        .unwrap();

    let guard = root.lock().unwrap();
    let net = guard.droot().network_by_name("cafenet").unwrap();
    assert_eq!(net.signals().len(), 6);
    assert_eq!(net.shortcuts().len(), 1);
}
