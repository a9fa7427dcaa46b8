//! Connection threads and an application thread sharing one root.

use std::sync::Arc;
use std::thread;

use iodyn::{CommRoot, EventKind, EventMask, RegistryConfig, SignalValue};

use crate::mocks::Device;

const CONNECTIONS: u32 = 4;
const ROUNDS: u32 = 25;

#[test]
fn connect_disconnect_from_many_threads() {
    let root = Arc::new(CommRoot::new(RegistryConfig::default()));
    let queue = root
        .initialize_event_queue(100_000, EventMask::DEVICE | EventMask::NETWORK)
        .unwrap();

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let (mut connected, mut disconnected) = (0, 0);
            while disconnected < CONNECTIONS * ROUNDS {
                queue.wait();
                while let Some(event) = queue.pop_event() {
                    match event.kind {
                        EventKind::NewDevice => connected += 1,
                        EventKind::DeviceDisconnected => disconnected += 1,
                        _ => {}
                    }
                }
            }
            (connected, disconnected)
        })
    };

    let producers: Vec<_> = (1..=CONNECTIONS)
        .map(|nr| {
            let root = root.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let device = Device::new(nr, "cafenet");
                    device.connect(&root);
                    device.disconnect(&root);
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let (connected, disconnected) = consumer.join().unwrap();
    assert_eq!(connected, CONNECTIONS * ROUNDS);
    assert_eq!(disconnected, CONNECTIONS * ROUNDS);

    let guard = root.lock().unwrap();
    assert_eq!(guard.droot().network_count(), 0);
    assert!(guard.memory_blocks().is_empty());
}

#[test]
fn readers_never_see_torn_registry() {
    let root = Arc::new(CommRoot::new(RegistryConfig::default()));
    let stable = Device::new(1, "cafenet");
    stable.connect(&root);
    root.set("counter.exp.gina1.cafenet", &SignalValue::UShort(7))
        .unwrap();

    let churn = {
        let root = root.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                let device = Device::new(2, "cafenet");
                device.connect(&root);
                device.disconnect(&root);
            }
        })
    };

    for _ in 0..200 {
        // gina1 never leaves, so its value is always there.
        assert_eq!(root.get("counter.exp.gina1.cafenet"), SignalValue::UShort(7));
        // gina2 comes and goes; either outcome is fine, but never a panic.
        let _ = root.get("counter.exp.gina2.cafenet");
    }
    churn.join().unwrap();
    stable.disconnect(&root);
}
