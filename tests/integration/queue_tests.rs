//! Event queue as seen by an application thread.

use iodyn::{CommRoot, Error, EventKind, EventMask, Exhausted, QueuedEvent, RegistryConfig};

use crate::mocks::{Device, RecordingListener, count};

fn drain(queue: &iodyn::EventQueue) -> Vec<QueuedEvent> {
    let mut out = Vec::new();
    while let Some(event) = queue.get_event() {
        out.push(event);
        queue.pop_event();
    }
    out
}

#[test]
fn depth_two_keeps_first_two_events() {
    let root = CommRoot::new(RegistryConfig::default());
    let queue = root.initialize_event_queue(2, EventMask::ALL).unwrap();

    let first = QueuedEvent::new(EventKind::NewNetwork, "a", "", 0, "");
    let second = QueuedEvent::new(EventKind::NewNetwork, "b", "", 0, "");
    let third = QueuedEvent::new(EventKind::NewNetwork, "c", "", 0, "");
    assert!(queue.queue_event(first.clone()).is_ok());
    assert!(queue.queue_event(second.clone()).is_ok());
    assert_eq!(
        queue.queue_event(third),
        Err(Error::ResourceExhausted(Exhausted::QueueFull))
    );

    assert_eq!(drain(&queue), vec![first, second]);
}

#[test]
fn overflow_does_not_fail_registration() {
    let root = CommRoot::new(RegistryConfig::default());
    let queue = root.initialize_event_queue(1, EventMask::ALL).unwrap();
    let gina = Device::new(1, "cafenet");
    gina.connect(&root);

    // Only the first NewMemoryBlock fits; the registry itself is complete.
    assert_eq!(queue.len(), 1);
    let guard = root.lock().unwrap();
    assert_eq!(guard.droot().network_by_name("cafenet").unwrap().signals().len(), 6);
}

#[test]
fn default_mask_carries_network_and_device_events() {
    let root = CommRoot::new(RegistryConfig::default());
    let queue = root.initialize_default_event_queue().unwrap();
    assert_eq!(queue.max_depth(), 1000);

    let gina = Device::new(3, "cafenet");
    gina.connect(&root);
    gina.disconnect(&root);

    let events = drain(&queue);
    let got: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        got,
        vec![
            EventKind::NewNetwork,
            EventKind::NewDevice,
            EventKind::DeviceDisconnected,
            EventKind::NetworkDisconnected,
        ]
    );
    assert_eq!(events[1].device_nr, 3);
    assert_eq!(events[1].mblk_name.as_str(), "info");
    assert_eq!(events[3].network_name.as_str(), "cafenet");
}

#[test]
fn listener_and_queue_both_see_each_event() {
    let root = CommRoot::new(RegistryConfig::default());
    let (listener, calls) = RecordingListener::new();
    root.set_listener(Some(Box::new(listener))).unwrap();
    let queue = root.initialize_event_queue(0, EventMask::NETWORK).unwrap();

    let gina = Device::new(1, "surfnet");
    gina.connect(&root);
    gina.disconnect(&root);

    assert_eq!(count(&calls, EventKind::NetworkDisconnected), 1);
    let queued: Vec<EventKind> = drain(&queue).iter().map(|e| e.kind).collect();
    assert_eq!(queued, vec![EventKind::NewNetwork, EventKind::NetworkDisconnected]);
}

#[test]
fn reinitializing_replaces_queue() {
    let root = CommRoot::new(RegistryConfig::default());
    let old = root.initialize_event_queue(10, EventMask::ALL).unwrap();
    Device::new(1, "cafenet").connect(&root);
    assert!(!old.is_empty());

    let new = root.initialize_event_queue(10, EventMask::ALL).unwrap();
    assert!(old.is_empty());
    assert!(new.is_empty());

    root.release_event_queue().unwrap();
    assert!(root.event_queue().is_none());
}
