//! Fuzz target: info block registration
//!
//! Feeds arbitrary bytes in as a device's info block.  Registration must
//! either succeed or fail cleanly, and removing the block must leave the
//! registry empty.
//!
//! cargo fuzz run fuzz_info_block

#![no_main]

use iodyn::{CommRoot, MblkInfo, MemoryBlock, RegistryConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let root = CommRoot::new(RegistryConfig::default());
    let info = MemoryBlock::with_content(MblkInfo::new("info", "fuzz", 1, "fuzznet"), data);

    let _ = root.add_memory_block(info.clone());
    root.remove_memory_block(&info).unwrap();

    let state = root.lock().unwrap();
    assert_eq!(state.droot().network_count(), 0);
    assert!(state.memory_blocks().is_empty());
});
