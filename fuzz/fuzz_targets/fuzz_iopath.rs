//! Fuzz target: IO path parsing
//!
//! Splits arbitrary strings at every level and checks that the result
//! always fits the fixed name buffers and survives a second round trip.
//!
//! cargo fuzz run fuzz_iopath

#![no_main]

use iodyn::{Expect, iopath_to_identifiers};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(path) = core::str::from_utf8(data) else {
        return;
    };
    for expect in [Expect::Signal, Expect::MemoryBlock, Expect::Device, Expect::Network] {
        let ids = iopath_to_identifiers(path, expect);
        // Rendering then parsing again must be stable.
        let again = iopath_to_identifiers(&ids.to_iopath(expect), expect);
        assert_eq!(again.to_iopath(expect), ids.to_iopath(expect));
    }
});
