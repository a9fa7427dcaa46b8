//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no transport
//! layer: memory blocks are created directly.

mod concurrency_tests;
mod config_tests;
mod mocks;
mod queue_tests;
mod registry_tests;
