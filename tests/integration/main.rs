//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! radio, broker or sensors required.

#![cfg(not(target_os = "espidf"))]

mod mock_hw;
mod sampling_tests;
mod startup_flow_tests;
