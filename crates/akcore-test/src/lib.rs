//! AutonomousKoi Test - shared test utilities for bus plugins.
//!
//! This crate provides [`MockHost`], an in-process stand-in for the host
//! side of the boundary, so the protocol can be exercised without a WASM
//! runtime.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! akcore-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use akcore_sdk::{Bus, BusError};
//! use akcore_test::MockHost;
//!
//! #[test]
//! fn test_absent_key() {
//!     let host = MockHost::new();
//!     let bus = Bus::new(host.clone());
//!     assert!(matches!(bus.kv_get("nope"), Err(BusError::NotFound)));
//!     assert_eq!(host.live_regions(), 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod mocks;

pub use mocks::*;

/// Install a test-friendly `tracing` subscriber, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
