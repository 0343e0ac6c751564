//! Raw host-call imports for the AutonomousKoi message bus.
//!
//! The host exposes exactly three functions to a guest. Every argument and
//! return value is an offset into Extism-managed memory holding a
//! borsh-encoded `BusMessage`. Allocation, release and encoding are the
//! business of `akcore-sdk`; nothing here touches memory.
//!
//! The imports only exist on `wasm32`. Native builds (tests, tooling) see an
//! empty crate and drive the SDK through a fake transport instead.

#![allow(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

#[cfg(target_arch = "wasm32")]
#[link(wasm_import_module = "extism:host/user")]
unsafe extern "C" {
    /// Publish the message at `msg` on the bus. Fire-and-forget.
    pub fn send(msg: u64);

    /// Send the message at `msg` as the reply to a previously received
    /// message. The envelope's `reply_to` must already be stamped.
    pub fn send_reply(msg: u64);

    /// Send the message at `msg` and block until the host delivers the
    /// correlated reply or `timeout_ms` elapses. Returns the offset of the
    /// reply envelope, which the caller owns and must free.
    pub fn wait_for_reply(msg: u64, timeout_ms: u64) -> u64;
}
