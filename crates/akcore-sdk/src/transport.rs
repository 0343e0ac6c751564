//! The three host calls every capability is built on.

use crate::error::BusResult;
use crate::memory::Memory;

/// Host calls available to a guest.
///
/// Each call takes the offset of an already-marshalled envelope. The caller
/// keeps ownership of that region and releases it once the call returns.
pub trait Transport: Memory {
    /// Fire-and-forget publish on the bus.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BusError::Transport`] if the host call fails.
    fn send(&self, msg: u64) -> BusResult<()>;

    /// Fire-and-forget reply to a message that carried a correlation token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BusError::Transport`] if the host call fails.
    fn send_reply(&self, msg: u64) -> BusResult<()>;

    /// Send `msg` and block until the correlated reply arrives or
    /// `timeout_ms` elapses. A timeout is a normal reply carrying a
    /// `TIMEOUT` error. The returned region belongs to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BusError::Transport`] if the host call fails.
    fn wait_for_reply(&self, msg: u64, timeout_ms: u64) -> BusResult<u64>;
}

#[cfg(target_arch = "wasm32")]
pub use self::extism::ExtismHost;

#[cfg(target_arch = "wasm32")]
#[allow(unsafe_code)]
mod extism {
    use super::{Memory, Transport};
    use crate::error::{BusError, BusResult};

    /// The real host, reached through Extism memory and the
    /// `extism:host/user` imports.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ExtismHost;

    impl Memory for ExtismHost {
        fn allocate(&self, bytes: &[u8]) -> BusResult<u64> {
            let mem = extism_pdk::Memory::from_bytes(bytes)
                .map_err(|e| BusError::Transport(e.to_string()))?;
            Ok(mem.offset())
        }

        fn read(&self, offset: u64) -> BusResult<Vec<u8>> {
            extism_pdk::Memory::find(offset)
                .map(|mem| mem.to_vec())
                .ok_or_else(|| BusError::Transport(format!("no host memory at offset {offset}")))
        }

        fn free(&self, offset: u64) {
            if let Some(mem) = extism_pdk::Memory::find(offset) {
                mem.free();
            }
        }
    }

    impl Transport for ExtismHost {
        fn send(&self, msg: u64) -> BusResult<()> {
            unsafe { akcore_sys::send(msg) };
            Ok(())
        }

        fn send_reply(&self, msg: u64) -> BusResult<()> {
            unsafe { akcore_sys::send_reply(msg) };
            Ok(())
        }

        fn wait_for_reply(&self, msg: u64, timeout_ms: u64) -> BusResult<u64> {
            let reply = unsafe { akcore_sys::wait_for_reply(msg, timeout_ms) };
            if reply == 0 {
                return Err(BusError::Transport("host returned no reply".into()));
            }
            Ok(reply)
        }
    }
}
