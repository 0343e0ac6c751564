//! Scoped memory regions used to move envelopes across the boundary.
//!
//! A region is allocated by whoever hands bytes over and is released exactly
//! once. [`Region`] owns an offset and frees it on drop, so every path out of
//! a marshal or unmarshal (including decode failures) releases it.

use borsh::BorshDeserialize;
use tracing::trace;

use crate::error::{BusError, BusResult};
use crate::message::BusMessage;

/// Host memory shared with the guest.
///
/// Offsets are opaque handles. The implementation decides what they mean.
pub trait Memory {
    /// Copy `bytes` into a fresh region and return its offset.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the host cannot allocate.
    fn allocate(&self, bytes: &[u8]) -> BusResult<u64>;

    /// Copy the contents of the region at `offset` out.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if no region lives at `offset`.
    fn read(&self, offset: u64) -> BusResult<Vec<u8>>;

    /// Release the region at `offset`.
    fn free(&self, offset: u64);
}

/// An owned region that is released when dropped.
#[derive(Debug)]
pub struct Region<'m, M: Memory + ?Sized> {
    memory: &'m M,
    offset: u64,
}

impl<'m, M: Memory + ?Sized> Region<'m, M> {
    /// Allocate a region holding `bytes`.
    ///
    /// # Errors
    ///
    /// Propagates allocation failures from the memory implementation.
    pub fn allocate(memory: &'m M, bytes: &[u8]) -> BusResult<Self> {
        let offset = memory.allocate(bytes)?;
        trace!(offset, len = bytes.len(), "region allocated");
        Ok(Self { memory, offset })
    }

    /// Take ownership of a region someone else allocated, such as the
    /// return value of a host call.
    pub fn adopt(memory: &'m M, offset: u64) -> Self {
        Self { memory, offset }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Copy the region's bytes out without releasing it.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the memory implementation.
    pub fn read(&self) -> BusResult<Vec<u8>> {
        self.memory.read(self.offset)
    }

    /// Release the region now rather than at end of scope.
    pub fn free(self) {
        drop(self);
    }
}

impl<M: Memory + ?Sized> Drop for Region<'_, M> {
    fn drop(&mut self) {
        trace!(offset = self.offset, "region released");
        self.memory.free(self.offset);
    }
}

/// Encode `msg` and copy it into a fresh region for a host call.
///
/// # Errors
///
/// Returns [`BusError::Marshal`] if the envelope does not encode; nothing is
/// allocated in that case.
pub fn marshal_arg<'m, M: Memory + ?Sized>(
    memory: &'m M,
    msg: &BusMessage,
) -> BusResult<Region<'m, M>> {
    let bytes = borsh::to_vec(msg).map_err(BusError::Marshal)?;
    Region::allocate(memory, &bytes)
}

/// Decode the envelope a host call returned at `offset`, releasing the
/// region whether or not decoding succeeds.
///
/// # Errors
///
/// Returns [`BusError::Unmarshal`] if the bytes are not a valid envelope.
pub fn unmarshal_return<M: Memory + ?Sized>(memory: &M, offset: u64) -> BusResult<BusMessage> {
    let region = Region::adopt(memory, offset);
    let bytes = region.read()?;
    region.free();
    BusMessage::try_from_slice(&bytes).map_err(BusError::Unmarshal)
}
