//! Typed request/reply on top of [`Bus::wait_for_reply`].
//!
//! Every capability client is an instantiation of
//! [`Bus::wait_for_reply_wrap`]: encode the request into the envelope, block
//! for the reply, then hand the continuation exactly one of the decoded
//! response or the host's error. The continuation is where a capability
//! translates host error codes into its own errors.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::bus::Bus;
use crate::error::{BusError, BusResult};
use crate::message::{BusMessage, Error};
use crate::transport::Transport;

/// A request with a fixed message type and response type.
pub trait Call: BorshSerialize {
    /// Message type the request is sent under.
    const MESSAGE_TYPE: i32;

    /// What a successful reply decodes to.
    type Response: BorshDeserialize;
}

impl<T: Transport> Bus<T> {
    /// Encode `req` into `msg`, wait up to `timeout_ms` for the reply, and
    /// pass the outcome to `process`.
    ///
    /// `process` receives `Ok(response)` or `Err(host_error)`, never both and
    /// never neither. It is not called at all when this returns `Err`.
    ///
    /// # Errors
    ///
    /// - [`BusError::Marshal`] if `req` does not encode. Nothing is sent.
    /// - Transport failures from the host call, unchanged.
    /// - [`BusError::Unmarshal`] if a successful reply does not decode as
    ///   `Resp`.
    pub fn wait_for_reply_wrap<Req, Resp, R>(
        &self,
        mut msg: BusMessage,
        req: &Req,
        timeout_ms: u64,
        process: impl FnOnce(Result<Resp, Error>) -> R,
    ) -> BusResult<R>
    where
        Req: BorshSerialize,
        Resp: BorshDeserialize,
    {
        msg.message = borsh::to_vec(req).map_err(BusError::Marshal)?;
        let reply = self.wait_for_reply(&msg, timeout_ms)?;
        if let Some(err) = reply.error {
            return Ok(process(Err(err)));
        }
        let resp = Resp::try_from_slice(&reply.message).map_err(BusError::Unmarshal)?;
        Ok(process(Ok(resp)))
    }

    /// Send a [`Call`] directly to the host with the configured request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Anything [`Bus::wait_for_reply_wrap`] returns, plus whatever
    /// `process` maps the reply to.
    pub fn call<C, R>(
        &self,
        req: &C,
        process: impl FnOnce(Result<C::Response, Error>) -> BusResult<R>,
    ) -> BusResult<R>
    where
        C: Call,
    {
        self.call_with_timeout(req, self.config().request_timeout_ms, process)
    }

    /// Like [`Bus::call`] with an explicit timeout.
    ///
    /// # Errors
    ///
    /// See [`Bus::call`].
    pub fn call_with_timeout<C, R>(
        &self,
        req: &C,
        timeout_ms: u64,
        process: impl FnOnce(Result<C::Response, Error>) -> BusResult<R>,
    ) -> BusResult<R>
    where
        C: Call,
    {
        self.wait_for_reply_wrap(BusMessage::new(C::MESSAGE_TYPE), req, timeout_ms, process)?
    }
}
