//! Envelope-level access to the host bus.

use tracing::trace;

use crate::config::Config;
use crate::error::BusResult;
use crate::memory::{marshal_arg, unmarshal_return};
use crate::message::BusMessage;
use crate::transport::Transport;

/// A handle on the host bus.
///
/// Wraps a [`Transport`] with the client configuration. Every capability
/// (KV, logging, subscriptions, services) is a method on this type.
#[derive(Debug, Clone, Default)]
pub struct Bus<T> {
    transport: T,
    config: Config,
}

impl<T: Transport> Bus<T> {
    /// Create a bus with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, Config::default())
    }

    pub fn with_config(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publish `msg` on the bus without waiting for anything back.
    ///
    /// # Errors
    ///
    /// Returns a marshal error if the envelope does not encode, or the
    /// transport's error if the host call fails.
    pub fn send(&self, msg: &BusMessage) -> BusResult<()> {
        let region = marshal_arg(&self.transport, msg)?;
        trace!(topic = %msg.topic, message_type = msg.message_type, "send");
        self.transport.send(region.offset())
    }

    /// Send `msg` as a reply. Its `reply_to` should be copied from the
    /// message being answered.
    ///
    /// # Errors
    ///
    /// Same as [`Bus::send`].
    pub fn send_reply(&self, msg: &BusMessage) -> BusResult<()> {
        let region = marshal_arg(&self.transport, msg)?;
        trace!(topic = %msg.topic, message_type = msg.message_type, "send_reply");
        self.transport.send_reply(region.offset())
    }

    /// Send `msg` and block for the reply.
    ///
    /// If nothing arrives within `timeout_ms` the reply's error code is
    /// `TIMEOUT`; that is returned as a normal reply, not as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns a marshal error before anything is sent, the transport's
    /// error if the host call fails, or an unmarshal error if the reply
    /// envelope does not decode.
    pub fn wait_for_reply(&self, msg: &BusMessage, timeout_ms: u64) -> BusResult<BusMessage> {
        let region = marshal_arg(&self.transport, msg)?;
        trace!(
            topic = %msg.topic,
            message_type = msg.message_type,
            timeout_ms,
            "wait_for_reply"
        );
        let reply = self.transport.wait_for_reply(region.offset(), timeout_ms)?;
        region.free();
        unmarshal_return(&self.transport, reply)
    }
}

#[cfg(target_arch = "wasm32")]
impl Bus<crate::transport::ExtismHost> {
    /// The bus of the real host, configured from the plugin config.
    pub fn host() -> &'static Self {
        use std::sync::OnceLock;

        static HOST: OnceLock<Bus<crate::transport::ExtismHost>> = OnceLock::new();
        HOST.get_or_init(|| {
            let config = Config::from_host().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring plugin config");
                Config::default()
            });
            Bus::with_config(crate::transport::ExtismHost, config)
        })
    }
}
