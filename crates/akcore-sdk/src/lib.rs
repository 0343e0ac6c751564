//! Guest-side message bus client for AutonomousKoi WASM plugins.
//!
//! A plugin runs in a sandbox and can only reach the host through three host
//! calls and Extism's shared memory. Every capability (publishing, request
//! and reply, the KV store, logging) is a [`BusMessage`] crossing that
//! boundary.
//!
//! - [`memory`] moves encoded envelopes in and out of host memory.
//! - [`Transport`] is the three host calls; [`Bus`] wraps it.
//! - [`Bus::wait_for_reply_wrap`] is the typed request/reply every
//!   capability is built from.
//! - [`TopicRouter`] dispatches inbound messages to handlers.
//!
//! ```rust,ignore
//! use akcore_sdk::prelude::*;
//!
//! #[plugin]
//! fn init() -> BusResult<TopicRouter> {
//!     let bus = Bus::host();
//!     bus.kv_set("greeting", b"hello")?;
//!     let router = TopicRouter::new().topic(
//!         "chat",
//!         TypeRouter::new().route(1, |msg| Some(msg.default_reply())),
//!     );
//!     bus.subscribe_router(&router)?;
//!     Ok(router)
//! }
//! ```

#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bus;
pub mod config;
pub mod entry;
pub mod error;
pub mod ipc;
pub mod kv;
pub mod log;
pub mod memory;
pub mod message;
pub mod router;
pub mod rpc;
pub mod svc;
pub mod telemetry;
pub mod transport;

pub use borsh;

pub use bus::Bus;
pub use config::Config;
pub use error::{BusError, BusResult};
pub use log::{LogArg, LogLevel, LogValue};
pub use message::{BusMessage, CommonErrorCode, Error, ExternalMessageType, ReplyTo};
pub use router::{Handler, TopicRouter, TypeRouter};
pub use rpc::Call;
pub use telemetry::{HostLogLayer, init_host_logging};
pub use transport::Transport;

#[cfg(target_arch = "wasm32")]
pub use transport::ExtismHost;

#[cfg(feature = "derive")]
pub use akcore_sdk_macros::plugin;

pub mod prelude {
    pub use crate::{
        Bus, BusError, BusMessage, BusResult, CommonErrorCode, Config, Error, LogLevel, LogValue,
        TopicRouter, Transport, TypeRouter,
    };

    #[cfg(target_arch = "wasm32")]
    pub use crate::ExtismHost;

    #[cfg(feature = "derive")]
    pub use akcore_sdk_macros::plugin;
}
