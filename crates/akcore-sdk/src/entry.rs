//! Guest entry points.
//!
//! The host calls two exports on a plugin: `start` once, then `recv` for
//! each delivered message. Both return an integer status. The
//! [`plugin`](crate::plugin) attribute generates them; the functions here are
//! what the generated code calls.

use std::sync::OnceLock;

use borsh::BorshDeserialize;
use tracing::{error, warn};

use crate::bus::Bus;
use crate::error::BusResult;
use crate::message::BusMessage;
use crate::router::TopicRouter;
use crate::transport::Transport;

/// Status returned to the host on success.
pub const STATUS_OK: i32 = 0;

/// Status returned to the host on failure.
pub const STATUS_ERR: i32 = 1;

/// Build the plugin's router with `init` and keep it in `cell`.
///
/// The router is built once. A second `start` keeps the first router.
pub fn start<F>(cell: &OnceLock<TopicRouter>, init: F) -> i32
where
    F: FnOnce() -> BusResult<TopicRouter>,
{
    if cell.get().is_some() {
        warn!("start called more than once; keeping the existing router");
        return STATUS_OK;
    }
    match init() {
        Ok(router) => {
            if cell.set(router).is_err() {
                warn!("router already set; ignoring the new one");
            }
            STATUS_OK
        },
        Err(e) => {
            error!(error = %e, "plugin initialisation failed");
            STATUS_ERR
        },
    }
}

/// Decode an inbound envelope from `input` and dispatch it through
/// `router`, sending any reply through `bus`.
pub fn dispatch<T: Transport>(bus: &Bus<T>, router: Option<&TopicRouter>, input: &[u8]) -> i32 {
    let Some(router) = router else {
        warn!("message received before start");
        return STATUS_ERR;
    };
    let msg = match BusMessage::try_from_slice(input) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "undecodable inbound message");
            return STATUS_ERR;
        },
    };
    match router.handle(bus, &msg) {
        Ok(()) => STATUS_OK,
        Err(e) => {
            warn!(topic = %msg.topic, message_type = msg.message_type, error = %e, "reply failed");
            STATUS_ERR
        },
    }
}

/// Handle the message the host passed as this call's input.
#[cfg(target_arch = "wasm32")]
pub fn recv(cell: &OnceLock<TopicRouter>) -> i32 {
    let input = extism_pdk::input_bytes();
    dispatch(Bus::host(), cell.get(), &input)
}
