//! Mock implementations for testing.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use akcore_sdk::borsh::BorshDeserialize;
use akcore_sdk::ipc::{SubscribeRequest, UnsubscribeRequest};
use akcore_sdk::kv::{
    KvDeleteRequest, KvDeleteResponse, KvGetRequest, KvGetResponse, KvListRequest, KvListResponse,
    KvSetRequest, KvSetResponse,
};
use akcore_sdk::log::LogSendRequest;
use akcore_sdk::memory::Memory;
use akcore_sdk::{
    BusError, BusMessage, BusResult, CommonErrorCode, Error, ExternalMessageType, ReplyTo,
    Transport,
};
use tracing::trace;

/// Builds the reply to a request the mock host received.
pub type Responder = Arc<dyn Fn(&BusMessage) -> BusMessage + Send + Sync>;

const SUBSCRIBE: i32 = ExternalMessageType::SubscribeReq as i32;
const UNSUBSCRIBE: i32 = ExternalMessageType::UnsubscribeReq as i32;
const LOG_SEND: i32 = ExternalMessageType::LogSendReq as i32;
const KV_GET: i32 = ExternalMessageType::KvGetReq as i32;
const KV_SET: i32 = ExternalMessageType::KvSetReq as i32;
const KV_LIST: i32 = ExternalMessageType::KvListReq as i32;
const KV_DELETE: i32 = ExternalMessageType::KvDeleteReq as i32;

/// Payload the mock returns for corrupted replies. Too short to be any
/// non-empty response, and trailing garbage for an empty one.
const CORRUPT_PAYLOAD: [u8; 3] = [0xff, 0xff, 0xff];

#[derive(Default)]
struct HostState {
    regions: HashMap<u64, Vec<u8>>,
    next_offset: u64,
    allocations: usize,
    frees: usize,
    invalid_frees: usize,
    kv: BTreeMap<Vec<u8>, Vec<u8>>,
    published: Vec<BusMessage>,
    replies: Vec<BusMessage>,
    requests: Vec<BusMessage>,
    subscriptions: BTreeSet<String>,
    timeouts: HashSet<i32>,
    corrupt: HashSet<i32>,
    transport_failure: bool,
    handlers: HashMap<i32, Responder>,
    next_reply_to: i64,
}

/// In-process fake of the host side of the bus.
///
/// Implements [`Memory`] and [`Transport`] with region accounting, serves the
/// KV requests from an ordered in-memory map, records everything the guest
/// publishes, and can be told to time out, corrupt replies, or fail
/// outright.
///
/// Clones share state, so keep one clone for inspection and hand another to
/// the [`akcore_sdk::Bus`].
#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl fmt::Debug for MockHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHost")
            .field("live_regions", &self.live_regions())
            .field("kv_entries", &self.kv_keys().len())
            .finish_non_exhaustive()
    }
}

impl MockHost {
    /// Create a mock host with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the KV store.
    #[must_use]
    pub fn with_entry(self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state
                .kv
                .insert(key.as_ref().to_vec(), value.as_ref().to_vec());
        }
        self
    }

    /// Answer every request of `message_type` with a `TIMEOUT` reply.
    #[must_use]
    pub fn with_timeout(self, message_type: impl Into<i32>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.timeouts.insert(message_type.into());
        }
        self
    }

    /// Answer every request of `message_type` with an undecodable payload.
    #[must_use]
    pub fn with_corrupt_reply(self, message_type: impl Into<i32>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.corrupt.insert(message_type.into());
        }
        self
    }

    /// Make every host call fail.
    #[must_use]
    pub fn with_transport_failure(self) -> Self {
        self.set_transport_failure(true);
        self
    }

    /// Answer requests of `message_type` with `responder` instead of the
    /// built-in behaviour.
    #[must_use]
    pub fn with_handler<F>(self, message_type: impl Into<i32>, responder: F) -> Self
    where
        F: Fn(&BusMessage) -> BusMessage + Send + Sync + 'static,
    {
        if let Ok(mut state) = self.state.lock() {
            state
                .handlers
                .insert(message_type.into(), Arc::new(responder));
        }
        self
    }

    /// Turn host call failures on or off.
    pub fn set_transport_failure(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.transport_failure = fail;
        }
    }

    /// Regions allocated and not yet released.
    #[must_use]
    pub fn live_regions(&self) -> usize {
        self.state.lock().map(|s| s.regions.len()).unwrap_or_default()
    }

    /// Total regions ever allocated, by either side.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.state.lock().map(|s| s.allocations).unwrap_or_default()
    }

    /// Total regions released.
    #[must_use]
    pub fn frees(&self) -> usize {
        self.state.lock().map(|s| s.frees).unwrap_or_default()
    }

    /// Releases of offsets that were not live (double frees).
    #[must_use]
    pub fn invalid_frees(&self) -> usize {
        self.state.lock().map(|s| s.invalid_frees).unwrap_or_default()
    }

    /// Current value under `key` in the store.
    #[must_use]
    pub fn get_kv(&self, key: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.kv.get(key.as_ref()).cloned())
    }

    /// All keys in the store, in order.
    #[must_use]
    pub fn kv_keys(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .map(|s| s.kv.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every message published with `send`.
    #[must_use]
    pub fn published(&self) -> Vec<BusMessage> {
        self.state
            .lock()
            .map(|s| s.published.clone())
            .unwrap_or_default()
    }

    /// Every message sent with `send_reply`.
    #[must_use]
    pub fn replies(&self) -> Vec<BusMessage> {
        self.state
            .lock()
            .map(|s| s.replies.clone())
            .unwrap_or_default()
    }

    /// Every request received through `wait_for_reply`.
    #[must_use]
    pub fn requests(&self) -> Vec<BusMessage> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    /// Decoded log lines published by the guest.
    #[must_use]
    pub fn logs(&self) -> Vec<LogSendRequest> {
        self.published()
            .iter()
            .filter(|m| m.message_type == LOG_SEND)
            .filter_map(|m| LogSendRequest::try_from_slice(&m.message).ok())
            .collect()
    }

    /// Topics the guest is currently subscribed to, in order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.subscriptions.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> BusResult<MutexGuard<'_, HostState>> {
        self.state
            .lock()
            .map_err(|e| BusError::Transport(format!("mock host state poisoned: {e}")))
    }

    fn check_transport(&self) -> BusResult<()> {
        if self.lock()?.transport_failure {
            return Err(BusError::Transport("injected transport failure".into()));
        }
        Ok(())
    }

    /// Decode the envelope at `offset` without taking ownership of it.
    fn envelope(&self, offset: u64) -> BusResult<BusMessage> {
        let bytes = self.read(offset)?;
        BusMessage::try_from_slice(&bytes)
            .map_err(|e| BusError::Transport(format!("malformed envelope: {e}")))
    }

    fn respond(&self, msg: &BusMessage) -> BusResult<BusMessage> {
        let ty = msg.message_type;
        let (token, handler, timeout, corrupt) = {
            let mut state = self.lock()?;
            state.requests.push(msg.clone());
            state.next_reply_to = state.next_reply_to.saturating_add(1);
            (
                ReplyTo(state.next_reply_to),
                state.handlers.get(&ty).cloned(),
                state.timeouts.contains(&ty),
                state.corrupt.contains(&ty),
            )
        };

        let mut reply = if timeout {
            msg.default_reply()
                .with_error(Error::new(CommonErrorCode::Timeout).with_detail("timed out waiting for reply"))
        } else if corrupt {
            msg.default_reply().with_message(CORRUPT_PAYLOAD.to_vec())
        } else if let Some(handler) = handler {
            handler(msg)
        } else {
            self.builtin(msg)?
        };
        reply.reply_to = Some(token);
        Ok(reply)
    }

    fn builtin(&self, msg: &BusMessage) -> BusResult<BusMessage> {
        let mut reply = msg.default_reply();
        let mut state = self.lock()?;
        let outcome = match msg.message_type {
            KV_GET => msg.payload::<KvGetRequest>().and_then(|req| {
                state
                    .kv
                    .get(&req.key)
                    .map(|value| {
                        reply.set_payload(&KvGetResponse {
                            value: value.clone(),
                        });
                    })
                    .ok_or_else(|| {
                        Error::new(CommonErrorCode::NotFound).with_detail(format!(
                            "key {:?} not found",
                            String::from_utf8_lossy(&req.key)
                        ))
                    })
            }),
            KV_SET => msg.payload::<KvSetRequest>().map(|req| {
                state.kv.insert(req.key, req.value);
                reply.set_payload(&KvSetResponse {});
            }),
            KV_LIST => msg.payload::<KvListRequest>().map(|req| {
                let matches: Vec<&Vec<u8>> = state
                    .kv
                    .keys()
                    .filter(|k| k.starts_with(&req.prefix))
                    .collect();
                let total_matches = u32::try_from(matches.len()).unwrap_or(u32::MAX);
                let skip = usize::try_from(req.offset).unwrap_or(usize::MAX);
                let take = match req.limit {
                    0 => usize::MAX,
                    n => usize::try_from(n).unwrap_or(usize::MAX),
                };
                let keys = matches.into_iter().skip(skip).take(take).cloned().collect();
                reply.set_payload(&KvListResponse {
                    keys,
                    total_matches,
                });
            }),
            KV_DELETE => msg.payload::<KvDeleteRequest>().map(|req| {
                state.kv.remove(&req.key);
                reply.set_payload(&KvDeleteResponse {});
            }),
            other => Err(Error::new(CommonErrorCode::InvalidType)
                .with_detail(format!("no handler for message type {other}"))),
        };
        if let Err(err) = outcome {
            reply.message.clear();
            reply.error = Some(err);
        }
        Ok(reply)
    }
}

impl Memory for MockHost {
    fn allocate(&self, bytes: &[u8]) -> BusResult<u64> {
        let mut state = self.lock()?;
        state.next_offset = state.next_offset.saturating_add(1);
        state.allocations = state.allocations.saturating_add(1);
        let offset = state.next_offset;
        state.regions.insert(offset, bytes.to_vec());
        Ok(offset)
    }

    fn read(&self, offset: u64) -> BusResult<Vec<u8>> {
        self.lock()?
            .regions
            .get(&offset)
            .cloned()
            .ok_or_else(|| BusError::Transport(format!("no region at offset {offset}")))
    }

    fn free(&self, offset: u64) {
        if let Ok(mut state) = self.state.lock() {
            if state.regions.remove(&offset).is_some() {
                state.frees = state.frees.saturating_add(1);
            } else {
                state.invalid_frees = state.invalid_frees.saturating_add(1);
            }
        }
    }
}

impl Transport for MockHost {
    fn send(&self, msg: u64) -> BusResult<()> {
        self.check_transport()?;
        let msg = self.envelope(msg)?;
        trace!(topic = %msg.topic, message_type = msg.message_type, "mock host received publish");
        let mut state = self.lock()?;
        match msg.message_type {
            SUBSCRIBE => {
                if let Ok(req) = SubscribeRequest::try_from_slice(&msg.message) {
                    state.subscriptions.insert(req.topic);
                }
            },
            UNSUBSCRIBE => {
                if let Ok(req) = UnsubscribeRequest::try_from_slice(&msg.message) {
                    state.subscriptions.remove(&req.topic);
                }
            },
            _ => {},
        }
        state.published.push(msg);
        Ok(())
    }

    fn send_reply(&self, msg: u64) -> BusResult<()> {
        self.check_transport()?;
        let msg = self.envelope(msg)?;
        self.lock()?.replies.push(msg);
        Ok(())
    }

    fn wait_for_reply(&self, msg: u64, timeout_ms: u64) -> BusResult<u64> {
        self.check_transport()?;
        let request = self.envelope(msg)?;
        trace!(message_type = request.message_type, timeout_ms, "mock host received request");
        let reply = self.respond(&request)?;
        let bytes = akcore_sdk::borsh::to_vec(&reply).map_err(BusError::Marshal)?;
        self.allocate(&bytes)
    }
}
