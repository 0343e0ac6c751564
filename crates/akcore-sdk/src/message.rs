//! The bus envelope and its structured error.
//!
//! Every capability a plugin has is expressed as a [`BusMessage`] crossing the
//! guest/host boundary. The envelope is borsh-encoded; the domain request or
//! response it carries is borsh-encoded again into [`BusMessage::message`].

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::error;

/// Opaque correlation token linking a reply to the request that caused it.
///
/// Minted by the host when a guest blocks on a request, echoed unchanged by
/// whoever answers. The guest never creates one of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct ReplyTo(pub i64);

/// Error codes shared between the host and every plugin.
///
/// Codes outside this set are domain-specific and are carried through
/// untouched in [`Error::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommonErrorCode {
    /// No more specific code applies.
    Unknown = 0,
    /// A blocking request did not receive its reply in time.
    Timeout = 1,
    /// The addressed item does not exist.
    NotFound = 2,
    /// A payload could not be encoded or decoded as the expected type.
    InvalidType = 3,
}

impl CommonErrorCode {
    /// Map a raw wire code back to a known code, if it is one.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Timeout),
            2 => Some(Self::NotFound),
            3 => Some(Self::InvalidType),
            _ => None,
        }
    }
}

impl From<CommonErrorCode> for i32 {
    fn from(code: CommonErrorCode) -> Self {
        code as i32
    }
}

/// Message types understood by the host bus itself.
///
/// Requests are even; the matching response is the request type plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExternalMessageType {
    Unspecified = 0,
    SubscribeReq = 2,
    SubscribeResp = 3,
    UnsubscribeReq = 4,
    UnsubscribeResp = 5,
    LogSendReq = 6,
    LogSendResp = 7,
    KvSetReq = 8,
    KvSetResp = 9,
    KvGetReq = 10,
    KvGetResp = 11,
    KvListReq = 12,
    KvListResp = 13,
    KvDeleteReq = 14,
    KvDeleteResp = 15,
}

impl From<ExternalMessageType> for i32 {
    fn from(t: ExternalMessageType) -> Self {
        t as i32
    }
}

/// Structured failure carried in a reply envelope.
///
/// Errors are values: the host reports failure here rather than by faulting
/// the guest.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct Error {
    pub code: i32,
    pub user_message: Option<String>,
    pub detail: Option<String>,
}

impl Error {
    /// Create an error with the given code and no text.
    #[must_use]
    pub fn new(code: impl Into<i32>) -> Self {
        Self {
            code: code.into(),
            user_message: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The code as a [`CommonErrorCode`], or `None` for domain codes.
    #[must_use]
    pub fn known_code(&self) -> Option<CommonErrorCode> {
        CommonErrorCode::from_code(self.code)
    }

    #[must_use]
    pub fn is(&self, code: CommonErrorCode) -> bool {
        self.code == i32::from(code)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.is(CommonErrorCode::Timeout)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.is(CommonErrorCode::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.detail, &self.user_message) {
            (Some(detail), _) => f.write_str(detail),
            (None, Some(message)) => f.write_str(message),
            (None, None) => write!(f, "bus error code {}", self.code),
        }
    }
}

impl std::error::Error for Error {}

/// The sole wire envelope exchanged with the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct BusMessage {
    /// Pub/sub routing key. Empty for direct calls to the host.
    pub topic: String,
    /// Logical kind of request, response or event within the topic.
    pub message_type: i32,
    /// Correlation token. `None` means no reply is expected.
    pub reply_to: Option<ReplyTo>,
    /// Encoded domain request or response.
    pub message: Vec<u8>,
    /// Failure outcome. Never set alongside a meaningful `message`.
    pub error: Option<Error>,
}

impl BusMessage {
    /// Create an empty envelope of the given type with no topic.
    #[must_use]
    pub fn new(message_type: impl Into<i32>) -> Self {
        Self {
            message_type: message_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Vec<u8>) -> Self {
        self.message = message;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    /// Template reply: same topic, type incremented by one.
    #[must_use]
    pub fn default_reply(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            message_type: self.message_type.saturating_add(1),
            ..Self::default()
        }
    }

    /// Encode `value` into the payload.
    ///
    /// On failure the payload is left empty and the envelope's error is set
    /// to `INVALID_TYPE`, so a handler can still return it as a reply.
    pub fn set_payload<T: BorshSerialize>(&mut self, value: &T) {
        match borsh::to_vec(value) {
            Ok(bytes) => self.message = bytes,
            Err(e) => {
                let reason = e.to_string();
                error!(error = %reason, "marshalling");
                self.message.clear();
                self.error = Some(
                    Error::new(CommonErrorCode::InvalidType).with_user_message(reason),
                );
            },
        }
    }

    /// Decode the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns an `INVALID_TYPE` [`Error`] if the payload does not decode.
    pub fn payload<T: BorshDeserialize>(&self) -> Result<T, Error> {
        T::try_from_slice(&self.message).map_err(|e| {
            let reason = e.to_string();
            error!(error = %reason, "unmarshalling");
            Error::new(CommonErrorCode::InvalidType).with_user_message(reason)
        })
    }
}
