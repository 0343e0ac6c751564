//! Structured logging on the host.
//!
//! A log line is published, not requested: nothing comes back. Arguments are
//! key/value pairs whose values are limited to [`LogValue`].

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::error::{BusError, BusResult};
use crate::message::{BusMessage, ExternalMessageType};
use crate::transport::Transport;

/// Severity of a host log line.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A log argument value. Nothing outside this set can be logged.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum LogValue {
    Double(f64),
    Int64(i64),
    String(String),
    Bool(bool),
}

macro_rules! log_value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for LogValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )+
    };
}

log_value_from!(Double: f32, f64);
log_value_from!(Int64: i8, i16, i32, i64, u8, u16, u32);
log_value_from!(String: &str, String);
log_value_from!(Bool: bool);

/// One `key=value` argument.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct LogArg {
    pub key: String,
    pub value: LogValue,
}

impl LogArg {
    pub fn new(key: impl Into<String>, value: impl Into<LogValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Turn a flat `key, value, key, value, ...` sequence into pairs.
///
/// # Errors
///
/// [`BusError::InvalidLogArgs`] if the count is odd or a key position does
/// not hold a string. The error names the key's index in `flat`.
pub fn pair_args(flat: &[LogValue]) -> BusResult<Vec<LogArg>> {
    if flat.len() % 2 != 0 {
        return Err(BusError::InvalidLogArgs("arg count must be even".into()));
    }
    flat.chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| match &pair[0] {
            LogValue::String(key) => Ok(LogArg {
                key: key.clone(),
                value: pair[1].clone(),
            }),
            other => Err(BusError::InvalidLogArgs(format!(
                "arg {} not a key string: {other:?}",
                i.saturating_mul(2)
            ))),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct LogSendRequest {
    pub level: LogLevel,
    pub message: String,
    pub args: Vec<LogArg>,
}

impl<T: Transport> Bus<T> {
    /// Log `message` on the host with a flat `key, value, ...` argument
    /// list.
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidLogArgs`] for malformed arguments and
    /// [`BusError::Marshal`] for unencodable values (such as NaN); both are
    /// raised before anything is sent.
    pub fn log(&self, level: LogLevel, message: &str, args: &[LogValue]) -> BusResult<()> {
        let args = pair_args(args)?;
        self.log_args(level, message, args)
    }

    /// Log `message` on the host with already-paired arguments.
    ///
    /// # Errors
    ///
    /// [`BusError::Marshal`] if an argument does not encode, otherwise the
    /// transport's error.
    pub fn log_args(&self, level: LogLevel, message: &str, args: Vec<LogArg>) -> BusResult<()> {
        let req = LogSendRequest {
            level,
            message: message.to_owned(),
            args,
        };
        let payload = borsh::to_vec(&req).map_err(BusError::Marshal)?;
        self.send(&BusMessage::new(ExternalMessageType::LogSendReq).with_message(payload))
    }

    /// Log at `ERROR`. See [`Bus::log`].
    ///
    /// # Errors
    ///
    /// See [`Bus::log`].
    pub fn log_error(&self, message: &str, args: &[LogValue]) -> BusResult<()> {
        self.log(LogLevel::Error, message, args)
    }

    /// Log at `WARN`. See [`Bus::log`].
    ///
    /// # Errors
    ///
    /// See [`Bus::log`].
    pub fn log_warn(&self, message: &str, args: &[LogValue]) -> BusResult<()> {
        self.log(LogLevel::Warn, message, args)
    }

    /// Log at `INFO`. See [`Bus::log`].
    ///
    /// # Errors
    ///
    /// See [`Bus::log`].
    pub fn log_info(&self, message: &str, args: &[LogValue]) -> BusResult<()> {
        self.log(LogLevel::Info, message, args)
    }

    /// Log at `DEBUG`. See [`Bus::log`].
    ///
    /// # Errors
    ///
    /// See [`Bus::log`].
    pub fn log_debug(&self, message: &str, args: &[LogValue]) -> BusResult<()> {
        self.log(LogLevel::Debug, message, args)
    }
}
