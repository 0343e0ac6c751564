//! Forwarding of guest `tracing` events to the host log.
//!
//! A guest has no stdout worth writing to, so [`HostLogLayer`] turns each
//! event into a `LOG_SEND` publish. Event fields become typed log arguments.

use std::cell::Cell;
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::bus::Bus;
use crate::error::{BusError, BusResult};
use crate::log::{LogArg, LogLevel, LogValue};
use crate::transport::Transport;

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// Resets the re-entrancy flag when forwarding finishes, even on unwind.
struct ForwardGuard;

impl ForwardGuard {
    fn enter() -> Option<Self> {
        FORWARDING.with(|flag| {
            if flag.replace(true) {
                None
            } else {
                Some(Self)
            }
        })
    }
}

impl Drop for ForwardGuard {
    fn drop(&mut self) {
        FORWARDING.with(|flag| flag.set(false));
    }
}

/// A `tracing` layer that publishes events to the host log.
///
/// Events emitted while an event is being forwarded (for instance by the
/// bus's own tracing) are dropped, as are the SDK's TRACE diagnostics.
#[derive(Debug)]
pub struct HostLogLayer<T> {
    bus: Bus<T>,
    min_level: LogLevel,
}

impl<T: Transport> HostLogLayer<T> {
    /// Forward events at or above the bus's configured log level.
    pub fn new(bus: Bus<T>) -> Self {
        let min_level = bus.config().log_level;
        Self { bus, min_level }
    }

    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }
}

/// Crates whose TRACE events describe boundary crossings. They are not
/// forwarded.
const BOUNDARY_TARGETS: &[&str] = &["akcore_sdk", "akcore_test"];

fn is_boundary_trace(metadata: &Metadata<'_>) -> bool {
    *metadata.level() == Level::TRACE
        && BOUNDARY_TARGETS
            .iter()
            .any(|crate_name| metadata.target().starts_with(crate_name))
}

/// TRACE has no host equivalent and folds into DEBUG.
fn host_level(level: Level) -> LogLevel {
    match level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

#[derive(Default)]
struct ArgVisitor {
    message: String,
    args: Vec<LogArg>,
}

impl ArgVisitor {
    fn push(&mut self, field: &Field, value: LogValue) {
        self.args.push(LogArg {
            key: field.name().to_owned(),
            value,
        });
    }
}

impl Visit for ArgVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, LogValue::Double(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, LogValue::Int64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let value = i64::try_from(value).map_or_else(|_| LogValue::String(value.to_string()), LogValue::Int64);
        self.push(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, LogValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.push(field, LogValue::String(value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push(field, LogValue::String(format!("{value:?}")));
        }
    }
}

impl<S, T> Layer<S> for HostLogLayer<T>
where
    S: Subscriber,
    T: Transport + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = host_level(*metadata.level());
        if level < self.min_level || is_boundary_trace(metadata) {
            return;
        }
        let Some(_guard) = ForwardGuard::enter() else {
            return;
        };

        let mut visitor = ArgVisitor::default();
        event.record(&mut visitor);
        // Nowhere left to report a failure to.
        let _ = self.bus.log_args(level, &visitor.message, visitor.args);
    }
}

/// Install a global subscriber that forwards events to the host.
///
/// # Errors
///
/// Returns [`BusError::Config`] if a global subscriber is already set.
pub fn init_host_logging<T>(bus: Bus<T>) -> BusResult<()>
where
    T: Transport + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(HostLogLayer::new(bus))
        .try_init()
        .map_err(|e| BusError::Config(e.to_string()))
}
