//! Two-level dispatch of inbound messages: topic, then type.
//!
//! Tables are built once when the plugin starts and only read afterwards.
//! Anything a handler needs must be captured by the handler closure when it
//! is registered.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::bus::Bus;
use crate::error::BusResult;
use crate::message::BusMessage;
use crate::transport::Transport;

/// Handles a message, optionally producing a reply.
pub type Handler = Box<dyn Fn(&BusMessage) -> Option<BusMessage> + Send + Sync>;

/// Dispatches a message to its handler by message type.
#[derive(Default)]
pub struct TypeRouter {
    handlers: HashMap<i32, Handler>,
}

impl TypeRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `message_type`, replacing any earlier handler
    /// for the same type.
    #[must_use]
    pub fn route<F>(mut self, message_type: impl Into<i32>, handler: F) -> Self
    where
        F: Fn(&BusMessage) -> Option<BusMessage> + Send + Sync + 'static,
    {
        let message_type = message_type.into();
        if self
            .handlers
            .insert(message_type, Box::new(handler))
            .is_some()
        {
            warn!(message_type, "replacing existing handler");
        }
        self
    }

    /// Run the handler for `msg`'s type. No handler means no reply.
    pub fn handle(&self, msg: &BusMessage) -> Option<BusMessage> {
        let Some(handler) = self.handlers.get(&msg.message_type) else {
            debug!(topic = %msg.topic, message_type = msg.message_type, "no handler for type");
            return None;
        };
        handler(msg)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TypeRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort_unstable();
        f.debug_struct("TypeRouter").field("types", &types).finish()
    }
}

/// Dispatches a message to the [`TypeRouter`] registered for its topic.
#[derive(Debug, Default)]
pub struct TopicRouter {
    topics: HashMap<String, TypeRouter>,
}

impl TopicRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the type table for `topic`, replacing any earlier one.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>, router: TypeRouter) -> Self {
        let topic = topic.into();
        if self.topics.contains_key(&topic) {
            warn!(topic = %topic, "replacing existing type router");
        }
        self.topics.insert(topic, router);
        self
    }

    /// Topics with a registered table, in no particular order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// Find and run the handler for `msg`, returning its reply with the
    /// correlation token copied from `msg`.
    ///
    /// Unknown topics and types are dropped silently; the bus may still
    /// deliver a topic for a moment after unsubscribing from it.
    pub fn route(&self, msg: &BusMessage) -> Option<BusMessage> {
        let Some(types) = self.topics.get(&msg.topic) else {
            debug!(topic = %msg.topic, "no router for topic");
            return None;
        };
        let mut reply = types.handle(msg)?;
        reply.reply_to = msg.reply_to;
        Some(reply)
    }

    /// Route `msg` and send any reply back through `bus`.
    ///
    /// A reply to a message that carried no correlation token has nowhere
    /// to go and is dropped with a warning rather than sent uncorrelated.
    /// Handlers for one-way messages should return `None`.
    ///
    /// # Errors
    ///
    /// Returns the error from sending the reply.
    pub fn handle<T: Transport>(&self, bus: &Bus<T>, msg: &BusMessage) -> BusResult<()> {
        let Some(reply) = self.route(msg) else {
            return Ok(());
        };
        if reply.reply_to.is_none() {
            warn!(
                topic = %msg.topic,
                message_type = msg.message_type,
                "handler replied to a message that expects no reply"
            );
            return Ok(());
        }
        bus.send_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ReplyTo;

    fn echo_router() -> TopicRouter {
        TopicRouter::new().topic(
            "echo",
            TypeRouter::new()
                .route(1, |msg| {
                    let mut reply = msg.default_reply();
                    reply.message = msg.message.clone();
                    Some(reply)
                })
                .route(3, |_| None),
        )
    }

    #[test]
    fn test_route_stamps_reply_to() {
        let router = echo_router();
        let mut msg = BusMessage::new(1).with_topic("echo").with_message(b"hi".to_vec());
        msg.reply_to = Some(ReplyTo(5));

        let reply = router.route(&msg).unwrap();
        assert_eq!(reply.reply_to, Some(ReplyTo(5)));
        assert_eq!(reply.message_type, 2);
        assert_eq!(reply.message, b"hi");
    }

    #[test]
    fn test_unknown_topic_is_dropped() {
        let router = echo_router();
        let msg = BusMessage::new(1).with_topic("other");
        assert!(router.route(&msg).is_none());
    }

    #[test]
    fn test_unknown_type_is_dropped() {
        let router = echo_router();
        let msg = BusMessage::new(99).with_topic("echo");
        assert!(router.route(&msg).is_none());
    }

    #[test]
    fn test_handler_without_reply() {
        let router = echo_router();
        let msg = BusMessage::new(3).with_topic("echo");
        assert!(router.route(&msg).is_none());
    }

    #[test]
    fn test_handlers_capture_state_at_registration() {
        let prefix = String::from("greeting: ");
        let router = TopicRouter::new().topic(
            "greet",
            TypeRouter::new().route(1, move |msg| {
                let mut reply = msg.default_reply();
                reply.message = [prefix.as_bytes(), &msg.message].concat();
                Some(reply)
            }),
        );
        let msg = BusMessage::new(1).with_topic("greet").with_message(b"hello".to_vec());
        assert_eq!(router.route(&msg).unwrap().message, b"greeting: hello");
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let types = TypeRouter::new()
            .route(1, |_| Some(BusMessage::new(10)))
            .route(1, |_| Some(BusMessage::new(20)));
        assert_eq!(types.len(), 1);
        let reply = types.handle(&BusMessage::new(1)).unwrap();
        assert_eq!(reply.message_type, 20);
    }

    #[test]
    fn test_topics_lists_registered_topics() {
        let router = echo_router().topic("second", TypeRouter::new());
        let mut topics: Vec<_> = router.topics().collect();
        topics.sort_unstable();
        assert_eq!(topics, vec!["echo", "second"]);
    }
}
