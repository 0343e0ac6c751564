//! Topic subscriptions.
//!
//! Subscribing tells the host which topics to deliver to this plugin's
//! `recv` entry point. Both calls are one-way.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::bus::Bus;
use crate::error::{BusError, BusResult};
use crate::message::{BusMessage, ExternalMessageType};
use crate::router::TopicRouter;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct SubscribeRequest {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct UnsubscribeRequest {
    pub topic: String,
}

impl<T: Transport> Bus<T> {
    /// Ask the host to deliver messages published on `topic`.
    ///
    /// # Errors
    ///
    /// Returns encoding or transport errors.
    pub fn subscribe(&self, topic: impl Into<String>) -> BusResult<()> {
        let req = SubscribeRequest {
            topic: topic.into(),
        };
        self.publish_request(ExternalMessageType::SubscribeReq, &req)
    }

    /// Stop delivery of `topic`. Unsubscribing from a topic with no active
    /// subscription is not an error.
    ///
    /// # Errors
    ///
    /// Returns encoding or transport errors.
    pub fn unsubscribe(&self, topic: impl Into<String>) -> BusResult<()> {
        let req = UnsubscribeRequest {
            topic: topic.into(),
        };
        self.publish_request(ExternalMessageType::UnsubscribeReq, &req)
    }

    /// Subscribe to every topic `router` has a table for.
    ///
    /// # Errors
    ///
    /// Stops at the first failed subscription and returns its error.
    pub fn subscribe_router(&self, router: &TopicRouter) -> BusResult<()> {
        router.topics().try_for_each(|topic| self.subscribe(topic))
    }

    fn publish_request<R: BorshSerialize>(
        &self,
        message_type: ExternalMessageType,
        req: &R,
    ) -> BusResult<()> {
        let payload = borsh::to_vec(req).map_err(BusError::Marshal)?;
        self.send(&BusMessage::new(message_type).with_message(payload))
    }
}
