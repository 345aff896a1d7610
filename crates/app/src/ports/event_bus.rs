//! Event bus port — publishing bridge events to subscribers.

use std::future::Future;

use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::event::BridgeEvent;

/// Publishes events to whatever bus implementation is wired in.
pub trait EventPublisher {
    /// Publish an event. Succeeds even when nobody is listening.
    fn publish(
        &self,
        event: BridgeEvent,
    ) -> impl Future<Output = Result<(), FitBridgeError>> + Send;
}
