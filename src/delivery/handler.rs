//! # Delivery handlers.
//!
//! A [`Handler`] consumes messages from a [`DeliveryQueue`](super::DeliveryQueue).
//! [`HandlerFn`] wraps a closure, the same way adapters can be function-backed.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;

use super::message::DeliveryMessage;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Identifier returned by [`DeliveryQueue::subscribe`](super::DeliveryQueue::subscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Consumer of delivered messages. Must be idempotent.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Name used in logs and events.
    fn name(&self) -> &str {
        "handler"
    }

    /// Processes one delivery attempt. An `Err` schedules a retry for this handler only.
    async fn handle(&self, message: &DeliveryMessage) -> Result<(), HandlerError>;
}

/// Function-backed handler.
///
/// # Example
/// ```
/// use plugvisor::{DeliveryMessage, Handler, HandlerError, HandlerFn, HandlerRef};
///
/// let h: HandlerRef = HandlerFn::arc("audit", |msg: DeliveryMessage| async move {
///     if msg.payload.is_null() {
///         return Err(HandlerError::new("empty payload"));
///     }
///     Ok(())
/// });
/// assert_eq!(h.name(), "audit");
/// ```
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(DeliveryMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: &DeliveryMessage) -> Result<(), HandlerError> {
        (self.f)(message.clone()).await
    }
}
