//! Live status updates for a single order.
//!
//! An [`OrderSubscription`] walks `Idle → Connecting → Connected →
//! Disconnected` and may reconnect after a disconnect. Handlers are
//! registered before [`connect`](OrderSubscription::connect); events are then
//! dispatched to them one at a time, in the order the transport received
//! them. Nothing is buffered: an update with no handler registered is
//! dropped.
//!
//! The channel is only ever released by
//! [`disconnect`](OrderSubscription::disconnect) (or by dropping the
//! subscription). A terminal order status does not close it.

#[cfg(feature = "ws")]
mod socketio;
mod transport;
#[cfg(feature = "ws")]
mod websocket;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use transport::{Channel, LinkState, Transport, TransportEvent};
#[cfg(feature = "ws")]
pub use websocket::WebSocketTransport;

use crate::Result;
use crate::error::Error;
use crate::types::response::OrderUpdateEvent;

/// Server event carrying an [`OrderUpdateEvent`].
pub const ORDER_UPDATE: &str = "ORDER_UPDATE";
/// Server event carrying an error message for the order.
pub const ERROR: &str = "ERROR";

type UpdateHandler = Arc<dyn Fn(OrderUpdateEvent) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(String) + Send + Sync>;
type StatusHandler = Arc<dyn Fn(bool) + Send + Sync>;
type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Default)]
struct Handlers {
    update: Option<UpdateHandler>,
    error: Option<ErrorHandler>,
    status: Option<StatusHandler>,
    connect: Option<LifecycleHandler>,
    disconnect: Option<LifecycleHandler>,
}

impl Handlers {
    fn error(&self, message: String) {
        if let Some(handler) = &self.error {
            handler(message);
        }
    }

    fn connected(&self) {
        if let Some(handler) = &self.status {
            handler(true);
        }
        if let Some(handler) = &self.connect {
            handler();
        }
    }

    fn disconnected(&self) {
        if let Some(handler) = &self.status {
            handler(false);
        }
        if let Some(handler) = &self.disconnect {
            handler();
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("update", &self.update.is_some())
            .field("error", &self.error.is_some())
            .field("status", &self.status.is_some())
            .field("connect", &self.connect.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct Active {
    link: LinkState,
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
    /// Set by whichever side reports the channel's drop first.
    reported: Arc<AtomicBool>,
}

impl Active {
    /// Closes the channel and claims its drop report. Returns `true` when
    /// nobody has reported the drop yet.
    fn release(self) -> bool {
        self.dispatcher.abort();
        self.shutdown.cancel();
        !self.reported.swap(true, Ordering::AcqRel)
    }
}

/// Subscription to one order's update channel.
///
/// Owns at most one transport channel at a time. `connect` takes `&mut
/// self`, so a second attempt cannot start while one is in flight.
#[derive(Debug)]
pub struct OrderSubscription {
    order_id: String,
    transport: Arc<dyn Transport>,
    state: State,
    handlers: Handlers,
    active: Option<Active>,
}

impl OrderSubscription {
    #[must_use]
    pub fn new<S: Into<String>>(order_id: S, transport: Arc<dyn Transport>) -> Self {
        Self {
            order_id: order_id.into(),
            transport,
            state: State::Idle,
            handlers: Handlers::default(),
            active: None,
        }
    }

    #[must_use]
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the transport currently reports the channel as up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.link.is_up())
    }

    pub fn on_order_update<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(OrderUpdateEvent) + Send + Sync + 'static,
    {
        self.handlers.update = Some(Arc::new(handler));
        self
    }

    /// Server-reported errors, undecodable updates and connect failures.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.handlers.error = Some(Arc::new(handler));
        self
    }

    pub fn on_connection_status_change<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.handlers.status = Some(Arc::new(handler));
        self
    }

    pub fn on_connect<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.connect = Some(Arc::new(handler));
        self
    }

    pub fn on_disconnect<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.disconnect = Some(Arc::new(handler));
        self
    }

    /// Opens the channel and waits for the server to accept it.
    ///
    /// Valid from `Idle` or `Disconnected`. Calling it while connected is
    /// rejected with [`Kind::Validation`](crate::error::Kind::Validation) and
    /// leaves the existing channel untouched, unless the transport has
    /// already lost that channel, in which case it is replaced. On failure
    /// the subscription returns to `Idle` and may be retried.
    ///
    /// Handlers registered after this call returns apply from the next
    /// `connect`.
    pub async fn connect(&mut self) -> Result<()> {
        if self.order_id.trim().is_empty() {
            return Err(Error::missing_subscription_target());
        }

        match self.state {
            State::Connected if self.is_connected() => {
                return Err(Error::validation(format!(
                    "subscription for order {} is already connected",
                    self.order_id
                )));
            }
            State::Connected | State::Connecting => {
                if self.release() {
                    self.handlers.disconnected();
                }
            }
            State::Idle | State::Disconnected => {}
        }

        self.state = State::Connecting;
        #[cfg(feature = "tracing")]
        tracing::debug!(order_id = %self.order_id, "opening order channel");

        let channel = match self.transport.open(&self.order_id).await {
            Ok(channel) => channel,
            Err(err) => return Err(self.fail(err.to_string())),
        };
        let Channel {
            mut events,
            link,
            shutdown,
        } = channel;

        let reason = loop {
            match events.recv().await {
                Some(TransportEvent::Connected) => break None,
                Some(
                    TransportEvent::ConnectError(reason) | TransportEvent::Disconnected(reason),
                ) => break Some(reason),
                Some(TransportEvent::Event { .. }) => {}
                None => break Some("channel closed before connecting".to_owned()),
            }
        };
        if let Some(reason) = reason {
            shutdown.cancel();
            return Err(self.fail(reason));
        }

        let handlers = self.handlers.clone();
        let reported = Arc::new(AtomicBool::new(false));
        let dispatcher = tokio::spawn(dispatch(
            self.order_id.clone(),
            events,
            handlers.clone(),
            Arc::clone(&reported),
        ));
        self.active = Some(Active {
            link,
            shutdown,
            dispatcher,
            reported,
        });
        self.state = State::Connected;

        #[cfg(feature = "tracing")]
        tracing::info!(order_id = %self.order_id, "subscribed to order updates");
        handlers.connected();
        Ok(())
    }

    /// Closes the channel, if any. Safe to call in any state and any number
    /// of times; always leaves the subscription `Disconnected`.
    pub fn disconnect(&mut self) {
        let unreported = self.release();
        self.state = State::Disconnected;

        if unreported {
            #[cfg(feature = "tracing")]
            tracing::info!(order_id = %self.order_id, "unsubscribed from order updates");
            self.handlers.disconnected();
        }
    }

    fn release(&mut self) -> bool {
        self.active.take().is_some_and(Active::release)
    }

    fn fail(&mut self, reason: String) -> Error {
        self.state = State::Idle;
        #[cfg(feature = "tracing")]
        tracing::warn!(order_id = %self.order_id, %reason, "order channel failed to connect");
        self.handlers.error(reason.clone());
        Error::subscription_connect(self.order_id.clone(), reason)
    }
}

impl Drop for OrderSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

async fn dispatch(
    order_id: String,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    handlers: Handlers,
    reported: Arc<AtomicBool>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Event { name, payload } => match name.as_str() {
                ORDER_UPDATE => deliver_update(&order_id, payload, &handlers),
                ERROR => {
                    let message = match payload {
                        Value::String(message) => message,
                        other => other.to_string(),
                    };
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%order_id, %message, "server reported an order error");
                    handlers.error(message);
                }
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%order_id, event = name.as_str(), "ignoring unknown event");
                }
            },
            #[cfg_attr(not(feature = "tracing"), expect(unused_variables, reason = "only logged"))]
            TransportEvent::Disconnected(reason) => {
                #[cfg(feature = "tracing")]
                tracing::info!(%order_id, %reason, "order channel dropped by remote");
                if !reported.swap(true, Ordering::AcqRel) {
                    handlers.disconnected();
                }
            }
            TransportEvent::Connected | TransportEvent::ConnectError(_) => {}
        }
    }
}

fn deliver_update(order_id: &str, payload: Value, handlers: &Handlers) {
    let Some(handler) = &handlers.update else {
        return;
    };
    match serde_json::from_value::<OrderUpdateEvent>(payload) {
        Ok(update) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(order_id, status = %update.status, "order update");
            handler(update);
        }
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(order_id, error = %err, "undecodable order update");
            handlers.error(format!("invalid {ORDER_UPDATE} payload: {err}"));
        }
    }
}
