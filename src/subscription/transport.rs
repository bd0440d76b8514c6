use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Lifecycle and payload events a transport reports for one channel, in the
/// order it received them.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// The server accepted the channel.
    Connected,
    /// The server refused the channel or it could not be established in time.
    ConnectError(String),
    /// A named server event and its first argument.
    Event { name: String, payload: Value },
    /// The channel closed after having been connected.
    Disconnected(String),
}

/// Live flag a transport keeps up to date for its channel.
///
/// Reads go straight to the transport's view; subscriptions never cache it.
#[derive(Clone, Debug, Default)]
pub struct LinkState(Arc<AtomicBool>);

impl LinkState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, up: bool) {
        self.0.store(up, Ordering::Release);
    }
}

/// One opened channel: its event queue, its live flag and the token that
/// closes it.
///
/// Cancelling `shutdown` or dropping `events` must make the transport close
/// the underlying connection and lower the link flag.
#[derive(Debug)]
pub struct Channel {
    pub(crate) events: mpsc::UnboundedReceiver<TransportEvent>,
    pub(crate) link: LinkState,
    pub(crate) shutdown: CancellationToken,
}

impl Channel {
    #[must_use]
    pub fn new(
        events: mpsc::UnboundedReceiver<TransportEvent>,
        link: LinkState,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            events,
            link,
            shutdown,
        }
    }
}

/// Opens real-time channels addressed by order id.
///
/// `open` starts the attempt and hands back the channel immediately; the
/// outcome arrives as the first [`TransportEvent`] on it. Transports enforce
/// their own connect timeout and report expiry as
/// [`TransportEvent::ConnectError`].
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    async fn open(&self, order_id: &str) -> Result<Channel>;
}
