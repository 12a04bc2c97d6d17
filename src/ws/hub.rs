//! Stock update hub: subscriber registry and fan-out.
//!
//! The [`Hub`] is an actor. A single task ([`Hub::run`]) owns the registry
//! of connected subscribers and is the only code that ever touches it.
//! Everything else talks to it through a cloneable [`HubHandle`] over three
//! queues:
//!
//! - **register**: unbounded, each request acknowledged through a
//!   `oneshot` so a connection is visible to fan-out before its loops start;
//! - **deregister**: unbounded, fire-and-forget, idempotent;
//! - **publish**: bounded, fed with `try_send` so publishers never wait.
//!
//! Fan-out offers the pre-encoded frame to every subscriber's bounded
//! outbound buffer with `try_send`. A full buffer loses that one event for
//! that one subscriber. The hub holds the only sender of each outbound
//! buffer, so removing a subscriber from the registry is what closes its
//! buffer, exactly once.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use utoipa::ToSchema;

use super::connection::ConnectionId;
use super::messages::{BroadcastEvent, EncodedEvent};
use crate::domain::ItemId;

/// Default capacity of the publish queue.
pub const DEFAULT_PUBLISH_CAPACITY: usize = 256;

/// Default capacity of each subscriber's outbound buffer.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Largest capacity accepted for the publish queue or an outbound buffer.
pub const MAX_CAPACITY: usize = 1 << 20;

/// Errors surfaced by the hub to connection setup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// The hub task is no longer running.
    #[error("stock update hub has stopped")]
    HubStopped,
}

/// Hub sizing and eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of the publish queue. Events published while it is full are
    /// dropped.
    pub publish_capacity: usize,
    /// Capacity of each subscriber's outbound buffer.
    pub subscriber_buffer: usize,
    /// Consecutive full-buffer drops after which a subscriber is evicted.
    /// `0` disables eviction: slow subscribers simply miss events.
    pub slow_consumer_drop_limit: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            publish_capacity: DEFAULT_PUBLISH_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            slow_consumer_drop_limit: 0,
        }
    }
}

/// What happened to a published event.
///
/// Publishing is best-effort; callers are free to ignore this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The event is queued for fan-out.
    Queued,
    /// The publish queue was full (or encoding failed); the event is gone.
    Dropped,
    /// The hub task has stopped; nobody is listening.
    HubStopped,
}

/// Hub-side membership record of one connection.
///
/// Holds the only sender of the connection's outbound buffer.
#[derive(Debug)]
pub struct Subscriber {
    id: ConnectionId,
    peer: SocketAddr,
    outbound: mpsc::Sender<Utf8Bytes>,
    consecutive_drops: u32,
}

impl Subscriber {
    /// Creates a membership record around the sending half of an outbound
    /// buffer.
    #[must_use]
    pub fn new(id: ConnectionId, peer: SocketAddr, outbound: mpsc::Sender<Utf8Bytes>) -> Self {
        Self {
            id,
            peer,
            outbound,
            consecutive_drops: 0,
        }
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

#[derive(Debug)]
struct Registration {
    subscriber: Subscriber,
    ack: oneshot::Sender<()>,
}

/// Counters shared between the hub task and its handles.
#[derive(Debug, Default)]
struct HubCounters {
    subscribers: AtomicUsize,
    published: AtomicU64,
    dropped_publishes: AtomicU64,
    dropped_deliveries: AtomicU64,
    evicted: AtomicU64,
}

/// Point-in-time view of the hub counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HubStats {
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Events accepted onto the publish queue.
    pub published: u64,
    /// Events dropped because the publish queue was full.
    pub dropped_publishes: u64,
    /// Single-subscriber deliveries skipped because that subscriber's
    /// outbound buffer was full.
    pub dropped_deliveries: u64,
    /// Subscribers evicted by the slow consumer policy.
    pub evicted: u64,
}

/// The coordination task state. Build with [`Hub::new`], drive with
/// [`Hub::run`].
#[derive(Debug)]
pub struct Hub {
    config: HubConfig,
    subscribers: HashMap<ConnectionId, Subscriber>,
    register_rx: mpsc::UnboundedReceiver<Registration>,
    deregister_rx: mpsc::UnboundedReceiver<ConnectionId>,
    publish_rx: mpsc::Receiver<EncodedEvent>,
    counters: Arc<HubCounters>,
}

/// Cloneable client side of the [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::UnboundedSender<Registration>,
    deregister_tx: mpsc::UnboundedSender<ConnectionId>,
    publish_tx: mpsc::Sender<EncodedEvent>,
    counters: Arc<HubCounters>,
    subscriber_buffer: usize,
}

impl Hub {
    /// Creates a hub and the handle used to reach it.
    ///
    /// Nothing happens until [`Hub::run`] is polled. Capacities are clamped
    /// to `1..=MAX_CAPACITY`.
    #[must_use]
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (deregister_tx, deregister_rx) = mpsc::unbounded_channel();
        let publish_capacity = config.publish_capacity.clamp(1, MAX_CAPACITY);
        let (publish_tx, publish_rx) = mpsc::channel(publish_capacity);
        let counters = Arc::new(HubCounters::default());

        let handle = HubHandle {
            register_tx,
            deregister_tx,
            publish_tx,
            counters: Arc::clone(&counters),
            subscriber_buffer: config.subscriber_buffer.clamp(1, MAX_CAPACITY),
        };
        let hub = Self {
            config,
            subscribers: HashMap::new(),
            register_rx,
            deregister_rx,
            publish_rx,
            counters,
        };
        (hub, handle)
    }

    /// Runs the coordination loop until `shutdown` resolves or every
    /// [`HubHandle`] has been dropped.
    ///
    /// Requests are applied one at a time. When several queues are ready,
    /// registrations go first, then deregistrations, then fan-out. On exit
    /// the registry is cleared, which closes every outbound buffer and lets
    /// each connection send its close frame.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(
            publish_capacity = self.config.publish_capacity,
            subscriber_buffer = self.config.subscriber_buffer,
            "stock update hub started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("stock update hub shutting down");
                    break;
                }
                Some(registration) = self.register_rx.recv() => self.register(registration),
                Some(id) = self.deregister_rx.recv() => self.deregister(id),
                event = self.publish_rx.recv() => match event {
                    Some(event) => self.fan_out(&event),
                    // Every handle is gone: nothing can register or publish.
                    None => break,
                },
            }
        }

        let remaining = self.subscribers.len();
        self.subscribers.clear();
        self.counters.subscribers.store(0, Ordering::Relaxed);
        tracing::info!(closed = remaining, "stock update hub stopped");
    }

    fn register(&mut self, registration: Registration) {
        let Registration { subscriber, ack } = registration;
        let id = subscriber.id;
        let peer = subscriber.peer;

        if self.subscribers.contains_key(&id) {
            tracing::warn!(connection_id = %id, "duplicate registration ignored");
            return;
        }
        self.subscribers.insert(id, subscriber);

        if ack.send(()).is_err() {
            // The connection gave up before its loops started.
            self.subscribers.remove(&id);
            tracing::debug!(connection_id = %id, "registration abandoned");
            return;
        }

        self.counters
            .subscribers
            .store(self.subscribers.len(), Ordering::Relaxed);
        tracing::info!(
            connection_id = %id,
            %peer,
            subscribers = self.subscribers.len(),
            "subscriber registered"
        );
    }

    fn deregister(&mut self, id: ConnectionId) {
        // Dropping the record drops the hub's sender, closing the buffer.
        let Some(subscriber) = self.subscribers.remove(&id) else {
            tracing::trace!(connection_id = %id, "already deregistered");
            return;
        };
        self.counters
            .subscribers
            .store(self.subscribers.len(), Ordering::Relaxed);
        tracing::info!(
            connection_id = %id,
            peer = %subscriber.peer,
            subscribers = self.subscribers.len(),
            "subscriber deregistered"
        );
    }

    fn fan_out(&mut self, event: &EncodedEvent) {
        let limit = self.config.slow_consumer_drop_limit;
        let mut delivered = 0_usize;
        let mut evict = Vec::new();
        let mut gone = Vec::new();

        for subscriber in self.subscribers.values_mut() {
            match subscriber.outbound.try_send(event.frame()) {
                Ok(()) => {
                    subscriber.consecutive_drops = 0;
                    delivered = delivered.saturating_add(1);
                }
                Err(TrySendError::Full(_)) => {
                    subscriber.consecutive_drops = subscriber.consecutive_drops.saturating_add(1);
                    self.counters
                        .dropped_deliveries
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        connection_id = %subscriber.id,
                        consecutive_drops = subscriber.consecutive_drops,
                        "subscriber buffer full, event skipped"
                    );
                    if limit > 0 && subscriber.consecutive_drops >= limit {
                        evict.push(subscriber.id);
                    }
                }
                Err(TrySendError::Closed(_)) => gone.push(subscriber.id),
            }
        }

        // The receiving side is gone, with or without a deregistration on
        // the way. Either way the record must not outlive its buffer.
        for id in gone {
            tracing::debug!(connection_id = %id, "pruning closed subscriber");
            self.deregister(id);
        }

        for id in evict {
            tracing::warn!(connection_id = %id, limit, "evicting slow subscriber");
            self.counters.evicted.fetch_add(1, Ordering::Relaxed);
            self.deregister(id);
        }

        tracing::trace!(delivered, subscribers = self.subscribers.len(), "event fanned out");
    }
}

impl HubHandle {
    /// Encodes `event` once and queues it for fan-out without waiting.
    ///
    /// Never blocks: a full publish queue drops the event.
    pub fn publish(&self, event: &BroadcastEvent) -> PublishOutcome {
        match event.encode() {
            Ok(encoded) => self.publish_encoded(encoded),
            Err(err) => {
                tracing::error!(%err, kind = event.kind(), "failed to encode broadcast event");
                PublishOutcome::Dropped
            }
        }
    }

    /// Queues an already encoded event for fan-out without waiting.
    pub fn publish_encoded(&self, event: EncodedEvent) -> PublishOutcome {
        match self.publish_tx.try_send(event) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                PublishOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.counters
                    .dropped_publishes
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("hub publish queue full, event dropped");
                PublishOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("hub stopped, event dropped");
                PublishOutcome::HubStopped
            }
        }
    }

    /// Announces a committed quantity change to every subscriber.
    pub fn emit_stock_update(
        &self,
        item_id: ItemId,
        sku: &str,
        new_quantity: i32,
    ) -> PublishOutcome {
        self.publish(&BroadcastEvent::stock_update(item_id, sku, new_quantity))
    }

    /// Adds `subscriber` to the registry and waits until the hub has
    /// applied it.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubStopped`] if the hub task is gone.
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), RealtimeError> {
        let (ack, acked) = oneshot::channel();
        self.register_tx
            .send(Registration { subscriber, ack })
            .map_err(|_| RealtimeError::HubStopped)?;
        acked.await.map_err(|_| RealtimeError::HubStopped)
    }

    /// Requests removal of a subscriber. Safe to call any number of times.
    pub fn deregister(&self, id: ConnectionId) {
        if self.deregister_tx.send(id).is_err() {
            tracing::trace!(connection_id = %id, "hub stopped before deregistration");
        }
    }

    /// Capacity to use for new outbound buffers.
    #[must_use]
    pub const fn subscriber_buffer(&self) -> usize {
        self.subscriber_buffer
    }

    /// Returns a snapshot of the hub counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.counters.subscribers.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            dropped_publishes: self.counters.dropped_publishes.load(Ordering::Relaxed),
            dropped_deliveries: self.counters.dropped_deliveries.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }
}
