//! Per-subscriber connection lifecycle.
//!
//! A [`Connection`] is one subscriber's link: its outbound buffer plus two
//! loops that jointly own the transport.
//!
//! - The **writer** drains the outbound buffer to the wire under a write
//!   deadline and sends a ping every `ping_period`. When the hub closes the
//!   buffer it sends a close frame and stops.
//! - The **reader** only watches for pongs and closure. Each pong pushes the
//!   read deadline out by `pong_wait`; anything else the client sends is
//!   ignored.
//!
//! Whichever loop hits a terminal condition first moves the connection from
//! `Active` to `Closing` and asks the hub to deregister it. The other loop
//! notices the state change and stops too. Once both have exited the
//! connection is `Closed`.
//!
//! The loops are generic over the transport halves so they can run against
//! an axum [`WebSocket`](axum::extract::ws::WebSocket) split or a test
//! double.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::hub::{HubHandle, RealtimeError, Subscriber};

/// Default deadline for writing one frame.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Default time allowed between pongs.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);

/// Default largest inbound frame accepted from a subscriber, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next identifier. Identifiers are never reused, so a
    /// deregistered connection can never be mistaken for a new one.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a connection. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Protocol upgrade in progress, not yet registered.
    Connecting,
    /// Registered with the hub; both loops running.
    Active,
    /// A loop hit a terminal condition; teardown under way.
    Closing,
    /// Both loops have exited and deregistration was requested.
    Closed,
}

/// Transport timings for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Deadline for writing a single frame.
    pub write_wait: Duration,
    /// Read deadline, refreshed by every pong.
    pub pong_wait: Duration,
    /// Interval between pings. Always shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
}

impl ConnectionConfig {
    /// Builds a config that pings at 90% of `pong_wait`.
    #[must_use]
    pub fn new(write_wait: Duration, pong_wait: Duration, max_message_size: usize) -> Self {
        Self {
            write_wait,
            pong_wait,
            ping_period: pong_wait - pong_wait / 10,
            max_message_size,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_WAIT, DEFAULT_PONG_WAIT, DEFAULT_MAX_MESSAGE_SIZE)
    }
}

/// Why a connection loop stopped.
#[derive(Debug)]
enum CloseReason {
    /// The hub closed the outbound buffer.
    Deregistered,
    /// The other loop started teardown first.
    SiblingClosed,
    /// The peer sent a close frame.
    PeerClosed,
    /// The inbound stream ended.
    StreamEnded,
    /// No pong arrived before the read deadline.
    PongTimeout,
    /// A frame write did not finish before the write deadline.
    WriteTimeout,
    /// The transport rejected a write.
    WriteFailed(String),
    /// The transport failed while reading.
    ReadFailed(String),
}

/// A registered subscriber whose loops have not started yet.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    config: ConnectionConfig,
    hub: HubHandle,
    outbound: mpsc::Receiver<Utf8Bytes>,
    state: watch::Sender<ConnectionState>,
}

impl Connection {
    /// Creates the outbound buffer and registers the connection with the
    /// hub, returning once the hub has applied the registration.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubStopped`] if the hub is no longer running.
    pub async fn accept(
        hub: &HubHandle,
        peer: SocketAddr,
        config: ConnectionConfig,
    ) -> Result<Self, RealtimeError> {
        let id = ConnectionId::next();
        let (outbound_tx, outbound) = mpsc::channel(hub.subscriber_buffer());
        let (state, _) = watch::channel(ConnectionState::Connecting);

        hub.register(Subscriber::new(id, peer, outbound_tx)).await?;
        state.send_replace(ConnectionState::Active);

        Ok(Self {
            id,
            peer,
            config,
            hub: hub.clone(),
            outbound,
            state,
        })
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Spawns the writer and reader loops over the two transport halves and
    /// returns immediately.
    ///
    /// The returned receiver follows the lifecycle until `Closed`.
    pub fn start<Si, St, E>(self, sink: Si, stream: St) -> watch::Receiver<ConnectionState>
    where
        Si: Sink<Message> + Unpin + Send + 'static,
        Si::Error: fmt::Display,
        St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let Self {
            id,
            peer,
            config,
            hub,
            outbound,
            state,
        } = self;

        let watcher = state.subscribe();
        let lifecycle = Arc::new(Lifecycle {
            id,
            peer,
            hub,
            state,
            live_loops: AtomicU8::new(2),
        });

        tracing::debug!(connection_id = %id, %peer, "connection loops starting");
        tokio::spawn(write_loop(Arc::clone(&lifecycle), outbound, sink, config));
        tokio::spawn(read_loop(lifecycle, stream, config));
        watcher
    }
}

/// State shared by the two loops of one connection.
#[derive(Debug)]
struct Lifecycle {
    id: ConnectionId,
    peer: SocketAddr,
    hub: HubHandle,
    state: watch::Sender<ConnectionState>,
    live_loops: AtomicU8,
}

impl Lifecycle {
    /// Moves `Active` to `Closing` if nobody has yet, and requests
    /// deregistration. Both loops call this; the hub ignores repeats.
    fn begin_closing(&self, side: &'static str, reason: &CloseReason) {
        let first = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Active {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });
        if first {
            tracing::info!(
                connection_id = %self.id,
                peer = %self.peer,
                side,
                ?reason,
                "connection closing"
            );
        }
        self.hub.deregister(self.id);
    }

    fn loop_exited(&self) {
        if self.live_loops.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.send_replace(ConnectionState::Closed);
            tracing::debug!(connection_id = %self.id, "connection closed");
        }
    }
}

/// Resolves once the connection has left `Active`.
async fn closing(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state.wait_for(|s| *s != ConnectionState::Active).await;
}

async fn send_frame<S>(sink: &mut S, frame: Message, deadline: Duration) -> Result<(), CloseReason>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match time::timeout(deadline, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(CloseReason::WriteFailed(err.to_string())),
        Err(_) => Err(CloseReason::WriteTimeout),
    }
}

async fn write_loop<S>(
    lifecycle: Arc<Lifecycle>,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
    mut sink: S,
    config: ConnectionConfig,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut state = lifecycle.state.subscribe();
    let mut ping = time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(reason) = send_frame(&mut sink, Message::Text(text), config.write_wait).await {
                        break reason;
                    }
                }
                None => {
                    let _ = send_frame(&mut sink, Message::Close(None), config.write_wait).await;
                    break CloseReason::Deregistered;
                }
            },
            _ = ping.tick() => {
                if let Err(reason) = send_frame(&mut sink, Message::Ping(Bytes::new()), config.write_wait).await {
                    break reason;
                }
            }
            () = closing(&mut state) => break CloseReason::SiblingClosed,
        }
    };

    lifecycle.begin_closing("writer", &reason);
    if let Ok(Err(err)) = time::timeout(config.write_wait, sink.close()).await {
        tracing::trace!(connection_id = %lifecycle.id, %err, "transport close failed");
    }
    lifecycle.loop_exited();
}

async fn read_loop<St, E>(lifecycle: Arc<Lifecycle>, mut stream: St, config: ConnectionConfig)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let mut state = lifecycle.state.subscribe();
    let mut deadline = Instant::now() + config.pong_wait;

    let reason = loop {
        tokio::select! {
            () = closing(&mut state) => break CloseReason::SiblingClosed,
            read = time::timeout_at(deadline, stream.next()) => match read {
                Err(_) => break CloseReason::PongTimeout,
                Ok(None) => break CloseReason::StreamEnded,
                Ok(Some(Err(err))) => break CloseReason::ReadFailed(err.to_string()),
                Ok(Some(Ok(Message::Close(_)))) => break CloseReason::PeerClosed,
                Ok(Some(Ok(Message::Pong(_)))) => deadline = Instant::now() + config.pong_wait,
                // Notification-only channel: client payloads are ignored.
                Ok(Some(Ok(_))) => {}
            },
        }
    };

    lifecycle.begin_closing("reader", &reason);
    lifecycle.loop_exited();
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::pin::Pin;

    use super::*;
    use crate::domain::ItemId;
    use crate::ws::hub::{Hub, HubConfig};

    type WireSink = Pin<Box<dyn Sink<Message, Error = &'static str> + Send>>;
    type PeerTx = mpsc::UnboundedSender<Result<Message, &'static str>>;

    struct Harness {
        hub: HubHandle,
        state: watch::Receiver<ConnectionState>,
        id: ConnectionId,
        wire: mpsc::UnboundedReceiver<Message>,
        peer: PeerTx,
    }

    fn test_config() -> ConnectionConfig {
        ConnectionConfig::new(Duration::from_secs(1), Duration::from_secs(10), 512)
    }

    fn spawn_hub() -> HubHandle {
        let (hub, handle) = Hub::new(HubConfig::default());
        tokio::spawn(hub.run(std::future::pending()));
        handle
    }

    async fn start_over(
        hub: &HubHandle,
        sink: WireSink,
    ) -> (ConnectionId, watch::Receiver<ConnectionState>, PeerTx) {
        let (peer, mut peer_rx) = mpsc::unbounded_channel();
        let stream = futures_util::stream::poll_fn(move |cx| peer_rx.poll_recv(cx));

        let peer_addr = SocketAddr::from(([127, 0, 0, 1], 50_000));
        let Ok(conn) = Connection::accept(hub, peer_addr, test_config()).await else {
            panic!("hub is running");
        };
        assert_eq!(conn.state(), ConnectionState::Active);
        let id = conn.id();
        (id, conn.start(sink, stream), peer)
    }

    async fn connect(hub: HubHandle) -> Harness {
        let (wire_tx, wire) = mpsc::unbounded_channel::<Message>();
        let sink: WireSink = Box::pin(futures_util::sink::unfold(
            wire_tx,
            |tx, msg: Message| async move { tx.send(msg).map(|()| tx).map_err(|_| "wire closed") },
        ));
        let (id, state, peer) = start_over(&hub, sink).await;
        Harness {
            hub,
            state,
            id,
            wire,
            peer,
        }
    }

    async fn next_frame(wire: &mut mpsc::UnboundedReceiver<Message>) -> Message {
        match time::timeout(Duration::from_secs(30), wire.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => panic!("wire closed"),
            Err(_) => panic!("no frame written"),
        }
    }

    async fn wait_closed(state: &mut watch::Receiver<ConnectionState>) {
        let closed = time::timeout(
            Duration::from_secs(60),
            state.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await;
        assert!(matches!(closed, Ok(Ok(_))), "connection never closed");
    }

    async fn wait_subscribers(hub: &HubHandle, expected: usize) {
        let settled = time::timeout(Duration::from_secs(5), async {
            while hub.stats().subscribers != expected {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(settled.is_ok(), "hub never reached {expected} subscribers");
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b.get() > a.get());
    }

    #[test]
    fn ping_period_is_ninety_percent_of_pong_wait() {
        let config = ConnectionConfig::default();
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(config.write_wait, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 512);
    }

    #[test]
    fn ping_period_never_overflows() {
        let config = ConnectionConfig::new(DEFAULT_WRITE_WAIT, Duration::MAX, 512);
        assert!(config.ping_period < config.pong_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_published_events_in_order() {
        let mut h = connect(spawn_hub()).await;
        let item = ItemId::new();
        let _ = h.hub.emit_stock_update(item, "SKU1", 5);
        let _ = h.hub.emit_stock_update(item, "SKU1", 6);

        for expected in ["\"new_quantity\":5", "\"new_quantity\":6"] {
            let Message::Text(text) = next_frame(&mut h.wire).await else {
                panic!("expected a text frame");
            };
            assert!(text.as_str().contains(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pongs_keep_the_connection_alive() {
        let mut h = connect(spawn_hub()).await;

        // Three ping rounds span well past a single pong_wait.
        for _ in 0..3 {
            assert!(matches!(next_frame(&mut h.wire).await, Message::Ping(_)));
            assert!(h.peer.send(Ok(Message::Pong(Bytes::new()))).is_ok());
        }
        assert_eq!(*h.state.borrow(), ConnectionState::Active);
        assert_eq!(h.hub.stats().subscribers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_is_torn_down() {
        let mut h = connect(spawn_hub()).await;
        let started = Instant::now();

        wait_closed(&mut h.state).await;
        assert!(started.elapsed() >= Duration::from_secs(10));
        wait_subscribers(&h.hub, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn deregistration_sends_close_frame() {
        let mut h = connect(spawn_hub()).await;
        h.hub.deregister(h.id);

        assert!(matches!(next_frame(&mut h.wire).await, Message::Close(None)));
        wait_closed(&mut h.state).await;
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_frame_ends_connection() {
        let mut h = connect(spawn_hub()).await;
        assert!(h.peer.send(Ok(Message::Close(None))).is_ok());

        wait_closed(&mut h.state).await;
        wait_subscribers(&h.hub, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_ends_connection() {
        let mut h = connect(spawn_hub()).await;
        h.wire.close();
        let _ = h.hub.emit_stock_update(ItemId::new(), "SKU1", 1);

        wait_closed(&mut h.state).await;
        wait_subscribers(&h.hub, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_ends_connection() {
        let hub = spawn_hub();
        let stalled: WireSink = Box::pin(futures_util::sink::unfold((), |(), _msg: Message| {
            std::future::pending::<Result<(), &'static str>>()
        }));
        let (_id, mut state, _peer) = start_over(&hub, stalled).await;
        let started = Instant::now();

        let _ = hub.emit_stock_update(ItemId::new(), "SKU1", 1);
        wait_closed(&mut state).await;

        // Torn down by the write deadline, well before any pong timeout.
        assert!(started.elapsed() < test_config().pong_wait);
        wait_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn dropped_before_start_leaves_no_subscriber() {
        let hub = spawn_hub();
        let peer = SocketAddr::from(([127, 0, 0, 1], 50_002));
        let Ok(conn) = Connection::accept(&hub, peer, test_config()).await else {
            panic!("hub is running");
        };
        assert_eq!(hub.stats().subscribers, 1);
        drop(conn);

        let _ = hub.emit_stock_update(ItemId::new(), "SKU1", 1);
        wait_subscribers(&hub, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn client_payloads_are_ignored() {
        let mut h = connect(spawn_hub()).await;
        assert!(h.peer.send(Ok(Message::Text("subscribe".into()))).is_ok());
        assert!(h.peer.send(Ok(Message::Binary(Bytes::from_static(b"\x01")))).is_ok());

        // The next thing on the wire is the first ping, not a reply.
        assert!(matches!(next_frame(&mut h.wire).await, Message::Ping(_)));
        assert_eq!(*h.state.borrow(), ConnectionState::Active);
    }

    #[tokio::test]
    async fn accept_fails_once_hub_is_gone() {
        let (hub, handle) = Hub::new(HubConfig::default());
        drop(hub);
        let peer = SocketAddr::from(([127, 0, 0, 1], 50_001));
        let accepted = Connection::accept(&handle, peer, ConnectionConfig::default()).await;
        assert!(matches!(accepted, Err(RealtimeError::HubStopped)));
    }
}
