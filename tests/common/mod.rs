//! Shared harness: an in-memory server on an ephemeral port.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use stockroom::api;
use stockroom::app_state::AppState;
use stockroom::persistence::ItemStore;
use stockroom::ws::{ConnectionConfig, Hub, HubConfig, HubHandle};

/// Client side of a stock update subscription.
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: HubHandle,
    pub http: reqwest::Client,
}

impl TestServer {
    /// Starts a server with default hub sizing and the given connection
    /// timings.
    pub async fn start(connection_config: ConnectionConfig) -> Self {
        let (hub, handle) = Hub::new(HubConfig::default());
        tokio::spawn(hub.run(std::future::pending()));

        let state = AppState::new(ItemStore::memory(), handle.clone(), connection_config);
        let app = api::build_router().with_state(state);

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind ephemeral port");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("listener has an address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        Self {
            addr,
            hub: handle,
            http: reqwest::Client::new(),
        }
    }

    /// Starts a server with production connection timings.
    pub async fn start_default() -> Self {
        Self::start(ConnectionConfig::default()).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Opens a stock update subscription.
    pub async fn subscribe(&self) -> WsClient {
        let url = format!("ws://{}/ws/stock-updates", self.addr);
        let Ok((client, _)) = tokio_tungstenite::connect_async(url).await else {
            panic!("websocket handshake failed");
        };
        client
    }

    /// Waits until the hub reports `expected` subscribers.
    pub async fn wait_for_subscribers(&self, expected: usize, within: Duration) {
        let reached = tokio::time::timeout(within, async {
            while self.hub.stats().subscribers != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "expected {expected} subscribers, hub reports {}",
            self.hub.stats().subscribers
        );
    }

    /// Creates an item through the API and returns its JSON.
    pub async fn create_item(&self, sku: &str, quantity: i32, price: f64) -> Value {
        let Ok(response) = self
            .http
            .post(self.url("/api/v1/items"))
            .json(&json!({ "sku": sku, "name": format!("Item {sku}"), "quantity": quantity, "price": price }))
            .send()
            .await
        else {
            panic!("create request failed");
        };
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let Ok(body) = response.json::<Value>().await else {
            panic!("create response is JSON");
        };
        body
    }

    /// Sets an item's quantity through `PUT /api/v1/items/{id}`.
    pub async fn set_quantity(&self, id: &str, quantity: i32) -> reqwest::Response {
        let Ok(response) = self
            .http
            .put(self.url(&format!("/api/v1/items/{id}")))
            .json(&json!({ "quantity": quantity }))
            .send()
            .await
        else {
            panic!("update request failed");
        };
        response
    }
}

/// Reads the next text frame, skipping control frames.
pub async fn next_text(client: &mut WsClient, within: Duration) -> Value {
    let read = tokio::time::timeout(within, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str::<Value>(text.as_str()),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => panic!("subscription ended: {other:?}"),
            }
        }
    })
    .await;
    match read {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => panic!("frame is not JSON: {err}"),
        Err(_) => panic!("no frame within {within:?}"),
    }
}

/// Asserts nothing but control frames arrive for `window`.
pub async fn assert_silent(client: &mut WsClient, window: Duration) {
    let read = tokio::time::timeout(window, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => return other,
            }
        }
    })
    .await;
    if let Ok(frame) = read {
        panic!("unexpected frame: {frame:?}");
    }
}
