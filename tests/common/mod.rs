//! Shared test helpers
//!
//! - Canned REST bodies for a healthy node behind wiremock
//! - A scripted WebSocket node: hands out a uid, records subscription
//!   frames, and replays whatever event frames the test feeds it
//! - A combined node serving the probe REST endpoints and `/ws` upgrades
//!   on one port, for controller-level monitor tests
//! - Account and network-property fixtures wired to the mock signer

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_core::account::{Account, AccountType};
use wallet_core::network::{
    NetworkCurrency, NetworkIdentifier, NetworkProperties, TransactionFees,
};
use wallet_core::signing::MockSigner;
use wallet_core::signing::SigningService;

pub const GENERATION_HASH: &str =
    "7FCCD304802016BEBBCD342A332F91FF1F3BB5E902988B352697BE245F48E836";
pub const CURRENCY_MOSAIC_ID: &str = "72C0212E67A08BCE";
pub const NETWORK_EPOCH: u64 = 1_615_853_185;

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

// ============================================================================
// REST fixtures
// ============================================================================

pub fn node_info_body(network_byte: u8) -> Value {
    json!({
        "version": 16777990,
        "publicKey": "C1B4E25B491D6552F78EDE5A77CB74BB1743955500FB7FAB610338B639C2F763",
        "networkGenerationHashSeed": GENERATION_HASH,
        "roles": 3,
        "port": 7900,
        "networkIdentifier": network_byte,
        "host": "node.test",
        "friendlyName": "test-node"
    })
}

pub fn network_properties_body(identifier: &str) -> Value {
    json!({
        "network": {
            "identifier": identifier,
            "epochAdjustment": format!("{}s", NETWORK_EPOCH),
            "generationHashSeed": GENERATION_HASH
        },
        "chain": {
            "currencyMosaicId": "0x72C0'212E'67A0'8BCE"
        }
    })
}

pub fn chain_info_body(height: u64) -> Value {
    json!({
        "height": height.to_string(),
        "scoreHigh": "0",
        "scoreLow": "1934025",
        "latestFinalizedBlock": {
            "height": height.saturating_sub(20).to_string()
        }
    })
}

pub fn fees_body() -> Value {
    json!({
        "averageFeeMultiplier": 100,
        "medianFeeMultiplier": 100,
        "highestFeeMultiplier": 543,
        "lowestFeeMultiplier": 0,
        "minFeeMultiplier": 100
    })
}

/// Mount the four endpoints the supervisor probes during a connection job.
pub async fn mount_healthy_node(
    server: &MockServer,
    identifier: &str,
    network_byte: u8,
    height: u64,
) {
    Mock::given(method("GET"))
        .and(path("/node/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(node_info_body(network_byte)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(network_properties_body(identifier)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chain/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chain_info_body(height)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/fees/transaction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fees_body()))
        .mount(server)
        .await;
}

/// One REST transaction, as `/transactions/*` endpoints return it.
pub fn transaction_body(
    hash: &str,
    transaction_type: u16,
    signer_public_key: &str,
    recipient_address: Option<&str>,
    height: u64,
) -> Value {
    let meta = if height == 0 {
        json!({ "hash": hash })
    } else {
        json!({ "hash": hash, "height": height.to_string() })
    };
    json!({
        "meta": meta,
        "transaction": {
            "type": transaction_type,
            "signerPublicKey": signer_public_key,
            "recipientAddress": recipient_address
        }
    })
}

// ============================================================================
// Wallet fixtures
// ============================================================================

/// Network properties as the supervisor would publish them after connecting
/// to `node_url`.
pub fn test_properties(node_url: &str) -> NetworkProperties {
    NetworkProperties {
        node_url: node_url.trim_end_matches('/').to_string(),
        network_identifier: NetworkIdentifier::TestNet,
        generation_hash: GENERATION_HASH.to_string(),
        epoch_adjustment: NETWORK_EPOCH,
        network_currency: NetworkCurrency {
            mosaic_id: CURRENCY_MOSAIC_ID.to_string(),
            divisibility: 6,
        },
        transaction_fees: TransactionFees {
            average_fee_multiplier: 100,
            median_fee_multiplier: 100,
            highest_fee_multiplier: 543,
            lowest_fee_multiplier: 0,
            min_fee_multiplier: 100,
        },
        chain_height: 100,
    }
}

/// Testnet account whose keys line up with the mock signer.
pub fn signer_account(name: &str, private_key: &str) -> Account {
    let signer = MockSigner::new();
    let public_key = MockSigner::public_key_of(private_key);
    let address = signer.derive_address(&public_key, NetworkIdentifier::TestNet);
    Account {
        name: name.to_string(),
        address,
        public_key,
        private_key_ref: format!("keystore://{}", name),
        account_type: AccountType::Seed,
        index: None,
    }
}

pub async fn recv_timeout<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
}

// ============================================================================
// Scripted WebSocket node
// ============================================================================

pub enum WsDirective {
    Frame(Value),
    Close(u16, String),
}

/// Minimal node-side WebSocket: accepts one connection, sends the uid
/// handshake, then records subscriptions and replays scripted frames.
pub struct WsNode {
    pub url: String,
    directives: mpsc::UnboundedSender<WsDirective>,
    subscriptions: mpsc::UnboundedReceiver<String>,
    handle: JoinHandle<()>,
}

impl WsNode {
    pub async fn start(uid: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind websocket test server");
        let addr = listener.local_addr().expect("missing local addr");
        let (directive_tx, mut directive_rx) = mpsc::unbounded_channel::<WsDirective>();
        let (subscription_tx, subscription_rx) = mpsc::unbounded_channel::<String>();
        let uid = uid.to_string();

        let handle = tokio::spawn(async move {
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let mut ws = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(_) => return,
            };
            if ws
                .send(Message::Text(json!({ "uid": uid }).to_string()))
                .await
                .is_err()
            {
                return;
            }

            loop {
                tokio::select! {
                    directive = directive_rx.recv() => match directive {
                        Some(WsDirective::Frame(value)) => {
                            if ws.send(Message::Text(value.to_string())).await.is_err() {
                                break;
                            }
                        }
                        Some(WsDirective::Close(code, reason)) => {
                            let _ = ws
                                .send(Message::Close(Some(CloseFrame {
                                    code: CloseCode::from(code),
                                    reason: reason.into(),
                                })))
                                .await;
                            break;
                        }
                        None => break,
                    },
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                if let Some(topic) = value.get("subscribe").and_then(Value::as_str) {
                                    let _ = subscription_tx.send(topic.to_string());
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    },
                }
            }
        });

        Self {
            url: format!("http://{}", addr),
            directives: directive_tx,
            subscriptions: subscription_rx,
            handle,
        }
    }

    /// Push one event frame to the connected client.
    pub fn send_frame(&self, value: Value) {
        self.directives
            .send(WsDirective::Frame(value))
            .expect("websocket test server is gone");
    }

    /// Close the socket from the node side.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self
            .directives
            .send(WsDirective::Close(code, reason.to_string()));
    }

    /// Next subscription topic the client sent.
    pub async fn expect_subscription(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.subscriptions.recv())
            .await
            .expect("timed out waiting for a subscription")
            .expect("websocket test server is gone")
    }

    /// True when no further subscription frame has arrived.
    pub fn no_more_subscriptions(&mut self) -> bool {
        self.subscriptions.try_recv().is_err()
    }
}

impl Drop for WsNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Combined REST and WebSocket node
// ============================================================================

/// Both of a node's surfaces on one port: the four REST endpoints the
/// supervisor probes, answered with the canned healthy-node bodies, and
/// `/ws` upgrades that hand out a uid and record subscription frames.
/// WebSocket connections are numbered so a test can tell a re-opened
/// listener from a kept one.
pub struct HybridNode {
    pub url: String,
    subscriptions: mpsc::UnboundedReceiver<(usize, String)>,
    handle: JoinHandle<()>,
}

impl HybridNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind hybrid test server");
        let addr = listener.local_addr().expect("missing local addr");
        let (subscription_tx, subscription_rx) = mpsc::unbounded_channel::<(usize, String)>();

        let handle = tokio::spawn(async move {
            let connections = Arc::new(AtomicUsize::new(0));
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let subscriptions = subscription_tx.clone();
                let connections = Arc::clone(&connections);
                tokio::spawn(async move {
                    // Route on the request line without consuming it; the
                    // upgrade handshake must stay intact for accept_async.
                    let mut head = [0u8; 512];
                    let peeked = match stream.peek(&mut head).await {
                        Ok(n) => n,
                        Err(_) => return,
                    };
                    let request = String::from_utf8_lossy(&head[..peeked]).into_owned();
                    if request.starts_with("GET /ws") {
                        let connection = connections.fetch_add(1, Ordering::SeqCst) + 1;
                        serve_websocket(stream, connection, subscriptions).await;
                    } else {
                        let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                        serve_rest(stream, path).await;
                    }
                });
            }
        });

        Self {
            url: format!("http://{}", addr),
            subscriptions: subscription_rx,
            handle,
        }
    }

    /// Next subscription any WebSocket client sent, as
    /// `(connection number, topic)`.
    pub async fn expect_subscription(&mut self) -> (usize, String) {
        tokio::time::timeout(Duration::from_secs(5), self.subscriptions.recv())
            .await
            .expect("timed out waiting for a subscription")
            .expect("hybrid test server is gone")
    }
}

impl Drop for HybridNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_websocket(
    stream: TcpStream,
    connection: usize,
    subscriptions: mpsc::UnboundedSender<(usize, String)>,
) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let uid = json!({ "uid": format!("uid-{}", connection) });
    if ws.send(Message::Text(uid.to_string())).await.is_err() {
        return;
    }
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if let Some(topic) = value.get("subscribe").and_then(Value::as_str) {
                        let _ = subscriptions.send((connection, topic.to_string()));
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

async fn serve_rest(mut stream: TcpStream, path: String) {
    let mut buf = [0u8; 1024];
    let mut head = Vec::new();
    // GET requests carry no body; the blank line ends them.
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let (status, body) = match path.as_str() {
        "/node/info" => ("200 OK", node_info_body(152)),
        "/network/properties" => ("200 OK", network_properties_body("testnet")),
        "/chain/info" => ("200 OK", chain_info_body(500)),
        "/network/fees/transaction" => ("200 OK", fees_body()),
        _ => ("404 Not Found", json!({ "code": "ResourceNotFound" })),
    };
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Event frame for the `block` topic.
pub fn block_frame(height: u64) -> Value {
    json!({
        "topic": "block",
        "data": {
            "block": {
                "height": height.to_string(),
                "timestamp": "86400000"
            },
            "meta": {
                "hash": format!("BLOCK-{}", height)
            }
        }
    })
}

/// Event frame for `unconfirmedAdded/*` and `partialAdded/*` topics.
pub fn added_frame(topic: &str, address: &str, hash: &str) -> Value {
    json!({
        "topic": format!("{}/{}", topic, address),
        "data": {
            "meta": { "hash": hash }
        }
    })
}
