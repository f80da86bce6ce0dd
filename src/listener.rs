//! Confirmation listener
//!
//! Duplex WebSocket subscription against one node, scoped to one account.
//! Each event group gets its own typed channel:
//! - Confirmed transactions, matched through the block's transaction list
//! - Unconfirmed and partial additions, resolved through the REST gateway
//! - New blocks
//! - Transaction status errors
//! - Close events, emitted only for closes the wallet did not ask for

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::account::Account;
use crate::error::WalletError;
use crate::network::NodeClient;
use crate::transaction::{BlockInfo, TransactionStatusError, TransactionSummary};

const OPEN_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The account a listener watches. Matching uses both identifiers so a
/// transaction is caught whether the account sent it or received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountScope {
    pub address: String,
    pub public_key: String,
}

impl From<&Account> for AccountScope {
    fn from(account: &Account) -> Self {
        Self {
            address: account.address.clone(),
            public_key: account.public_key.clone(),
        }
    }
}

/// Why the socket went away when the wallet did not close it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventGroup {
    Confirmed,
    Unconfirmed,
    Partial,
    NewBlock,
    TransactionError,
}

enum DriverCommand {
    Subscribe(EventGroup),
    Close,
}

pub struct ConfirmationListener {
    uid: String,
    node_url: String,
    scope: AccountScope,
    commands: mpsc::UnboundedSender<DriverCommand>,
    interrupted: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
    confirmed_rx: Option<mpsc::UnboundedReceiver<TransactionSummary>>,
    unconfirmed_rx: Option<mpsc::UnboundedReceiver<TransactionSummary>>,
    partial_rx: Option<mpsc::UnboundedReceiver<TransactionSummary>>,
    block_rx: Option<mpsc::UnboundedReceiver<BlockInfo>>,
    error_rx: Option<mpsc::UnboundedReceiver<TransactionStatusError>>,
    close_rx: Option<mpsc::UnboundedReceiver<CloseReason>>,
}

impl ConfirmationListener {
    /// Connect, read the uid handshake frame, and start the driver task.
    /// Nothing is subscribed until the per-group methods are called.
    pub async fn open(
        node_url: &str,
        rest: NodeClient,
        scope: AccountScope,
    ) -> Result<Self, WalletError> {
        let ws_url = websocket_url(node_url);
        let (mut ws, _) = timeout(OPEN_TIMEOUT, connect_async(&ws_url))
            .await
            .map_err(|_| WalletError::ListenerOpen(format!("{} timed out", ws_url)))?
            .map_err(|e| WalletError::ListenerOpen(format!("{}: {}", ws_url, e)))?;

        let uid = timeout(OPEN_TIMEOUT, read_uid(&mut ws))
            .await
            .map_err(|_| WalletError::ListenerOpen(format!("{} sent no uid", ws_url)))??;
        log::info!("📡 Listener open on {} with uid {}", ws_url, uid);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (confirmed_tx, confirmed_rx) = mpsc::unbounded_channel();
        let (unconfirmed_tx, unconfirmed_rx) = mpsc::unbounded_channel();
        let (partial_tx, partial_rx) = mpsc::unbounded_channel();
        let (block_tx, block_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = mpsc::unbounded_channel();

        let interrupted = Arc::new(AtomicBool::new(false));
        let driver = ListenerDriver {
            ws,
            uid: uid.clone(),
            rest,
            scope: scope.clone(),
            commands: command_rx,
            interrupted: Arc::clone(&interrupted),
            confirmed_tx,
            unconfirmed_tx,
            partial_tx,
            block_tx,
            error_tx,
            close_tx,
            confirmed_on: false,
            unconfirmed_on: false,
            partial_on: false,
            blocks_on: false,
            errors_on: false,
            block_topic_subscribed: false,
        };
        let handle = tokio::spawn(driver.run());

        Ok(Self {
            uid,
            node_url: node_url.trim_end_matches('/').to_string(),
            scope,
            commands: command_tx,
            interrupted,
            driver: Some(handle),
            confirmed_rx: Some(confirmed_rx),
            unconfirmed_rx: Some(unconfirmed_rx),
            partial_rx: Some(partial_rx),
            block_rx: Some(block_rx),
            error_rx: Some(error_rx),
            close_rx: Some(close_rx),
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// The account this listener was opened for.
    pub fn scope(&self) -> &AccountScope {
        &self.scope
    }

    /// True once the driver has exited, whether the wallet closed the
    /// listener or the node did.
    pub fn is_closed(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
            || self.driver.as_ref().map(|d| d.is_finished()).unwrap_or(true)
    }

    /// Confirmed transactions involving the scoped account, in block order.
    pub fn confirmed(&mut self) -> Result<mpsc::UnboundedReceiver<TransactionSummary>, WalletError> {
        let rx = taken(self.confirmed_rx.take(), "confirmed")?;
        self.subscribe(EventGroup::Confirmed)?;
        Ok(rx)
    }

    pub fn unconfirmed(
        &mut self,
    ) -> Result<mpsc::UnboundedReceiver<TransactionSummary>, WalletError> {
        let rx = taken(self.unconfirmed_rx.take(), "unconfirmed")?;
        self.subscribe(EventGroup::Unconfirmed)?;
        Ok(rx)
    }

    pub fn partial(&mut self) -> Result<mpsc::UnboundedReceiver<TransactionSummary>, WalletError> {
        let rx = taken(self.partial_rx.take(), "partial")?;
        self.subscribe(EventGroup::Partial)?;
        Ok(rx)
    }

    pub fn new_blocks(&mut self) -> Result<mpsc::UnboundedReceiver<BlockInfo>, WalletError> {
        let rx = taken(self.block_rx.take(), "new block")?;
        self.subscribe(EventGroup::NewBlock)?;
        Ok(rx)
    }

    pub fn transaction_errors(
        &mut self,
    ) -> Result<mpsc::UnboundedReceiver<TransactionStatusError>, WalletError> {
        let rx = taken(self.error_rx.take(), "transaction error")?;
        self.subscribe(EventGroup::TransactionError)?;
        Ok(rx)
    }

    /// Closes the wallet did not ask for. Intentional `close` calls end the
    /// event channels without emitting here.
    pub fn close_events(&mut self) -> Result<mpsc::UnboundedReceiver<CloseReason>, WalletError> {
        taken(self.close_rx.take(), "close")
    }

    fn subscribe(&self, group: EventGroup) -> Result<(), WalletError> {
        self.commands
            .send(DriverCommand::Subscribe(group))
            .map_err(|_| WalletError::ListenerClosed("listener driver is gone".to_string()))
    }

    /// Close the socket on purpose. Safe to call more than once; later calls
    /// are no-ops.
    pub async fn close(&mut self) {
        if self.interrupted.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(DriverCommand::Close);
        if let Some(driver) = self.driver.take() {
            if timeout(CLOSE_TIMEOUT, driver).await.is_err() {
                log::warn!("⚠️ Listener driver did not stop in time");
            }
        }
        log::info!("🧹 Listener on {} closed", self.node_url);
    }
}

impl Drop for ConfirmationListener {
    fn drop(&mut self) {
        self.interrupted.store(true, Ordering::SeqCst);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

struct ListenerDriver {
    ws: WsStream,
    uid: String,
    rest: NodeClient,
    scope: AccountScope,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
    interrupted: Arc<AtomicBool>,
    confirmed_tx: mpsc::UnboundedSender<TransactionSummary>,
    unconfirmed_tx: mpsc::UnboundedSender<TransactionSummary>,
    partial_tx: mpsc::UnboundedSender<TransactionSummary>,
    block_tx: mpsc::UnboundedSender<BlockInfo>,
    error_tx: mpsc::UnboundedSender<TransactionStatusError>,
    close_tx: mpsc::UnboundedSender<CloseReason>,
    confirmed_on: bool,
    unconfirmed_on: bool,
    partial_on: bool,
    blocks_on: bool,
    errors_on: bool,
    block_topic_subscribed: bool,
}

impl ListenerDriver {
    async fn run(mut self) {
        let close = loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(DriverCommand::Subscribe(group)) => {
                            if let Err(e) = self.apply_subscription(group).await {
                                log::warn!("⚠️ Subscription failed: {}", e);
                                break CloseReason { code: 1006, reason: e };
                            }
                        }
                        Some(DriverCommand::Close) | None => {
                            let _ = self.ws.send(Message::Close(None)).await;
                            break CloseReason { code: 1000, reason: "closed by wallet".to_string() };
                        }
                    }
                }
                frame = self.ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = self.ws.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break frame
                                .map(|f| CloseReason {
                                    code: f.code.into(),
                                    reason: f.reason.into_owned(),
                                })
                                .unwrap_or(CloseReason { code: 1005, reason: String::new() });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            break CloseReason { code: 1006, reason: e.to_string() };
                        }
                        None => {
                            break CloseReason { code: 1006, reason: "connection reset".to_string() };
                        }
                    }
                }
            }
        };

        if !self.interrupted.load(Ordering::SeqCst) {
            log::warn!("⚠️ Listener closed by node: {} ({})", close.reason, close.code);
            let _ = self.close_tx.send(close);
        }
    }

    async fn apply_subscription(&mut self, group: EventGroup) -> Result<(), String> {
        let topic = match group {
            EventGroup::Confirmed | EventGroup::NewBlock => {
                match group {
                    EventGroup::Confirmed => self.confirmed_on = true,
                    _ => self.blocks_on = true,
                }
                if self.block_topic_subscribed {
                    return Ok(());
                }
                self.block_topic_subscribed = true;
                "block".to_string()
            }
            EventGroup::Unconfirmed => {
                self.unconfirmed_on = true;
                format!("unconfirmedAdded/{}", self.scope.address)
            }
            EventGroup::Partial => {
                self.partial_on = true;
                format!("partialAdded/{}", self.scope.address)
            }
            EventGroup::TransactionError => {
                self.errors_on = true;
                format!("status/{}", self.scope.address)
            }
        };

        let frame = serde_json::json!({ "uid": self.uid, "subscribe": topic });
        self.ws
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| e.to_string())
    }

    async fn handle_text(&mut self, text: &str) {
        let event: WsEventDto = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("Unparseable listener frame skipped: {}", e);
                return;
            }
        };

        if event.topic == "block" {
            self.handle_block(event.data).await;
        } else if event.topic.starts_with("unconfirmedAdded") {
            self.handle_added(event.data, false).await;
        } else if event.topic.starts_with("partialAdded") {
            self.handle_added(event.data, true).await;
        } else if event.topic.starts_with("status") {
            if !self.errors_on {
                return;
            }
            match serde_json::from_value::<TransactionStatusError>(event.data) {
                Ok(error) => {
                    let _ = self.error_tx.send(error);
                }
                Err(e) => log::debug!("Unparseable status event skipped: {}", e),
            }
        }
    }

    async fn handle_block(&mut self, data: serde_json::Value) {
        let block: WsBlockDto = match serde_json::from_value(data) {
            Ok(block) => block,
            Err(e) => {
                log::debug!("Unparseable block event skipped: {}", e);
                return;
            }
        };
        let height = match block.block.height.parse::<u64>() {
            Ok(height) => height,
            Err(_) => {
                log::debug!("Block event with bad height '{}' skipped", block.block.height);
                return;
            }
        };

        if self.blocks_on {
            let _ = self.block_tx.send(BlockInfo {
                height,
                timestamp: block.block.timestamp.parse().unwrap_or(0),
                hash: block.meta.hash.clone(),
            });
        }

        if !self.confirmed_on {
            return;
        }
        // The block topic carries no transactions; fetch them and pick out
        // the ones touching the scoped account, preserving block order.
        match self.rest.block_transactions(height).await {
            Ok(transactions) => {
                for summary in transactions {
                    if summary_matches_scope(&summary, &self.scope) {
                        let _ = self.confirmed_tx.send(summary);
                    }
                }
            }
            Err(e) => log::warn!("⚠️ Block {} transaction fetch failed: {}", height, e),
        }
    }

    async fn handle_added(&mut self, data: serde_json::Value, partial: bool) {
        if (partial && !self.partial_on) || (!partial && !self.unconfirmed_on) {
            return;
        }
        let added: WsAddedDto = match serde_json::from_value(data) {
            Ok(added) => added,
            Err(e) => {
                log::debug!("Unparseable added event skipped: {}", e);
                return;
            }
        };

        let fetched = if partial {
            self.rest.partial_transaction(&added.meta.hash).await
        } else {
            self.rest.unconfirmed_transaction(&added.meta.hash).await
        };
        // Address topics are node-chosen; apply the same scope match as the
        // confirmed path before anything reaches the wallet.
        match fetched {
            Ok(Some(summary)) if summary_matches_scope(&summary, &self.scope) => {
                let tx = if partial { &self.partial_tx } else { &self.unconfirmed_tx };
                let _ = tx.send(summary);
            }
            Ok(Some(summary)) => {
                log::debug!("Transaction {} does not touch the scoped account", summary.hash);
            }
            Ok(None) => log::debug!("Transaction {} already left the pool", added.meta.hash),
            Err(e) => log::warn!("⚠️ Transaction {} fetch failed: {}", added.meta.hash, e),
        }
    }
}

async fn read_uid(ws: &mut WsStream) -> Result<String, WalletError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame: UidFrameDto = serde_json::from_str(&text).map_err(|e| {
                    WalletError::ListenerOpen(format!("handshake frame invalid: {}", e))
                })?;
                return Ok(frame.uid);
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(other)) => {
                return Err(WalletError::ListenerOpen(format!(
                    "unexpected handshake frame: {:?}",
                    other
                )));
            }
            Some(Err(e)) => return Err(WalletError::ListenerOpen(e.to_string())),
            None => {
                return Err(WalletError::ListenerOpen(
                    "socket closed during handshake".to_string(),
                ));
            }
        }
    }
}

/// Confirmed events match when the account signed the transaction or is its
/// recipient. Hex keys and addresses compare case-insensitively.
fn summary_matches_scope(summary: &TransactionSummary, scope: &AccountScope) -> bool {
    summary.signer_public_key.eq_ignore_ascii_case(&scope.public_key)
        || summary
            .recipient_address
            .as_deref()
            .map(|addr| addr.eq_ignore_ascii_case(&scope.address))
            .unwrap_or(false)
}

fn taken<T>(rx: Option<T>, group: &str) -> Result<T, WalletError> {
    rx.ok_or_else(|| WalletError::InvalidState(format!("{} channel already taken", group)))
}

fn websocket_url(node_url: &str) -> String {
    let base = node_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws", ws)
}

#[derive(Debug, Deserialize)]
struct UidFrameDto {
    uid: String,
}

#[derive(Debug, Deserialize)]
struct WsEventDto {
    topic: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WsBlockDto {
    block: WsBlockBodyDto,
    #[serde(default)]
    meta: WsBlockMetaDto,
}

#[derive(Debug, Deserialize)]
struct WsBlockBodyDto {
    height: String,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
struct WsBlockMetaDto {
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsAddedDto {
    meta: WsAddedMetaDto,
}

#[derive(Debug, Deserialize)]
struct WsAddedMetaDto {
    hash: String,
}
