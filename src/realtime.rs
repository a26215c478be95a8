use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// One newly inserted row delivered to a subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub event: EventKind,
    pub row: Value,
}

#[derive(Debug)]
pub enum FeedCommand {
    Subscribe {
        id: u64,
        table: String,
        filter: Filter,
        event: EventKind,
        tx: mpsc::UnboundedSender<ChangeEvent>,
    },
    Unsubscribe {
        id: u64,
    },
}

/// Delivers matching rows until released. Dropping the subscription sends
/// the unsubscribe command in the same tick, so a replacement subscribe
/// issued afterwards through the same feed is always ordered behind it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    control: mpsc::UnboundedSender<FeedCommand>,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(
        id: u64,
        control: mpsc::UnboundedSender<FeedCommand>,
        rx: mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> Self {
        Self { id, control, rx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// `None` once the feed has shut down and drained.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.control.send(FeedCommand::Unsubscribe { id: self.id });
    }
}

pub trait ChangeFeed {
    fn subscribe(&self, table: &str, filter: Filter, event: EventKind) -> Result<Subscription>;
}

#[derive(Serialize)]
struct SubscribeFrame<'a> {
    action: &'static str,
    id: u64,
    table: &'a str,
    filter: &'a Filter,
    event: EventKind,
}

#[derive(Serialize)]
struct UnsubscribeFrame {
    action: &'static str,
    id: u64,
}

#[derive(Deserialize)]
struct InboundFrame {
    id: u64,
    table: String,
    event: EventKind,
    row: Value,
}

/// Websocket change-feed client. A single spawned listener task owns the
/// socket: it issues subscribe/unsubscribe frames on command and forwards
/// inbound rows to the matching subscriber channel.
pub struct WsChangeFeed {
    control: mpsc::UnboundedSender<FeedCommand>,
    next_id: AtomicU64,
}

impl WsChangeFeed {
    pub async fn connect(
        url: impl Into<String>,
        reconnect_attempts: u32,
        reconnect_delay: Duration,
    ) -> Result<Self> {
        let url = url.into();
        let socket = open_socket(&url).await?;
        debug!("feed: connected url={url}");

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(listener_loop(
            socket,
            url,
            control_rx,
            reconnect_attempts,
            reconnect_delay,
        ));

        Ok(Self {
            control: control_tx,
            next_id: AtomicU64::new(1),
        })
    }
}

impl ChangeFeed for WsChangeFeed {
    fn subscribe(&self, table: &str, filter: Filter, event: EventKind) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.control
            .send(FeedCommand::Subscribe {
                id,
                table: table.to_string(),
                filter,
                event,
                tx,
            })
            .map_err(|_| anyhow!("change feed listener has shut down"))?;
        Ok(Subscription::new(id, self.control.clone(), rx))
    }
}

struct ActiveSub {
    table: String,
    filter: Filter,
    event: EventKind,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

async fn open_socket(url: &str) -> Result<WsStream> {
    let (socket, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect change feed: {url}"))?;
    Ok(socket)
}

async fn listener_loop(
    mut socket: WsStream,
    url: String,
    mut control: mpsc::UnboundedReceiver<FeedCommand>,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
) {
    let mut subs: HashMap<u64, ActiveSub> = HashMap::new();

    loop {
        tokio::select! {
            command = control.recv() => {
                match command {
                    Some(FeedCommand::Subscribe { id, table, filter, event, tx }) => {
                        // a failed frame shows up as a read error next turn;
                        // the reconnect path re-issues every live subscription
                        if let Err(err) = send_subscribe(&mut socket, id, &table, &filter, event).await {
                            warn!("feed: subscribe frame failed id={id}: {err:#}");
                        }
                        debug!("feed: subscribed id={id} table={table} {}={}", filter.column, filter.value);
                        subs.insert(id, ActiveSub { table, filter, event, tx });
                    }
                    Some(FeedCommand::Unsubscribe { id }) => {
                        subs.remove(&id);
                        debug!("feed: unsubscribed id={id}");
                        if let Err(err) = send_unsubscribe(&mut socket, id).await {
                            warn!("feed: unsubscribe frame failed id={id}: {err:#}");
                        }
                    }
                    None => break,
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => dispatch(&subs, &text),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("feed: socket error: {err}");
                        match reopen(&url, reconnect_attempts, reconnect_delay, &subs).await {
                            Some(replacement) => socket = replacement,
                            None => break,
                        }
                    }
                    None => {
                        warn!("feed: socket closed by peer");
                        match reopen(&url, reconnect_attempts, reconnect_delay, &subs).await {
                            Some(replacement) => socket = replacement,
                            None => break,
                        }
                    }
                }
            }
        }
    }
    // dropping subs closes every subscriber channel
    warn!("feed: listener stopped");
}

fn dispatch(subs: &HashMap<u64, ActiveSub>, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("feed: dropping malformed frame: {err}");
            return;
        }
    };
    // frames for a just-released subscription race the unsubscribe; ignore
    let Some(sub) = subs.get(&frame.id) else {
        return;
    };
    if sub.table != frame.table || sub.event != frame.event {
        warn!(
            "feed: frame does not match subscription id={} table={}",
            frame.id, frame.table
        );
        return;
    }
    let _ = sub.tx.send(ChangeEvent {
        table: frame.table,
        event: frame.event,
        row: frame.row,
    });
}

async fn send_subscribe(
    socket: &mut WsStream,
    id: u64,
    table: &str,
    filter: &Filter,
    event: EventKind,
) -> Result<()> {
    let frame = serde_json::to_string(&SubscribeFrame {
        action: "subscribe",
        id,
        table,
        filter,
        event,
    })
    .context("failed to encode subscribe frame")?;
    socket
        .send(WsMessage::Text(frame))
        .await
        .context("failed to send subscribe frame")
}

async fn send_unsubscribe(socket: &mut WsStream, id: u64) -> Result<()> {
    let frame = serde_json::to_string(&UnsubscribeFrame {
        action: "unsubscribe",
        id,
    })
    .context("failed to encode unsubscribe frame")?;
    socket
        .send(WsMessage::Text(frame))
        .await
        .context("failed to send unsubscribe frame")
}

async fn reopen(
    url: &str,
    attempts: u32,
    delay: Duration,
    subs: &HashMap<u64, ActiveSub>,
) -> Option<WsStream> {
    for attempt in 1..=attempts {
        tokio::time::sleep(delay).await;
        let mut socket = match open_socket(url).await {
            Ok(socket) => socket,
            Err(err) => {
                warn!("feed: reconnect attempt {attempt}/{attempts} failed: {err:#}");
                continue;
            }
        };
        let mut resubscribed = true;
        for (id, sub) in subs {
            if let Err(err) = send_subscribe(&mut socket, *id, &sub.table, &sub.filter, sub.event).await {
                warn!("feed: resubscribe failed id={id}: {err:#}");
                resubscribed = false;
                break;
            }
        }
        if resubscribed {
            debug!("feed: reconnected after {attempt} attempt(s)");
            return Some(socket);
        }
    }
    warn!("feed: reconnect attempts exhausted");
    None
}
