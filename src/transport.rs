use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::env::ConnectionSettings;
use crate::errors::{ClientError, ClientResult};
use crate::protocol::{ClientCommand, Envelope, ServerReply};
use crate::snapshot::SnapshotCache;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

/// The request side of the transport, kept behind a trait so the coordinator
/// and facade can be exercised against an in-memory fake.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn request(&self, command: ClientCommand) -> ClientResult<ServerReply>;
}

/// Owns the persistent websocket connection to the game server.
///
/// Every outbound request is wrapped in an envelope with a fresh correlation
/// id and parked in the pending map until the matching reply arrives or the
/// timeout fires. Unsolicited pushes (no id) bypass the pending map and land
/// in the snapshot cache. On connection loss all pending requests are failed
/// immediately and reconnection is retried forever at a fixed delay.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    request_timeout: Duration,
    reconnect_delay: Duration,
    state: Mutex<ConnectionState>,
    ready: Notify,
    pending: Mutex<HashMap<Uuid, oneshot::Sender<ClientResult<ServerReply>>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    cache: SnapshotCache,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Transport {
    /// Parse the endpoint, start the connection task and hand back a handle.
    /// The task reconnects forever until `shutdown` aborts it.
    pub fn spawn(settings: &ConnectionSettings, cache: SnapshotCache) -> ClientResult<Self> {
        let url = Url::parse(&settings.server_url)
            .map_err(|_| ClientError::Server(format!("bad server url: {}", settings.server_url)))?;
        let inner = Arc::new(Inner {
            url,
            request_timeout: settings.request_timeout(),
            reconnect_delay: settings.reconnect_delay(),
            state: Mutex::new(ConnectionState::Disconnected),
            ready: Notify::new(),
            pending: Mutex::new(HashMap::new()),
            outbound: Mutex::new(None),
            cache,
            task: Mutex::new(None),
        });
        let task = tokio::spawn(run(inner.clone()));
        *inner.task.lock().unwrap() = Some(task);
        Ok(Self { inner })
    }

    /// Stop the connection task for good: no further reconnect attempts, and
    /// every request still in flight is failed as closed.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.task.lock().unwrap().take() {
            task.abort();
        }
        *self.inner.outbound.lock().unwrap() = None;
        self.inner.set_state(ConnectionState::Disconnected);
        self.inner.fail_all_pending();
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap()
    }

    /// Wait for the connection to be open, bounded by the request timeout.
    /// Woken by the state transition itself, not by polling.
    pub async fn ready(&self) -> ClientResult<()> {
        let wait = async {
            loop {
                let notified = self.inner.ready.notified();
                if self.state() == ConnectionState::Open {
                    return;
                }
                notified.await;
            }
        };
        timeout(self.inner.request_timeout, wait)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    async fn send_request(&self, command: ClientCommand) -> ClientResult<ServerReply> {
        // A v4 collision against the pending set is not a practical concern,
        // but the invariant is cheap to enforce outright.
        let (id, envelope) = loop {
            let (id, envelope) = Envelope::request(command.clone());
            if !self.inner.pending.lock().unwrap().contains_key(&id) {
                break (id, envelope);
            }
        };
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id, tx);

        let text = serde_json::to_string(&envelope)?;
        let sent = match self.inner.outbound.lock().unwrap().as_ref() {
            Some(out) => out.send(Message::Text(text)).is_ok(),
            None => false,
        };
        if !sent {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(ClientError::NotConnected);
        }
        debug!(%id, "request sent");

        match timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Resolver dropped without an answer: the pending set was torn
            // down underneath us by a disconnect.
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().unwrap().remove(&id);
                Err(ClientError::RequestTimeout { id })
            }
        }
    }
}

#[async_trait]
impl Requester for Transport {
    async fn request(&self, command: ClientCommand) -> ClientResult<ServerReply> {
        self.send_request(command).await
    }
}

async fn run(inner: Arc<Inner>) {
    loop {
        inner.set_state(ConnectionState::Connecting);
        match connect_async(inner.url.as_str()).await {
            Ok((socket, _)) => {
                info!(url = %inner.url, "websocket connected");
                let (sink, stream) = socket.split();
                let (tx, rx) = mpsc::unbounded_channel();
                *inner.outbound.lock().unwrap() = Some(tx);
                inner.set_state(ConnectionState::Open);
                inner.ready.notify_waiters();
                inner.drive(sink, stream, rx).await;
                info!("websocket connection lost");
            }
            Err(err) => {
                warn!(%err, url = %inner.url, "websocket connect failed");
            }
        }
        *inner.outbound.lock().unwrap() = None;
        inner.set_state(ConnectionState::Disconnected);
        inner.fail_all_pending();
        sleep(inner.reconnect_delay).await;
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Pump one live connection until it drops.
    async fn drive(
        &self,
        mut sink: WsSink,
        mut stream: WsStream,
        mut outbound: mpsc::UnboundedReceiver<Message>,
    ) {
        loop {
            tokio::select! {
                Some(msg) = outbound.recv() => {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "websocket read error");
                        break;
                    }
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let envelope: Envelope<ServerReply> = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "dropping malformed server envelope");
                return;
            }
        };

        // Every snapshot refreshes the cache, solicited or not.
        if let ServerReply::Snapshot(snapshot) = &envelope.message {
            self.cache.publish(snapshot.clone());
        }

        let Some(id) = envelope.id.as_deref().and_then(|id| Uuid::parse_str(id).ok()) else {
            if let ServerReply::Error(message) = &envelope.message {
                warn!(%message, "unsolicited server error");
            }
            return;
        };

        let Some(resolver) = self.pending.lock().unwrap().remove(&id) else {
            // Late reply for a request that already timed out.
            debug!(%id, "reply for unknown correlation id");
            return;
        };
        let result = match envelope.message {
            ServerReply::Error(message) => Err(ClientError::Server(message)),
            reply => Ok(reply),
        };
        let _ = resolver.send(result);
    }

    /// Reject every in-flight request with a closed error and clear the map.
    fn fail_all_pending(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };
        for (id, resolver) in drained {
            debug!(%id, "failing pending request on disconnect");
            let _ = resolver.send(Err(ClientError::ConnectionClosed));
        }
    }
}
