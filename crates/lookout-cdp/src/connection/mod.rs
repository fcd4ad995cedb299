//! CDP WebSocket connection management.

pub mod discovery;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::CdpError;
use crate::transport::{CdpEvent, CdpMessage, CdpRequest, CdpResponse};

/// Default timeout for CDP commands.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for the event broadcast channel.
///
/// Captures of busy pages can produce bursts of Network and Runtime events;
/// slow subscribers are lagged rather than blocking the read loop.
const EVENT_CHANNEL_SIZE: usize = 1024;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// A CDP connection to a browser.
///
/// One connection multiplexes the browser-level command stream and every
/// flattened session attached through it. Command/response matching is by
/// message id; events are fanned out to all subscribers.
#[derive(Debug)]
pub struct CdpConnection {
    /// Sender feeding the write loop.
    tx: mpsc::Sender<CdpRequest>,
    /// Broadcast side of the event fan-out.
    event_tx: broadcast::Sender<CdpEvent>,
    /// Responses awaited by in-flight commands.
    pending: PendingMap,
    /// Message id allocator.
    next_id: AtomicU64,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
    /// Connect to a CDP WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket connection fails.
    #[instrument(level = "info", skip(ws_url), fields(ws_url = %ws_url))]
    pub async fn connect(ws_url: &str) -> Result<Self, CdpError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(ws_url).await?;
        info!(status = %response.status(), "WebSocket connection established");

        let (write, read) = ws_stream.split();

        let (tx, rx) = mpsc::channel::<CdpRequest>(64);
        let (event_tx, _) = broadcast::channel::<CdpEvent>(EVENT_CHANNEL_SIZE);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let write_handle = tokio::spawn(Self::write_loop(rx, write));
        let read_handle = tokio::spawn(Self::read_loop(read, pending.clone(), event_tx.clone()));
        debug!("CDP read/write loops spawned");

        Ok(Self {
            tx,
            event_tx,
            pending,
            next_id: AtomicU64::new(1),
            _read_handle: read_handle,
            _write_handle: write_handle,
        })
    }

    /// Background task serializing requests onto the WebSocket.
    ///
    /// A single writer drains the channel in order, which is what makes
    /// command invocation sequentially consistent per session.
    async fn write_loop<S>(mut rx: mpsc::Receiver<CdpRequest>, mut sink: S)
    where
        S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        while let Some(request) = rx.recv().await {
            let json = match serde_json::to_string(&request) {
                Ok(j) => j,
                Err(e) => {
                    error!(error = %e, method = %request.method, "failed to serialize CDP request");
                    continue;
                }
            };

            trace!(id = request.id, method = %request.method, "sending CDP request");
            if sink.send(Message::Text(json.into())).await.is_err() {
                warn!("WebSocket sink closed, ending write loop");
                break;
            }
        }
        debug!("CDP write loop ended");
    }

    /// Background task demultiplexing incoming messages.
    async fn read_loop<S>(mut stream: S, pending: PendingMap, event_tx: broadcast::Sender<CdpEvent>)
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        while let Some(msg) = stream.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    info!(?frame, "WebSocket closed by remote");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "WebSocket error, ending read loop");
                    break;
                }
                Ok(_) => continue,
            };

            let cdp_msg: CdpMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(e) => {
                    error!(error = %e, "failed to parse CDP message");
                    continue;
                }
            };

            match cdp_msg {
                CdpMessage::Response(resp) => {
                    let waiter = pending.lock().remove(&resp.id);
                    if let Some(sender) = waiter {
                        let _ = sender.send(resp);
                    } else {
                        warn!(id = resp.id, "response for unknown request id");
                    }
                }
                CdpMessage::Event(event) => {
                    trace!(method = %event.method, session_id = ?event.session_id, "CDP event");
                    let _ = event_tx.send(event);
                }
            }
        }

        // Fail any still-pending commands so callers observe the loss
        // instead of hanging until their timeout.
        let orphaned: Vec<_> = pending.lock().drain().collect();
        if !orphaned.is_empty() {
            debug!(count = orphaned.len(), "dropping pending commands on read loop exit");
        }
        debug!("CDP read loop ended");
    }

    /// Send a CDP command and wait for the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent, the response times
    /// out, or the browser returns a protocol error.
    pub async fn send_command<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        session_id: Option<&str>,
    ) -> Result<R, CdpError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.send_command_with_timeout(method, params, session_id, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    /// Send a CDP command with a caller-supplied deadline.
    ///
    /// On deadline no cancellation is issued to the browser; the call is
    /// simply marked failed and its eventual response discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be sent, the deadline
    /// elapses, or the browser returns a protocol error.
    #[instrument(level = "debug", skip(self, params), fields(method = %method, session_id = ?session_id))]
    pub async fn send_command_with_timeout<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        session_id: Option<&str>,
        deadline: Duration,
    ) -> Result<R, CdpError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let params_value = params.map(serde_json::to_value).transpose()?;
        let request = CdpRequest::new(id, method, params_value, session_id);

        let (resp_tx, resp_rx) = oneshot::channel();
        self.pending.lock().insert(id, resp_tx);

        if self.tx.send(request).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(CdpError::ConnectionLost);
        }

        let response = match timeout(deadline, resp_rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => return Err(CdpError::ConnectionLost),
            Err(_) => {
                self.pending.lock().remove(&id);
                warn!(id = id, "CDP command timed out");
                return Err(CdpError::Timeout {
                    method: method.to_string(),
                    timeout: deadline,
                });
            }
        };

        if let Some(error) = response.error {
            warn!(id = id, code = error.code, error_msg = %error.message, "CDP protocol error");
            return Err(CdpError::Protocol {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(CdpError::from)
    }

    /// Subscribe to all CDP events on this connection.
    ///
    /// Events arrive in CDP order per session; ordering across sessions is
    /// not promised.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CdpEvent> {
        self.event_tx.subscribe()
    }

    /// A connection with no backing socket; every command fails with
    /// [`CdpError::ConnectionLost`]. Must be created inside a tokio runtime.
    #[cfg(test)]
    pub(crate) fn disconnected() -> Self {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let (event_tx, _) = broadcast::channel(8);
        Self {
            tx,
            event_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            _read_handle: tokio::spawn(async {}),
            _write_handle: tokio::spawn(async {}),
        }
    }
}
