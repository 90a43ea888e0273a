//! Gateway client
//!
//! One logical connection to the gateway: opens the socket, performs the
//! versioned `connect` handshake, multiplexes correlated calls over the
//! socket, and fails every outstanding call when the socket goes away.
//!
//! Concurrent `connect()` callers share a single in-flight attempt, and every
//! `call()` goes through `connect()` first, so no ordinary request can reach
//! the gateway before the handshake has been accepted.

use super::error::GatewayError;
use super::pending::{CallOutcome, PendingCalls};
use super::protocol::{self, ConnectParams, EventFrame, Frame, Inbound, RequestFrame};
use super::settings::GatewaySettings;
use super::state::{ConnectionState, LifecycleEvent};
use super::transport::{self, Connector, TransportEvent, TransportSender};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};
use uuid::Uuid;

/// Deadline for the `connect` handshake (and for opening the socket)
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for ordinary calls
pub const CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

type ConnectAttempt = Shared<BoxFuture<'static, Result<(), GatewayError>>>;

/// Socket-owning part of the client, guarded by one lock
#[derive(Default)]
struct Connection {
    state: ConnectionState,
    socket: Option<TransportSender>,
    /// Bumped for every connect attempt and every explicit disconnect, so
    /// work belonging to a superseded socket can recognise itself as stale.
    generation: u64,
    in_flight: Option<ConnectAttempt>,
}

impl Connection {
    fn open_socket(&self) -> Option<TransportSender> {
        self.socket.as_ref().filter(|s| s.is_open()).cloned()
    }
}

struct Inner {
    settings: GatewaySettings,
    connector: Arc<dyn Connector>,
    conn: Mutex<Connection>,
    pending: Arc<PendingCalls>,
    events: broadcast::Sender<EventFrame>,
    handshake_timeout: Duration,
    call_timeout: Duration,
}

/// Handle to a gateway connection
///
/// Cheap to clone; clones share the same socket and pending-call table.
/// Dropping the last clone disconnects, even with a connect attempt in flight.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
    _owner: Arc<Owner>,
}

/// Shared by every clone of one client; its drop marks the last clone gone
///
/// An in-flight attempt keeps `Inner` alive on its own, so the socket has to
/// be released explicitly.
struct Owner {
    inner: Weak<Inner>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.shutdown();
        }
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("settings", &self.inner.settings)
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl GatewayClient {
    /// Create a disconnected client for `settings`
    pub fn new(settings: GatewaySettings, connector: Arc<dyn Connector>) -> Self {
        Self::with_timeouts(settings, connector, HANDSHAKE_TIMEOUT, CALL_TIMEOUT)
    }

    /// Create a disconnected client with custom deadlines
    pub fn with_timeouts(
        settings: GatewaySettings,
        connector: Arc<dyn Connector>,
        handshake_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            settings,
            connector,
            conn: Mutex::new(Connection::default()),
            pending: Arc::new(PendingCalls::new()),
            events,
            handshake_timeout,
            call_timeout,
        });
        let owner = Arc::new(Owner {
            inner: Arc::downgrade(&inner),
        });
        Self {
            inner,
            _owner: owner,
        }
    }

    /// Settings this client was built with
    pub fn settings(&self) -> &GatewaySettings {
        &self.inner.settings
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Whether the handshake completed and the socket is still open
    pub fn is_connected(&self) -> bool {
        let conn = self.inner.lock();
        conn.state == ConnectionState::Ready && conn.open_socket().is_some()
    }

    /// Number of calls awaiting a response
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Subscribe to unsolicited gateway events
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventFrame> {
        self.inner.events.subscribe()
    }

    /// Make sure the connection is ready
    ///
    /// Returns at once when already connected. Callers arriving while an
    /// attempt is in flight join it and observe the same outcome.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let attempt = {
            let mut conn = self.inner.lock();
            if conn.state == ConnectionState::Ready && conn.open_socket().is_some() {
                return Ok(());
            }

            match conn.in_flight.clone() {
                Some(attempt) => attempt,
                None => {
                    // Ready with a dead writer: the close has not been
                    // dispatched yet, so tear down before starting over.
                    if conn.state != ConnectionState::Disconnected {
                        self.inner
                            .apply(&mut conn, LifecycleEvent::TransportClosed);
                    }
                    self.inner
                        .apply(&mut conn, LifecycleEvent::ConnectRequested);
                    conn.generation += 1;

                    let attempt = Arc::clone(&self.inner)
                        .establish(conn.generation)
                        .boxed()
                        .shared();
                    conn.in_flight = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Close the connection; safe to call at any time
    pub fn disconnect(&self) {
        self.inner.shutdown();
    }

    /// Issue a correlated call and wait for its payload
    pub async fn call(&self, method: &str, params: Option<Value>) -> CallOutcome {
        self.connect().await?;

        let socket = {
            let conn = self.inner.lock();
            if conn.state == ConnectionState::Ready {
                conn.open_socket()
            } else {
                None
            }
        }
        .ok_or(GatewayError::NotConnected)?;

        self.inner
            .request(&socket, method, params, self.inner.call_timeout)
            .await
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run one lifecycle event through the transition table
    fn apply(&self, conn: &mut Connection, event: LifecycleEvent) {
        let Some(transition) = conn.state.on(event) else {
            trace!(state = ?conn.state, ?event, "Ignoring lifecycle event");
            return;
        };

        if transition.next != conn.state {
            debug!(
                from = ?conn.state,
                to = ?transition.next,
                ?event,
                "Gateway connection state changed"
            );
        }
        conn.state = transition.next;

        if transition.release_socket {
            conn.socket = None;
        }
        if transition.fail_pending {
            let failed = self.pending.fail_all(GatewayError::ConnectionClosed);
            if failed > 0 {
                debug!(failed, "Failed pending gateway calls on close");
            }
        }
    }

    /// Abandon any in-flight attempt and close the socket
    fn shutdown(&self) {
        let abandoned = {
            let mut conn = self.lock();
            conn.generation += 1;
            self.apply(&mut conn, LifecycleEvent::DisconnectRequested);
            conn.in_flight.take()
        };
        // Dropped outside the lock: the attempt owns pending-call handles
        drop(abandoned);
    }

    async fn establish(self: Arc<Self>, generation: u64) -> Result<(), GatewayError> {
        let result = self.open_and_handshake(generation).await;

        let mut conn = self.lock();
        if conn.generation != generation {
            // disconnect() ran while this attempt was in flight
            return Err(GatewayError::ConnectionClosed);
        }
        conn.in_flight = None;

        match &result {
            Ok(()) => self.apply(&mut conn, LifecycleEvent::HandshakeAccepted),
            Err(e) => {
                debug!(error = %e, "Gateway connect attempt failed");
                let event = if conn.state == ConnectionState::Connecting {
                    LifecycleEvent::TransportClosed
                } else {
                    LifecycleEvent::HandshakeFailed
                };
                self.apply(&mut conn, event);
            }
        }
        result
    }

    async fn open_and_handshake(self: &Arc<Self>, generation: u64) -> Result<(), GatewayError> {
        let url = transport::websocket_url(&self.settings.url, self.settings.token())?;
        debug!(url = %transport::redacted(&url), "Opening gateway connection");

        let transport = tokio::time::timeout(self.handshake_timeout, self.connector.open(&url))
            .await
            .map_err(|_| {
                GatewayError::ConnectionFailed(format!(
                    "timed out after {}s opening {}",
                    self.handshake_timeout.as_secs(),
                    transport::redacted(&url)
                ))
            })??;

        let socket = {
            let mut conn = self.lock();
            if conn.generation != generation {
                return Err(GatewayError::ConnectionClosed);
            }
            let (socket, inbound) = transport.split();
            conn.socket = Some(socket.clone());
            self.apply(&mut conn, LifecycleEvent::TransportOpened);
            tokio::spawn(dispatch(Arc::downgrade(self), generation, inbound));
            socket
        };

        let params = serde_json::to_value(ConnectParams::new(self.settings.token()))
            .map_err(|e| GatewayError::Encode(e.to_string()))?;

        let hello = self
            .request(
                &socket,
                protocol::CONNECT_METHOD,
                Some(params),
                self.handshake_timeout,
            )
            .await
            .map_err(|e| match e {
                GatewayError::Remote { code, message } => GatewayError::Handshake { code, message },
                other => other,
            })?;

        debug!(
            protocol = ?hello.get("protocol"),
            "Gateway handshake accepted"
        );
        Ok(())
    }

    /// Send one request on `socket` and wait for its outcome
    async fn request(
        &self,
        socket: &TransportSender,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> CallOutcome {
        let id = Uuid::new_v4().to_string();
        let text = protocol::encode(&Frame::Request(RequestFrame {
            id: id.clone(),
            method: method.to_string(),
            params,
        }))?;

        let call = self.pending.register(id);
        socket.send(text)?;
        trace!(id = %call.id(), method, "Sent gateway request");

        call.wait(method, deadline).await
    }

    fn handle_message(&self, text: &str) {
        match protocol::decode(text) {
            Inbound::Response(frame) => {
                self.pending.resolve(frame);
            }
            Inbound::Event(event) => {
                trace!(event = %event.event, "Gateway event");
                // No subscribers is fine
                let _ = self.events.send(event);
            }
            Inbound::Ignored(kind) => trace!(kind = %kind, "Ignoring gateway frame"),
            Inbound::Malformed => trace!(len = text.len(), "Dropping malformed gateway frame"),
        }
    }

    fn handle_close(&self, generation: u64, reason: Option<String>) {
        let mut conn = self.lock();
        if conn.generation != generation {
            return;
        }
        debug!(reason = ?reason, "Gateway socket closed");
        self.apply(&mut conn, LifecycleEvent::TransportClosed);
    }
}

/// Inbound path of one socket: routes frames until the socket closes
///
/// Holds only a weak reference so an abandoned client does not keep its
/// socket alive.
async fn dispatch(
    inner: Weak<Inner>,
    generation: u64,
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = inbound.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Message(text) => inner.handle_message(&text),
            TransportEvent::Closed(reason) => {
                inner.handle_close(generation, reason);
                return;
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.handle_close(generation, None);
    }
}
