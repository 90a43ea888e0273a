//! Socket transports for the gateway client
//!
//! A [`Connector`] opens a [`Transport`]: an outbound text-frame sender plus an
//! inbound stream of [`TransportEvent`]s. The production connector speaks
//! WebSocket through `tokio-tungstenite`; [`ChannelConnector`] is an
//! in-process stand-in whose far end is handed to the caller.

use super::error::GatewayError;
use super::protocol::{self, ErrorShape, Frame, RequestFrame, ResponseFrame};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// Something that happened on the inbound side of a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text message
    Message(String),
    /// The socket closed or failed, with an optional reason
    Closed(Option<String>),
}

/// Sending half of an open transport
#[derive(Debug, Clone)]
pub struct TransportSender {
    outbound: mpsc::UnboundedSender<String>,
}

impl TransportSender {
    /// Queue one text frame for the socket
    pub fn send(&self, text: String) -> Result<(), GatewayError> {
        self.outbound
            .send(text)
            .map_err(|_| GatewayError::NotConnected)
    }

    /// Whether the socket is still accepting frames
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// An open socket
///
/// Dropping every [`TransportSender`] closes the socket.
#[derive(Debug)]
pub struct Transport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Transport {
    /// Assemble a transport from its two channel ends
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Separate the sending half from the inbound event stream
    pub fn split(self) -> (TransportSender, mpsc::UnboundedReceiver<TransportEvent>) {
        (
            TransportSender {
                outbound: self.outbound,
            },
            self.inbound,
        )
    }
}

/// Opens transports to a gateway endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `url`
    async fn open(&self, url: &Url) -> Result<Transport, GatewayError>;
}

/// Build the socket URL for an endpoint
///
/// `http(s)` endpoints are mapped onto `ws(s)`. A non-empty token is also
/// passed as the `token` query parameter.
pub fn websocket_url(endpoint: &str, token: Option<&str>) -> Result<Url, GatewayError> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(GatewayError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                other, endpoint
            )))
        }
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| GatewayError::InvalidUrl(endpoint.to_string()))?;
    }

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("token", token);
    }

    Ok(url)
}

/// Endpoint URL with the query string removed, for logging
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// WebSocket connector backed by `tokio-tungstenite`
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> Result<Transport, GatewayError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;

        debug!(url = %redacted(url), "Gateway socket opened");

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        // Writer: drains queued frames; ends when every sender is dropped
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                    warn!(error = %e, "Failed to write to gateway socket");
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        // Reader: forwards text frames until the socket closes
        tokio::spawn(async move {
            let reason = loop {
                match ws_read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx
                            .send(TransportEvent::Message(text.as_str().to_owned()))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.as_str().to_owned());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed(reason));
        });

        Ok(Transport::new(outbound_tx, inbound_rx))
    }
}

/// In-process connector
///
/// Each successful `open` hands a [`ChannelPeer`] (the gateway side of the
/// socket) to the receiver returned by [`ChannelConnector::new`].
#[derive(Debug)]
pub struct ChannelConnector {
    peers: mpsc::UnboundedSender<ChannelPeer>,
    opened: AtomicUsize,
    refusing: AtomicBool,
}

impl ChannelConnector {
    /// Create a connector and the stream of peers it will open
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                opened: AtomicUsize::new(0),
                refusing: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Make subsequent `open` calls fail
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Number of transports opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, url: &Url) -> Result<Transport, GatewayError> {
        tokio::task::yield_now().await;

        if self.refusing.load(Ordering::SeqCst) {
            return Err(GatewayError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let peer = ChannelPeer {
            url: url.clone(),
            from_client: outbound_rx,
            to_client: inbound_tx,
        };
        self.peers
            .send(peer)
            .map_err(|_| GatewayError::ConnectionFailed("no listener".to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Transport::new(outbound_tx, inbound_rx))
    }
}

/// Gateway side of a [`ChannelConnector`] socket
#[derive(Debug)]
pub struct ChannelPeer {
    url: Url,
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelPeer {
    /// URL the client opened
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Next raw frame written by the client; `None` once the client closed
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next request written by the client, skipping anything else
    pub async fn recv_request(&mut self) -> Option<RequestFrame> {
        while let Some(text) = self.recv().await {
            if let Ok(Frame::Request(request)) = serde_json::from_str::<Frame>(&text) {
                return Some(request);
            }
        }
        None
    }

    /// Whether the client has closed its side
    pub fn client_closed(&self) -> bool {
        self.from_client.is_closed()
    }

    /// Deliver raw text to the client
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Message(text.into()))
            .is_ok()
    }

    /// Answer `id` successfully
    pub fn respond_ok(&self, id: &str, payload: Value) -> bool {
        self.send_frame(Frame::Response(ResponseFrame {
            id: id.to_string(),
            ok: true,
            payload: Some(payload),
            error: None,
        }))
    }

    /// Answer `id` with an error
    pub fn respond_err(&self, id: &str, code: i64, message: &str) -> bool {
        self.send_frame(Frame::Response(ResponseFrame {
            id: id.to_string(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code,
                message: message.to_string(),
            }),
        }))
    }

    /// Push a frame to the client
    pub fn send_frame(&self, frame: Frame) -> bool {
        match protocol::encode(&frame) {
            Ok(text) => self.send_text(text),
            Err(_) => false,
        }
    }

    /// Close the socket from the gateway side
    pub fn close(&self, reason: Option<&str>) {
        let _ = self
            .to_client
            .send(TransportEvent::Closed(reason.map(str::to_string)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_keeps_ws_schemes() {
        let url = websocket_url("ws://127.0.0.1:18789", None).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:18789/");
        let url = websocket_url("wss://gateway.example.net", None).unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn test_websocket_url_maps_http_schemes() {
        assert_eq!(
            websocket_url("http://localhost:18789", None).unwrap().scheme(),
            "ws"
        );
        assert_eq!(
            websocket_url("https://gateway.example.net", None)
                .unwrap()
                .scheme(),
            "wss"
        );
    }

    #[test]
    fn test_websocket_url_appends_token() {
        let url = websocket_url("ws://localhost:18789/?x=1", Some("a b")).unwrap();
        assert_eq!(url.query(), Some("x=1&token=a+b"));
        let url = websocket_url("ws://localhost:18789", Some("")).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_websocket_url_rejects_garbage() {
        assert!(matches!(
            websocket_url("not a url", None),
            Err(GatewayError::InvalidUrl(_))
        ));
        assert!(matches!(
            websocket_url("ftp://host", None),
            Err(GatewayError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_redacted_hides_token() {
        let url = websocket_url("ws://localhost:18789", Some("secret")).unwrap();
        assert!(!redacted(&url).contains("secret"));
    }

    #[tokio::test]
    async fn test_channel_connector_round_trip() {
        let (connector, mut peers) = ChannelConnector::new();
        let url = websocket_url("ws://gateway.test", None).unwrap();
        let (sender, mut inbound) = connector.open(&url).await.unwrap().split();
        let mut peer = peers.recv().await.unwrap();
        assert_eq!(connector.opened(), 1);

        sender.send("hello".to_string()).unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("hello"));

        assert!(peer.send_text("world"));
        assert_eq!(
            inbound.recv().await,
            Some(TransportEvent::Message("world".to_string()))
        );

        drop(sender);
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn test_channel_connector_refusing() {
        let (connector, _peers) = ChannelConnector::new();
        connector.set_refusing(true);
        let url = websocket_url("ws://gateway.test", None).unwrap();
        assert!(matches!(
            connector.open(&url).await,
            Err(GatewayError::ConnectionFailed(_))
        ));
        assert_eq!(connector.opened(), 0);
    }
}
