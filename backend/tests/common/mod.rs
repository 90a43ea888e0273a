//! Shared helpers for integration tests: an in-process fake gateway

#![allow(dead_code)]

use agent_dashboard_backend::gateway::{
    ChannelConnector, ChannelPeer, GatewayClient, GatewaySettings,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const GATEWAY_URL: &str = "ws://gateway.test:18789";

/// A client wired to an in-memory connector, plus the stream of sockets it opens
pub fn fake_client() -> (
    GatewayClient,
    Arc<ChannelConnector>,
    mpsc::UnboundedReceiver<ChannelPeer>,
) {
    let (connector, peers) = ChannelConnector::new();
    let connector = Arc::new(connector);
    let client = GatewayClient::new(
        GatewaySettings::new(GATEWAY_URL, Some("test-token")),
        connector.clone(),
    );
    (client, connector, peers)
}

/// Take the next socket and accept its handshake
pub async fn accept(peers: &mut mpsc::UnboundedReceiver<ChannelPeer>) -> ChannelPeer {
    let mut peer = peers.recv().await.expect("client should open a socket");
    let hello = peer.recv_request().await.expect("handshake request");
    assert_eq!(hello.method, "connect");
    peer.respond_ok(&hello.id, json!({"type": "hello-ok", "protocol": 3}));
    peer
}

/// Canned payload for each gateway method
pub fn fixture(method: &str) -> Value {
    match method {
        "connect" => json!({"type": "hello-ok", "protocol": 3}),
        "health" => json!({
            "ok": true,
            "channels": {"telegram": {"ok": true}},
            "agents": [
                {"agentId": "main", "name": "Main", "isDefault": true,
                 "sessions": {"count": 2, "recent": [{"key": "agent:main", "updatedAt": 1, "age": 5}]}},
                {"agentId": "coder", "name": "Coder", "isDefault": false,
                 "sessions": {"count": 0, "recent": []}}
            ]
        }),
        "status" => json!({
            "heartbeat": {"defaultAgentId": "main", "agents": [{"agentId": "main", "enabled": true, "every": "30m"}]},
            "sessions": {
                "count": 1,
                "recent": [{"agentId": "main", "key": "agent:main", "sessionId": "s1",
                            "updatedAt": 1, "age": 5, "totalTokens": 1000, "percentUsed": 12.5, "model": "opus"}],
                "byAgent": [{"agentId": "main", "count": 1, "recent": []}]
            }
        }),
        "cron.list" => json!({
            "jobs": [{
                "id": "digest", "agentId": "main", "name": "Daily digest", "enabled": true,
                "schedule": {"kind": "cron", "expr": "0 9 * * *", "tz": "Asia/Tokyo"},
                "state": {"lastRunAtMs": 1, "lastStatus": "ok", "lastDurationMs": 1200,
                          "consecutiveErrors": 0, "nextRunAtMs": 2}
            }]
        }),
        _ => json!({}),
    }
}

/// Answer every request on every socket with [`fixture`] payloads
pub fn serve_fixtures(mut peers: mpsc::UnboundedReceiver<ChannelPeer>) {
    tokio::spawn(async move {
        while let Some(mut peer) = peers.recv().await {
            tokio::spawn(async move {
                while let Some(request) = peer.recv_request().await {
                    peer.respond_ok(&request.id, fixture(&request.method));
                }
            });
        }
    });
}
