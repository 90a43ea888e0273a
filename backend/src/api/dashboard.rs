//! Dashboard API handlers
//!
//! Latest snapshot, on-demand refresh, and a Server-Sent Events feed of
//! snapshots for clients that do not speak WebSocket.

use crate::dashboard::DashboardSnapshot;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{Json, Response},
};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

/// GET /api/dashboard - Latest snapshot
pub async fn get_dashboard(State(state): State<SharedState>) -> Json<DashboardSnapshot> {
    Json(state.poller.snapshot())
}

/// POST /api/dashboard/refresh - Poll the gateway now and return the result
pub async fn refresh_dashboard(State(state): State<SharedState>) -> Json<DashboardSnapshot> {
    debug!("Manual dashboard refresh");
    Json(state.poller.refresh().await)
}

/// GET /api/dashboard/stream - Snapshots as Server-Sent Events
pub async fn stream_dashboard(State(state): State<SharedState>) -> Result<Response, AppError> {
    let events = snapshot_events(WatchStream::new(state.poller.subscribe()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(events))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build SSE response: {}", e)))
}

/// Format each snapshot as one SSE `data:` frame
fn snapshot_events<S>(snapshots: S) -> impl Stream<Item = Result<String, std::io::Error>>
where
    S: Stream<Item = DashboardSnapshot>,
{
    use async_stream::stream;

    stream! {
        futures_util::pin_mut!(snapshots);
        while let Some(snapshot) = snapshots.next().await {
            match serde_json::to_string(&snapshot) {
                Ok(json) => yield Ok(format!("data: {}\n\n", json)),
                Err(e) => debug!(error = %e, "Skipping unserializable snapshot"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_events_format() {
        let snapshot = DashboardSnapshot {
            error: Some("Connection closed".to_string()),
            ..Default::default()
        };
        let frames: Vec<String> = snapshot_events(futures_util::stream::iter(vec![snapshot]))
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with("data: {"));
        assert!(frames[0].ends_with("\n\n"));
        assert!(frames[0].contains("\"error\":\"Connection closed\""));
    }
}
