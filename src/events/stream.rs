//! SSE endpoints for live notification and project updates.
//!
//! Each handler subscribes to the hub first and only then fetches the
//! entity's current state for the initial frame, so an update published
//! while the snapshot fetch is in flight lands in the queue instead of
//! being lost. Dropping the response stream (client disconnect) runs the
//! subscription guard exactly once, which removes the queue from the hub.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{AppendHeaders, IntoResponse};
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::events::hub::{EventHub, Subscription};
use crate::events::snapshot::SnapshotError;
use crate::state::AppState;

/// GET /api/members/{member_id}/notifications/stream
/// First frame is the member's current notification list.
pub async fn notification_stream(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    // Subscribe before fetching the snapshot; the queue buffers anything
    // published mid-fetch until the stream starts draining it.
    let Subscription { id, receiver } = state.notification_events.connect(&member_id);
    let guard = SubscriptionGuard {
        hub: state.notification_events.clone(),
        entity_id: member_id.clone(),
        id,
    };

    let snapshot = state
        .snapshots
        .member_notifications(&member_id)
        .await
        .map_err(internal_error)?;

    tracing::info!(member_id = %member_id, "notification stream subscriber connected");
    Ok(sse_response(guard, receiver, snapshot.to_string()))
}

/// GET /api/projects/{project_id}/stream
/// First frame is the current project state; 404 if the project is unknown.
pub async fn project_stream(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let Subscription { id, receiver } = state.project_events.connect(&project_id);
    let guard = SubscriptionGuard {
        hub: state.project_events.clone(),
        entity_id: project_id.clone(),
        id,
    };

    // An error return drops the guard, which unsubscribes the queue
    let snapshot = state
        .snapshots
        .project_state(&project_id)
        .await
        .map_err(|e| match e {
            SnapshotError::NotFound => StatusCode::NOT_FOUND,
            other => internal_error(other),
        })?;

    tracing::info!(project_id = %project_id, "project stream subscriber connected");
    Ok(sse_response(guard, receiver, snapshot.to_string()))
}

fn internal_error(e: SnapshotError) -> StatusCode {
    tracing::error!(error = %e, "snapshot fetch failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Removes the subscriber queue from the hub when the response stream is
/// dropped, however the stream ends.
struct SubscriptionGuard {
    hub: EventHub,
    entity_id: String,
    id: Uuid,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.disconnect(&self.entity_id, self.id);
    }
}

/// Build the streamed response: snapshot frame, then the live queue, with
/// no-cache / no-buffering headers and periodic keep-alive comments.
fn sse_response(
    guard: SubscriptionGuard,
    receiver: mpsc::UnboundedReceiver<String>,
    first_frame: String,
) -> impl IntoResponse {
    let initial =
        stream::once(async move { Ok::<Event, Infallible>(Event::default().data(first_frame)) });
    let live = UnboundedReceiverStream::new(receiver)
        .map(|payload| Ok::<Event, Infallible>(Event::default().data(payload)));

    // The guard rides inside the closure so it drops with the stream
    let frames = initial.chain(live).map(move |frame| {
        let _held = &guard;
        frame
    });

    (
        AppendHeaders([
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ]),
        Sse::new(frames).keep_alive(KeepAlive::new()),
    )
}
