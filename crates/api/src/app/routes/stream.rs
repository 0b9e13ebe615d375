//! Admin push channel over Server-Sent Events.
//!
//! Each stream is one attached session. The first frame (`session`) carries
//! the session handle; every committed status change follows as a `status`
//! frame whose `id` is `<entity_type>/<entity_id>/<seq>`. When the session's
//! queue overflows the server ends the stream, and the client reconnects
//! with `replay_since` set to the last `committed_at` it saw (or
//! `replay_buffered=true` to receive the whole replay buffer).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{info, warn};

use resellsync_core::ConnectionId;
use resellsync_events::{Broadcaster, SessionHandle, StatusEvent};

use crate::app::dto::{self, StreamQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AdminContext;

/// GET /admin/stream?connection_id=…&replay_since=…&replay_buffered=…
///
/// Reusing a `connection_id` re-attaches: the older stream for that id stops
/// receiving and is closed.
pub async fn admin_stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let connection_id = match query.connection_id.as_deref() {
        Some(raw) => dto::parse_id::<ConnectionId>(raw, "connection_id")?,
        None => ConnectionId::new(),
    };

    let (tx, rx) = mpsc::channel::<StatusEvent>(services.config().session_buffer);
    let transport = services.transport().clone();
    let broadcaster = services.broadcaster().clone();

    let (handle, replayed) = broadcaster.connect(
        admin.principal_id(),
        connection_id,
        query.replay_from(),
        |handle| transport.register(handle, tx),
    )?;

    info!(
        connection_id = %connection_id,
        principal_id = %admin.principal_id(),
        generation = handle.generation,
        replayed = replayed.delivered,
        "admin stream opened"
    );

    let guard = SessionGuard {
        broadcaster,
        handle,
    };
    let hello = tokio_stream::once(Ok::<_, Infallible>(session_frame(&handle)));
    let events = ReceiverStream::new(rx).map(move |event| {
        let _attached = &guard;
        Ok::<_, Infallible>(status_frame(&event))
    });

    Ok(Sse::new(hello.chain(events)).keep_alive(KeepAlive::new().interval(services.config().keepalive)))
}

/// GET /admin/events
///
/// Contents of the replay buffer, oldest first.
pub async fn recent_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(_admin): Extension<AdminContext>,
) -> Json<Vec<StatusEvent>> {
    Json(services.broadcaster().recent())
}

/// Detaches the session when the response stream is dropped.
struct SessionGuard {
    broadcaster: Arc<Broadcaster>,
    handle: SessionHandle,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.broadcaster.disconnect(&self.handle);
        info!(
            connection_id = %self.handle.connection_id,
            generation = self.handle.generation,
            "admin stream closed"
        );
    }
}

fn session_frame(handle: &SessionHandle) -> SseEvent {
    SseEvent::default()
        .event("session")
        .json_data(handle)
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to encode session frame");
            SseEvent::default().event("session")
        })
}

fn status_frame(event: &StatusEvent) -> SseEvent {
    let id = format!("{}/{}", event.topic(), event.seq());
    match SseEvent::default().event("status").id(id).json_data(event) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, topic = %event.topic(), "failed to encode status frame");
            SseEvent::default().comment("dropped unencodable event")
        }
    }
}
