use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use flowgate_engine::{EngineError, Instance};
use flowgate_schema::{
    PipelineRunEvent, PipelineRunLogsSubscriptionFailure, PipelineRunLogsSubscriptionPayload,
    PipelineRunLogsSubscriptionSuccess,
};
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// GET /api/v1/runs/{id}/logs
///
/// Upgrades to a WebSocket streaming the run's log as
/// `PipelineRunLogsSubscriptionPayload` frames: the history first, then
/// live batches, then a Close frame once the run is terminal.
pub async fn run_logs(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.instance, state.ws_manager, run_id))
}

/// Manage a single subscription after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Spawns a producer task that feeds the run's events into the channel.
///   4. Processes inbound messages on the current task.
///   5. Cleans up on disconnect.
async fn handle_socket(
    socket: WebSocket,
    instance: Arc<Instance>,
    ws_manager: Arc<WsManager>,
    run_id: String,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, run_id = %run_id, "Log subscription opened");

    let mut rx = ws_manager.add(conn_id.clone(), run_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let produce_task = tokio::spawn(produce(
        instance,
        Arc::clone(&ws_manager),
        conn_id.clone(),
        run_id,
    ));

    // Receiver loop: the client only ever closes or answers pings.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    produce_task.abort();
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Log subscription closed");
}

/// Feed a run's events to a connection, then close it.
async fn produce(instance: Arc<Instance>, ws_manager: Arc<WsManager>, conn_id: String, run_id: String) {
    match instance.subscribe_run_events(&run_id).await {
        Ok(mut subscription) => {
            while let Some(batch) = subscription.next_batch().await {
                let payload = PipelineRunLogsSubscriptionSuccess {
                    run_id: subscription.run_id(),
                    messages: batch.iter().map(PipelineRunEvent::from).collect(),
                };
                if !send_payload(&ws_manager, &conn_id, payload.into()).await {
                    return;
                }
            }
            let subscribers = ws_manager.subscribers_of(&run_id).await.len();
            tracing::debug!(
                conn_id = %conn_id,
                run_id = %run_id,
                subscribers,
                "Run finished, closing log subscription"
            );
        }
        Err(err) => {
            let missing_run_id = match &err {
                EngineError::RunNotFound { run_id } => Some(run_id.clone()),
                _ => None,
            };
            let payload = PipelineRunLogsSubscriptionFailure {
                message: err.to_string(),
                missing_run_id,
            };
            tracing::debug!(conn_id = %conn_id, run_id = %run_id, error = %err, "Log subscription failed");
            if !send_payload(&ws_manager, &conn_id, payload.into()).await {
                return;
            }
        }
    }
    ws_manager.send(&conn_id, Message::Close(None)).await;
}

async fn send_payload(
    ws_manager: &WsManager,
    conn_id: &str,
    payload: PipelineRunLogsSubscriptionPayload,
) -> bool {
    match serde_json::to_string(&payload) {
        Ok(text) => ws_manager.send(conn_id, Message::Text(text.into())).await,
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode log payload");
            false
        }
    }
}
