//! Run log subscriptions over WebSocket.

use flowgate_core::types::RunId;
use flowgate_schema::{PipelineRunEvent, PipelineRunLogsSubscriptionPayload};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{ClientError, ClientResult};

/// A live stream of one run's log, in sequence order.
///
/// Yields batches of events until the run is terminal. A subscription to
/// a run the gateway does not know yields a single `NotFound` error.
/// Dropping the stream or calling [`close`](Self::close) cancels the
/// subscription without affecting the run.
pub struct RunLogStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    run_id: Option<RunId>,
    done: bool,
}

impl RunLogStream {
    pub(crate) async fn connect(url: &str) -> ClientResult<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        tracing::debug!(%url, "Log subscription opened");
        Ok(Self {
            socket,
            run_id: None,
            done: false,
        })
    }

    /// Run the stream belongs to, known once the first batch arrived.
    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    /// Next batch of events, or `None` once the gateway closed the stream.
    pub async fn next_batch(&mut self) -> Option<ClientResult<Vec<PipelineRunEvent>>> {
        while !self.done {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => break,
            };

            match message {
                Message::Text(text) => return Some(self.decode(&text)),
                Message::Close(_) => self.done = true,
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
            }
        }
        self.done = true;
        None
    }

    /// Every remaining event until the run is terminal.
    pub async fn collect_all(mut self) -> ClientResult<Vec<PipelineRunEvent>> {
        let mut events = Vec::new();
        while let Some(batch) = self.next_batch().await {
            events.extend(batch?);
        }
        Ok(events)
    }

    /// Cancel the subscription.
    pub async fn close(mut self) -> ClientResult<()> {
        self.done = true;
        self.socket.close(None).await?;
        Ok(())
    }

    fn decode(&mut self, text: &str) -> ClientResult<Vec<PipelineRunEvent>> {
        let payload: PipelineRunLogsSubscriptionPayload =
            serde_json::from_str(text).map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;

        match payload {
            PipelineRunLogsSubscriptionPayload::PipelineRunLogsSubscriptionSuccess(success) => {
                self.run_id = Some(success.run_id);
                Ok(success.messages)
            }
            PipelineRunLogsSubscriptionPayload::PipelineRunLogsSubscriptionFailure(failure) => {
                self.done = true;
                Err(match failure.missing_run_id {
                    Some(_) => ClientError::not_found("PipelineRunNotFoundError", failure.message),
                    None => ClientError::UnexpectedResponse(failure.message),
                })
            }
        }
    }
}

impl std::fmt::Debug for RunLogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLogStream")
            .field("run_id", &self.run_id)
            .field("done", &self.done)
            .finish()
    }
}
