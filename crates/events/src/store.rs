//! Append-only run event log.
//!
//! [`EventStore::append`] assigns the per-run sequence number and publishes
//! on the bus while holding the write lock. [`EventStore::subscribe`] takes
//! the history snapshot and the bus receiver under the read lock, so every
//! event is either in the snapshot or delivered by the receiver.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use flowgate_core::event::LogEvent;
use flowgate_core::types::RunId;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, RwLock};

use crate::bus::EventBus;

#[derive(Default)]
pub struct EventStore {
    runs: RwLock<HashMap<RunId, Vec<LogEvent>>>,
    bus: EventBus,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence `event`, store it and publish it. Returns the stored copy.
    pub async fn append(&self, mut event: LogEvent) -> LogEvent {
        let mut runs = self.runs.write().await;
        let log = runs.entry(event.run_id).or_default();
        event.sequence = log.last().map_or(1, |last| last.sequence + 1);
        log.push(event.clone());
        self.bus.publish(event.clone());
        event
    }

    /// Events of `run_id` with a sequence greater than `after`.
    pub async fn events(&self, run_id: RunId, after: Option<u64>) -> Vec<LogEvent> {
        let after = after.unwrap_or(0);
        self.runs
            .read()
            .await
            .get(&run_id)
            .map(|log| {
                log.iter()
                    .filter(|e| e.sequence > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Events of every run, for cross-run indexes such as assets.
    pub async fn all_events(&self) -> Vec<LogEvent> {
        self.runs
            .read()
            .await
            .values()
            .flat_map(|log| log.iter().cloned())
            .collect()
    }

    /// Stored history of `run_id` followed by its live events.
    pub async fn subscribe(self: &Arc<Self>, run_id: RunId) -> RunEventSubscription {
        let runs = self.runs.read().await;
        let receiver = self.bus.subscribe();
        let history: VecDeque<LogEvent> = runs
            .get(&run_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default();
        drop(runs);

        RunEventSubscription {
            run_id,
            pending: history,
            last_sequence: 0,
            finished: false,
            receiver,
            store: Arc::clone(self),
        }
    }
}

/// Ordered, gap-free stream of one run's events.
///
/// Ends after yielding the run's terminal event, or when the store is
/// dropped.
pub struct RunEventSubscription {
    run_id: RunId,
    pending: VecDeque<LogEvent>,
    last_sequence: u64,
    finished: bool,
    receiver: broadcast::Receiver<LogEvent>,
    store: Arc<EventStore>,
}

impl RunEventSubscription {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Next event, or `None` once the run has ended.
    pub async fn next(&mut self) -> Option<LogEvent> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                if let Some(event) = self.accept(event) {
                    return Some(event);
                }
                continue;
            }
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(run_id = %self.run_id, skipped, "Run event subscriber lagged, replaying from store");
                    self.refill().await;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Every event available right now, waiting for at least one.
    ///
    /// Returns `None` once the run has ended.
    pub async fn next_batch(&mut self) -> Option<Vec<LogEvent>> {
        let first = self.next().await?;
        let mut batch = vec![first];
        while !self.finished {
            if let Some(event) = self.pending.pop_front() {
                if let Some(event) = self.accept(event) {
                    batch.push(event);
                }
                continue;
            }
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        batch.push(event);
                    }
                }
                Err(TryRecvError::Lagged(_)) => self.refill().await,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        Some(batch)
    }

    fn accept(&mut self, event: LogEvent) -> Option<LogEvent> {
        if event.run_id != self.run_id || event.sequence <= self.last_sequence {
            return None;
        }
        self.last_sequence = event.sequence;
        if event.kind.is_run_terminal() {
            self.finished = true;
        }
        Some(event)
    }

    async fn refill(&mut self) {
        let missed = self.store.events(self.run_id, Some(self.last_sequence)).await;
        self.pending.extend(missed);
    }
}

#[cfg(test)]
mod tests {
    use flowgate_core::event::EventKind;

    use super::*;

    #[tokio::test]
    async fn append_assigns_increasing_sequences_per_run() {
        let store = EventStore::new();
        let a = RunId::new_v4();
        let b = RunId::new_v4();

        let first = store.append(LogEvent::new(a, EventKind::RunEnqueued, "1")).await;
        let other = store.append(LogEvent::new(b, EventKind::RunEnqueued, "1")).await;
        let second = store.append(LogEvent::new(a, EventKind::RunStart, "2")).await;

        assert_eq!(first.sequence, 1);
        assert_eq!(other.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(store.events(a, Some(1)).await, vec![second]);
    }

    #[tokio::test]
    async fn subscription_replays_history_then_live_events() {
        let store = Arc::new(EventStore::new());
        let run_id = RunId::new_v4();
        store.append(LogEvent::new(run_id, EventKind::RunEnqueued, "queued")).await;

        let mut subscription = store.subscribe(run_id).await;

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            writer
                .append(LogEvent::new(RunId::new_v4(), EventKind::RunStart, "other run"))
                .await;
            writer.append(LogEvent::new(run_id, EventKind::RunStart, "started")).await;
            writer.append(LogEvent::new(run_id, EventKind::RunSuccess, "done")).await;
        });

        let mut messages = Vec::new();
        while let Some(event) = subscription.next().await {
            messages.push(event.message);
        }
        assert_eq!(messages, vec!["queued", "started", "done"]);
    }

    #[tokio::test]
    async fn subscription_to_finished_run_ends_after_history() {
        let store = Arc::new(EventStore::new());
        let run_id = RunId::new_v4();
        store.append(LogEvent::new(run_id, EventKind::RunStart, "start")).await;
        store.append(LogEvent::new(run_id, EventKind::RunFailure, "failed")).await;

        let mut subscription = store.subscribe(run_id).await;
        let batch = subscription.next_batch().await.expect("history batch");
        assert_eq!(batch.len(), 2);
        assert!(subscription.next_batch().await.is_none());
    }
}
