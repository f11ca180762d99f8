//! Broadcast bus that carries replication events between the API surface and
//! the orchestrator.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use crate::payloads::{
    DEFAULT_LIVE_CAPACITY, DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId,
};

/// Stream handed to subscribers: replayed backlog first, then live events.
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<EventEnvelope, BroadcastStreamRecvError>> + Send>>;

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    replay: Arc<Mutex<VecDeque<EventEnvelope>>>,
    replay_capacity: usize,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a bus whose live channel and replay ring share one capacity.
    ///
    /// # Panics
    ///
    /// Panics if `replay_capacity` is zero.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        Self::with_capacities(replay_capacity, replay_capacity)
    }

    /// Construct a bus with separate live-channel and replay-ring depths.
    ///
    /// # Panics
    ///
    /// Panics if either capacity is zero.
    #[must_use]
    pub fn with_capacities(live_capacity: usize, replay_capacity: usize) -> Self {
        assert!(
            live_capacity > 0 && replay_capacity > 0,
            "event bus capacity must be positive"
        );
        let (sender, _) = broadcast::channel(live_capacity);
        Self {
            sender,
            replay: Arc::new(Mutex::new(VecDeque::with_capacity(replay_capacity))),
            replay_capacity,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacities(DEFAULT_LIVE_CAPACITY, DEFAULT_REPLAY_CAPACITY)
    }

    /// Subscribe to the bus. When `since` is supplied, buffered events newer
    /// than that id are yielded before live traffic.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        // Subscribe before snapshotting so nothing published in between is lost.
        let live = BroadcastStream::new(self.sender.subscribe());
        let backlog = since.map_or_else(Vec::new, |id| self.backlog_since(id));
        let cutoff = backlog.last().map(|env| env.id);
        let live = live.filter(move |item| match (item, cutoff) {
            (Ok(env), Some(last)) => env.id > last,
            _ => true,
        });
        Box::pin(tokio_stream::iter(backlog.into_iter().map(Ok)).chain(live))
    }

    /// Publish a new event to all subscribers and return its identifier.
    ///
    /// Publishing never fails: with no live subscribers the event is still
    /// retained in the replay buffer.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        {
            let mut replay = self.lock_replay();
            if replay.len() == self.replay_capacity {
                let _ = replay.pop_front();
            }
            replay.push_back(envelope.clone());
        }
        let _ = self.sender.send(envelope);
        id
    }

    /// Last event id observed in the replay buffer.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_replay().back().map(|env| env.id)
    }

    /// Collect a backlog of events emitted after the specified id.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        self.lock_replay()
            .iter()
            .filter(|env| env.id > id)
            .cloned()
            .collect()
    }

    /// Number of live subscribers currently attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn lock_replay(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.replay
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
