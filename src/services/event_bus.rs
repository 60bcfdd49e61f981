//! EventBus: the single point through which all activation-triggering events
//! flow, fanned out to per-subscriber bounded queues with bounded replay.
//!
//! Unlike the swarm's `broadcast`-channel bus, each subscriber here gets its
//! own queue so that a slow consumer only ever drops events for itself — it
//! can never force other subscribers to skip ahead the way a lagged
//! `broadcast::Receiver` would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, Duration};
use tracing::warn;

use crate::domain::models::Event;

/// Per-subscriber queue depth. A full queue drops the event for that
/// subscriber only; it never blocks the publisher and never affects other
/// subscribers.
const MAX_SUBSCRIBER_QUEUE: usize = 512;

/// How many past events `get_replay_events` can return.
const REPLAY_BUFFER_SIZE: usize = 200;

/// Interval on which a synthetic `heartbeat` event is published.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
    include_heartbeats: bool,
}

struct Inner {
    subscribers: Vec<Subscriber>,
    replay: VecDeque<Event>,
}

/// Central event distributor. Cheap to clone (wraps an `Arc`); every clone
/// shares the same subscriber set, replay buffer, and sequence counter.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
    next_event_id: Arc<AtomicU64>,
    next_subscriber_id: Arc<AtomicU64>,
}

/// A live subscription. Dropping this drops the subscriber's queue; the bus
/// notices on the next publish and removes it.
pub struct Subscription {
    pub id: u64,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subscribers: Vec::new(),
                replay: VecDeque::with_capacity(REPLAY_BUFFER_SIZE),
            })),
            next_event_id: Arc::new(AtomicU64::new(1)),
            next_subscriber_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event, stamping it with the next monotonic `event_id`.
    ///
    /// Fans out to every subscriber's queue via `try_send`; a subscriber
    /// whose queue is full has this event dropped for it alone (and a
    /// warning logged), while every other subscriber still receives it.
    pub async fn publish(&self, mut event: Event) {
        event.event_id = self.next_event_id.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().await;
        inner.replay.push_back(event.clone());
        while inner.replay.len() > REPLAY_BUFFER_SIZE {
            inner.replay.pop_front();
        }

        let is_heartbeat = event.event_type == "heartbeat";
        inner.subscribers.retain(|sub| {
            if is_heartbeat && !sub.include_heartbeats {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscriber_id = sub.id,
                        event_id = event.event_id,
                        "subscriber queue full, dropping event for this subscriber"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Subscribe to the event stream. `include_heartbeats` controls whether
    /// synthetic `heartbeat` events are delivered to this subscriber; the
    /// activation router subscribes with this set to `false` so it never has
    /// to special-case heartbeats in its own consume loop.
    ///
    /// When `last_event_id` is `Some`, every replayed event with a greater
    /// `event_id` is queued for this subscriber before it is registered to
    /// receive live events, under the same lock, so a reconnecting consumer
    /// gets replay-then-live as a single atomic step with no window in which
    /// an event published between the two could be lost or delivered twice.
    pub async fn subscribe(&self, last_event_id: Option<u64>, include_heartbeats: bool) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(MAX_SUBSCRIBER_QUEUE);
        let mut inner = self.inner.lock().await;

        if let Some(last_id) = last_event_id {
            for event in inner.replay.iter().filter(|e| e.event_id > last_id) {
                if event.event_type == "heartbeat" && !include_heartbeats {
                    continue;
                }
                if tx.try_send(event.clone()).is_err() {
                    warn!(subscriber_id = id, event_id = event.event_id, "dropped replay event on subscribe");
                }
            }
        }

        inner.subscribers.push(Subscriber {
            id,
            tx,
            include_heartbeats,
        });
        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock().await;
        inner.subscribers.retain(|sub| sub.id != id);
    }

    /// Return up to the last `limit` replayed events, oldest first.
    pub async fn get_replay_events(&self, limit: usize) -> Vec<Event> {
        let inner = self.inner.lock().await;
        let take = limit.min(inner.replay.len());
        inner
            .replay
            .iter()
            .skip(inner.replay.len() - take)
            .cloned()
            .collect()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Spawn the background task that publishes a `heartbeat` event every
    /// `HEARTBEAT_INTERVAL`. Returns a handle the owner can abort on shutdown.
    pub fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            let mut tick = interval(HEARTBEAT_INTERVAL);
            loop {
                tick.tick().await;
                let current = bus.next_event_id.load(Ordering::SeqCst);
                bus.publish(Event::heartbeat(current)).await;
            }
        })
    }
}
