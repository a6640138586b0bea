//! C6: SSE Broker.
//!
//! A logical topic table, `streamID -> topic {subscribers, lastEvent?}`.
//! Subscribers hold a single pending slot: a publish always overwrites it
//! with the latest payload (coalesce-on-enqueue), so a slow subscriber never
//! causes unbounded growth and always eventually observes the latest state
//! (§4.6, §8 properties 4 and 5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::trace;

use crate::metrics::Metrics;
use crate::stream_id::StreamId;

struct SubscriberSlot {
    pending: std::sync::Mutex<Option<Arc<str>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl SubscriberSlot {
    fn new() -> Self {
        Self {
            pending: std::sync::Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Overwrites the pending slot, returning `true` if it already held an
    /// unconsumed payload (a coalesced-away drop).
    fn deliver(&self, payload: Arc<str>) -> bool {
        let mut guard = self.pending.lock().unwrap();
        let dropped = guard.is_some();
        *guard = Some(payload);
        self.notify.notify_one();
        dropped
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

struct TopicInner {
    subscribers: HashMap<u64, Arc<SubscriberSlot>>,
    last_event: Option<Arc<str>>,
}

/// C6. Cheaply cloneable.
#[derive(Clone)]
pub struct SseBroker {
    topics: Arc<DashMap<StreamId, Arc<RwLock<TopicInner>>>>,
    next_subscriber_id: Arc<AtomicU64>,
    metrics: Metrics,
}

/// A live subscription on one topic. Dropping it unsubscribes.
pub struct Subscription {
    stream_id: StreamId,
    id: u64,
    slot: Arc<SubscriberSlot>,
    broker: SseBroker,
}

impl Subscription {
    /// Waits for the next payload. Returns `None` once the topic has been
    /// torn down (`UnsubscribeAll`).
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            if let Some(payload) = self.slot.pending.lock().unwrap().take() {
                return Some(payload);
            }
            if self.slot.closed.load(Ordering::Acquire) {
                return None;
            }
            self.slot.notify.notified().await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.stream_id, self.id);
        self.broker.metrics.sse_subscribers.dec();
    }
}

impl SseBroker {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
            metrics,
        }
    }

    fn topic(&self, stream_id: &StreamId) -> Arc<RwLock<TopicInner>> {
        self.topics
            .entry(stream_id.clone())
            .or_insert_with(|| {
                Arc::new(RwLock::new(TopicInner {
                    subscribers: HashMap::new(),
                    last_event: None,
                }))
            })
            .clone()
    }

    /// Registers a subscription on `stream_id`. If a last event exists, it is
    /// delivered before any subsequent publish (replay policy, §8 property 4).
    pub fn subscribe(&self, stream_id: &StreamId) -> Subscription {
        let topic = self.topic(stream_id);
        let slot = Arc::new(SubscriberSlot::new());
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut inner = topic.write().unwrap();
            if let Some(last) = inner.last_event.clone() {
                slot.deliver(last);
            }
            inner.subscribers.insert(id, slot.clone());
        }

        self.metrics.sse_subscribers.inc();
        Subscription {
            stream_id: stream_id.clone(),
            id,
            slot,
            broker: self.clone(),
        }
    }

    /// Serializes `payload` as `lastEvent` and fans it out to every current
    /// subscriber. A publish to a topic with no subscribers only updates
    /// `lastEvent`. `stream_kind` is the broad category of stream (list,
    /// detail, yaml, events), not the stream ID itself, to keep the metric's
    /// cardinality bounded.
    pub fn publish(&self, stream_id: &StreamId, stream_kind: &str, payload: impl Into<Arc<str>>) {
        let payload = payload.into();
        let topic = self.topic(stream_id);
        let inner = topic.read().unwrap();
        // last_event needs a write; upgrade via a short write lock instead of
        // holding the read lock across mutation.
        drop(inner);
        {
            let mut inner = topic.write().unwrap();
            inner.last_event = Some(payload.clone());
            trace!(stream_id = %stream_id, subscribers = inner.subscribers.len(), "publish");
            for slot in inner.subscribers.values() {
                if slot.deliver(payload.clone()) {
                    self.metrics.sse_dropped_events.with_label_values(&[stream_kind]).inc();
                }
            }
        }
        self.metrics.sse_publishes.with_label_values(&[stream_kind]).inc();
    }

    /// Subscriber count for metrics/diagnostics.
    pub fn subscriber_count(&self, stream_id: &StreamId) -> usize {
        self.topics
            .get(stream_id)
            .map(|t| t.read().unwrap().subscribers.len())
            .unwrap_or(0)
    }

    /// Tears a topic down: every blocked `recv()` returns `None`.
    pub fn unsubscribe_all(&self, stream_id: &StreamId) {
        if let Some((_, topic)) = self.topics.remove(stream_id) {
            let inner = topic.read().unwrap();
            for slot in inner.subscribers.values() {
                slot.close();
            }
        }
    }

    fn unsubscribe(&self, stream_id: &StreamId, id: u64) {
        if let Some(topic) = self.topics.get(stream_id) {
            topic.write().unwrap().subscribers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replay_delivers_last_event_before_any_new_publish() {
        let broker = SseBroker::new(Metrics::default());
        let stream = StreamId::list("c", "k", "pods");
        broker.publish(&stream, "list", "snapshot-1");

        let mut sub = broker.subscribe(&stream);
        assert_eq!(sub.recv().await.as_deref(), Some("snapshot-1"));
    }

    #[tokio::test]
    async fn second_subscriber_with_no_intervening_change_gets_same_snapshot() {
        let broker = SseBroker::new(Metrics::default());
        let stream = StreamId::list("c", "k", "pods");
        broker.publish(&stream, "list", "snapshot-1");

        let mut sub_a = broker.subscribe(&stream);
        let mut sub_b = broker.subscribe(&stream);
        assert_eq!(sub_a.recv().await.as_deref(), Some("snapshot-1"));
        assert_eq!(sub_b.recv().await.as_deref(), Some("snapshot-1"));
    }

    #[tokio::test]
    async fn bursty_publishes_coalesce_to_the_latest_value() {
        let broker = SseBroker::new(Metrics::default());
        let stream = StreamId::list("c", "k", "pods");
        let mut sub = broker.subscribe(&stream);

        for i in 0..10 {
            broker.publish(&stream, "list", format!("v{i}"));
        }

        // Exactly one pending slot: only the latest value is ever observed.
        assert_eq!(sub.recv().await.as_deref(), Some("v9"));
        // Every publish but the first overwrote an unconsumed payload.
        assert_eq!(
            broker.metrics.sse_dropped_events.with_label_values(&["list"]).get(),
            9
        );
    }

    #[tokio::test]
    async fn unsubscribe_all_closes_blocked_subscribers() {
        let broker = SseBroker::new(Metrics::default());
        let stream = StreamId::list("c", "k", "pods");
        let mut sub = broker.subscribe(&stream);

        broker.unsubscribe_all(&stream);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_only_stores_last_event() {
        let broker = SseBroker::new(Metrics::default());
        let stream = StreamId::list("c", "k", "pods");
        broker.publish(&stream, "list", "no-one-home");
        assert_eq!(broker.subscriber_count(&stream), 0);

        let mut sub = broker.subscribe(&stream);
        assert_eq!(sub.recv().await.as_deref(), Some("no-one-home"));
    }

    #[tokio::test]
    async fn subscribing_and_dropping_keeps_the_gauge_accurate() {
        let broker = SseBroker::new(Metrics::default());
        let stream = StreamId::list("c", "k", "pods");

        let sub = broker.subscribe(&stream);
        assert_eq!(broker.metrics.sse_subscribers.get(), 1);
        drop(sub);
        assert_eq!(broker.metrics.sse_subscribers.get(), 0);
    }
}
