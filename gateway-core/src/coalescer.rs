//! C5: Event Coalescer.
//!
//! Per stream ID, maintains a single-slot pending flag and a worker so that
//! at most one rebuild is in flight at a time, with eventual freshness: the
//! last builder registered while a build was running always runs afterwards
//! (§4.5, §8 property 3).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::stream_id::StreamId;

type BuildFn = Box<dyn FnOnce() -> BuildFuture + Send>;
type BuildFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

enum SlotState {
    Idle,
    Running,
    /// A rebuild completed while a new notification arrived during the run;
    /// the new builder replaces whatever was previously queued.
    Pending(BuildFn),
}

struct Slot {
    state: Mutex<SlotState>,
}

/// C5. Cheaply cloneable.
#[derive(Clone, Default)]
pub struct EventCoalescer {
    slots: Arc<DashMap<StreamId, Arc<Slot>>>,
}

impl EventCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Notify(streamID, buildFn)`.
    ///
    /// - idle, no pending: transition to running, spawn `build_fn`.
    /// - running: set pending, replacing any previously queued builder.
    /// - on completion: if pending is set, clear it and re-enter running
    ///   with the stored builder.
    #[instrument(skip(self, build_fn), fields(stream_id = %stream_id))]
    pub async fn notify<F, Fut>(&self, stream_id: StreamId, build_fn: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: BuildFn = Box::new(move || Box::pin(build_fn()) as BuildFuture);
        let slot = self
            .slots
            .entry(stream_id.clone())
            .or_insert_with(|| {
                Arc::new(Slot {
                    state: Mutex::new(SlotState::Idle),
                })
            })
            .clone();

        let mut guard = slot.state.lock().await;
        match &*guard {
            SlotState::Idle => {
                *guard = SlotState::Running;
                drop(guard);
                Self::spawn_run(slot, boxed);
            }
            SlotState::Running | SlotState::Pending(_) => {
                *guard = SlotState::Pending(boxed);
            }
        }
    }

    fn spawn_run(slot: Arc<Slot>, build_fn: BuildFn) {
        tokio::spawn(async move {
            let mut next = build_fn;
            loop {
                next().await;

                let mut guard = slot.state.lock().await;
                match std::mem::replace(&mut *guard, SlotState::Idle) {
                    SlotState::Pending(queued) => {
                        *guard = SlotState::Running;
                        drop(guard);
                        next = queued;
                    }
                    _ => {
                        // Already reset to Idle above; nothing queued.
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn single_notification_runs_exactly_once() {
        let coalescer = EventCoalescer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = runs.clone();

        coalescer
            .notify(StreamId::list("c", "k", "pods"), move || {
                let runs = runs2.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn burst_during_a_run_collapses_to_one_more_run_with_latest_builder() {
        let coalescer = EventCoalescer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stream = StreamId::list("c", "k", "deployments");

        // First notification: a slow build that blocks the slot.
        let seen1 = seen.clone();
        coalescer
            .notify(stream.clone(), move || async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                seen1.lock().await.push(0);
            })
            .await;

        tokio::time::sleep(Duration::from_millis(5)).await;

        // A burst of notifications arrives while the first build is running;
        // only the last builder's payload should ever be observed.
        for i in 1..=5 {
            let seen_i = seen.clone();
            coalescer
                .notify(stream.clone(), move || async move {
                    seen_i.lock().await.push(i);
                })
                .await;
        }

        tokio::time::sleep(Duration::from_millis(150)).await;

        let results = seen.lock().await.clone();
        // The slow first build, plus exactly one collapsed rebuild carrying
        // the last notification's payload (5).
        assert_eq!(results, vec![0, 5]);
    }

    #[tokio::test]
    async fn distinct_streams_do_not_interfere() {
        let coalescer = EventCoalescer::new();
        let pods_runs = Arc::new(AtomicUsize::new(0));
        let deployments_runs = Arc::new(AtomicUsize::new(0));

        let p = pods_runs.clone();
        coalescer
            .notify(StreamId::list("c", "k", "pods"), move || async move {
                p.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        let d = deployments_runs.clone();
        coalescer
            .notify(StreamId::list("c", "k", "deployments"), move || async move {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pods_runs.load(Ordering::SeqCst), 1);
        assert_eq!(deployments_runs.load(Ordering::SeqCst), 1);
    }
}
