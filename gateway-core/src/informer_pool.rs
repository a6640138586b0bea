//! C4: Informer Pool.
//!
//! One reflector per `(configID, clusterName, kind)`, started on first
//! demand and shared across every subscriber of that resource (§4.4).
//! Watch events are forwarded to the Event Coalescer, which rebuilds the
//! list/detail/yaml payloads from the reflector's store and publishes them
//! through the SSE Broker — this module never talks to the broker's
//! `lastEvent` directly, it only ever triggers a coalesced rebuild.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::runtime::reflector::{self, Store};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use tokio::sync::Notify;
use tracing::{info, instrument, warn};

use crate::broker::SseBroker;
use crate::client_factory::ClientFactory;
use crate::coalescer::EventCoalescer;
use crate::discovery::DiscoveryCache;
use crate::error::{CoreError, Result};
use crate::metrics::Metrics;
use crate::stream_id::StreamId;
use crate::transform::{transform_detail, transform_list, transform_yaml, TransformContext};

const INITIAL_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Key {
    config_id: String,
    cluster: String,
    kind: String,
}

struct Entry {
    store: Store<DynamicObject>,
    namespaced: bool,
    plural: String,
    /// Kept alive for as long as the informer should keep running; dropping
    /// the pool drops this and aborts the watch task.
    _task: tokio::task::JoinHandle<()>,
}

/// C4. Cheaply cloneable.
#[derive(Clone)]
pub struct InformerPool {
    client_factory: ClientFactory,
    discovery: DiscoveryCache,
    coalescer: EventCoalescer,
    broker: SseBroker,
    metrics: Metrics,
    entries: Arc<dashmap::DashMap<Key, Arc<Entry>>>,
    /// Per-key start locks, so two concurrent first-subscribers for the same
    /// key don't race to spawn two informers (§4.4 "starting is idempotent").
    start_locks: Arc<dashmap::DashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
}

impl InformerPool {
    pub fn new(
        client_factory: ClientFactory,
        discovery: DiscoveryCache,
        coalescer: EventCoalescer,
        broker: SseBroker,
        metrics: Metrics,
    ) -> Self {
        Self {
            client_factory,
            discovery,
            coalescer,
            broker,
            metrics,
            entries: Arc::new(dashmap::DashMap::new()),
            start_locks: Arc::new(dashmap::DashMap::new()),
        }
    }

    /// `EnsureStarted(key, handlerSet)` (§4.4). Idempotent: the first caller
    /// for a key pays for informer construction and initial sync; every
    /// later caller for the same key gets the already-running entry.
    #[instrument(skip(self), fields(config_id, cluster, kind))]
    pub async fn ensure_started(&self, config_id: &str, cluster: &str, kind: &str) -> Result<()> {
        let key = Key {
            config_id: config_id.to_string(),
            cluster: cluster.to_string(),
            kind: kind.to_string(),
        };

        if self.entries.contains_key(&key) {
            return Ok(());
        }

        let lock = self
            .start_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if self.entries.contains_key(&key) {
            return Ok(());
        }

        let descriptor = self
            .discovery
            .find_resource_by_kind(config_id, cluster, kind)
            .await?;
        let client = self.client_factory.get(config_id, cluster).await?;

        let ar = ApiResource {
            group: descriptor.group.clone(),
            version: descriptor.version.clone(),
            api_version: if descriptor.group.is_empty() {
                descriptor.version.clone()
            } else {
                format!("{}/{}", descriptor.group, descriptor.version)
            },
            kind: descriptor.kind.clone(),
            plural: descriptor.plural.clone(),
        };
        // `Api::all_with` watches across every namespace regardless of scope;
        // namespaced-ness only matters for detail/delete targeting, not here.
        let api: Api<DynamicObject> = Api::all_with(client, &ar);

        let (reader, writer) = reflector::store();
        let ready = Arc::new(Notify::new());
        let ready_signal = ready.clone();

        let stream_key = key.clone();
        let coalescer = self.coalescer.clone();
        let broker = self.broker.clone();
        let metrics = self.metrics.clone();
        let store_for_task = reader.clone();

        let task = tokio::spawn(async move {
            let watch = watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer);
            let mut watch = Box::pin(watch);
            let mut signalled = false;

            loop {
                match watch.next().await {
                    Some(Ok(event)) => {
                        if !signalled {
                            if let Event::InitDone = &event {
                                signalled = true;
                                ready_signal.notify_waiters();
                            }
                        }
                        handle_event(
                            &stream_key,
                            &event,
                            &store_for_task,
                            &coalescer,
                            &broker,
                            &metrics,
                        );
                    }
                    Some(Err(e)) => {
                        warn!(
                            config_id = %stream_key.config_id,
                            cluster = %stream_key.cluster,
                            kind = %stream_key.kind,
                            error = %e,
                            "watch stream error, backing off"
                        );
                    }
                    None => {
                        warn!(
                            config_id = %stream_key.config_id,
                            cluster = %stream_key.cluster,
                            kind = %stream_key.kind,
                            "watch stream ended"
                        );
                        break;
                    }
                }
            }
        });

        self.metrics.informers_started.with_label_values(&[kind]).inc();
        match tokio::time::timeout(INITIAL_SYNC_TIMEOUT, ready.notified()).await {
            Ok(()) => info!(config_id, cluster, kind, "informer initial sync complete"),
            Err(_) => {
                self.metrics.informer_sync_timeouts.with_label_values(&[kind]).inc();
                warn!(
                    config_id,
                    cluster, kind, "informer initial sync timed out, proceeding with a possibly empty store"
                );
            }
        }

        self.entries.insert(
            key,
            Arc::new(Entry {
                store: reader,
                namespaced: descriptor.namespaced,
                plural: descriptor.plural,
                _task: task,
            }),
        );
        Ok(())
    }

    /// Current store contents for a started informer, or `ConfigNotFound`-
    /// shaped failure if it was never started (callers are expected to call
    /// `ensure_started` first).
    pub fn snapshot(&self, config_id: &str, cluster: &str, kind: &str) -> Result<Vec<Arc<DynamicObject>>> {
        let entry = self.entry(config_id, cluster, kind)?;
        Ok(entry.store.state())
    }

    pub fn get(&self, config_id: &str, cluster: &str, kind: &str, namespace: Option<&str>, name: &str) -> Result<Option<Arc<DynamicObject>>> {
        let entry = self.entry(config_id, cluster, kind)?;
        let needle_ns = namespace.unwrap_or_default();
        Ok(entry
            .store
            .state()
            .into_iter()
            .find(|obj| {
                obj.metadata.name.as_deref() == Some(name)
                    && obj.metadata.namespace.as_deref().unwrap_or_default() == needle_ns
            }))
    }

    pub fn is_namespaced(&self, config_id: &str, cluster: &str, kind: &str) -> Result<bool> {
        Ok(self.entry(config_id, cluster, kind)?.namespaced)
    }

    /// Schedules an immediate list rebuild, so a handler that just
    /// subscribed sees a snapshot without waiting for the next watch event
    /// (§9 design note: "enqueue a one-shot publish into the same broker").
    /// `flash_name`, when present, stamps `hasUpdated` on that row (§4.7).
    pub fn publish_list_snapshot(&self, config_id: &str, cluster: &str, kind: &str, flash_name: Option<&str>) -> Result<()> {
        let entry = self.entry(config_id, cluster, kind)?;
        let key = Key {
            config_id: config_id.to_string(),
            cluster: cluster.to_string(),
            kind: kind.to_string(),
        };
        schedule_list_rebuild(
            StreamId::list(config_id, cluster, kind),
            key,
            flash_name.map(str::to_string),
            entry.store.clone(),
            self.coalescer.clone(),
            self.broker.clone(),
            self.metrics.clone(),
        );
        Ok(())
    }

    /// Schedules an immediate detail + yaml rebuild for one object.
    pub fn publish_detail_snapshot(
        &self,
        config_id: &str,
        cluster: &str,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let entry = self.entry(config_id, cluster, kind)?;
        let key = Key {
            config_id: config_id.to_string(),
            cluster: cluster.to_string(),
            kind: kind.to_string(),
        };
        schedule_detail_rebuild(
            StreamId::detail(config_id, cluster, kind, namespace, name),
            StreamId::yaml(config_id, cluster, kind, namespace, name),
            key,
            namespace.map(str::to_string),
            name.to_string(),
            entry.store.clone(),
            self.coalescer.clone(),
            self.broker.clone(),
            self.metrics.clone(),
        );
        Ok(())
    }

    fn entry(&self, config_id: &str, cluster: &str, kind: &str) -> Result<Arc<Entry>> {
        let key = Key {
            config_id: config_id.to_string(),
            cluster: cluster.to_string(),
            kind: kind.to_string(),
        };
        self.entries
            .get(&key)
            .map(|e| e.clone())
            .ok_or_else(|| CoreError::Internal(format!("informer for {key:?} not started")))
    }
}

/// Builds the three derived stream IDs for an object event and schedules a
/// coalesced rebuild for each (§4.4: "forwards each callback to the Event
/// Coalescer with three stream IDs derived from the resource").
fn handle_event(
    key: &Key,
    event: &Event<DynamicObject>,
    store: &Store<DynamicObject>,
    coalescer: &EventCoalescer,
    broker: &SseBroker,
    metrics: &Metrics,
) {
    let touched: Vec<(Option<String>, String)> = match event {
        Event::Apply(obj) | Event::InitApply(obj) | Event::Delete(obj) => {
            match &obj.metadata.name {
                Some(name) => vec![(obj.metadata.namespace.clone(), name.clone())],
                None => Vec::new(),
            }
        }
        Event::Init | Event::InitDone => Vec::new(),
    };

    let list_stream = StreamId::list(&key.config_id, &key.cluster, &key.kind);
    schedule_list_rebuild(
        list_stream,
        key.clone(),
        None,
        store.clone(),
        coalescer.clone(),
        broker.clone(),
        metrics.clone(),
    );

    for (namespace, name) in touched {
        let detail_stream = StreamId::detail(&key.config_id, &key.cluster, &key.kind, namespace.as_deref(), &name);
        let yaml_stream = StreamId::yaml(&key.config_id, &key.cluster, &key.kind, namespace.as_deref(), &name);
        schedule_detail_rebuild(
            detail_stream,
            yaml_stream,
            key.clone(),
            namespace,
            name,
            store.clone(),
            coalescer.clone(),
            broker.clone(),
            metrics.clone(),
        );
    }
}

fn schedule_list_rebuild(
    stream_id: StreamId,
    key: Key,
    flash_name: Option<String>,
    store: Store<DynamicObject>,
    coalescer: EventCoalescer,
    broker: SseBroker,
    metrics: Metrics,
) {
    tokio::spawn(async move {
        coalescer
            .notify(stream_id.clone(), move || async move {
                let _measure = metrics.count_coalescer_build("list");
                let items: Vec<DynamicObject> = store.state().iter().map(|a| (**a).clone()).collect();
                let ctx = TransformContext {
                    kind: &key.kind,
                    flash_name: flash_name.as_deref(),
                };
                let value = transform_list(&items, &ctx);
                publish_or_warn(&broker, &stream_id, "list", value);
            })
            .await;
    });
}

fn schedule_detail_rebuild(
    detail_stream: StreamId,
    yaml_stream: StreamId,
    _key: Key,
    namespace: Option<String>,
    name: String,
    store: Store<DynamicObject>,
    coalescer: EventCoalescer,
    broker: SseBroker,
    metrics: Metrics,
) {
    tokio::spawn(async move {
        let detail_stream2 = detail_stream.clone();
        let yaml_stream2 = yaml_stream.clone();
        let broker2 = broker.clone();
        let store2 = store.clone();
        let name2 = name.clone();
        let namespace2 = namespace.clone();
        let metrics2 = metrics.clone();

        coalescer
            .notify(detail_stream, move || async move {
                let _measure = metrics2.count_coalescer_build("detail");
                let obj = find_in_store(&store2, namespace2.as_deref(), &name2);
                let value = transform_detail(obj.as_deref());
                publish_or_warn(&broker2, &detail_stream2, "detail", value);
            })
            .await;

        coalescer
            .notify(yaml_stream, move || async move {
                let _measure = metrics.count_coalescer_build("yaml");
                let obj = find_in_store(&store, namespace.as_deref(), &name);
                let value = transform_yaml(obj.as_deref());
                publish_or_warn(&broker, &yaml_stream2, "yaml", value);
            })
            .await;
    });
}

fn find_in_store(store: &Store<DynamicObject>, namespace: Option<&str>, name: &str) -> Option<Arc<DynamicObject>> {
    let needle_ns = namespace.unwrap_or_default();
    store.state().into_iter().find(|obj| {
        obj.metadata.name.as_deref() == Some(name)
            && obj.metadata.namespace.as_deref().unwrap_or_default() == needle_ns
    })
}

fn publish_or_warn(broker: &SseBroker, stream_id: &StreamId, stream_kind: &str, value: serde_json::Value) {
    match serde_json::to_string(&value) {
        Ok(payload) => broker.publish(stream_id, stream_kind, payload),
        Err(e) => warn!(stream_id = %stream_id, error = %e, "failed to marshal rebuild payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_is_structural() {
        let a = Key {
            config_id: "cfg".into(),
            cluster: "prod".into(),
            kind: "Pod".into(),
        };
        let b = Key {
            config_id: "cfg".into(),
            cluster: "prod".into(),
            kind: "Pod".into(),
        };
        assert_eq!(a, b);
    }
}
