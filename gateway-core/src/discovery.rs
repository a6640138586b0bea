//! C3: Discovery Cache.
//!
//! Per `(configID, clusterName)`: the resource descriptor list, the
//! `metricsAPIAvailable` flag, and the non-namespaced-kinds derived view. A
//! miss triggers a refresh and retries once; a second miss returns a
//! zero-value descriptor and marks the kind unknown (§4.3).

use std::sync::Arc;

use dashmap::DashMap;
use kube::discovery::Discovery;
use kube::Client;
use tracing::warn;

use crate::client_factory::ClientFactory;
use crate::error::{CoreError, Result};
use crate::kinds::{builtin_kinds, KindDescriptor};

type Key = (String, String);

struct DiscoveryEntry {
    all_resources: Vec<KindDescriptor>,
    metrics_api_available: bool,
}

impl DiscoveryEntry {
    fn seed() -> Self {
        Self {
            all_resources: builtin_kinds(),
            metrics_api_available: false,
        }
    }
}

/// C3. Cheaply cloneable.
#[derive(Clone)]
pub struct DiscoveryCache {
    client_factory: ClientFactory,
    entries: Arc<DashMap<Key, Arc<DiscoveryEntry>>>,
}

impl DiscoveryCache {
    pub fn new(client_factory: ClientFactory) -> Self {
        Self {
            client_factory,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// `FindResourceByKind(kind)` — case-insensitive; refreshes on miss and
    /// retries once before returning `KindUnknown`.
    pub async fn find_resource_by_kind(
        &self,
        config_id: &str,
        cluster: &str,
        kind: &str,
    ) -> Result<KindDescriptor> {
        let key: Key = (config_id.to_string(), cluster.to_string());
        if let Some(found) = self.lookup_cached(&key, kind) {
            return Ok(found);
        }

        self.refresh(config_id, cluster).await?;
        if let Some(found) = self.lookup_cached(&key, kind) {
            return Ok(found);
        }

        warn!(config_id, cluster, kind, "resource kind unknown after refresh");
        Err(CoreError::KindUnknown(kind.to_string()))
    }

    /// `IsNamespaced(kind)` — derived from the cached descriptor list.
    pub async fn is_namespaced(&self, config_id: &str, cluster: &str, kind: &str) -> Result<bool> {
        Ok(self
            .find_resource_by_kind(config_id, cluster, kind)
            .await?
            .namespaced)
    }

    /// `metricsAPIAvailable`.
    pub fn metrics_api_available(&self, config_id: &str, cluster: &str) -> bool {
        let key: Key = (config_id.to_string(), cluster.to_string());
        self.entries
            .get(&key)
            .map(|e| e.metrics_api_available)
            .unwrap_or(false)
    }

    /// `nonNamespacedKinds` — derived view.
    pub fn non_namespaced_kinds(&self, config_id: &str, cluster: &str) -> Vec<KindDescriptor> {
        let key: Key = (config_id.to_string(), cluster.to_string());
        self.entries
            .get(&key)
            .map(|e| {
                e.all_resources
                    .iter()
                    .filter(|d| !d.namespaced)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `Refresh()` — re-queries discovery and replaces the entry atomically.
    /// A dead API server is reported as `ClusterUnreachable` rather than
    /// swallowed into the builtin seed; only a resolvable-but-unconfigured
    /// cluster (bad config id, RBAC-gated discovery, ...) falls back to
    /// seeding so builtin kinds keep resolving.
    pub async fn refresh(&self, config_id: &str, cluster: &str) -> Result<()> {
        let key: Key = (config_id.to_string(), cluster.to_string());
        let client = match self.client_factory.get(config_id, cluster).await {
            Ok(client) => client,
            Err(e @ CoreError::ClusterUnreachable { .. }) => return Err(e),
            Err(e) => {
                warn!(config_id, cluster, error = %e, "client unavailable for discovery, seeding builtins");
                self.entries.insert(key, Arc::new(DiscoveryEntry::seed()));
                return Ok(());
            }
        };

        let entry = match query_discovery(client).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(config_id, cluster, error = %e, "discovery query failed, seeding builtins");
                DiscoveryEntry::seed()
            }
        };
        self.entries.insert(key, Arc::new(entry));
        Ok(())
    }

    fn lookup_cached(&self, key: &Key, kind: &str) -> Option<KindDescriptor> {
        let needle = kind.to_lowercase();
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Arc::new(DiscoveryEntry::seed()));
        entry
            .all_resources
            .iter()
            .find(|d| d.kind.to_lowercase() == needle || d.plural.to_lowercase() == needle)
            .cloned()
    }
}

async fn query_discovery(client: Client) -> Result<DiscoveryEntry> {
    let discovery = Discovery::new(client).run().await.map_err(CoreError::from)?;
    let mut all_resources = Vec::new();
    let mut metrics_api_available = false;

    for group in discovery.groups() {
        if group.name() == "metrics.k8s.io" {
            metrics_api_available = true;
        }
        for (ar, caps) in group.recommended_resources() {
            all_resources.push(KindDescriptor::new(
                &ar.kind,
                &ar.plural,
                &ar.group,
                &ar.version,
                caps.scope == kube::discovery::Scope::Namespaced,
            ));
        }
    }

    // Builtins are always present as a floor even when discovery omits them
    // (some API servers gate listing of core resources behind other verbs).
    for builtin in builtin_kinds() {
        if !all_resources.iter().any(|d| d.kind == builtin.kind) {
            all_resources.push(builtin);
        }
    }

    Ok(DiscoveryEntry {
        all_resources,
        metrics_api_available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_registry::ConfigRegistry;

    #[tokio::test]
    async fn unknown_kind_on_empty_cache_is_kind_unknown_after_refresh_attempt() {
        // No backing config files: refresh() will fail to even get a client,
        // but lookup still falls back to the builtin seed so known kinds work.
        let registry = ConfigRegistry::load(vec![]).unwrap();
        let factory = ClientFactory::new(registry);
        let cache = DiscoveryCache::new(factory);

        let pod = cache
            .find_resource_by_kind("missing-config", "x", "Pod")
            .await
            .unwrap();
        assert_eq!(pod.plural, "pods");

        let err = cache
            .find_resource_by_kind("missing-config", "x", "Widget")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::KindUnknown(_)));
    }

    #[tokio::test]
    async fn refresh_against_an_unreachable_cluster_surfaces_cluster_unreachable() {
        let dir = std::env::temp_dir().join(format!(
            "gateway-core-discovery-test-unreachable-{}",
            std::process::id()
        ));
        let _ = std::fs::create_dir_all(&dir);
        let kubeconfig_path = dir.join("kubeconfig-dead.yaml");
        std::fs::write(
            &kubeconfig_path,
            "apiVersion: v1\nkind: Config\nclusters:\n- name: dead\n  cluster:\n    server: https://127.0.0.1:1\ncontexts:\n- name: dead\n  context:\n    cluster: dead\n    user: dead\ncurrent-context: dead\nusers:\n- name: dead\n  user: {}\n",
        )
        .unwrap();
        let config_path = dir.join("cfg-dead.yaml");
        std::fs::write(
            &config_path,
            format!(
                "config_id: cfg-dead\nclusters:\n  - name: only\n    kubeconfig_path: {}\n",
                kubeconfig_path.display()
            ),
        )
        .unwrap();

        let registry = ConfigRegistry::load(vec![config_path]).unwrap();
        let factory = ClientFactory::new(registry);
        let cache = DiscoveryCache::new(factory);

        // "Widget" is not a builtin, so the seeded lookup misses and refresh()
        // actually runs, hitting the unreachable API server.
        let err = cache
            .find_resource_by_kind("cfg-dead", "only", "Widget")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ClusterUnreachable { .. }));
    }
}
