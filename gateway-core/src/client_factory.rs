//! C2: Client Factory.
//!
//! First call per `(configID, clusterName)` synchronously constructs a
//! `kube::Client`; subsequent calls return the cached instance. Construction
//! failures are never cached so the next call retries (§4.2).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::config_registry::ConfigRegistry;
use crate::error::{CoreError, Result};

type Key = (String, String);

#[derive(Clone)]
struct CachedClient {
    client: Client,
    fingerprint: u64,
}

/// C2. Cheaply cloneable; the caches live for the process lifetime.
#[derive(Clone)]
pub struct ClientFactory {
    registry: ConfigRegistry,
    clients: Arc<DashMap<Key, CachedClient>>,
    /// Per-key build locks, implementing single-flight construction: two
    /// concurrent first-callers for the same key serialize on this mutex so
    /// only one of them actually talks to the API server.
    build_locks: Arc<DashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl ClientFactory {
    pub fn new(registry: ConfigRegistry) -> Self {
        Self {
            registry,
            clients: Arc::new(DashMap::new()),
            build_locks: Arc::new(DashMap::new()),
        }
    }

    /// Returns the memoized typed/dynamic client for `(config_id, cluster)`,
    /// building and caching it on first use.
    pub async fn get(&self, config_id: &str, cluster: &str) -> Result<Client> {
        let resolved = self.registry.resolve(config_id, cluster)?;
        let fingerprint = fingerprint_of(&resolved.cluster.connection_fingerprint());
        let key: Key = (config_id.to_string(), cluster.to_string());

        if let Some(cached) = self.clients.get(&key) {
            if cached.fingerprint == fingerprint {
                return Ok(cached.client.clone());
            }
            // Reload changed the connection material under us; fall through
            // to rebuild (the single-flight lock below makes this safe under
            // concurrent callers).
        }

        let lock = self
            .build_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Double-checked: another caller may have already rebuilt while we
        // waited for the lock.
        if let Some(cached) = self.clients.get(&key) {
            if cached.fingerprint == fingerprint {
                return Ok(cached.client.clone());
            }
        }

        let client = build_client(&resolved.cluster).await.map_err(|e| {
            warn!(config_id, cluster, error = %e, "client construction failed");
            e
        })?;

        self.clients.insert(
            key,
            CachedClient {
                client: client.clone(),
                fingerprint,
            },
        );
        self.registry.mark_connected(config_id, cluster);
        info!(config_id, cluster, "kubernetes client constructed");
        Ok(client)
    }

    /// Drops every cached client whose cluster entry no longer resolves, or
    /// whose fingerprint has changed, so the next `get()` rebuilds it. Called
    /// after a successful `ConfigRegistry::reload()`.
    pub fn invalidate_stale(&self) {
        self.clients.retain(|(config_id, cluster), cached| {
            match self.registry.resolve(config_id, cluster) {
                Ok(resolved) => {
                    fingerprint_of(&resolved.cluster.connection_fingerprint()) == cached.fingerprint
                }
                Err(_) => false,
            }
        });
    }
}

/// Builds a client and proves it against the live API server before handing
/// it back: `kube::Client::try_from` only assembles an HTTP client and never
/// makes a network call, so a dead or unreachable API server would otherwise
/// surface as an empty store several layers up instead of `cluster_unreachable`
/// (§5 first-touch probe).
async fn build_client(cluster: &crate::config_registry::ClusterEntry) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(&cluster.kubeconfig_path).map_err(|e| {
        CoreError::Internal(format!(
            "reading kubeconfig {}: {e}",
            cluster.kubeconfig_path.display()
        ))
    })?;
    let options = KubeConfigOptions {
        context: cluster.context.clone(),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| CoreError::ClusterUnreachable {
            cluster: cluster.name.clone(),
            source: kube::Error::Kubeconfig(e),
        })?;
    let client = Client::try_from(config).map_err(|e| CoreError::ClusterUnreachable {
        cluster: cluster.name.clone(),
        source: e,
    })?;

    client
        .apiserver_version()
        .await
        .map_err(|e| CoreError::ClusterUnreachable {
            cluster: cluster.name.clone(),
            source: e,
        })?;

    Ok(client)
}

fn fingerprint_of(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_registry::ConfigRegistry;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(config_id: &str, kubeconfig_path: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gateway-core-client-factory-test-{}",
            std::process::id()
        ));
        let _ = std::fs::create_dir_all(&dir);
        let contents = format!(
            "config_id: {config_id}\nclusters:\n  - name: only\n    kubeconfig_path: {kubeconfig_path}\n"
        );
        let path = dir.join(format!("{config_id}.yaml"));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn get_with_a_nonexistent_kubeconfig_fails_without_caching_and_retries_cleanly() {
        let path = write_config("cfg1", "/nonexistent/kubeconfig.yaml");
        let registry = ConfigRegistry::load(vec![path]).unwrap();
        let factory = ClientFactory::new(registry);

        let first = factory.get("cfg1", "only").await;
        assert!(first.is_err());
        // A failed build is never cached: a second call reaches build_client
        // again rather than returning a stale Ok from a prior attempt.
        let second = factory.get("cfg1", "only").await;
        assert!(second.is_err());
    }

    fn write_kubeconfig_pointing_nowhere(dir: &std::path::Path) -> PathBuf {
        let kubeconfig = "apiVersion: v1\nkind: Config\nclusters:\n- name: dead\n  cluster:\n    server: https://127.0.0.1:1\ncontexts:\n- name: dead\n  context:\n    cluster: dead\n    user: dead\ncurrent-context: dead\nusers:\n- name: dead\n  user: {}\n";
        let path = dir.join("kubeconfig-dead.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(kubeconfig.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn get_against_an_unreachable_api_server_returns_cluster_unreachable() {
        let dir = std::env::temp_dir().join(format!(
            "gateway-core-client-factory-test-unreachable-{}",
            std::process::id()
        ));
        let _ = std::fs::create_dir_all(&dir);
        let kubeconfig_path = write_kubeconfig_pointing_nowhere(&dir);
        let path = write_config("cfg-dead", kubeconfig_path.to_str().unwrap());
        let registry = ConfigRegistry::load(vec![path]).unwrap();
        let factory = ClientFactory::new(registry);

        let err = factory.get("cfg-dead", "only").await.unwrap_err();
        assert!(matches!(err, CoreError::ClusterUnreachable { .. }));
    }
}
