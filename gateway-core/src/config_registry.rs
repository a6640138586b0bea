//! C1: Config Registry.
//!
//! Holds `configID -> {file path, clusters[]}`, offering non-blocking reads
//! under an atomic pointer swap (§5 concurrency table: "Reload only" writes,
//! "All handlers" read, readers hold the old snapshot for their request).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{CoreError, Result};

/// One cluster entry as read from a config file, plus its runtime-mutable
/// `connected` flag (§3: "a runtime-mutable `connected` flag").
#[derive(Debug)]
pub struct ClusterEntry {
    /// Preserved-case name; lookups match case-insensitively against this.
    pub name: String,
    pub namespace: Option<String>,
    pub kubeconfig_path: PathBuf,
    pub context: Option<String>,
    connected: AtomicBool,
}

impl ClusterEntry {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn mark_connected(&self) {
        self.connected.store(true, Ordering::Relaxed);
    }

    /// A fingerprint of the connection material this entry would build a
    /// client from. Two entries with equal fingerprints would build
    /// byte-for-byte the same client, which is what the Client Factory uses
    /// to decide whether a reload invalidates its cache.
    pub fn connection_fingerprint(&self) -> String {
        format!(
            "{}|{}|{}",
            self.kubeconfig_path.display(),
            self.context.as_deref().unwrap_or(""),
            self.namespace.as_deref().unwrap_or(""),
        )
    }
}

/// A resolved `(configID, clusterName)` target, handed to the Client Factory.
#[derive(Clone)]
pub struct ResolvedCluster {
    pub config_id: String,
    pub cluster: Arc<ClusterEntry>,
}

struct ConfigEntry {
    config_id: String,
    source_path: PathBuf,
    clusters: Vec<Arc<ClusterEntry>>,
}

/// On-disk shape of one configuration file (§1.3 of SPEC_FULL.md).
#[derive(Debug, Deserialize)]
struct GatewayConfigFile {
    config_id: String,
    clusters: Vec<ClusterFileEntry>,
}

#[derive(Debug, Deserialize)]
struct ClusterFileEntry {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    kubeconfig_path: PathBuf,
    #[serde(default)]
    context: Option<String>,
}

struct Snapshot {
    configs: HashMap<String, Arc<ConfigEntry>>,
}

/// C1. Cheaply cloneable: holds an `Arc` to the atomic snapshot.
#[derive(Clone)]
pub struct ConfigRegistry {
    snapshot: Arc<ArcSwap<Snapshot>>,
    source_paths: Arc<Vec<PathBuf>>,
}

impl ConfigRegistry {
    /// Loads every file in `source_paths`, each one a configuration entry
    /// keyed by its own `config_id`.
    pub fn load(source_paths: Vec<PathBuf>) -> Result<Self> {
        let configs = Self::read_all(&source_paths)?;
        Ok(Self {
            snapshot: Arc::new(ArcSwap::from_pointee(Snapshot { configs })),
            source_paths: Arc::new(source_paths),
        })
    }

    fn read_all(paths: &[PathBuf]) -> Result<HashMap<String, Arc<ConfigEntry>>> {
        let mut configs = HashMap::new();
        for path in paths {
            let entry = Self::read_one(path)?;
            configs.insert(entry.config_id.clone(), Arc::new(entry));
        }
        Ok(configs)
    }

    fn read_one(path: &Path) -> Result<ConfigEntry> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("reading config file {}: {e}", path.display()))
        })?;
        let file: GatewayConfigFile = serde_yaml::from_str(&raw).map_err(|e| {
            CoreError::Internal(format!("parsing config file {}: {e}", path.display()))
        })?;
        let clusters = file
            .clusters
            .into_iter()
            .map(|c| {
                Arc::new(ClusterEntry {
                    name: c.name,
                    namespace: c.namespace,
                    kubeconfig_path: c.kubeconfig_path,
                    context: c.context,
                    connected: AtomicBool::new(false),
                })
            })
            .collect();
        Ok(ConfigEntry {
            config_id: file.config_id,
            source_path: path.to_path_buf(),
            clusters,
        })
    }

    /// `Lookup(configID) -> config | not-found`.
    pub fn lookup(&self, config_id: &str) -> Result<()> {
        let snap = self.snapshot.load();
        if snap.configs.contains_key(config_id) {
            Ok(())
        } else {
            Err(CoreError::ConfigNotFound(config_id.to_string()))
        }
    }

    /// `Resolve(configID, clusterName) -> connection | not-found | cluster-missing`.
    /// Cluster names match case-insensitively; the stored (preserved-case)
    /// name is returned.
    pub fn resolve(&self, config_id: &str, cluster_name: &str) -> Result<ResolvedCluster> {
        let snap = self.snapshot.load();
        let config = snap
            .configs
            .get(config_id)
            .ok_or_else(|| CoreError::ConfigNotFound(config_id.to_string()))?;
        let needle = cluster_name.to_lowercase();
        let cluster = config
            .clusters
            .iter()
            .find(|c| c.name.to_lowercase() == needle)
            .cloned()
            .ok_or_else(|| CoreError::ClusterNotInConfig {
                config_id: config_id.to_string(),
                cluster: cluster_name.to_string(),
            })?;
        Ok(ResolvedCluster {
            config_id: config.config_id.clone(),
            cluster,
        })
    }

    /// `MarkConnected(configID, clusterName)`, called by the Client Factory
    /// after its first successful client construction for the pair.
    pub fn mark_connected(&self, config_id: &str, cluster_name: &str) {
        if let Ok(resolved) = self.resolve(config_id, cluster_name) {
            resolved.cluster.mark_connected();
        }
    }

    /// Re-reads the backing files and atomically swaps in a new map. On
    /// failure the previous state is left intact (§4.1 invariant).
    pub fn reload(&self) -> Result<()> {
        match Self::read_all(&self.source_paths) {
            Ok(configs) => {
                self.snapshot.store(Arc::new(Snapshot { configs }));
                info!(count = self.source_paths.len(), "config registry reloaded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "config reload failed, keeping previous state");
                Err(e)
            }
        }
    }

    /// All `(config_id, cluster_name)` pairs currently known, for diagnostics
    /// and for driving informer-pool warmup.
    pub fn all_targets(&self) -> Vec<(String, String)> {
        let snap = self.snapshot.load();
        let mut out = Vec::new();
        for config in snap.configs.values() {
            for cluster in &config.clusters {
                out.push((config.config_id.clone(), cluster.name.clone()));
            }
        }
        out
    }

    #[cfg(test)]
    fn source_path_for(&self, config_id: &str) -> Option<PathBuf> {
        let snap = self.snapshot.load();
        snap.configs.get(config_id).map(|c| c.source_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile_dir::TempDir, config_id: &str, cluster_names: &[&str]) -> PathBuf {
        let clusters_yaml: String = cluster_names
            .iter()
            .map(|name| {
                format!(
                    "  - name: {name}\n    kubeconfig_path: /tmp/{name}.kubeconfig\n    context: {name}-ctx\n"
                )
            })
            .collect();
        let contents = format!("config_id: {config_id}\nclusters:\n{clusters_yaml}");
        let path = dir.path().join(format!("{config_id}.yaml"));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    // Minimal temp-dir helper so this module stays free of a tempfile
    // dev-dependency; each test gets a unique directory under std::env::temp_dir().
    mod tempfile_dir {
        use std::path::{Path, PathBuf};

        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new(tag: &str) -> Self {
                let dir = std::env::temp_dir().join(format!(
                    "gateway-core-test-{tag}-{}",
                    std::process::id()
                ));
                let _ = std::fs::remove_dir_all(&dir);
                std::fs::create_dir_all(&dir).unwrap();
                Self(dir)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[test]
    fn resolve_is_case_insensitive_but_preserves_stored_case() {
        let dir = tempfile_dir::TempDir::new("resolve");
        let path = write_config(&dir, "cfg1", &["Production"]);
        let registry = ConfigRegistry::load(vec![path]).unwrap();

        let resolved = registry.resolve("cfg1", "PRODUCTION").unwrap();
        assert_eq!(resolved.cluster.name, "Production");
    }

    #[test]
    fn resolve_unknown_config_returns_config_not_found() {
        let registry = ConfigRegistry::load(vec![]).unwrap();
        let err = registry.resolve("missing", "x").unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound(_)));
    }

    #[test]
    fn resolve_unknown_cluster_returns_cluster_not_in_config() {
        let dir = tempfile_dir::TempDir::new("cluster-missing");
        let path = write_config(&dir, "cfg1", &["prod"]);
        let registry = ConfigRegistry::load(vec![path]).unwrap();

        let err = registry.resolve("cfg1", "staging").unwrap_err();
        assert!(matches!(err, CoreError::ClusterNotInConfig { .. }));
    }

    #[test]
    fn reload_picks_up_renamed_cluster_and_drops_the_old_name() {
        let dir = tempfile_dir::TempDir::new("reload");
        let path = write_config(&dir, "cfg1", &["prod"]);
        let registry = ConfigRegistry::load(vec![path.clone()]).unwrap();
        assert!(registry.resolve("cfg1", "prod").is_ok());

        // Rename the cluster in the backing file.
        write_config(&dir, "cfg1", &["prod-renamed"]);
        // write_config writes to the same deterministic path for config_id "cfg1".
        registry.reload().unwrap();

        assert!(matches!(
            registry.resolve("cfg1", "prod"),
            Err(CoreError::ClusterNotInConfig { .. })
        ));
        assert!(registry.resolve("cfg1", "prod-renamed").is_ok());
        assert_eq!(registry.source_path_for("cfg1"), Some(path));
    }

    #[test]
    fn mark_connected_flips_the_flag_for_the_right_cluster_only() {
        let dir = tempfile_dir::TempDir::new("mark-connected");
        let path = write_config(&dir, "cfg1", &["a", "b"]);
        let registry = ConfigRegistry::load(vec![path]).unwrap();

        registry.mark_connected("cfg1", "a");

        assert!(registry.resolve("cfg1", "a").unwrap().cluster.is_connected());
        assert!(!registry.resolve("cfg1", "b").unwrap().cluster.is_connected());
    }
}
