//! Resource kind descriptors (§3 "Resource kind descriptor").
//!
//! A small static table of the built-in kinds the gateway lists/watches out
//! of the box, used as C3's fallback before a discovery round-trip is
//! needed and as C7's dispatch table (kind -> {plural, group, version,
//! namespaced}), per the design note preferring a tagged lookup table over a
//! handler class hierarchy.

use serde::{Deserialize, Serialize};

/// A single known (or discovered) Kubernetes resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDescriptor {
    pub kind: String,
    pub plural: String,
    pub group: String,
    pub version: String,
    pub namespaced: bool,
}

impl KindDescriptor {
    pub fn new(kind: &str, plural: &str, group: &str, version: &str, namespaced: bool) -> Self {
        Self {
            kind: kind.to_string(),
            plural: plural.to_string(),
            group: group.to_string(),
            version: version.to_string(),
            namespaced,
        }
    }
}

/// Built-in kinds known without a discovery round-trip.
pub fn builtin_kinds() -> Vec<KindDescriptor> {
    vec![
        KindDescriptor::new("Pod", "pods", "", "v1", true),
        KindDescriptor::new("Service", "services", "", "v1", true),
        KindDescriptor::new("ConfigMap", "configmaps", "", "v1", true),
        KindDescriptor::new("Secret", "secrets", "", "v1", true),
        KindDescriptor::new("Event", "events", "", "v1", true),
        KindDescriptor::new("Node", "nodes", "", "v1", false),
        KindDescriptor::new("Namespace", "namespaces", "", "v1", false),
        KindDescriptor::new(
            "PersistentVolumeClaim",
            "persistentvolumeclaims",
            "",
            "v1",
            true,
        ),
        KindDescriptor::new("Deployment", "deployments", "apps", "v1", true),
        KindDescriptor::new("StatefulSet", "statefulsets", "apps", "v1", true),
        KindDescriptor::new("DaemonSet", "daemonsets", "apps", "v1", true),
        KindDescriptor::new("ReplicaSet", "replicasets", "apps", "v1", true),
        KindDescriptor::new("Job", "jobs", "batch", "v1", true),
        KindDescriptor::new("CronJob", "cronjobs", "batch", "v1", true),
    ]
}

/// Case-insensitive lookup by kind name or plural, matching C3's
/// `FindResourceByKind` contract.
pub fn find_builtin(kind_or_plural: &str) -> Option<KindDescriptor> {
    let needle = kind_or_plural.to_lowercase();
    builtin_kinds()
        .into_iter()
        .find(|d| d.kind.to_lowercase() == needle || d.plural.to_lowercase() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_builtin_is_case_insensitive_and_matches_plural() {
        assert_eq!(find_builtin("pod").unwrap().kind, "Pod");
        assert_eq!(find_builtin("PODS").unwrap().kind, "Pod");
        assert_eq!(find_builtin("Deployments").unwrap().plural, "deployments");
        assert!(find_builtin("widgets").is_none());
    }
}
