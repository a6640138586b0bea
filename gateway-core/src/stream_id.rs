//! Deterministic stream identifiers (§3, §8 property 1).
//!
//! Two requests with equal `(configID, cluster, kind, namespace?, name?)`
//! MUST compute byte-equal stream IDs; the formats below are the only place
//! that derivation happens so that invariant holds by construction.

use std::fmt;

/// A canonical, hashable, cheaply-clonable stream identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{configID}-{cluster}-{kind}`
    pub fn list(config_id: &str, cluster: &str, kind: &str) -> Self {
        Self(format!("{config_id}-{cluster}-{kind}"))
    }

    /// `{configID}-{cluster}-{kind}-{namespace}-{name}`, namespace segment
    /// omitted for cluster-scoped kinds.
    pub fn detail(config_id: &str, cluster: &str, kind: &str, namespace: Option<&str>, name: &str) -> Self {
        match namespace {
            Some(ns) => Self(format!("{config_id}-{cluster}-{kind}-{ns}-{name}")),
            None => Self(format!("{config_id}-{cluster}-{kind}-{name}")),
        }
    }

    /// `{detail streamID}-yaml`
    pub fn yaml(config_id: &str, cluster: &str, kind: &str, namespace: Option<&str>, name: &str) -> Self {
        let detail = Self::detail(config_id, cluster, kind, namespace, name);
        Self(format!("{}-yaml", detail.0))
    }

    /// `{configID}-{cluster}-{namespace}-{name}-events`
    pub fn events(config_id: &str, cluster: &str, namespace: &str, name: &str) -> Self {
        Self(format!("{config_id}-{cluster}-{namespace}-{name}-events"))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_stream_id_is_deterministic() {
        let a = StreamId::list("cfg1", "prod", "pods");
        let b = StreamId::list("cfg1", "prod", "pods");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "cfg1-prod-pods");
    }

    #[test]
    fn detail_stream_id_omits_namespace_for_cluster_scoped() {
        let namespaced = StreamId::detail("cfg1", "prod", "pods", Some("default"), "p");
        assert_eq!(namespaced.as_str(), "cfg1-prod-pods-default-p");

        let cluster_scoped = StreamId::detail("cfg1", "prod", "nodes", None, "node-1");
        assert_eq!(cluster_scoped.as_str(), "cfg1-prod-nodes-node-1");
    }

    #[test]
    fn yaml_stream_id_appends_suffix_to_detail() {
        let detail = StreamId::detail("cfg1", "prod", "pods", Some("default"), "p");
        let yaml = StreamId::yaml("cfg1", "prod", "pods", Some("default"), "p");
        assert_eq!(yaml.as_str(), format!("{detail}-yaml"));
    }

    #[test]
    fn events_stream_id_shape() {
        let events = StreamId::events("cfg1", "prod", "default", "p");
        assert_eq!(events.as_str(), "cfg1-prod-default-p-events");
    }
}
