use serde::Serialize;
use thiserror::Error;

/// The taxonomy of errors the core can raise, per the error handling design:
/// configuration errors never retried, connectivity errors retried on the
/// next request, permission errors surfaced distinctly, everything else
/// logged and collapsed to an internal error.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("config '{0}' not found")]
    ConfigNotFound(String),

    #[error("cluster '{cluster}' not in config '{config_id}'")]
    ClusterNotInConfig { config_id: String, cluster: String },

    #[error("cluster '{cluster}' unreachable: {source}")]
    ClusterUnreachable {
        cluster: String,
        #[source]
        source: kube::Error,
    },

    #[error("resource kind '{0}' is unknown")]
    KindUnknown(String),

    #[error("permission denied for {verb} on {resource}")]
    PermissionDenied { verb: String, resource: String },

    #[error("kube error: {0}")]
    Kube(#[source] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// The SSE error envelope of the handler template: `{"error": {...}}`.
#[derive(Serialize, Debug, Clone)]
pub struct ErrorEnvelope {
    pub error: ErrorEnvelopeBody,
}

#[derive(Serialize, Debug, Clone)]
pub struct ErrorEnvelopeBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    pub code: u16,
    pub resource: String,
    pub verb: String,
}

impl CoreError {
    /// Maps this error onto the SSE error envelope of the handler template,
    /// given the plural resource name and the k8s verb that was attempted.
    pub fn to_envelope(&self, resource: &str, verb: &str) -> ErrorEnvelope {
        let (kind, code) = match self {
            CoreError::ConfigNotFound(_) => ("config_not_found", 400),
            CoreError::ClusterNotInConfig { .. } => ("config_not_found", 400),
            CoreError::ClusterUnreachable { .. } => ("cluster_unreachable", 500),
            CoreError::PermissionDenied { .. } => ("permission_error", 403),
            CoreError::KindUnknown(_) => ("internal", 400),
            CoreError::Kube(_) | CoreError::Serialization(_) | CoreError::Internal(_) => {
                ("internal", 500)
            }
        };
        ErrorEnvelope {
            error: ErrorEnvelopeBody {
                kind,
                message: self.to_string(),
                code,
                resource: resource.to_string(),
                verb: verb.to_string(),
            },
        }
    }

    /// The HTTP status direct (non-SSE) endpoints should use for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::ConfigNotFound(_) | CoreError::ClusterNotInConfig { .. } => 400,
            CoreError::ClusterUnreachable { .. } => 500,
            CoreError::PermissionDenied { .. } => 403,
            CoreError::KindUnknown(_) => 400,
            CoreError::Kube(_) | CoreError::Serialization(_) | CoreError::Internal(_) => 500,
        }
    }

    /// `true` for errors that should never be retried without operator action
    /// (configuration errors), mirroring §7's "never retried" classification.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CoreError::ConfigNotFound(_) | CoreError::ClusterNotInConfig { .. }
        )
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            CoreError::ConfigNotFound(_) => "config_not_found",
            CoreError::ClusterNotInConfig { .. } => "cluster_not_in_config",
            CoreError::ClusterUnreachable { .. } => "cluster_unreachable",
            CoreError::KindUnknown(_) => "kind_unknown",
            CoreError::PermissionDenied { .. } => "permission_denied",
            CoreError::Kube(_) => "kube",
            CoreError::Serialization(_) => "serialization",
            CoreError::Internal(_) => "internal",
        }
    }
}

impl From<kube::Error> for CoreError {
    fn from(e: kube::Error) -> Self {
        CoreError::Kube(e)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_maps_to_403_envelope() {
        let err = CoreError::PermissionDenied {
            verb: "update".into(),
            resource: "deployments".into(),
        };
        let envelope = err.to_envelope("deployments", "update");
        assert_eq!(envelope.error.kind, "permission_error");
        assert_eq!(envelope.error.code, 403);
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn config_errors_are_permanent() {
        assert!(CoreError::ConfigNotFound("a".into()).is_permanent());
        assert!(CoreError::ClusterNotInConfig {
            config_id: "a".into(),
            cluster: "b".into()
        }
        .is_permanent());
        assert!(!CoreError::Internal("x".into()).is_permanent());
    }
}
