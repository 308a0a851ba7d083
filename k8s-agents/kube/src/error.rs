use thiserror::Error;

pub type Result<T, E = KubeApiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum KubeApiError {
    #[error("Kube failed: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{kind} `{namespace}/{name}` not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
}

impl KubeApiError {
    pub fn not_found(kind: &'static str, namespace: &str, name: &str) -> Self {
        KubeApiError::NotFound {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }

    /// The object does not exist (yet). Freshly created owners can take a moment to become
    /// visible to readers, so this is the only condition worth retrying on.
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeApiError::KubeError(kube::Error::Api(response)) => response.code == 404,
            KubeApiError::NotFound { .. } => true,
            _ => false,
        }
    }
}
