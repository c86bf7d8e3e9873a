//! Error types for the snapshot sources

use nodepulse_core::FetchError;
use thiserror::Error;

/// Failure to set up a Kubernetes client
#[derive(Debug, Error)]
pub enum KubeError {
    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Context '{0}' not found in kubeconfig")]
    ContextNotFound(String),

    #[error("Failed to create Kubernetes client: {0}")]
    ClientCreate(String),
}

impl From<KubeError> for FetchError {
    fn from(error: KubeError) -> Self {
        FetchError::Config(error.to_string())
    }
}

/// Map a kube client error onto the fetch error taxonomy
pub fn fetch_error(error: kube::Error) -> FetchError {
    match error {
        kube::Error::Api(response) => FetchError::Api {
            code: response.code,
            message: response.message,
        },
        other => FetchError::Transport(other.to_string()),
    }
}
