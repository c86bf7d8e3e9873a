//! Kubeconfig handling
//!
//! Resolves which context to use and builds a client for it.

use crate::error::KubeError;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Client plus the display name of the cluster it talks to
pub struct Connection {
    pub client: Client,
    pub cluster_name: String,
}

/// Name of the cluster referenced by a context
///
/// Falls back to the context name when the entry carries no cluster, and
/// to `"unknown"` when no context is selected at all.
pub fn cluster_name(kubeconfig: &Kubeconfig, context: Option<&str>) -> Result<String, KubeError> {
    let Some(name) = context.or(kubeconfig.current_context.as_deref()) else {
        return Ok("unknown".to_string());
    };

    let entry = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| KubeError::ContextNotFound(name.to_string()))?;

    Ok(entry
        .context
        .as_ref()
        .map(|c| c.cluster.clone())
        .filter(|cluster| !cluster.is_empty())
        .unwrap_or_else(|| name.to_string()))
}

/// Connect using the default kubeconfig, optionally overriding the context
pub async fn connect(context: Option<&str>) -> Result<Connection, KubeError> {
    let kubeconfig = Kubeconfig::read().map_err(|e| KubeError::Kubeconfig(e.to_string()))?;
    let cluster_name = cluster_name(&kubeconfig, context)?;

    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| KubeError::ClientCreate(e.to_string()))?;
    let client = Client::try_from(config).map_err(|e| KubeError::ClientCreate(e.to_string()))?;

    tracing::info!(cluster = %cluster_name, "Connected to Kubernetes API");
    Ok(Connection {
        client,
        cluster_name,
    })
}
