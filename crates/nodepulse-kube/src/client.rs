//! Live cluster snapshot source
//!
//! Lists all nodes and pods cluster-wide and folds them into a
//! [`ClusterSnapshot`].

use crate::config::{self, Connection};
use crate::error::{KubeError, fetch_error};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Node, Pod};
use kube::{
    Client,
    api::{Api, ListParams},
};
use nodepulse_core::constants::NODE_READY_CONDITION;
use nodepulse_core::{
    ClusterSnapshot, ContainerSnapshot, ContainerState, FetchError, NodeSnapshot, PodPhase,
    PodSnapshot, SnapshotSource,
};
use std::collections::BTreeMap;

/// Snapshot source backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    cluster_name: String,
}

impl KubeSource {
    /// Connect using the default kubeconfig and the given (or current) context
    pub async fn connect(context: Option<&str>) -> Result<Self, KubeError> {
        let Connection {
            client,
            cluster_name,
        } = config::connect(context).await?;
        Ok(Self::new(client, cluster_name))
    }

    pub fn new(client: Client, cluster_name: impl Into<String>) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
        }
    }
}

impl SnapshotSource for KubeSource {
    async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
        let nodes_api: Api<Node> = Api::all(self.client.clone());
        let pods_api: Api<Pod> = Api::all(self.client.clone());
        let list_params = ListParams::default();

        let (nodes, pods) = tokio::join!(nodes_api.list(&list_params), pods_api.list(&list_params));
        let nodes = nodes.map_err(fetch_error)?;
        let pods = pods.map_err(fetch_error)?;

        tracing::debug!(
            nodes = nodes.items.len(),
            pods = pods.items.len(),
            "Listed cluster resources"
        );
        Ok(build_snapshot(&nodes.items, &pods.items))
    }

    fn cluster_name(&self) -> String {
        self.cluster_name.clone()
    }
}

/// Assemble a snapshot from listed nodes and pods
///
/// Pods bound to a node that was not listed are dropped, as are pods that
/// have not been scheduled yet.
pub fn build_snapshot(nodes: &[Node], pods: &[Pod]) -> ClusterSnapshot {
    let mut by_name: BTreeMap<String, NodeSnapshot> = nodes
        .iter()
        .filter_map(node_from_api)
        .map(|n| (n.name.clone(), n))
        .collect();

    for pod in pods {
        let Some((node_name, snapshot)) = pod_from_api(pod) else {
            continue;
        };
        if let Some(node) = by_name.get_mut(&node_name) {
            node.pods.insert(snapshot.name.clone(), snapshot);
        }
    }

    by_name.into_values().collect()
}

/// Convert an API node; nodes without a name are skipped
pub fn node_from_api(node: &Node) -> Option<NodeSnapshot> {
    let name = node.metadata.name.clone()?;
    let status = node.status.as_ref();

    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == NODE_READY_CONDITION && c.status == "True")
        })
        .unwrap_or(false);

    let kubelet_version = status
        .and_then(|s| s.node_info.as_ref())
        .map(|info| info.kubelet_version.clone())
        .unwrap_or_default();

    let creation_time = node
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Some(NodeSnapshot::new(name, ready, kubelet_version, creation_time))
}

/// Convert an API pod into `(node name, pod)`; unscheduled pods yield `None`
pub fn pod_from_api(pod: &Pod) -> Option<(String, PodSnapshot)> {
    let name = pod.metadata.name.clone()?;
    let node_name = pod
        .spec
        .as_ref()
        .and_then(|s| s.node_name.clone())
        .filter(|n| !n.is_empty())?;
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let status = pod.status.as_ref();

    let phase = if pod.metadata.deletion_timestamp.is_some() {
        PodPhase::Terminating
    } else {
        status
            .and_then(|s| s.phase.as_deref())
            .map(PodPhase::from_api)
            .unwrap_or_default()
    };

    let statuses = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or(&[]);

    // Containers from the pod spec, so ones without a status yet still show up
    let mut containers: BTreeMap<String, ContainerSnapshot> = pod
        .spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .map(|c| {
            let snapshot = statuses
                .iter()
                .find(|s| s.name == c.name)
                .map(container_from_status)
                .unwrap_or_default();
            (c.name.clone(), snapshot)
        })
        .collect();
    for status in statuses {
        containers
            .entry(status.name.clone())
            .or_insert_with(|| container_from_status(status));
    }

    Some((node_name, PodSnapshot::new(name, namespace, phase, containers)))
}

fn container_from_status(status: &ContainerStatus) -> ContainerSnapshot {
    let state = match status.state.as_ref() {
        Some(s) if s.running.is_some() => ContainerState::Running,
        Some(s) if s.waiting.is_some() => {
            ContainerState::Waiting(s.waiting.as_ref().and_then(|w| w.reason.clone()))
        }
        Some(s) if s.terminated.is_some() => {
            ContainerState::Terminated(s.terminated.as_ref().and_then(|t| t.reason.clone()))
        }
        _ => ContainerState::Unknown,
    };
    ContainerSnapshot::new(state, u32::try_from(status.restart_count).unwrap_or(0))
}
