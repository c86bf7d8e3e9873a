//! Point-in-time cluster state
//!
//! Immutable value types describing the nodes of a cluster, the pods
//! scheduled on them and their containers, as returned by one fetch.
//! Maps are ordered by key so every walk over a snapshot is deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle phase of a pod as shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PodPhase {
    Running,
    Pending,
    /// Deletion requested but the pod is still present
    Terminating,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    /// Parse the phase string reported by the Kubernetes API
    pub fn from_api(phase: &str) -> Self {
        match phase {
            "Running" => PodPhase::Running,
            "Pending" => PodPhase::Pending,
            "Terminating" => PodPhase::Terminating,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Running => "Running",
            PodPhase::Pending => "Pending",
            PodPhase::Terminating => "Terminating",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed state of a single container
///
/// Waiting and terminated states carry the reason reported by the kubelet
/// (e.g. `CrashLoopBackOff`, `Completed`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContainerState {
    Running,
    Waiting(Option<String>),
    Terminated(Option<String>),
    #[default]
    Unknown,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }

    /// Reason for a waiting container, if any
    pub fn waiting_reason(&self) -> Option<&str> {
        match self {
            ContainerState::Waiting(reason) => reason.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Running => write!(f, "Running"),
            ContainerState::Waiting(Some(reason)) | ContainerState::Terminated(Some(reason)) => {
                write!(f, "{}", reason)
            }
            ContainerState::Waiting(None) => write!(f, "Waiting"),
            ContainerState::Terminated(None) => write!(f, "Terminated"),
            ContainerState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A container within a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContainerSnapshot {
    pub state: ContainerState,
    pub restart_count: u32,
}

impl ContainerSnapshot {
    pub fn new(state: ContainerState, restart_count: u32) -> Self {
        Self {
            state,
            restart_count,
        }
    }
}

/// A pod scheduled on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// Sum of the restart counts of all containers
    pub restart_count: u32,
    pub containers: BTreeMap<String, ContainerSnapshot>,
}

impl PodSnapshot {
    /// Create a pod, deriving its restart count from the containers
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        phase: PodPhase,
        containers: BTreeMap<String, ContainerSnapshot>,
    ) -> Self {
        let restart_count = containers.values().map(|c| c.restart_count).sum();
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase,
            restart_count,
            containers,
        }
    }

    /// Add or replace a container, keeping the restart total in sync
    pub fn with_container(mut self, name: impl Into<String>, container: ContainerSnapshot) -> Self {
        self.containers.insert(name.into(), container);
        self.restart_count = self.containers.values().map(|c| c.restart_count).sum();
        self
    }
}

/// A node and the pods currently scheduled on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub ready: bool,
    pub kubelet_version: String,
    pub creation_time: DateTime<Utc>,
    pub pods: BTreeMap<String, PodSnapshot>,
}

impl NodeSnapshot {
    pub fn new(
        name: impl Into<String>,
        ready: bool,
        kubelet_version: impl Into<String>,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            ready,
            kubelet_version: kubelet_version.into(),
            creation_time,
            pods: BTreeMap::new(),
        }
    }

    pub fn with_pod(mut self, pod: PodSnapshot) -> Self {
        self.pods.insert(pod.name.clone(), pod);
        self
    }

    /// Unfiltered number of pods on the node
    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    /// Readiness as displayed in the status column
    pub fn status_label(&self) -> &'static str {
        if self.ready { "Ready" } else { "NotReady" }
    }
}

/// Complete view of the cluster produced by one successful fetch
///
/// Nodes are held behind `Arc` so consecutive snapshots and the state cache
/// can share unchanged nodes without copying.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterSnapshot {
    nodes: BTreeMap<String, Arc<NodeSnapshot>>,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node while building a snapshot
    pub fn insert(&mut self, node: NodeSnapshot) {
        self.nodes.insert(node.name.clone(), Arc::new(node));
    }

    /// Insert an already shared node
    pub fn insert_shared(&mut self, node: Arc<NodeSnapshot>) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NodeSnapshot>> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<NodeSnapshot>> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total pods across all nodes
    pub fn pod_count(&self) -> usize {
        self.nodes.values().map(|n| n.pod_count()).sum()
    }
}

impl FromIterator<NodeSnapshot> for ClusterSnapshot {
    fn from_iter<I: IntoIterator<Item = NodeSnapshot>>(iter: I) -> Self {
        let mut snapshot = ClusterSnapshot::new();
        for node in iter {
            snapshot.insert(node);
        }
        snapshot
    }
}
