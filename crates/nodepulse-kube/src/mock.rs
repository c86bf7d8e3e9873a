//! Random snapshot generator for running without a cluster
//!
//! Starts with three ready nodes and no pods. Every fetch applies exactly
//! one random mutation, so consecutive snapshots differ in a small and
//! predictable way.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use nodepulse_core::{
    ClusterSnapshot, ContainerSnapshot, ContainerState, FetchError, NodeSnapshot, PodPhase,
    PodSnapshot, SnapshotSource,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

const MOCK_CLUSTER: &str = "mock-cluster";
const MOCK_NODES: &[&str] = &["node1", "node2", "node3"];
const MOCK_KUBELET_VERSION: &str = "v1.24.0";
const MOCK_NAMESPACES: &[&str] = &["default", "kube-system", "monitoring"];
const MOCK_PHASES: &[PodPhase] = &[
    PodPhase::Running,
    PodPhase::Pending,
    PodPhase::Failed,
    PodPhase::Terminating,
];

/// Mutation applied by one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockChange {
    AddPod,
    RerollPod,
    FlipReadiness,
    BumpRestart,
}

const MOCK_CHANGES: &[MockChange] = &[
    MockChange::AddPod,
    MockChange::RerollPod,
    MockChange::FlipReadiness,
    MockChange::BumpRestart,
];

struct MockState {
    rng: StdRng,
    nodes: BTreeMap<String, NodeSnapshot>,
}

impl MockState {
    fn new(rng: StdRng, created: DateTime<Utc>) -> Self {
        let nodes = MOCK_NODES
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    NodeSnapshot::new(*name, true, MOCK_KUBELET_VERSION, created),
                )
            })
            .collect();
        Self { rng, nodes }
    }

    fn step(&mut self) -> (MockChange, String) {
        let change = MOCK_CHANGES[self.rng.gen_range(0..MOCK_CHANGES.len())];
        let node = MOCK_NODES[self.rng.gen_range(0..MOCK_NODES.len())].to_string();
        self.apply(change, &node);
        (change, node)
    }

    fn apply(&mut self, change: MockChange, node_name: &str) {
        let Some(node) = self.nodes.get_mut(node_name) else {
            return;
        };
        let rng = &mut self.rng;

        match change {
            MockChange::AddPod => {
                let namespace = MOCK_NAMESPACES[rng.gen_range(0..MOCK_NAMESPACES.len())];
                let name = format!("{}-pod-{}-{}", node_name, namespace, node.pods.len() + 1);
                let pod = random_pod(rng, &name, namespace);
                node.pods.insert(name, pod);
            }
            MockChange::RerollPod => {
                let names: Vec<String> = node.pods.keys().cloned().collect();
                if let Some(name) = names.choose(rng) {
                    let namespace = node.pods[name].namespace.clone();
                    let pod = random_pod(rng, name, &namespace);
                    node.pods.insert(name.clone(), pod);
                }
            }
            MockChange::FlipReadiness => {
                node.ready = !node.ready;
            }
            MockChange::BumpRestart => {
                let names: Vec<String> = node.pods.keys().cloned().collect();
                let Some(name) = names.choose(rng) else {
                    return;
                };
                let Some(pod) = node.pods.remove(name) else {
                    return;
                };
                let containers: Vec<String> = pod.containers.keys().cloned().collect();
                let pod = match containers.choose(rng) {
                    Some(container) => {
                        let mut bumped = pod.containers[container].clone();
                        bumped.restart_count += 1;
                        pod.with_container(container.clone(), bumped)
                    }
                    None => pod,
                };
                node.pods.insert(name.clone(), pod);
            }
        }
    }

    fn snapshot(&self) -> ClusterSnapshot {
        self.nodes.values().cloned().collect()
    }
}

fn random_pod(rng: &mut StdRng, name: &str, namespace: &str) -> PodSnapshot {
    let phase = MOCK_PHASES[rng.gen_range(0..MOCK_PHASES.len())];
    let state = match phase {
        PodPhase::Pending => ContainerState::Waiting(Some("ContainerCreating".to_string())),
        PodPhase::Failed => ContainerState::Terminated(Some("Error".to_string())),
        _ => ContainerState::Running,
    };

    let count = rng.gen_range(1..=2);
    (0..count).fold(
        PodSnapshot::new(name, namespace, phase, BTreeMap::new()),
        |pod, i| {
            let restarts = rng.gen_range(0..5);
            pod.with_container(
                format!("{}-container-{}", name, i),
                ContainerSnapshot::new(state.clone(), restarts),
            )
        },
    )
}

fn seeded_creation_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Snapshot source producing a slowly mutating fake cluster
pub struct MockSource {
    state: Mutex<MockState>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSource {
    pub fn new() -> Self {
        let created = Utc::now() - ChronoDuration::hours(24);
        Self::from_rng(StdRng::from_entropy(), created)
    }

    /// Deterministic generator for tests and demos; nodes share a fixed
    /// creation time so equal seeds yield equal snapshots
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), seeded_creation_time())
    }

    fn from_rng(rng: StdRng, created: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(MockState::new(rng, created)),
        }
    }

    fn next_snapshot(&self) -> ClusterSnapshot {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (change, node) = state.step();
        tracing::debug!(?change, node = %node, "Mock cluster mutated");
        state.snapshot()
    }
}

impl SnapshotSource for MockSource {
    async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
        Ok(self.next_snapshot())
    }

    fn cluster_name(&self) -> String {
        MOCK_CLUSTER.to_string()
    }
}
