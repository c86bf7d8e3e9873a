//! Change detection between consecutive snapshots
//!
//! [`StateCache`] remembers the last observed state of every node and turns
//! each new observation into a list of [`ChangeEvent`]s. Events from one
//! comparison come out in a fixed order: node fields first, then pods by
//! name (with their containers by name), then removed pods by name.

use crate::snapshot::{
    ClusterSnapshot, ContainerSnapshot, ContainerState, NodeSnapshot, PodPhase, PodSnapshot,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Kind of resource a change refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Node,
    Pod,
    Container,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Node => "Node",
            ResourceKind::Pod => "Pod",
            ResourceKind::Container => "Container",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeType::Added => "Added",
            ChangeType::Removed => "Removed",
            ChangeType::Modified => "Modified",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Field whose value changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeField {
    /// Node readiness
    Readiness,
    KubeletVersion,
    PodCount,
    /// Pod phase
    Phase,
    RestartCount,
    /// Container state
    Status,
}

impl ChangeField {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeField::Readiness => "Ready",
            ChangeField::KubeletVersion => "Version",
            ChangeField::PodCount => "PodCount",
            ChangeField::Phase => "Phase",
            ChangeField::RestartCount => "RestartCount",
            ChangeField::Status => "Status",
        }
    }
}

impl std::fmt::Display for ChangeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Typed old/new value carried by a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    Count(u64),
    Phase(PodPhase),
    Container(ContainerState),
    /// A whole node, for node additions and removals
    Node(Arc<NodeSnapshot>),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
            FieldValue::Count(v) => write!(f, "{}", v),
            FieldValue::Phase(v) => write!(f, "{}", v),
            FieldValue::Container(v) => write!(f, "{}", v),
            FieldValue::Node(_) => write!(f, "present"),
        }
    }
}

/// Render an optional value, `-` when absent
pub fn format_value(value: Option<&FieldValue>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// A discrete change detected between two observations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub resource_kind: ResourceKind,
    /// `node`, `node/pod` or `node/pod/container`
    pub resource_key: String,
    pub change_type: ChangeType,
    pub field: Option<ChangeField>,
    pub old_value: Option<FieldValue>,
    pub new_value: Option<FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    fn new(
        resource_kind: ResourceKind,
        resource_key: String,
        change_type: ChangeType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_kind,
            resource_key,
            change_type,
            field: None,
            old_value: None,
            new_value: None,
            timestamp,
        }
    }

    fn modified(
        resource_kind: ResourceKind,
        resource_key: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(resource_kind, resource_key, ChangeType::Modified, timestamp)
    }

    fn field(mut self, field: ChangeField) -> Self {
        self.field = Some(field);
        self
    }

    fn old(mut self, value: FieldValue) -> Self {
        self.old_value = Some(value);
        self
    }

    fn new_value(mut self, value: FieldValue) -> Self {
        self.new_value = Some(value);
        self
    }

    /// Field and values as `field: old -> new`, if the change has a field
    pub fn describe(&self) -> Option<String> {
        self.field.map(|field| {
            format!(
                "{}: {} -> {}",
                field,
                format_value(self.old_value.as_ref()),
                format_value(self.new_value.as_ref())
            )
        })
    }
}

/// Observation of one node; `None` signals that the node is gone
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub data: Option<Arc<NodeSnapshot>>,
    pub timestamp: DateTime<Utc>,
}

impl ResourceState {
    pub fn present(node: Arc<NodeSnapshot>, timestamp: DateTime<Utc>) -> Self {
        Self {
            data: Some(node),
            timestamp,
        }
    }

    pub fn removed(timestamp: DateTime<Utc>) -> Self {
        Self {
            data: None,
            timestamp,
        }
    }
}

/// Last observed state per node, guarded by a single lock
///
/// The map is never exposed; all access goes through the methods below, and
/// each one holds the lock only for its own duration.
#[derive(Debug, Default)]
pub struct StateCache {
    entries: Mutex<BTreeMap<String, ResourceState>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, ResourceState>> {
        // The map holds plain values, so a panicked holder cannot leave it half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compare a new observation of `key` against the cached one
    ///
    /// # Examples
    ///
    /// ```
    /// use nodepulse_core::diff::{ChangeType, ResourceState, StateCache};
    /// use nodepulse_core::snapshot::NodeSnapshot;
    /// use chrono::Utc;
    /// use std::sync::Arc;
    ///
    /// let cache = StateCache::new();
    /// let node = Arc::new(NodeSnapshot::new("n1", true, "v1.30.0", Utc::now()));
    /// let events = cache.compare("n1", ResourceState::present(node, Utc::now()));
    /// assert_eq!(events.len(), 1);
    /// assert_eq!(events[0].change_type, ChangeType::Added);
    /// ```
    pub fn compare(&self, key: &str, state: ResourceState) -> Vec<ChangeEvent> {
        let mut entries = self.entries();
        compare_locked(&mut entries, key, state)
    }

    /// Store every node of a snapshot without emitting events
    pub fn seed(&self, snapshot: &ClusterSnapshot) {
        let now = Utc::now();
        let mut entries = self.entries();
        for node in snapshot.nodes() {
            entries.insert(
                node.name.clone(),
                ResourceState::present(Arc::clone(node), now),
            );
        }
    }

    /// Compare a whole snapshot, then report cached nodes it no longer has
    pub fn reconcile(
        &self,
        snapshot: &ClusterSnapshot,
        timestamp: DateTime<Utc>,
    ) -> Vec<ChangeEvent> {
        let mut entries = self.entries();
        let mut events = Vec::new();

        for node in snapshot.nodes() {
            events.extend(compare_locked(
                &mut entries,
                &node.name,
                ResourceState::present(Arc::clone(node), timestamp),
            ));
        }

        let gone: Vec<String> = entries
            .keys()
            .filter(|key| !snapshot.contains(key))
            .cloned()
            .collect();
        for key in gone {
            events.extend(compare_locked(&mut entries, &key, ResourceState::removed(timestamp)));
        }

        events
    }

    pub fn get(&self, key: &str) -> Option<ResourceState> {
        self.entries().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

fn compare_locked(
    entries: &mut BTreeMap<String, ResourceState>,
    key: &str,
    state: ResourceState,
) -> Vec<ChangeEvent> {
    let ts = state.timestamp;

    let Some(previous) = entries.get(key) else {
        // Removal of something never seen is not a change
        let Some(node) = state.data.clone() else {
            return Vec::new();
        };
        entries.insert(key.to_string(), state);
        return vec![
            ChangeEvent::new(ResourceKind::Node, key.to_string(), ChangeType::Added, ts)
                .new_value(FieldValue::Node(node)),
        ];
    };

    let Some(new_node) = state.data.clone() else {
        let old = previous.data.clone();
        entries.remove(key);
        let mut event =
            ChangeEvent::new(ResourceKind::Node, key.to_string(), ChangeType::Removed, ts);
        event.old_value = old.map(FieldValue::Node);
        return vec![event];
    };

    let events = match &previous.data {
        Some(old_node) => diff_nodes(key, old_node, &new_node, ts),
        None => Vec::new(),
    };
    entries.insert(key.to_string(), state);
    events
}

fn diff_nodes(
    key: &str,
    old: &NodeSnapshot,
    new: &NodeSnapshot,
    ts: DateTime<Utc>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    let modified = |field, old_value, new_value| {
        ChangeEvent::modified(ResourceKind::Node, key.to_string(), ts)
            .field(field)
            .old(old_value)
            .new_value(new_value)
    };

    if old.ready != new.ready {
        events.push(modified(
            ChangeField::Readiness,
            FieldValue::Bool(old.ready),
            FieldValue::Bool(new.ready),
        ));
    }
    if old.kubelet_version != new.kubelet_version {
        events.push(modified(
            ChangeField::KubeletVersion,
            FieldValue::Text(old.kubelet_version.clone()),
            FieldValue::Text(new.kubelet_version.clone()),
        ));
    }
    if old.pod_count() != new.pod_count() {
        events.push(modified(
            ChangeField::PodCount,
            FieldValue::Count(old.pod_count() as u64),
            FieldValue::Count(new.pod_count() as u64),
        ));
    }

    for (name, pod) in &new.pods {
        let pod_key = format!("{}/{}", key, name);
        match old.pods.get(name) {
            None => events.push(
                ChangeEvent::new(ResourceKind::Pod, pod_key, ChangeType::Added, ts)
                    .field(ChangeField::Phase)
                    .new_value(FieldValue::Phase(pod.phase)),
            ),
            Some(old_pod) => diff_pods(&pod_key, old_pod, pod, ts, &mut events),
        }
    }

    for (name, pod) in &old.pods {
        if !new.pods.contains_key(name) {
            let pod_key = format!("{}/{}", key, name);
            events.push(
                ChangeEvent::new(ResourceKind::Pod, pod_key, ChangeType::Removed, ts)
                    .field(ChangeField::Phase)
                    .old(FieldValue::Phase(pod.phase)),
            );
        }
    }

    events
}

fn diff_pods(
    pod_key: &str,
    old: &PodSnapshot,
    new: &PodSnapshot,
    ts: DateTime<Utc>,
    events: &mut Vec<ChangeEvent>,
) {
    if old.phase != new.phase {
        events.push(
            ChangeEvent::modified(ResourceKind::Pod, pod_key.to_string(), ts)
                .field(ChangeField::Phase)
                .old(FieldValue::Phase(old.phase))
                .new_value(FieldValue::Phase(new.phase)),
        );
    }
    if old.restart_count != new.restart_count {
        events.push(
            ChangeEvent::modified(ResourceKind::Pod, pod_key.to_string(), ts)
                .field(ChangeField::RestartCount)
                .old(FieldValue::Count(old.restart_count.into()))
                .new_value(FieldValue::Count(new.restart_count.into())),
        );
    }

    for (name, container) in &new.containers {
        let key = format!("{}/{}", pod_key, name);
        match old.containers.get(name) {
            None => events.push(
                ChangeEvent::new(ResourceKind::Container, key, ChangeType::Added, ts)
                    .field(ChangeField::Status)
                    .new_value(FieldValue::Container(container.state.clone())),
            ),
            Some(old_container) => diff_containers(&key, old_container, container, ts, events),
        }
    }

    for (name, container) in &old.containers {
        if !new.containers.contains_key(name) {
            events.push(
                ChangeEvent::new(
                    ResourceKind::Container,
                    format!("{}/{}", pod_key, name),
                    ChangeType::Removed,
                    ts,
                )
                .field(ChangeField::Status)
                .old(FieldValue::Container(container.state.clone())),
            );
        }
    }
}

fn diff_containers(
    key: &str,
    old: &ContainerSnapshot,
    new: &ContainerSnapshot,
    ts: DateTime<Utc>,
    events: &mut Vec<ChangeEvent>,
) {
    if old.state != new.state {
        events.push(
            ChangeEvent::modified(ResourceKind::Container, key.to_string(), ts)
                .field(ChangeField::Status)
                .old(FieldValue::Container(old.state.clone()))
                .new_value(FieldValue::Container(new.state.clone())),
        );
    }
    if old.restart_count != new.restart_count {
        events.push(
            ChangeEvent::modified(ResourceKind::Container, key.to_string(), ts)
                .field(ChangeField::RestartCount)
                .old(FieldValue::Count(old.restart_count.into()))
                .new_value(FieldValue::Count(new.restart_count.into())),
        );
    }
}
