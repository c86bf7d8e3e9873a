//! View filter
//!
//! Projects a full [`ClusterSnapshot`] through namespace and search
//! criteria into what the nodes table renders: a reduced snapshot, one
//! row per node, and the classified pod indicators grouped by node and
//! namespace. Projection is pure; the input snapshot is never modified.

use crate::indicators::{PodIndicator, sort_indicators};
use crate::snapshot::{ClusterSnapshot, NodeSnapshot, PodSnapshot};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Namespace allow/deny lists and the pod-name search query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub include_namespaces: BTreeSet<String>,
    pub exclude_namespaces: BTreeSet<String>,
    pub search_query: String,
}

impl FilterCriteria {
    /// Build criteria from namespace arguments
    ///
    /// Each argument may hold several comma-separated namespaces; a leading
    /// `-` moves a namespace to the exclude list.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodepulse_core::filter::FilterCriteria;
    ///
    /// let criteria = FilterCriteria::from_namespace_args(["default,-kube-system", "monitoring"]);
    /// assert!(criteria.include_namespaces.contains("default"));
    /// assert!(criteria.include_namespaces.contains("monitoring"));
    /// assert!(criteria.exclude_namespaces.contains("kube-system"));
    /// ```
    pub fn from_namespace_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut criteria = FilterCriteria::default();
        for arg in args {
            for ns in arg
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                if let Some(excluded) = ns.strip_prefix('-') {
                    if !excluded.is_empty() {
                        criteria.exclude_namespaces.insert(excluded.to_string());
                    }
                } else {
                    criteria.include_namespaces.insert(ns.to_string());
                }
            }
        }
        criteria
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }

    /// Namespace pass: a non-empty include list wins over the exclude list
    pub fn allows_namespace(&self, namespace: &str) -> bool {
        if !self.include_namespaces.is_empty() {
            self.include_namespaces.contains(namespace)
        } else {
            !self.exclude_namespaces.contains(namespace)
        }
    }

    /// Search pass: case-insensitive substring of the pod name
    pub fn matches_search(&self, pod_name: &str) -> bool {
        self.search_query.is_empty()
            || pod_name
                .to_lowercase()
                .contains(&self.search_query.to_lowercase())
    }

    pub fn has_namespace_filter(&self) -> bool {
        !self.include_namespaces.is_empty() || !self.exclude_namespaces.is_empty()
    }
}

/// One row of the nodes table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub name: String,
    pub ready: bool,
    pub kubelet_version: String,
    pub creation_time: DateTime<Utc>,
    /// `"<filtered>"` or `"<filtered> (<total>)"`
    pub pod_count: String,
}

impl NodeRow {
    pub fn status_label(&self) -> &'static str {
        if self.ready { "Ready" } else { "NotReady" }
    }
}

/// Indicators keyed by node, then namespace
pub type IndicatorMap = BTreeMap<String, BTreeMap<String, Vec<PodIndicator>>>;

/// Result of projecting a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    /// Snapshot holding only the pods that passed both filter passes
    pub snapshot: ClusterSnapshot,
    pub nodes: Vec<NodeRow>,
    pub indicators: IndicatorMap,
    /// Namespace columns, stable while a search is active
    pub namespaces: BTreeSet<String>,
}

impl FilteredView {
    /// Indicators for one table cell
    pub fn indicators_for(&self, node: &str, namespace: &str) -> &[PodIndicator] {
        self.indicators
            .get(node)
            .and_then(|by_ns| by_ns.get(namespace))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Format the pod count column
///
/// # Examples
///
/// ```
/// use nodepulse_core::filter::format_pod_count;
///
/// assert_eq!(format_pod_count(5, 5), "5");
/// assert_eq!(format_pod_count(3, 5), "3 (5)");
/// ```
pub fn format_pod_count(filtered: usize, total: usize) -> String {
    if filtered == total {
        filtered.to_string()
    } else {
        format!("{} ({})", filtered, total)
    }
}

/// Project a snapshot through the filter criteria
///
/// Every node is kept, even one whose pods are all filtered out. With a
/// non-empty include list the namespace columns are exactly the included
/// namespaces; otherwise they are the namespaces that survived the
/// namespace pass.
pub fn project(snapshot: &ClusterSnapshot, criteria: &FilterCriteria) -> FilteredView {
    if criteria == &FilterCriteria::default() {
        return project_unfiltered(snapshot);
    }

    let mut view = FilteredView::default();
    if !criteria.include_namespaces.is_empty() {
        view.namespaces = criteria.include_namespaces.clone();
    }

    for node in snapshot.nodes() {
        let mut kept = strip_pods(node);

        for pod in node.pods.values() {
            if !criteria.allows_namespace(&pod.namespace) {
                continue;
            }
            if criteria.include_namespaces.is_empty() {
                view.namespaces.insert(pod.namespace.clone());
            }
            if criteria.matches_search(&pod.name) {
                kept.pods.insert(pod.name.clone(), pod.clone());
            }
        }

        push_node(&mut view, kept, node.pod_count());
    }

    view
}

// Empty criteria keeps every pod, so the node Arcs can be shared as-is.
fn project_unfiltered(snapshot: &ClusterSnapshot) -> FilteredView {
    let mut view = FilteredView {
        snapshot: snapshot.clone(),
        ..FilteredView::default()
    };
    for node in snapshot.nodes() {
        view.namespaces
            .extend(node.pods.values().map(|p| p.namespace.clone()));
        view.nodes.push(node_row(node, node.pod_count()));
        view.indicators
            .insert(node.name.clone(), group_indicators(node.pods.values()));
    }
    view
}

fn strip_pods(node: &NodeSnapshot) -> NodeSnapshot {
    NodeSnapshot::new(
        node.name.clone(),
        node.ready,
        node.kubelet_version.clone(),
        node.creation_time,
    )
}

fn push_node(view: &mut FilteredView, node: NodeSnapshot, total: usize) {
    view.nodes.push(node_row(&node, total));
    view.indicators
        .insert(node.name.clone(), group_indicators(node.pods.values()));
    view.snapshot.insert_shared(Arc::new(node));
}

fn node_row(node: &NodeSnapshot, total: usize) -> NodeRow {
    NodeRow {
        name: node.name.clone(),
        ready: node.ready,
        kubelet_version: node.kubelet_version.clone(),
        creation_time: node.creation_time,
        pod_count: format_pod_count(node.pod_count(), total),
    }
}

fn group_indicators<'a>(
    pods: impl Iterator<Item = &'a PodSnapshot>,
) -> BTreeMap<String, Vec<PodIndicator>> {
    let mut by_namespace: BTreeMap<String, Vec<PodIndicator>> = BTreeMap::new();
    for pod in pods {
        by_namespace
            .entry(pod.namespace.clone())
            .or_default()
            .push(PodIndicator::from_pod(pod));
    }
    for indicators in by_namespace.values_mut() {
        sort_indicators(indicators);
    }
    by_namespace
}
