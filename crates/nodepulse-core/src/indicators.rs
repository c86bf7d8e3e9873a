//! Pod health classification
//!
//! Maps a pod's phase, restart count and container states onto a
//! three-level health indicator, with a consistent symbol and ordering
//! for the namespace columns of the nodes table.

use crate::constants::FATAL_WAITING_REASONS;
use crate::snapshot::{PodPhase, PodSnapshot};
use serde::{Deserialize, Serialize};

/// Health of a pod as shown in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HealthIndicator {
    /// Failed, or a container is stuck in a fatal waiting state
    Error,
    /// Restarting, transitioning, or a container is not running
    Warning,
    /// Running with all containers up and no restarts
    #[default]
    Ok,
}

impl HealthIndicator {
    /// Unicode symbol for this status
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthIndicator::Error => "✗",
            HealthIndicator::Warning => "◐",
            HealthIndicator::Ok => "●",
        }
    }

    /// Human-readable label for this status
    pub fn label(&self) -> &'static str {
        match self {
            HealthIndicator::Error => "Error",
            HealthIndicator::Warning => "Warning",
            HealthIndicator::Ok => "OK",
        }
    }

    /// Get severity level (for sorting/prioritization)
    ///
    /// Higher numbers = more severe
    pub fn severity(&self) -> u8 {
        match self {
            HealthIndicator::Ok => 0,
            HealthIndicator::Warning => 1,
            HealthIndicator::Error => 2,
        }
    }

    /// Return the more severe of two indicators
    pub fn worst(self, other: HealthIndicator) -> HealthIndicator {
        if self.severity() >= other.severity() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Classify a pod; the first matching rule wins
///
/// 1. `Failed` phase is an error.
/// 2. A container waiting on a fatal reason (see [`FATAL_WAITING_REASONS`]) is an error.
/// 3. Any restart, a `Pending`/`Terminating` phase or a non-running container is a warning.
/// 4. Everything else is ok.
///
/// # Examples
///
/// ```
/// use nodepulse_core::indicators::{classify_pod, HealthIndicator};
/// use nodepulse_core::snapshot::{ContainerSnapshot, ContainerState, PodPhase, PodSnapshot};
/// use std::collections::BTreeMap;
///
/// let pod = PodSnapshot::new("web", "default", PodPhase::Running, BTreeMap::new())
///     .with_container("app", ContainerSnapshot::new(ContainerState::Running, 1));
/// assert_eq!(classify_pod(&pod), HealthIndicator::Warning);
/// ```
pub fn classify_pod(pod: &PodSnapshot) -> HealthIndicator {
    if pod.phase == PodPhase::Failed {
        return HealthIndicator::Error;
    }

    let fatal_wait = pod.containers.values().any(|c| {
        c.state
            .waiting_reason()
            .is_some_and(|reason| FATAL_WAITING_REASONS.contains(&reason))
    });
    if fatal_wait {
        return HealthIndicator::Error;
    }

    if pod.restart_count > 0
        || matches!(pod.phase, PodPhase::Pending | PodPhase::Terminating)
        || pod.containers.values().any(|c| !c.state.is_running())
    {
        return HealthIndicator::Warning;
    }

    HealthIndicator::Ok
}

/// Per-pod indicator rendered in a namespace column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodIndicator {
    pub pod: String,
    pub namespace: String,
    pub health: HealthIndicator,
    pub phase: PodPhase,
    pub restart_count: u32,
}

impl PodIndicator {
    pub fn from_pod(pod: &PodSnapshot) -> Self {
        Self {
            pod: pod.name.clone(),
            namespace: pod.namespace.clone(),
            health: classify_pod(pod),
            phase: pod.phase,
            restart_count: pod.restart_count,
        }
    }
}

/// Order indicators errors first, then warnings, then ok
///
/// The sort is stable so pods of equal severity keep their incoming order.
pub fn sort_indicators(indicators: &mut [PodIndicator]) {
    indicators.sort_by_key(|i| std::cmp::Reverse(i.health.severity()));
}

/// Most severe health among `indicators`, ok when there are none
pub fn overall_health<'a>(
    indicators: impl IntoIterator<Item = &'a PodIndicator>,
) -> HealthIndicator {
    indicators
        .into_iter()
        .fold(HealthIndicator::Ok, |worst, i| worst.worst(i.health))
}
