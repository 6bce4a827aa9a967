//! Rich wait errors with debugging context
//!
//! When a bounded wait gives up, the error says what was being waited on,
//! what was last observed, and for how long.
//!
//! # Example
//!
//! ```
//! use rbac_smoke::wait::WaitError;
//! use std::time::Duration;
//!
//! let err = WaitError::new("pods kubeless=controller", Duration::from_secs(300), Duration::from_secs(301))
//!     .with_state("phase=Pending, containers 0/1 ready, waiting: ImagePullBackOff");
//! assert!(err.to_string().contains("ImagePullBackOff"));
//! ```

use std::fmt;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;

/// Rich error context for wait operations
#[derive(Debug, Clone)]
pub struct WaitError {
    /// What was waited on (e.g., "pods kubeless=controller in kubeless")
    pub resource: String,
    /// Description of the last observed state
    pub last_state: String,
    /// How long we waited before giving up
    pub elapsed: Duration,
    /// The timeout that was configured
    pub timeout: Duration,
}

impl WaitError {
    /// Create a new WaitError
    pub fn new(resource: impl Into<String>, timeout: Duration, elapsed: Duration) -> Self {
        Self {
            resource: resource.into(),
            last_state: "unknown".to_string(),
            elapsed,
            timeout,
        }
    }

    /// Set the last observed state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.last_state = state.into();
        self
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Wait timeout for {}", self.resource)?;
        writeln!(f, "├─ Last state: {}", self.last_state)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        write!(f, "└─ Timeout: {:?}", self.timeout)
    }
}

impl std::error::Error for WaitError {}

/// Helper trait for extracting state description from K8s resources
pub trait ResourceState {
    /// Get a human-readable description of the resource's current state
    fn state_description(&self) -> String;
}

/// Pod phase as reported by the API, "Unknown" when absent
pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown")
}

/// Whether the pod reports the Running phase
pub fn pod_is_running(pod: &Pod) -> bool {
    pod_phase(pod) == "Running"
}

impl ResourceState for Pod {
    fn state_description(&self) -> String {
        let phase = pod_phase(self);

        let containers = self
            .status
            .as_ref()
            .and_then(|s| s.container_statuses.as_ref());

        match containers {
            Some(statuses) => {
                let total = statuses.len();
                let ready = statuses.iter().filter(|c| c.ready).count();

                let waiting_reasons: Vec<&str> = statuses
                    .iter()
                    .filter_map(|c| {
                        c.state
                            .as_ref()
                            .and_then(|s| s.waiting.as_ref())
                            .and_then(|w| w.reason.as_deref())
                    })
                    .collect();

                if !waiting_reasons.is_empty() {
                    format!(
                        "phase={}, containers {}/{} ready, waiting: {}",
                        phase,
                        ready,
                        total,
                        waiting_reasons.join(", ")
                    )
                } else {
                    format!("phase={}, containers {}/{} ready", phase, ready, total)
                }
            }
            None => format!("phase={}, no container status", phase),
        }
    }
}

impl ResourceState for [Pod] {
    fn state_description(&self) -> String {
        if self.is_empty() {
            return "no matching pods".to_string();
        }

        self.iter()
            .map(|pod| {
                let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
                format!("{}: {}", name, pod.state_description())
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateWaiting, ContainerStatus, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_wait_error_display() {
        let err = WaitError::new(
            "namespace kubeless deleted",
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .with_state("namespace still present");

        let output = err.to_string();
        assert!(output.contains("namespace kubeless deleted"));
        assert!(output.contains("still present"));
        assert!(output.contains("60s"));
    }

    #[test]
    fn test_wait_error_builder() {
        let err = WaitError::new(
            "pods function=get-python",
            Duration::from_secs(120),
            Duration::from_secs(115),
        );

        assert_eq!(err.resource, "pods function=get-python");
        assert_eq!(err.timeout, Duration::from_secs(120));
        assert_eq!(err.elapsed, Duration::from_secs(115));
        assert_eq!(err.last_state, "unknown");
    }

    #[test]
    fn test_pod_is_running() {
        assert!(pod_is_running(&pod("a", "Running")));
        assert!(!pod_is_running(&pod("a", "Pending")));
        assert!(!pod_is_running(&Pod::default()));
        assert_eq!(pod_phase(&Pod::default()), "Unknown");
    }

    #[test]
    fn test_pod_state_description() {
        let pod = Pod {
            status: Some(PodStatus {
                phase: Some("Pending".to_string()),
                container_statuses: Some(vec![ContainerStatus {
                    name: "controller".to_string(),
                    ready: false,
                    state: Some(ContainerState {
                        waiting: Some(ContainerStateWaiting {
                            reason: Some("ImagePullBackOff".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let state = pod.state_description();
        assert!(state.contains("phase=Pending"));
        assert!(state.contains("0/1 ready"));
        assert!(state.contains("ImagePullBackOff"));
    }

    #[test]
    fn test_pod_list_state_description() {
        let pods = vec![pod("ctrl-1", "Pending"), pod("ctrl-2", "Running")];
        let state = pods.as_slice().state_description();

        assert!(state.contains("ctrl-1: phase=Pending"));
        assert!(state.contains("ctrl-2: phase=Running"));

        let empty: Vec<Pod> = Vec::new();
        assert_eq!(empty.as_slice().state_description(), "no matching pods");
    }
}
