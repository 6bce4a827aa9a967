//! The two RBAC scenarios
//!
//! Both scenarios share one shape: reset the function, redeploy the
//! controller from a manifest variant, deploy the function, watch the
//! controller log for a telling line and finally call the function. They
//! differ only in the manifest, the log line, whether the function pod must
//! come up, and the result code the call has to produce.

use crate::config::ManifestVariant;

/// Result code of a function call that failed
pub const CALL_FAILED: i32 = 1;

/// Result code of a function call that succeeded
pub const CALL_SUCCEEDED: i32 = 0;

/// Which controller log line proves the scenario's point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogExpectation {
    /// The controller was refused by the API server
    Denied,
    /// The controller synced and is serving
    Ready,
}

/// One RBAC scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub manifest: ManifestVariant,
    pub log: LogExpectation,
    /// Wait for the function's own pod before calling it
    pub wait_for_function_pod: bool,
    /// Result code the function call must produce
    pub expected_call: i32,
}

impl Scenario {
    /// Deploy/call must fail when the controller lacks RBAC roles
    pub fn without_rbac() -> Self {
        Self {
            name: "deploy/call fails without RBAC roles",
            manifest: ManifestVariant::WithoutRbac,
            log: LogExpectation::Denied,
            wait_for_function_pod: false,
            expected_call: CALL_FAILED,
        }
    }

    /// Deploy/call must pass once the RBAC roles are in place
    pub fn with_rbac() -> Self {
        Self {
            name: "deploy/call succeeds with RBAC roles",
            manifest: ManifestVariant::WithRbac,
            log: LogExpectation::Ready,
            wait_for_function_pod: true,
            expected_call: CALL_SUCCEEDED,
        }
    }

    /// Scenarios in the order they run
    pub fn all() -> [Scenario; 2] {
        [Self::without_rbac(), Self::with_rbac()]
    }

    /// Prefix an assertion description with the scenario label
    pub fn describe(&self, what: &str) -> String {
        format!("[{}] {}", self.manifest.label(), what)
    }

    pub fn log_description(&self) -> String {
        match self.log {
            LogExpectation::Denied => self.describe("controller log reports the deploy was denied"),
            LogExpectation::Ready => self.describe("controller log reports synced and ready"),
        }
    }

    pub fn call_description(&self) -> String {
        if self.expected_call == CALL_SUCCEEDED {
            self.describe("function call succeeds")
        } else {
            self.describe("function call fails")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_order() {
        let [first, second] = Scenario::all();
        assert_eq!(first.manifest, ManifestVariant::WithoutRbac);
        assert_eq!(second.manifest, ManifestVariant::WithRbac);
    }

    #[test]
    fn test_without_rbac_expectations() {
        let scenario = Scenario::without_rbac();
        assert_eq!(scenario.expected_call, CALL_FAILED);
        assert!(!scenario.wait_for_function_pod);
        assert_eq!(scenario.log, LogExpectation::Denied);
        assert_eq!(
            scenario.call_description(),
            "[without RBAC roles] function call fails"
        );
    }

    #[test]
    fn test_with_rbac_expectations() {
        let scenario = Scenario::with_rbac();
        assert_eq!(scenario.expected_call, CALL_SUCCEEDED);
        assert!(scenario.wait_for_function_pod);
        assert_eq!(scenario.log, LogExpectation::Ready);
        assert_eq!(
            scenario.log_description(),
            "[with RBAC roles] controller log reports synced and ready"
        );
    }
}
