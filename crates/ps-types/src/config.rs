//! Sweep run configuration.

use serde::{Deserialize, Serialize};

/// What the sweep driver does when a single point fails to apply or solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the sweep and return the error.
    #[default]
    Abort,
    /// Record the failure and continue with the next point.
    SkipPoint,
}

/// Top-level configuration for a sensitivity sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub error_policy: ErrorPolicy,

    /// Evaluate points in parallel, each on its own copy of the model.
    pub parallel: bool,

    /// Return the coefficients of an axis to their baseline values once the
    /// axis has been swept, so every parameter is varied in isolation.
    pub restore_baseline: bool,

    /// Upper bound on the number of points evaluated. `None` = all.
    pub max_points: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Abort,
            parallel: false,
            restore_baseline: true,
            max_points: None,
        }
    }
}

impl SweepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_restore_baseline(mut self, restore: bool) -> Self {
        self.restore_baseline = restore;
        self
    }

    pub fn with_max_points(mut self, n: usize) -> Self {
        self.max_points = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SweepConfig = serde_json::from_str(r#"{"parallel": true}"#).unwrap();
        assert!(config.parallel);
        assert!(config.restore_baseline);
        assert_eq!(config.error_policy, ErrorPolicy::Abort);
        assert_eq!(config.max_points, None);
    }

    #[test]
    fn error_policy_uses_snake_case() {
        let config: SweepConfig =
            serde_json::from_str(r#"{"error_policy": "skip_point", "max_points": 10}"#).unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::SkipPoint);
        assert_eq!(config.max_points, Some(10));
    }

    #[test]
    fn builder_chain() {
        let config = SweepConfig::new()
            .with_error_policy(ErrorPolicy::SkipPoint)
            .with_parallel(true)
            .with_restore_baseline(false)
            .with_max_points(3);
        assert_eq!(config.max_points, Some(3));
        assert!(!config.restore_baseline);
    }
}
