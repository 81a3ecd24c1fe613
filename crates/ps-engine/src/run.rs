//! Per-point results and sweep run tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use ps_types::SweepConfig;

use crate::plan::SweepPoint;

/// Unique sweep run identifier.
pub type SweepId = Uuid;

/// What the solver reports for one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub objective: f64,
    pub metrics: HashMap<String, f64>,
}

impl SolveOutcome {
    pub fn new(objective: f64) -> Self {
        Self {
            objective,
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// The value could not be applied; the solver never ran.
    Skipped,
}

/// A single point's evaluation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    pub id: Uuid,
    pub sweep_id: SweepId,
    pub point_number: usize,
    pub point: SweepPoint,
    pub status: PointStatus,
    pub outcome: Option<SolveOutcome>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PointResult {
    pub fn new(sweep_id: SweepId, point_number: usize, point: SweepPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            sweep_id,
            point_number,
            point,
            status: PointStatus::Pending,
            outcome: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = PointStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, outcome: SolveOutcome) {
        self.status = PointStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = PointStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn mark_skipped(&mut self, error: String) {
        self.status = PointStatus::Skipped;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn is_success(&self) -> bool {
        self.status == PointStatus::Completed
    }
}

/// Lifecycle state for a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status and results of a sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub id: SweepId,
    pub config: SweepConfig,
    pub state: SweepState,
    /// Coefficients flagged mutable before the first point.
    pub mutable_coefficients: Vec<String>,
    pub results: Vec<PointResult>,
    pub points_completed: usize,
    pub points_failed: usize,
    pub points_skipped: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SweepReport {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: SweepState::Pending,
            mutable_coefficients: Vec::new(),
            results: Vec::new(),
            points_completed: 0,
            points_failed: 0,
            points_skipped: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SweepState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SweepState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SweepState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Add a finished point and update the counters.
    pub fn record(&mut self, result: PointResult) {
        match result.status {
            PointStatus::Completed => self.points_completed += 1,
            PointStatus::Failed => self.points_failed += 1,
            PointStatus::Skipped => self.points_skipped += 1,
            PointStatus::Pending | PointStatus::Running => {}
        }
        self.results.push(result);
    }

    /// Objective per sample value for one axis, in sweep order.
    pub fn objectives_for(&self, key: &str) -> Vec<(f64, f64)> {
        self.results
            .iter()
            .filter(|r| r.point.key == key)
            .filter_map(|r| r.outcome.as_ref().map(|o| (r.point.value, o.objective)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::ParameterMetadata;

    fn point(value: f64) -> SweepPoint {
        SweepPoint {
            key: "Yield factor (xi)_7".into(),
            label: "Yield factor (xi)".into(),
            value,
            metadata: ParameterMetadata::new(),
            axis_index: 0,
            step_index: 0,
        }
    }

    #[test]
    fn report_lifecycle() {
        let mut report = SweepReport::new(SweepConfig::default());
        assert_eq!(report.state, SweepState::Pending);
        assert!(report.started_at.is_none());

        report.mark_running();
        assert_eq!(report.state, SweepState::Running);
        assert!(report.started_at.is_some());

        report.mark_completed();
        assert_eq!(report.state, SweepState::Completed);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn point_lifecycle_and_counters() {
        let mut report = SweepReport::new(SweepConfig::default());

        let mut ok = PointResult::new(report.id, 0, point(0.5));
        assert_eq!(ok.status, PointStatus::Pending);
        ok.mark_running();
        assert_eq!(ok.status, PointStatus::Running);
        ok.mark_completed(SolveOutcome::new(12.0).with_metric("npc", 3.0));
        report.record(ok);

        let mut bad = PointResult::new(report.id, 1, point(0.7));
        bad.mark_running();
        bad.mark_failed("infeasible".into());
        assert_eq!(bad.error.as_deref(), Some("infeasible"));
        report.record(bad);

        let mut skipped = PointResult::new(report.id, 2, point(0.9));
        skipped.mark_skipped("Coefficient xi is not mutable".into());
        assert!(!skipped.is_success());
        report.record(skipped);

        assert_eq!(report.points_completed, 1);
        assert_eq!(report.points_failed, 1);
        assert_eq!(report.points_skipped, 1);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.objectives_for("Yield factor (xi)_7"), vec![(0.5, 12.0)]);
    }

    #[test]
    fn report_failure() {
        let mut report = SweepReport::new(SweepConfig::default());
        report.mark_running();
        report.mark_failed("model has no coefficient named xi".into());
        assert_eq!(report.state, SweepState::Failed);
        assert!(report.error.as_deref().unwrap().contains("xi"));
    }
}
