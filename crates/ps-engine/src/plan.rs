//! Enumerating the concrete points of a sweep.

use ps_sweep::SensitivitySweep;
use ps_types::ParameterMetadata;
use serde::{Deserialize, Serialize};

/// One fully resolved (label, value, metadata) triple to apply and solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Key of the axis the point belongs to.
    pub key: String,
    pub label: String,
    pub value: f64,
    pub metadata: ParameterMetadata,
    pub axis_index: usize,
    pub step_index: usize,
}

/// Ordered list of points: axis by axis, samples in ascending order.
///
/// Every parameter is varied on its own (one-at-a-time sensitivity); points
/// of different axes are never combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub points: Vec<SweepPoint>,
}

impl SweepPlan {
    pub fn from_sweep(sweep: &SensitivitySweep) -> Self {
        let points = sweep
            .axes
            .iter()
            .enumerate()
            .flat_map(|(axis_index, axis)| {
                axis.samples
                    .iter()
                    .enumerate()
                    .map(move |(step_index, value)| SweepPoint {
                        key: axis.key.clone(),
                        label: axis.label.clone(),
                        value: *value,
                        metadata: axis.metadata.clone(),
                        axis_index,
                        step_index,
                    })
            })
            .collect();
        Self { points }
    }

    /// Keep at most `max` points.
    pub fn limited(mut self, max: Option<usize>) -> Self {
        if let Some(max) = max {
            self.points.truncate(max);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points grouped by consecutive axis, in plan order.
    pub fn by_axis(&self) -> Vec<&[SweepPoint]> {
        self.points
            .chunk_by(|a, b| a.axis_index == b.axis_index)
            .collect()
    }
}
