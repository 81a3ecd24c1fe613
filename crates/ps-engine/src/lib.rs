// Sensitivity sweep driver
// Plans one-at-a-time points, applies them and collects solver outcomes

pub mod engine;
pub mod plan;
pub mod run;

pub use engine::{SweepRunner, Solver};
pub use plan::{SweepPlan, SweepPoint};
pub use run::{PointResult, PointStatus, SolveOutcome, SweepId, SweepReport, SweepState};
