// Sweep driver: apply each planned value, hand the model to a solver,
// collect the outcome.

use ps_sweep::{MutabilityPreparer, ParameterApplier, SensitivitySweep};
use ps_types::{CoefficientSnapshot, ErrorPolicy, ModelInstance, PsError, PsResult, SweepConfig};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::plan::{SweepPlan, SweepPoint};
use crate::run::{PointResult, SolveOutcome, SweepId, SweepReport};

/// Anything that can evaluate a prepared model instance.
pub trait Solver {
    fn solve(&mut self, model: &ModelInstance) -> PsResult<SolveOutcome>;
}

impl<F> Solver for F
where
    F: FnMut(&ModelInstance) -> PsResult<SolveOutcome>,
{
    fn solve(&mut self, model: &ModelInstance) -> PsResult<SolveOutcome> {
        self(model)
    }
}

/// Runs one-at-a-time sensitivity sweeps against a model.
#[derive(Debug, Clone, Default)]
pub struct SweepRunner {
    applier: ParameterApplier,
    config: SweepConfig,
}

impl SweepRunner {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            applier: ParameterApplier::standard(),
            config,
        }
    }

    pub fn with_applier(mut self, applier: ParameterApplier) -> Self {
        self.applier = applier;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn applier(&self) -> &ParameterApplier {
        &self.applier
    }

    /// Run sequentially or in parallel according to the configuration.
    ///
    /// The parallel path leaves `model` untouched; the sequential path
    /// mutates it in place.
    pub fn execute<S, F>(
        &self,
        model: &mut ModelInstance,
        sweep: &SensitivitySweep,
        factory: F,
        context: Option<&Value>,
    ) -> PsResult<SweepReport>
    where
        S: Solver,
        F: Fn() -> S + Sync,
    {
        if self.config.parallel {
            self.run_parallel(model, sweep, factory, context)
        } else {
            let mut solver = factory();
            self.run(model, sweep, &mut solver, context)
        }
    }

    /// Sweep every axis in order on the given instance.
    ///
    /// Mutability is granted once up front; an unknown label or a missing
    /// coefficient fails the whole run before the solver is called.
    pub fn run<S>(
        &self,
        model: &mut ModelInstance,
        sweep: &SensitivitySweep,
        solver: &mut S,
        context: Option<&Value>,
    ) -> PsResult<SweepReport>
    where
        S: Solver + ?Sized,
    {
        let mut report = SweepReport::new(self.config.clone());
        report.mutable_coefficients = self.applier.prepare(model, sweep.labels())?;

        let plan = SweepPlan::from_sweep(sweep).limited(self.config.max_points);
        info!(
            "Starting sweep {} on model {:?}: {} axes, {} points",
            report.id,
            model.name,
            sweep.len(),
            plan.len()
        );
        report.mark_running();

        let mut point_number = 0;
        for axis in plan.by_axis() {
            let baseline = self.axis_baseline(model, &axis[0])?;

            for point in axis {
                let (result, error) =
                    self.evaluate(model, solver, report.id, point_number, point, context);
                point_number += 1;
                report.record(result);

                if let Some(err) = error {
                    if self.config.error_policy == ErrorPolicy::Abort {
                        if let Some(snapshot) = &baseline {
                            model.restore(snapshot)?;
                        }
                        warn!("Sweep {} aborted at {} = {}: {}", report.id, point.key, point.value, err);
                        report.mark_failed(err.to_string());
                        return Err(err);
                    }
                    warn!("Skipping {} = {}: {}", point.key, point.value, err);
                }
            }

            if let Some(snapshot) = &baseline {
                model.restore(snapshot)?;
                debug!("Restored baseline for {:?}", snapshot.names().collect::<Vec<_>>());
            }
        }

        report.mark_completed();
        info!(
            "Sweep {} completed: {} ok, {} failed, {} skipped",
            report.id, report.points_completed, report.points_failed, report.points_skipped
        );
        Ok(report)
    }

    /// Evaluate all points concurrently, each on its own copy of `model`.
    ///
    /// Every point starts from the baseline, so `restore_baseline` has no
    /// effect here. Under `Abort` the error of the first failing point in
    /// plan order is returned.
    pub fn run_parallel<S, F>(
        &self,
        model: &ModelInstance,
        sweep: &SensitivitySweep,
        factory: F,
        context: Option<&Value>,
    ) -> PsResult<SweepReport>
    where
        S: Solver,
        F: Fn() -> S + Sync,
    {
        let mut report = SweepReport::new(self.config.clone());
        let mut base = model.clone();
        report.mutable_coefficients = self.applier.prepare(&mut base, sweep.labels())?;

        let plan = SweepPlan::from_sweep(sweep).limited(self.config.max_points);
        info!(
            "Starting parallel sweep {} on model {:?}: {} points",
            report.id,
            model.name,
            plan.len()
        );
        report.mark_running();

        let sweep_id = report.id;
        let evaluated: Vec<(PointResult, Option<PsError>)> = plan
            .points
            .par_iter()
            .enumerate()
            .map(|(n, point)| {
                let mut local = base.clone();
                let mut solver = factory();
                self.evaluate(&mut local, &mut solver, sweep_id, n, point, context)
            })
            .collect();

        for (result, error) in evaluated {
            report.record(result);
            if let Some(err) = error {
                if self.config.error_policy == ErrorPolicy::Abort {
                    warn!("Parallel sweep {} aborted: {}", report.id, err);
                    report.mark_failed(err.to_string());
                    return Err(err);
                }
            }
        }

        report.mark_completed();
        info!(
            "Parallel sweep {} completed: {} ok, {} failed, {} skipped",
            report.id, report.points_completed, report.points_failed, report.points_skipped
        );
        Ok(report)
    }

    /// Snapshot of the coefficients an axis writes, if baselines are restored.
    fn axis_baseline(
        &self,
        model: &ModelInstance,
        first: &SweepPoint,
    ) -> PsResult<Option<CoefficientSnapshot>> {
        if !self.config.restore_baseline {
            return Ok(None);
        }
        let resolved = self.applier.resolve(&first.label)?;
        let names = MutabilityPreparer::coefficients_for(&resolved);
        Ok(Some(model.snapshot(names)?))
    }

    fn evaluate<S>(
        &self,
        model: &mut ModelInstance,
        solver: &mut S,
        sweep_id: SweepId,
        point_number: usize,
        point: &SweepPoint,
        context: Option<&Value>,
    ) -> (PointResult, Option<PsError>)
    where
        S: Solver + ?Sized,
    {
        let mut result = PointResult::new(sweep_id, point_number, point.clone());
        result.mark_running();

        if let Err(e) = self.applier.apply(
            model,
            &point.label,
            point.value,
            Some(&point.metadata),
            context,
        ) {
            result.mark_skipped(e.to_string());
            return (result, Some(e.into()));
        }

        match solver.solve(model) {
            Ok(outcome) => {
                debug!("{} = {} -> objective {}", point.key, point.value, outcome.objective);
                result.mark_completed(outcome);
                (result, None)
            }
            Err(e) => {
                result.mark_failed(e.to_string());
                (result, Some(e))
            }
        }
    }
}
