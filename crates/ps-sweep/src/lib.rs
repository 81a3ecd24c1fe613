//! # ps-sweep
//!
//! Turns parameter-range descriptions into sample sequences and injects
//! sampled values into a live model instance.
//!
//! Pipeline: [`SweepExpander`] expands range records, [`MutabilityPreparer`]
//! grants write access once per sweep, and [`ParameterApplier`] resolves each
//! label through the [`ParameterRegistry`] and runs the family's
//! [`CoefficientUpdater`].

mod applier;
mod expander;
mod mutability;
mod registry;
mod updaters;

pub use applier::ParameterApplier;
pub use expander::{
    linspace, ParameterDescriptor, RangeDialect, RangeRow, RangeTable, SensitivitySweep,
    SweepAxis, SweepExpander,
};
pub use mutability::MutabilityPreparer;
pub use registry::{
    extract_tag, AliasRule, HeatLevel, HeatStream, ParameterKind, ParameterRegistry,
    RegistryEntry, ResolvedParameter, Utility, ELECTRICITY_PRICE_ALIAS, ELECTRICITY_PRICE_LABEL,
    STANDARD_PARAMETERS,
};
pub use updaters::{
    CapitalCostUpdater, CoefficientUpdater, HeatPriceUpdater, HeatingDemandUpdater,
    IndexedUpdater, UtilityDemandUpdater, UtilityPriceUpdater,
};
