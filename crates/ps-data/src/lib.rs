pub mod loaders;

pub use loaders::*;

use ps_sweep::{SensitivitySweep, SweepExpander};
use ps_types::PsResult;
use std::path::Path;

/// Load a range table from disk and expand it into a sweep.
pub fn load_sweep<P: AsRef<Path>>(path: P) -> PsResult<SensitivitySweep> {
    let rows = InputLoader::new().load_range_rows(path)?;
    Ok(SweepExpander::new().expand(&rows)?)
}
