//! Coefficient update routines, one per parameter family.
//!
//! Routines only *plan* writes; the applier commits them atomically. Planning
//! reads the model but never depends on values the routine itself writes, so
//! applying the same point twice yields the same state.

use ps_types::{
    CoefficientIndex, CoefficientWrite, IndexPart, MetadataField, ModelInstance,
    ParameterMetadata, SensitivityError,
};
use serde_json::Value;

use crate::registry::{HeatLevel, HeatStream, Utility};

/// Computes the coefficient writes that set one parameter to a value.
pub trait CoefficientUpdater: Send + Sync {
    /// Name of the coefficient family, for logging.
    fn family(&self) -> &'static str;

    /// Plan the writes for `value`.
    ///
    /// `label` is the canonical label the raw label resolved to; `context` is
    /// the caller's free-form object, forwarded unmodified.
    fn plan(
        &self,
        model: &ModelInstance,
        value: f64,
        metadata: &ParameterMetadata,
        context: Option<&Value>,
        label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError>;
}

/// Writes a single entry of a coefficient indexed by metadata fields.
#[derive(Debug, Clone, Copy)]
pub struct IndexedUpdater {
    coefficient: &'static str,
    fields: &'static [MetadataField],
}

impl IndexedUpdater {
    pub fn new(coefficient: &'static str, fields: &'static [MetadataField]) -> Self {
        Self {
            coefficient,
            fields,
        }
    }

    pub fn index(
        &self,
        metadata: &ParameterMetadata,
        label: &str,
    ) -> Result<CoefficientIndex, SensitivityError> {
        let parts = self
            .fields
            .iter()
            .map(|field| metadata.require(*field, label))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CoefficientIndex(parts))
    }
}

impl CoefficientUpdater for IndexedUpdater {
    fn family(&self) -> &'static str {
        self.coefficient
    }

    fn plan(
        &self,
        _model: &ModelInstance,
        value: f64,
        metadata: &ParameterMetadata,
        _context: Option<&Value>,
        label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError> {
        let index = self.index(metadata, label)?;
        Ok(vec![CoefficientWrite::new(self.coefficient, index, value)])
    }
}

/// `delta_ut[utility]`
#[derive(Debug, Clone, Copy)]
pub struct UtilityPriceUpdater {
    pub utility: Utility,
}

impl CoefficientUpdater for UtilityPriceUpdater {
    fn family(&self) -> &'static str {
        "delta_ut"
    }

    fn plan(
        &self,
        _model: &ModelInstance,
        value: f64,
        _metadata: &ParameterMetadata,
        _context: Option<&Value>,
        _label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError> {
        Ok(vec![CoefficientWrite::new(
            "delta_ut",
            [IndexPart::from(self.utility.index_name())],
            value,
        )])
    }
}

/// `delta_q[level]`
#[derive(Debug, Clone, Copy)]
pub struct HeatPriceUpdater {
    pub level: HeatLevel,
}

impl CoefficientUpdater for HeatPriceUpdater {
    fn family(&self) -> &'static str {
        "delta_q"
    }

    fn plan(
        &self,
        _model: &ModelInstance,
        value: f64,
        _metadata: &ParameterMetadata,
        _context: Option<&Value>,
        _label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError> {
        Ok(vec![CoefficientWrite::new(
            "delta_q",
            [IndexPart::from(self.level.index_name())],
            value,
        )])
    }
}

/// `tau[utility, unit]`
#[derive(Debug, Clone, Copy)]
pub struct UtilityDemandUpdater {
    pub utility: Utility,
}

impl CoefficientUpdater for UtilityDemandUpdater {
    fn family(&self) -> &'static str {
        "tau"
    }

    fn plan(
        &self,
        _model: &ModelInstance,
        value: f64,
        metadata: &ParameterMetadata,
        _context: Option<&Value>,
        label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError> {
        let unit = metadata.require(MetadataField::UnitNumber, label)?;
        Ok(vec![CoefficientWrite::new(
            "tau",
            [IndexPart::from(self.utility.index_name()), unit],
            value,
        )])
    }
}

/// Heating demand of one heat stream.
///
/// Sets `tau_h[stream, unit]` and keeps the combined demand consistent:
/// `tau[stream, unit] = tau_h - tau_c`, with a missing `tau_c` entry read as
/// zero.
#[derive(Debug, Clone, Copy)]
pub struct HeatingDemandUpdater {
    pub stream: HeatStream,
}

impl CoefficientUpdater for HeatingDemandUpdater {
    fn family(&self) -> &'static str {
        "tau_h"
    }

    fn plan(
        &self,
        model: &ModelInstance,
        value: f64,
        metadata: &ParameterMetadata,
        _context: Option<&Value>,
        label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError> {
        let unit = metadata.require(MetadataField::UnitNumber, label)?;
        let index = CoefficientIndex::from([IndexPart::from(self.stream.index_name()), unit]);
        let cooling = model.coefficient("tau_c")?.get(&index).unwrap_or(0.0);

        Ok(vec![
            CoefficientWrite::new("tau_h", index.clone(), value),
            CoefficientWrite::new("tau", index, value - cooling),
        ])
    }
}

/// Reference capital cost of a unit.
///
/// The piecewise-linear CAPEX curve is rebuilt from the new reference cost:
/// `lin_CAPEX_y[unit, j] = C_ref * (lin_CAPEX_x[unit, j] / K_Ref[unit]) ^ f[unit]`
/// for every breakpoint `j`. `K_Ref` and `f` are read, never written.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapitalCostUpdater;

impl CapitalCostUpdater {
    fn unit_value(
        model: &ModelInstance,
        coefficient: &str,
        unit: &IndexPart,
    ) -> Result<f64, SensitivityError> {
        let index = CoefficientIndex::from([unit.clone()]);
        model
            .coefficient(coefficient)?
            .get(&index)
            .ok_or_else(|| SensitivityError::UnknownIndex {
                coefficient: coefficient.to_string(),
                index: index.to_string(),
            })
    }
}

impl CoefficientUpdater for CapitalCostUpdater {
    fn family(&self) -> &'static str {
        "lin_CAPEX_y"
    }

    fn plan(
        &self,
        model: &ModelInstance,
        value: f64,
        metadata: &ParameterMetadata,
        _context: Option<&Value>,
        label: &str,
    ) -> Result<Vec<CoefficientWrite>, SensitivityError> {
        let unit = metadata.require(MetadataField::UnitNumber, label)?;
        let reference_capacity = Self::unit_value(model, "K_Ref", &unit)?;
        let exponent = Self::unit_value(model, "f", &unit)?;
        if reference_capacity <= 0.0 {
            return Err(SensitivityError::InvalidValue {
                label: format!("{label}: K_Ref"),
                value: reference_capacity,
            });
        }

        let writes: Vec<CoefficientWrite> = model
            .coefficient("lin_CAPEX_x")?
            .values
            .iter()
            .filter(|(index, _)| index.head() == Some(&unit))
            .map(|(index, capacity)| {
                let cost = value * (capacity / reference_capacity).powf(exponent);
                CoefficientWrite::new("lin_CAPEX_y", index.clone(), cost)
            })
            .collect();

        if writes.is_empty() {
            return Err(SensitivityError::UnknownIndex {
                coefficient: "lin_CAPEX_x".to_string(),
                index: CoefficientIndex::from([unit]).to_string(),
            });
        }
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ps_types::Coefficient;

    fn unit_idx(unit: i64) -> CoefficientIndex {
        CoefficientIndex::from([IndexPart::Int(unit)])
    }

    fn capex_model() -> ModelInstance {
        let bp = |unit: i64, j: i64| CoefficientIndex::from([IndexPart::Int(unit), IndexPart::Int(j)]);
        ModelInstance::new("capex")
            .with_coefficient("K_Ref", Coefficient::new().with_value(unit_idx(4), 100.0))
            .with_coefficient("f", Coefficient::new().with_value(unit_idx(4), 0.6))
            .with_coefficient(
                "lin_CAPEX_x",
                Coefficient::new()
                    .with_value(bp(4, 1), 50.0)
                    .with_value(bp(4, 2), 100.0)
                    .with_value(bp(4, 3), 200.0)
                    .with_value(bp(5, 1), 10.0),
            )
            .with_coefficient(
                "lin_CAPEX_y",
                Coefficient::new()
                    .with_value(bp(4, 1), 0.0)
                    .with_value(bp(4, 2), 0.0)
                    .with_value(bp(4, 3), 0.0)
                    .with_value(bp(5, 1), 0.0),
            )
    }

    #[test]
    fn indexed_updater_builds_index_in_field_order() {
        let updater = IndexedUpdater::new(
            "theta",
            &[
                MetadataField::UnitNumber,
                MetadataField::ReactionNumber,
                MetadataField::Component,
            ],
        );
        let meta = ParameterMetadata::new()
            .with_unit(3)
            .with_component("CH4")
            .with_reaction(2);
        let writes = updater
            .plan(&ModelInstance::default(), 0.8, &meta, None, "Conversion factor (theta)")
            .unwrap();
        assert_eq!(
            writes,
            vec![CoefficientWrite::new(
                "theta",
                [IndexPart::Int(3), IndexPart::Int(2), IndexPart::from("CH4")],
                0.8
            )]
        );
    }

    #[test]
    fn indexed_updater_requires_metadata() {
        let updater = IndexedUpdater::new("xi", &[MetadataField::UnitNumber, MetadataField::Component]);
        let err = updater
            .plan(
                &ModelInstance::default(),
                0.5,
                &ParameterMetadata::new().with_unit(1),
                None,
                "Yield factor (xi)",
            )
            .unwrap_err();
        assert!(matches!(err, SensitivityError::MissingMetadata { ref field, .. } if field == "Component"));
    }

    #[test]
    fn utility_price_targets_utility_entry() {
        let writes = UtilityPriceUpdater {
            utility: Utility::Chilling,
        }
        .plan(
            &ModelInstance::default(),
            42.0,
            &ParameterMetadata::new(),
            None,
            "Chilling price (delta_ut)",
        )
        .unwrap();
        assert_eq!(
            writes,
            vec![CoefficientWrite::new("delta_ut", [IndexPart::from("Chilling")], 42.0)]
        );
    }

    #[test]
    fn heat_price_targets_level_entry() {
        let writes = HeatPriceUpdater {
            level: HeatLevel::Medium,
        }
        .plan(
            &ModelInstance::default(),
            0.03,
            &ParameterMetadata::new(),
            None,
            "Heating price medium (delta_q)",
        )
        .unwrap();
        assert_eq!(writes[0].index, CoefficientIndex::from([IndexPart::from("medium")]));
    }

    #[test]
    fn heating_demand_updates_combined_demand() {
        let idx = CoefficientIndex::from([IndexPart::from("heat1"), IndexPart::Int(2)]);
        let model = ModelInstance::new("heat")
            .with_coefficient("tau_h", Coefficient::new().with_value(idx.clone(), 1.0))
            .with_coefficient("tau_c", Coefficient::new().with_value(idx.clone(), 0.25))
            .with_coefficient("tau", Coefficient::new().with_value(idx.clone(), 0.75));

        let writes = HeatingDemandUpdater {
            stream: HeatStream::Heat1,
        }
        .plan(
            &model,
            2.0,
            &ParameterMetadata::new().with_unit(2),
            None,
            "Heating demand 1 (tau_h)",
        )
        .unwrap();

        assert_eq!(
            writes,
            vec![
                CoefficientWrite::new("tau_h", idx.clone(), 2.0),
                CoefficientWrite::new("tau", idx, 1.75),
            ]
        );
    }

    #[test]
    fn capital_cost_rebuilds_breakpoints_of_one_unit() {
        let model = capex_model();
        let writes = CapitalCostUpdater
            .plan(
                &model,
                1000.0,
                &ParameterMetadata::new().with_unit(4),
                None,
                "Reference Capital costs (C_Ref)",
            )
            .unwrap();

        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|w| w.coefficient == "lin_CAPEX_y"));
        assert_relative_eq!(writes[0].value, 1000.0 * 0.5f64.powf(0.6), epsilon = 1e-9);
        assert_relative_eq!(writes[1].value, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(writes[2].value, 1000.0 * 2.0f64.powf(0.6), epsilon = 1e-9);
    }

    #[test]
    fn capital_cost_without_breakpoints_fails() {
        let model = capex_model();
        let err = CapitalCostUpdater
            .plan(
                &model,
                1000.0,
                &ParameterMetadata::new().with_unit(9),
                None,
                "Reference Capital costs (C_Ref)",
            )
            .unwrap_err();
        assert!(matches!(err, SensitivityError::UnknownIndex { .. }));
    }
}
