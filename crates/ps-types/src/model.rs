//! The mutable optimization-model abstraction: named, indexed coefficients
//! with a per-coefficient mutability flag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::SensitivityError;
use crate::metadata::IndexPart;

/// Position of a single value inside an indexed coefficient.
///
/// The empty index addresses a scalar coefficient.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoefficientIndex(pub Vec<IndexPart>);

impl CoefficientIndex {
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn parts(&self) -> &[IndexPart] {
        &self.0
    }

    /// The first index part, which is the unit number for unit-indexed
    /// coefficients.
    pub fn head(&self) -> Option<&IndexPart> {
        self.0.first()
    }
}

impl From<Vec<IndexPart>> for CoefficientIndex {
    fn from(parts: Vec<IndexPart>) -> Self {
        Self(parts)
    }
}

impl<const N: usize> From<[IndexPart; N]> for CoefficientIndex {
    fn from(parts: [IndexPart; N]) -> Self {
        Self(parts.to_vec())
    }
}

impl fmt::Display for CoefficientIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "[]");
        }
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, ")")
    }
}

/// A named model input: a table of values over a declared index set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    /// Whether the coefficient may be rewritten after construction.
    #[serde(default)]
    pub mutable: bool,
    #[serde(with = "entries")]
    pub values: BTreeMap<CoefficientIndex, f64>,
}

impl Coefficient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(value: f64) -> Self {
        Self::new().with_value(CoefficientIndex::scalar(), value)
    }

    pub fn with_value(mut self, index: impl Into<CoefficientIndex>, value: f64) -> Self {
        self.values.insert(index.into(), value);
        self
    }

    pub fn get(&self, index: &CoefficientIndex) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single pending assignment `coefficient[index] = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientWrite {
    pub coefficient: String,
    pub index: CoefficientIndex,
    pub value: f64,
}

impl CoefficientWrite {
    pub fn new(coefficient: &str, index: impl Into<CoefficientIndex>, value: f64) -> Self {
        Self {
            coefficient: coefficient.to_string(),
            index: index.into(),
            value,
        }
    }
}

/// Saved values of a set of coefficients, used to return a model to its
/// baseline after a sweep axis has been explored.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSnapshot {
    values: BTreeMap<String, BTreeMap<CoefficientIndex, f64>>,
}

impl CoefficientSnapshot {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// An optimization-model instance as seen by the parameter-change subsystem.
///
/// Only coefficients are exposed; decision variables and constraints are
/// owned by the solver side and never touched here. Cloning performs a deep
/// copy, which is what clone-per-point parallel sweeps rely on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInstance {
    #[serde(default)]
    pub name: String,
    pub coefficients: BTreeMap<String, Coefficient>,
}

impl ModelInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coefficients: BTreeMap::new(),
        }
    }

    pub fn with_coefficient(mut self, name: impl Into<String>, coefficient: Coefficient) -> Self {
        self.coefficients.insert(name.into(), coefficient);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, coefficient: Coefficient) {
        self.coefficients.insert(name.into(), coefficient);
    }

    pub fn has_coefficient(&self, name: &str) -> bool {
        self.coefficients.contains_key(name)
    }

    pub fn coefficient(&self, name: &str) -> Result<&Coefficient, SensitivityError> {
        self.coefficients
            .get(name)
            .ok_or_else(|| SensitivityError::MissingCoefficient {
                name: name.to_string(),
            })
    }

    pub fn coefficient_mut(&mut self, name: &str) -> Result<&mut Coefficient, SensitivityError> {
        self.coefficients
            .get_mut(name)
            .ok_or_else(|| SensitivityError::MissingCoefficient {
                name: name.to_string(),
            })
    }

    pub fn value(&self, name: &str, index: &CoefficientIndex) -> Option<f64> {
        self.coefficients.get(name)?.get(index)
    }

    pub fn is_mutable(&self, name: &str) -> Result<bool, SensitivityError> {
        Ok(self.coefficient(name)?.mutable)
    }

    /// Names of all coefficients currently flagged mutable.
    pub fn mutable_coefficients(&self) -> Vec<&str> {
        self.coefficients
            .iter()
            .filter(|(_, c)| c.mutable)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Flag every named coefficient mutable.
    ///
    /// All names are checked before any flag is set, so a missing coefficient
    /// leaves the instance untouched.
    pub fn set_mutable<'a, I>(&mut self, names: I) -> Result<(), SensitivityError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        for name in &names {
            self.coefficient(name)?;
        }
        for name in names {
            self.coefficient_mut(name)?.mutable = true;
        }
        Ok(())
    }

    /// Perform a batch of writes atomically.
    ///
    /// Every write is validated (coefficient exists, is mutable, declares the
    /// index) before the first value changes.
    pub fn commit(&mut self, writes: &[CoefficientWrite]) -> Result<(), SensitivityError> {
        for write in writes {
            let coefficient = self.coefficient(&write.coefficient)?;
            if !coefficient.mutable {
                return Err(SensitivityError::ImmutableCoefficient {
                    name: write.coefficient.clone(),
                });
            }
            if !coefficient.values.contains_key(&write.index) {
                return Err(SensitivityError::UnknownIndex {
                    coefficient: write.coefficient.clone(),
                    index: write.index.to_string(),
                });
            }
        }

        for write in writes {
            let coefficient = self.coefficient_mut(&write.coefficient)?;
            coefficient.values.insert(write.index.clone(), write.value);
        }
        Ok(())
    }

    pub fn snapshot<'a, I>(&self, names: I) -> Result<CoefficientSnapshot, SensitivityError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = BTreeMap::new();
        for name in names {
            values.insert(name.to_string(), self.coefficient(name)?.values.clone());
        }
        Ok(CoefficientSnapshot { values })
    }

    pub fn restore(&mut self, snapshot: &CoefficientSnapshot) -> Result<(), SensitivityError> {
        for name in snapshot.values.keys() {
            self.coefficient(name)?;
        }
        for (name, values) in &snapshot.values {
            self.coefficient_mut(name)?.values = values.clone();
        }
        Ok(())
    }
}

mod entries {
    use super::CoefficientIndex;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        index: &'a CoefficientIndex,
        value: f64,
    }

    #[derive(Deserialize)]
    struct Entry {
        #[serde(default)]
        index: CoefficientIndex,
        value: f64,
    }

    pub fn serialize<S: Serializer>(
        values: &BTreeMap<CoefficientIndex, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            values
                .iter()
                .map(|(index, value)| EntryRef { index, value: *value }),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<CoefficientIndex, f64>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.index, e.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(unit: i64, component: &str) -> CoefficientIndex {
        CoefficientIndex::from([IndexPart::Int(unit), IndexPart::from(component)])
    }

    fn sample_model() -> ModelInstance {
        ModelInstance::new("plant")
            .with_coefficient(
                "xi",
                Coefficient::new()
                    .with_value(idx(7, "CO2"), 0.5)
                    .with_value(idx(7, "H2"), 0.1),
            )
            .with_coefficient("K_OM", Coefficient::new().with_value([IndexPart::Int(7)], 0.04))
    }

    #[test]
    fn missing_coefficient_lookup_fails() {
        let model = sample_model();
        assert_eq!(
            model.coefficient("tau").unwrap_err(),
            SensitivityError::MissingCoefficient { name: "tau".into() }
        );
    }

    #[test]
    fn set_mutable_is_all_or_nothing() {
        let mut model = sample_model();
        let err = model.set_mutable(["xi", "lin_CAPEX_x"]).unwrap_err();
        assert!(matches!(err, SensitivityError::MissingCoefficient { .. }));
        assert!(!model.is_mutable("xi").unwrap());

        model.set_mutable(["xi"]).unwrap();
        assert_eq!(model.mutable_coefficients(), vec!["xi"]);
    }

    #[test]
    fn commit_rejects_immutable_without_partial_writes() {
        let mut model = sample_model();
        model.set_mutable(["xi"]).unwrap();

        let writes = vec![
            CoefficientWrite::new("xi", idx(7, "CO2"), 0.9),
            CoefficientWrite::new("K_OM", [IndexPart::Int(7)], 0.08),
        ];
        let err = model.commit(&writes).unwrap_err();
        assert_eq!(
            err,
            SensitivityError::ImmutableCoefficient { name: "K_OM".into() }
        );
        assert_eq!(model.value("xi", &idx(7, "CO2")), Some(0.5));
    }

    #[test]
    fn commit_rejects_undeclared_index() {
        let mut model = sample_model();
        model.set_mutable(["xi"]).unwrap();
        let err = model
            .commit(&[CoefficientWrite::new("xi", idx(8, "CO2"), 0.9)])
            .unwrap_err();
        assert_eq!(
            err,
            SensitivityError::UnknownIndex {
                coefficient: "xi".into(),
                index: "(8, CO2)".into(),
            }
        );
    }

    #[test]
    fn snapshot_and_restore() {
        let mut model = sample_model();
        model.set_mutable(["xi"]).unwrap();
        let snap = model.snapshot(["xi"]).unwrap();

        model
            .commit(&[CoefficientWrite::new("xi", idx(7, "H2"), 0.3)])
            .unwrap();
        assert_eq!(model.value("xi", &idx(7, "H2")), Some(0.3));

        model.restore(&snap).unwrap();
        assert_eq!(model.value("xi", &idx(7, "H2")), Some(0.1));
        assert_eq!(snap.names().collect::<Vec<_>>(), vec!["xi"]);
    }

    #[test]
    fn model_json_round_trip() {
        let model = sample_model();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains(r#""index":[7,"CO2"]"#));
        let back: ModelInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(model, back);
    }

    #[test]
    fn index_display() {
        assert_eq!(CoefficientIndex::scalar().to_string(), "[]");
        assert_eq!(idx(3, "CH4").to_string(), "(3, CH4)");
    }
}
