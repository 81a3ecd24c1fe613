//! Range tables and sweep expansion.
//!
//! A range table is a batch of records, each naming one coefficient family to
//! vary together with its bounds and step count. Two record dialects exist:
//!
//! - **rich** (spreadsheet export): `Parameter_Type`, `Unit_Number`,
//!   `Lower_Bound`, `Upper_Bound`, `Number_of_steps`, plus the canonical
//!   metadata columns.
//! - **compact** (UI export): `parameterType`, `unitUid`, `targetUnitProcess`,
//!   `componentName`, `reactionUid`, `lowerBound`, `upperBound`, `steps`.
//!
//! The dialect is decided once per batch, from the first record, and every
//! record of the batch is then parsed with it.

use ps_types::{IndexPart, ParameterMetadata, SensitivityError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// One raw record as handed over by a file loader or the UI.
pub type RangeRow = Map<String, Value>;

/// Field renames applied to compact records so downstream routines see the
/// canonical metadata names.
const COMPACT_RENAMES: [(&str, &str); 4] = [
    ("unitUid", "Unit_Number"),
    ("targetUnitProcess", "Target_Unit"),
    ("componentName", "Component"),
    ("reactionUid", "Reaction_Number"),
];

/// Record naming scheme of a range table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeDialect {
    Rich,
    Compact,
}

impl RangeDialect {
    /// Detect the dialect from a record's field names.
    pub fn detect(row: &RangeRow) -> Option<Self> {
        if row.contains_key("Parameter_Type") {
            Some(Self::Rich)
        } else if row.contains_key("parameterType") {
            Some(Self::Compact)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct RichRecord {
    #[serde(rename = "Parameter_Type")]
    parameter_type: String,
    #[serde(rename = "Lower_Bound")]
    lower_bound: f64,
    #[serde(rename = "Upper_Bound")]
    upper_bound: f64,
    #[serde(rename = "Number_of_steps")]
    steps: Value,
    #[serde(flatten)]
    metadata: ParameterMetadata,
}

#[derive(Debug, Deserialize)]
struct CompactRecord {
    #[serde(rename = "parameterType")]
    parameter_type: String,
    #[serde(rename = "lowerBound")]
    lower_bound: f64,
    #[serde(rename = "upperBound")]
    upper_bound: f64,
    steps: Value,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

/// One variable coefficient: a label, its range, and how finely to sample it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Unique key within the batch (label plus unit number or record index).
    pub key: String,
    /// Parameter label as written in the input; resolved later.
    pub label: String,
    /// Unit/process the parameter applies to; `None` means global.
    pub unit: Option<i64>,
    pub lower: f64,
    pub upper: f64,
    pub steps: usize,
    pub metadata: ParameterMetadata,
}

impl ParameterDescriptor {
    /// Build a validated descriptor.
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        lower: f64,
        upper: f64,
        steps: usize,
        metadata: ParameterMetadata,
    ) -> Result<Self, String> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(format!("bounds must be finite, got [{lower}, {upper}]"));
        }
        if lower > upper {
            return Err(format!("lower bound {lower} exceeds upper bound {upper}"));
        }
        if steps == 0 {
            return Err("step count must be positive".to_string());
        }
        let unit = metadata.unit_number.as_ref().and_then(IndexPart::as_int);
        Ok(Self {
            key: key.into(),
            label: label.into(),
            unit,
            lower,
            upper,
            steps,
            metadata,
        })
    }

    /// The uniformly spaced samples over `[lower, upper]`.
    pub fn samples(&self) -> Vec<f64> {
        linspace(self.lower, self.upper, self.steps)
    }
}

/// `steps` evenly spaced values from `lower` to `upper` inclusive.
///
/// A single step yields just `lower`; zero steps yield nothing.
pub fn linspace(lower: f64, upper: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![lower],
        _ => {
            let span = upper - lower;
            let last = (steps - 1) as f64;
            let mut values: Vec<f64> = (0..steps)
                .map(|i| {
                    let t = i as f64 / last;
                    // span overflows for bounds near f64::MAX
                    let value = if span.is_finite() {
                        lower + span * t
                    } else {
                        lower * (1.0 - t) + upper * t
                    };
                    value.min(upper)
                })
                .collect();
            values[0] = lower;
            values[steps - 1] = upper;
            values
        }
    }
}

fn parse_steps(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                usize::try_from(v).ok()
            } else {
                let f = n.as_f64()?;
                (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then(|| f as usize)
            }
        }
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(|f| {
            (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then(|| f as usize)
        }),
        _ => None,
    }
}

fn malformed(record: usize, message: impl Into<String>) -> SensitivityError {
    SensitivityError::MalformedDescriptor {
        record,
        message: message.into(),
    }
}

/// A parsed batch of descriptors together with the dialect it came in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTable {
    pub dialect: RangeDialect,
    pub descriptors: Vec<ParameterDescriptor>,
}

impl RangeTable {
    /// Parse raw records, deciding the dialect from the first one.
    pub fn parse(rows: &[RangeRow]) -> Result<Self, SensitivityError> {
        let Some(first) = rows.first() else {
            return Ok(Self {
                dialect: RangeDialect::Rich,
                descriptors: Vec::new(),
            });
        };
        let dialect = RangeDialect::detect(first).ok_or_else(|| {
            malformed(0, "record matches neither the rich nor the compact dialect")
        })?;
        Self::parse_as(rows, dialect)
    }

    /// Parse raw records with an explicitly chosen dialect.
    pub fn parse_as(rows: &[RangeRow], dialect: RangeDialect) -> Result<Self, SensitivityError> {
        let mut descriptors = Vec::with_capacity(rows.len());
        let mut seen = HashSet::new();

        for (index, row) in rows.iter().enumerate() {
            if RangeDialect::detect(row) != Some(dialect) {
                return Err(malformed(
                    index,
                    format!("record is not in the {dialect:?} dialect of this batch"),
                ));
            }
            let descriptor = match dialect {
                RangeDialect::Rich => Self::parse_rich(index, row)?,
                RangeDialect::Compact => Self::parse_compact(index, row)?,
            };
            if !seen.insert(descriptor.key.clone()) {
                return Err(malformed(
                    index,
                    format!("duplicate parameter key {}", descriptor.key),
                ));
            }
            descriptors.push(descriptor);
        }

        debug!("Parsed {} range records ({:?} dialect)", descriptors.len(), dialect);
        Ok(Self {
            dialect,
            descriptors,
        })
    }

    fn parse_rich(index: usize, row: &RangeRow) -> Result<ParameterDescriptor, SensitivityError> {
        let record: RichRecord = serde_json::from_value(Value::Object(row.clone()))
            .map_err(|e| malformed(index, e.to_string()))?;
        let steps = parse_steps(&record.steps)
            .ok_or_else(|| malformed(index, format!("invalid step count {}", record.steps)))?;

        let key = match record.metadata.unit_number.as_ref().and_then(IndexPart::as_int) {
            Some(unit) => format!("{}_{}", record.parameter_type, unit),
            None => record.parameter_type.clone(),
        };

        ParameterDescriptor::new(
            key,
            record.parameter_type,
            record.lower_bound,
            record.upper_bound,
            steps,
            record.metadata,
        )
        .map_err(|message| malformed(index, message))
    }

    fn parse_compact(
        index: usize,
        row: &RangeRow,
    ) -> Result<ParameterDescriptor, SensitivityError> {
        let record: CompactRecord = serde_json::from_value(Value::Object(row.clone()))
            .map_err(|e| malformed(index, e.to_string()))?;
        let steps = parse_steps(&record.steps)
            .ok_or_else(|| malformed(index, format!("invalid step count {}", record.steps)))?;

        let mut fields: Map<String, Value> = record.rest.into_iter().collect();
        for (from, to) in COMPACT_RENAMES {
            if let Some(value) = fields.remove(from) {
                fields.insert(to.to_string(), value);
            }
        }
        let metadata: ParameterMetadata = serde_json::from_value(Value::Object(fields))
            .map_err(|e| malformed(index, e.to_string()))?;

        ParameterDescriptor::new(
            format!("{}_{}", record.parameter_type, index),
            record.parameter_type,
            record.lower_bound,
            record.upper_bound,
            steps,
            metadata,
        )
        .map_err(|message| malformed(index, message))
    }
}

/// Samples and metadata for one descriptor of an expanded sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    pub key: String,
    pub label: String,
    pub samples: Vec<f64>,
    pub metadata: ParameterMetadata,
}

/// An expanded sweep: one axis per descriptor, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySweep {
    pub dialect: RangeDialect,
    pub axes: Vec<SweepAxis>,
}

impl SensitivitySweep {
    pub fn get(&self, key: &str) -> Option<&SweepAxis> {
        self.axes.iter().find(|axis| axis.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|axis| axis.key.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|axis| axis.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of single-parameter points across all axes.
    pub fn total_points(&self) -> usize {
        self.axes.iter().map(|axis| axis.samples.len()).sum()
    }
}

/// Turns range records into enumerated sample sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepExpander;

impl SweepExpander {
    pub fn new() -> Self {
        Self
    }

    /// Parse and expand raw records in one go.
    pub fn expand(&self, rows: &[RangeRow]) -> Result<SensitivitySweep, SensitivityError> {
        let table = RangeTable::parse(rows)?;
        Ok(self.expand_table(&table))
    }

    pub fn expand_table(&self, table: &RangeTable) -> SensitivitySweep {
        let axes = table
            .descriptors
            .iter()
            .map(|d| SweepAxis {
                key: d.key.clone(),
                label: d.label.clone(),
                samples: d.samples(),
                metadata: d.metadata.clone(),
            })
            .collect();
        SensitivitySweep {
            dialect: table.dialect,
            axes,
        }
    }
}
