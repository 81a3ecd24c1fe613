use std::fs;
use std::path::Path;

use ps_sweep::RangeRow;
use ps_types::{config_error, validation_error, ModelInstance, PsError, PsResult, SweepConfig};
use serde_json::{Map, Number, Value};

/// File format of a range table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFormat {
    Csv,
    Json,
}

impl RangeFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> PsResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(validation_error!(
                "Unsupported range file {}: expected .csv or .json",
                path.display()
            )),
        }
    }
}

/// Reads range tables, model instances and run configuration from disk.
#[derive(Debug, Clone, Copy)]
pub struct InputLoader {
    delimiter: u8,
}

impl InputLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Load range rows, choosing CSV or JSON by extension.
    pub fn load_range_rows<P: AsRef<Path>>(&self, path: P) -> PsResult<Vec<RangeRow>> {
        let path = path.as_ref();
        match RangeFormat::from_path(path)? {
            RangeFormat::Csv => self.load_range_rows_csv(path),
            RangeFormat::Json => self.load_range_rows_json(path),
        }
    }

    /// Load range rows from a CSV file with a header row.
    pub fn load_range_rows_csv<P: AsRef<Path>>(&self, path: P) -> PsResult<Vec<RangeRow>> {
        use csv::ReaderBuilder;

        let path = path.as_ref();
        tracing::info!("Loading range table from CSV: {}", path.display());

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| PsError::Csv(format!("Failed to open CSV file {}: {}", path.display(), e)))?;

        let headers = rdr
            .headers()
            .map_err(|e| PsError::Csv(format!("Failed to read CSV headers: {}", e)))?
            .clone();
        tracing::debug!("CSV headers: {:?}", headers);

        let mut rows = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                PsError::Csv(format!("Failed to read CSV record at line {}: {}", line_num + 2, e))
            })?;
            if record.iter().all(str::is_empty) {
                continue;
            }

            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.to_string(), parse_cell(header, cell)))
                .collect();
            rows.push(row);
        }

        tracing::info!("Loaded {} range rows from CSV file", rows.len());
        Ok(rows)
    }

    /// Load range rows from a JSON array of objects.
    pub fn load_range_rows_json<P: AsRef<Path>>(&self, path: P) -> PsResult<Vec<RangeRow>> {
        let path = path.as_ref();
        tracing::info!("Loading range table from JSON: {}", path.display());

        let text = fs::read_to_string(path)?;
        let rows: Vec<RangeRow> = serde_json::from_str(&text)?;

        tracing::info!("Loaded {} range rows from JSON file", rows.len());
        Ok(rows)
    }

    /// Load a serialized model instance.
    pub fn load_model_json<P: AsRef<Path>>(&self, path: P) -> PsResult<ModelInstance> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let model: ModelInstance = serde_json::from_str(&text)?;
        tracing::info!(
            "Loaded model {:?} with {} coefficients from {}",
            model.name,
            model.coefficients.len(),
            path.display()
        );
        Ok(model)
    }

    /// Load a sweep configuration; absent fields take their defaults.
    pub fn load_config_json<P: AsRef<Path>>(&self, path: P) -> PsResult<SweepConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| config_error!("Invalid config {}: {}", path.display(), e))
    }
}

impl Default for InputLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Columns holding bounds and step counts, in either dialect.
const NUMERIC_COLUMNS: [&str; 6] = [
    "Lower_Bound",
    "Upper_Bound",
    "Number_of_steps",
    "lowerBound",
    "upperBound",
    "steps",
];

/// Interpret a CSV cell. Empty cells are null.
///
/// Bound and step columns parse as integer, then float, then text. Every other
/// column is an identifier: it becomes an integer only when the cell is that
/// integer's exact spelling, so "001" and "1e3" stay text.
fn parse_cell(header: &str, cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        if NUMERIC_COLUMNS.contains(&header) || i.to_string() == cell {
            return Value::Number(i.into());
        }
        return Value::String(cell.to_string());
    }
    if NUMERIC_COLUMNS.contains(&header) {
        if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}
