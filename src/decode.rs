//! Replace coded column values with their value labels.

use tracing::{debug, warn};

use crate::metadata::{MetadataRow, NormalizedMetadata};
use crate::table::DataTable;
use crate::types::{CodeKey, DecodeSource, Value, ValueLabelMap};
use crate::value_labels::{parse_value_labels, try_parse_int};

/// Outcome of a decoding pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    /// Columns whose values went through label substitution
    pub decoded: Vec<String>,
    /// Labels with no matching table column
    pub not_found: Vec<String>,
    /// Columns that could not be converted to integer codes
    pub coercion_skipped: Vec<String>,
    /// Number of cells replaced by a label
    pub replaced_cells: usize,
}

impl DecodeReport {
    /// Human-readable diagnostics for the conversion summary
    pub fn warnings(&self) -> Vec<String> {
        self.not_found
            .iter()
            .map(|label| format!("Column '{}' not found in data", label))
            .collect()
    }
}

fn source_field(row: &MetadataRow, source: DecodeSource) -> &str {
    match source {
        DecodeSource::Variables => &row.variable_value_labels,
        DecodeSource::LabelSets => &row.value_labels,
    }
}

/// Decode every labelled column of `table` in metadata row order
pub fn decode_columns(
    table: &mut DataTable,
    metadata: &NormalizedMetadata,
    source: DecodeSource,
) -> DecodeReport {
    let mut report = DecodeReport::default();

    for row in &metadata.rows {
        let flattened = source_field(row, source);
        if flattened.is_empty() {
            continue;
        }
        let mapping = parse_value_labels(flattened);
        let Some(target) = row.target_column() else {
            continue;
        };

        let Some(index) = table.column_index(target) else {
            warn!(column = target, "column not found in data");
            report.not_found.push(target.to_string());
            continue;
        };
        let Some(column) = table.column_mut(index) else {
            continue;
        };

        if !coerce_to_int(&mut column.values) {
            debug!(column = target, "values are not all integers; keeping original types");
            report.coercion_skipped.push(target.to_string());
        }
        let replaced = substitute_labels(&mut column.values, &mapping);
        debug!(column = target, replaced, codes = mapping.len(), "decoded column");

        report.replaced_cells += replaced;
        report.decoded.push(target.to_string());
    }

    report
}

/// Integer code of a single cell, if it has one
pub fn try_cell_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(x) if x.is_finite() && x.fract() == 0.0 => {
            let truncated = *x as i64;
            (truncated as f64 == *x).then_some(truncated)
        }
        Value::Float(_) => None,
        Value::Str(s) => try_parse_int(s),
        Value::Missing | Value::Date(_) | Value::DateTime(_) => None,
    }
}

/// Convert every cell to `Value::Int`, or leave the column untouched when
/// any cell has no integer form. Returns whether the conversion happened.
pub fn coerce_to_int(values: &mut [Value]) -> bool {
    let Some(codes) = values
        .iter()
        .map(try_cell_to_int)
        .collect::<Option<Vec<i64>>>()
    else {
        return false;
    };
    for (value, code) in values.iter_mut().zip(codes) {
        *value = Value::Int(code);
    }
    true
}

fn label_for<'a>(value: &Value, mapping: &'a ValueLabelMap) -> Option<&'a String> {
    match value {
        Value::Int(i) => mapping.get(&CodeKey::Int(*i)),
        Value::Float(x) if x.fract() == 0.0 => mapping.get(&CodeKey::Int(*x as i64)),
        Value::Str(s) => mapping.get(&CodeKey::Str(s.clone())),
        _ => None,
    }
}

/// Replace cells matching a code; other cells stay as they are
pub fn substitute_labels(values: &mut [Value], mapping: &ValueLabelMap) -> usize {
    let mut replaced = 0;
    for value in values.iter_mut() {
        if let Some(label) = label_for(value, mapping) {
            *value = Value::Str(label.clone());
            replaced += 1;
        }
    }
    replaced
}
