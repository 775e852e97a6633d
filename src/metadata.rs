//! Collection and normalization of per-column metadata attributes.
//!
//! The reader exposes several parallel attributes: plain lists (names,
//! labels) and maps keyed by column or label-set name. Their lengths
//! differ, e.g. only labelled variables appear in `variable_to_label`.
//! [`normalize`] pads and flattens them into one row per column position.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::types::{FileMetadata, ValueLabelMap};
use crate::value_labels::flatten_label_map;

/// Stata has no measurement level, so every variable reports this
pub const UNKNOWN_MEASURE: &str = "unknown";

/// A metadata attribute entry: a plain value or a code -> label map
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(String),
    LabelMap(ValueLabelMap),
}

impl AttributeValue {
    /// One-string form used in the metadata table
    pub fn flatten(&self) -> String {
        match self {
            AttributeValue::Scalar(s) => s.clone(),
            AttributeValue::LabelMap(map) => flatten_label_map(map),
        }
    }
}

/// Attribute keyed by column (or label-set) name, in insertion order
pub type AttributeMap = IndexMap<String, AttributeValue>;

/// Display alignment derived from a Stata format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    /// `%-9s` is left aligned, `%~9s` centered, everything else right aligned
    pub fn from_format(format: &str) -> Self {
        match format.strip_prefix('%').and_then(|f| f.chars().next()) {
            Some('-') => Alignment::Left,
            Some('~') => Alignment::Center,
            _ => Alignment::Right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

/// The raw parallel attributes, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataAttributes {
    /// Variable labels; `None` where a variable has no label
    pub column_labels: Vec<Option<String>>,
    pub column_names: Vec<Option<String>>,
    /// Keyed by label-set name
    pub value_labels: AttributeMap,
    /// Keyed by variable name
    pub variable_value_labels: AttributeMap,
    pub original_variable_types: AttributeMap,
    pub readstat_variable_types: AttributeMap,
    pub variable_alignment: AttributeMap,
    pub variable_measure: AttributeMap,
    pub variable_to_label: AttributeMap,
}

impl MetadataAttributes {
    /// Gather the attributes from a file's metadata
    pub fn collect(metadata: &FileMetadata) -> Self {
        let mut attrs = MetadataAttributes::default();

        for (name, labels) in &metadata.label_sets {
            attrs
                .value_labels
                .insert(name.clone(), AttributeValue::LabelMap(labels.clone()));
        }

        for var in &metadata.variables {
            let name = var.name.clone();
            attrs.column_names.push(Some(name.clone()));
            attrs
                .column_labels
                .push((!var.label.is_empty()).then(|| var.label.clone()));

            if !var.value_label_set.is_empty() {
                if let Some(labels) = metadata.label_sets.get(&var.value_label_set) {
                    attrs
                        .variable_value_labels
                        .insert(name.clone(), AttributeValue::LabelMap(labels.clone()));
                }
                attrs.variable_to_label.insert(
                    name.clone(),
                    AttributeValue::Scalar(var.value_label_set.clone()),
                );
            }

            attrs
                .original_variable_types
                .insert(name.clone(), AttributeValue::Scalar(var.format.clone()));
            attrs.readstat_variable_types.insert(
                name.clone(),
                AttributeValue::Scalar(var.storage_type.readstat_name().to_string()),
            );
            attrs.variable_alignment.insert(
                name.clone(),
                AttributeValue::Scalar(Alignment::from_format(&var.format).as_str().to_string()),
            );
            attrs
                .variable_measure
                .insert(name, AttributeValue::Scalar(UNKNOWN_MEASURE.to_string()));
        }

        attrs
    }

    /// Length of the longest attribute
    pub fn max_length(&self) -> usize {
        [
            self.column_labels.len(),
            self.column_names.len(),
            self.value_labels.len(),
            self.variable_value_labels.len(),
            self.original_variable_types.len(),
            self.readstat_variable_types.len(),
            self.variable_alignment.len(),
            self.variable_measure.len(),
            self.variable_to_label.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// One normalized metadata row; all map attributes are flattened strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRow {
    pub column_label: Option<String>,
    pub column_name: Option<String>,
    pub value_labels: String,
    pub variable_value_labels: String,
    pub original_variable_types: String,
    pub readstat_variable_types: String,
    pub variable_alignment: String,
    pub variable_measure: String,
    pub variable_to_label: String,
}

impl MetadataRow {
    /// Column name this row refers to in the renamed table
    pub fn target_column(&self) -> Option<&str> {
        self.column_label
            .as_deref()
            .or(self.column_name.as_deref())
    }

    /// Fields in metadata table order
    pub fn fields(&self) -> [&str; 9] {
        [
            self.column_label.as_deref().unwrap_or(""),
            self.column_name.as_deref().unwrap_or(""),
            &self.value_labels,
            &self.variable_value_labels,
            &self.original_variable_types,
            &self.readstat_variable_types,
            &self.variable_alignment,
            &self.variable_measure,
            &self.variable_to_label,
        ]
    }
}

/// Metadata with every attribute aligned to `max_length` positions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedMetadata {
    pub rows: Vec<MetadataRow>,
}

impl NormalizedMetadata {
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Right-pad a list with `None` up to `len`
pub fn pad_list(list: &[Option<String>], len: usize) -> Vec<Option<String>> {
    let mut padded = list.to_vec();
    if padded.len() < len {
        padded.resize(len, None);
    }
    padded
}

/// Flatten a map attribute per column name. Absent names, repeated names
/// after their first occurrence, and names without an entry give `""`.
pub fn flatten_by_name(attribute: &AttributeMap, names: &[Option<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| match name {
            Some(name) if seen.insert(name.as_str()) => attribute
                .get(name)
                .map(AttributeValue::flatten)
                .unwrap_or_default(),
            _ => String::new(),
        })
        .collect()
}

/// Pad and flatten all attributes into one row per column position
pub fn normalize(attrs: &MetadataAttributes) -> NormalizedMetadata {
    let max_length = attrs.max_length();
    let names = pad_list(&attrs.column_names, max_length);
    let labels = pad_list(&attrs.column_labels, max_length);

    let mut value_labels = flatten_by_name(&attrs.value_labels, &names).into_iter();
    let mut variable_value_labels =
        flatten_by_name(&attrs.variable_value_labels, &names).into_iter();
    let mut original_variable_types =
        flatten_by_name(&attrs.original_variable_types, &names).into_iter();
    let mut readstat_variable_types =
        flatten_by_name(&attrs.readstat_variable_types, &names).into_iter();
    let mut variable_alignment = flatten_by_name(&attrs.variable_alignment, &names).into_iter();
    let mut variable_measure = flatten_by_name(&attrs.variable_measure, &names).into_iter();
    let mut variable_to_label = flatten_by_name(&attrs.variable_to_label, &names).into_iter();

    let rows = names
        .into_iter()
        .zip(labels)
        .map(|(column_name, column_label)| MetadataRow {
            column_label,
            column_name,
            value_labels: value_labels.next().unwrap_or_default(),
            variable_value_labels: variable_value_labels.next().unwrap_or_default(),
            original_variable_types: original_variable_types.next().unwrap_or_default(),
            readstat_variable_types: readstat_variable_types.next().unwrap_or_default(),
            variable_alignment: variable_alignment.next().unwrap_or_default(),
            variable_measure: variable_measure.next().unwrap_or_default(),
            variable_to_label: variable_to_label.next().unwrap_or_default(),
        })
        .collect();

    NormalizedMetadata { rows }
}
