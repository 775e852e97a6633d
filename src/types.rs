use std::fmt;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Number of rows logged by `--preview` when no count is given
pub const DEFAULT_PREVIEW_ROWS: &str = "5";

/// A single cell of the data table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Key of a value-label mapping. Stata stores integer codes, but flattened
/// label strings may carry arbitrary tokens, so both forms are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodeKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for CodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKey::Int(i) => write!(f, "{}", i),
            CodeKey::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for CodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CodeKey::Int(i) => serializer.serialize_i64(*i),
            CodeKey::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// Ordered code -> label mapping
pub type ValueLabelMap = IndexMap<CodeKey, String>;

/// Stata storage type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Fixed-width string (`str1` .. `str2045`)
    Str(u16),
    /// Long string stored in the strL section
    StrL,
    Byte,
    Int,
    Long,
    Float,
    Double,
}

impl StorageType {
    /// Width of one cell in a data record
    pub fn width(self) -> usize {
        match self {
            StorageType::Str(n) => n as usize,
            StorageType::StrL => 8,
            StorageType::Byte => 1,
            StorageType::Int => 2,
            StorageType::Long | StorageType::Float => 4,
            StorageType::Double => 8,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, StorageType::Str(_) | StorageType::StrL)
    }

    /// Type name in the vocabulary used by readstat-based tools
    pub fn readstat_name(self) -> &'static str {
        match self {
            StorageType::Str(_) | StorageType::StrL => "string",
            StorageType::Byte => "int8",
            StorageType::Int => "int16",
            StorageType::Long => "int32",
            StorageType::Float => "float",
            StorageType::Double => "double",
        }
    }

    /// Type name as Stata prints it
    pub fn stata_name(self) -> String {
        match self {
            StorageType::Str(n) => format!("str{}", n),
            StorageType::StrL => "strL".to_string(),
            StorageType::Byte => "byte".to_string(),
            StorageType::Int => "int".to_string(),
            StorageType::Long => "long".to_string(),
            StorageType::Float => "float".to_string(),
            StorageType::Double => "double".to_string(),
        }
    }
}

impl Serialize for StorageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.stata_name())
    }
}

/// Descriptor of one variable (column) in a Stata file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    /// Variable label; empty when the variable has none
    pub label: String,
    pub storage_type: StorageType,
    /// Display format, e.g. `%9.0g`
    pub format: String,
    /// Name of the attached value-label set; empty when none
    pub value_label_set: String,
}

impl VariableInfo {
    /// Name the column carries after renaming: its label, or its name when unlabeled
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Byte order declared in the file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Big,
    Little,
}

/// File-level metadata of a Stata dataset
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    /// File name (without path)
    pub file_name: String,
    pub release: u16,
    pub byte_order: ByteOrder,
    pub n_rows: u64,
    pub n_cols: usize,
    pub data_label: String,
    pub timestamp: String,
    pub variables: Vec<VariableInfo>,
    /// Value-label sets keyed by set name, in file order
    pub label_sets: IndexMap<String, ValueLabelMap>,
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Stata,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "dta" => Some(FileFormat::Stata),
            _ => None,
        }
    }
}

/// Which flattened metadata field drives decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DecodeSource {
    /// "Value Labels": label sets looked up by column name
    #[default]
    LabelSets,
    /// "Variable Value Labels": the label set attached to each variable
    Variables,
}

/// Header naming of the first metadata column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum HeaderStyle {
    /// "Column Labels"
    #[default]
    ColumnLabels,
    /// "Variable Labels"
    VariableLabels,
}

/// Options for reading a data file
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Convert `%td` and `%tc` formatted numbers to dates and datetimes
    pub convert_dates: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            convert_dates: true,
        }
    }
}

/// Options for the convert command
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory receiving the CSV outputs
    pub output_dir: PathBuf,

    /// Whether to write the decoded table
    pub decode: bool,

    pub decode_source: DecodeSource,

    pub header_style: HeaderStyle,

    pub read: ReadOptions,

    /// Rows to log from each table (0 disables the preview)
    pub preview_rows: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            decode: true,
            decode_source: DecodeSource::default(),
            header_style: HeaderStyle::default(),
            read: ReadOptions::default(),
            preview_rows: 0,
        }
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;
