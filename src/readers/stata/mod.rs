//! Stata .dta file reader
//!
//! Reads releases 113-115 (fixed binary layout) and 117-119 (tagged
//! layout) into a [`DataTable`] plus [`FileMetadata`]. The whole file is
//! loaded into memory before parsing.

mod cursor;
#[cfg(test)]
pub(crate) mod fixture;
mod labels;
mod layout;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::table::{Column, DataTable};
use crate::types::{
    ByteOrder, FileMetadata, ReadOptions, Result, StorageType, Value, ValueLabelMap, VariableInfo,
};

use super::{DataReader, Dataset};
use cursor::Cursor;
use labels::parse_label_table;
use layout::{double_is_missing, float_is_missing, Layout, TextEncoding};
use layout::{MAX_BYTE, MAX_INT, MAX_LONG};

const TAGGED_MAGIC: &[u8] = b"<stata_dta>";
const TIMESTAMP_LEN: usize = 18;
const OLD_DATA_LABEL_LEN: usize = 81;
const MAP_ENTRIES: usize = 14;
const LABEL_PADDING: usize = 3;

/// GSO content type of a NUL-terminated text blob
const GSO_ASCII: u8 = 130;

/// Stata .dta file reader
pub struct StataReader {
    path: PathBuf,
}

impl StataReader {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

impl DataReader for StataReader {
    fn read(&mut self, options: &ReadOptions) -> Result<Dataset> {
        let data = read_file(&self.path)?;
        debug!(path = %self.path.display(), bytes = data.len(), "read Stata file");
        parse_dta(&data, self.file_name(), options)
    }
}

/// Load the whole file; the handle is closed before parsing starts
fn read_file(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(e)
        }
    })?;
    let mut data = Vec::new();
    BufReader::new(file).read_to_end(&mut data)?;
    Ok(data)
}

/// Parse an in-memory `.dta` file
pub(crate) fn parse_dta(data: &[u8], file_name: String, options: &ReadOptions) -> Result<Dataset> {
    let parsed = if data.starts_with(TAGGED_MAGIC) {
        parse_tagged(data)?
    } else {
        parse_fixed(data)?
    };
    parsed.into_dataset(file_name, options)
}

/// Header fields shared by both layouts
struct Header {
    layout: Layout,
    order: ByteOrder,
    n_vars: usize,
    n_rows: u64,
    data_label: String,
    timestamp: String,
}

/// Intermediate result before columns are assembled
struct Parsed {
    header: Header,
    variables: Vec<VariableInfo>,
    columns: Vec<Vec<Value>>,
    label_sets: IndexMap<String, ValueLabelMap>,
}

impl Parsed {
    fn into_dataset(self, file_name: String, options: &ReadOptions) -> Result<Dataset> {
        let Parsed {
            header,
            variables,
            mut columns,
            label_sets,
        } = self;

        if options.convert_dates {
            for (variable, values) in variables.iter().zip(columns.iter_mut()) {
                if let Some(kind) = DateKind::from_format(&variable.format) {
                    if variable.storage_type.is_numeric() {
                        convert_dates(values, kind);
                    }
                }
            }
        }

        let table = DataTable::from_columns(
            variables
                .iter()
                .zip(columns)
                .map(|(v, values)| Column::new(v.name.clone(), values))
                .collect(),
        )?;

        debug!(
            release = header.layout.release,
            rows = header.n_rows,
            columns = header.n_vars,
            label_sets = label_sets.len(),
            "parsed Stata dataset"
        );

        let metadata = FileMetadata {
            file_name,
            release: header.layout.release,
            byte_order: header.order,
            n_rows: header.n_rows,
            n_cols: header.n_vars,
            data_label: header.data_label,
            timestamp: header.timestamp,
            variables,
            label_sets,
        };
        Ok(Dataset { table, metadata })
    }
}

/// Per-variable descriptor arrays, in file order
struct Descriptors {
    types: Vec<StorageType>,
    names: Vec<String>,
    formats: Vec<String>,
    label_sets: Vec<String>,
    labels: Vec<String>,
}

impl Descriptors {
    fn into_variables(self) -> Vec<VariableInfo> {
        self.types
            .into_iter()
            .zip(self.names)
            .zip(self.formats)
            .zip(self.label_sets)
            .zip(self.labels)
            .map(
                |((((storage_type, name), format), value_label_set), label)| VariableInfo {
                    name,
                    label,
                    storage_type,
                    format,
                    value_label_set,
                },
            )
            .collect()
    }
}

fn read_strings(
    cursor: &mut Cursor<'_>,
    count: usize,
    width: usize,
    encoding: TextEncoding,
) -> Result<Vec<String>> {
    (0..count)
        .map(|_| cursor.fixed_str(width, encoding))
        .collect()
}

/// Releases 113, 114 and 115
fn parse_fixed(data: &[u8]) -> Result<Parsed> {
    let release = data
        .first()
        .copied()
        .ok_or_else(|| Error::invalid_format("empty file"))?;
    let layout = Layout::for_release(u16::from(release))?;
    let order = match data.get(1).copied() {
        Some(1) => ByteOrder::Big,
        Some(2) => ByteOrder::Little,
        other => {
            return Err(Error::invalid_format(format!(
                "unknown byte order marker {:?}",
                other
            )))
        }
    };
    let enc = layout.encoding;

    let mut cursor = Cursor::new(data, order);
    // release, byte order, filetype, unused
    cursor.skip(4)?;
    let n_vars = usize::from(cursor.u16()?);
    let n_rows = u64::from(cursor.u32()?);
    let data_label = cursor.fixed_str(OLD_DATA_LABEL_LEN, enc)?;
    let timestamp = cursor.fixed_str(TIMESTAMP_LEN, enc)?;
    let header = Header {
        layout,
        order,
        n_vars,
        n_rows,
        data_label,
        timestamp,
    };

    let types = (0..n_vars)
        .map(|_| cursor.u8().and_then(|code| layout.storage_type(u16::from(code))))
        .collect::<Result<Vec<_>>>()?;
    let names = read_strings(&mut cursor, n_vars, layout.name_len, enc)?;
    cursor.skip((n_vars + 1) * 2)?;
    let formats = read_strings(&mut cursor, n_vars, layout.format_len, enc)?;
    let label_sets = read_strings(&mut cursor, n_vars, layout.name_len, enc)?;
    let labels = read_strings(&mut cursor, n_vars, layout.label_len, enc)?;

    // expansion fields end with a zero type and zero length
    loop {
        let kind = cursor.u8()?;
        let len = cursor.len32()?;
        if kind == 0 && len == 0 {
            break;
        }
        cursor.skip(len)?;
    }

    let variables = Descriptors {
        types,
        names,
        formats,
        label_sets,
        labels,
    }
    .into_variables();

    trace!(offset = cursor.position(), "data section");
    let (columns, strls) = read_rows(&mut cursor, &header, &variables)?;
    if !strls.is_empty() {
        return Err(Error::invalid_format("strL values require release 117 or later"));
    }

    trace!(offset = cursor.position(), "value labels");
    let mut label_sets = IndexMap::new();
    while cursor.remaining() > 0 {
        let len = cursor.len32()?;
        let name = cursor.fixed_str(layout.name_len, enc)?;
        cursor.skip(LABEL_PADDING)?;
        let table = cursor.take(len)?;
        label_sets.insert(name, parse_label_table(table, order, enc)?);
    }

    Ok(Parsed {
        header,
        variables,
        columns,
        label_sets,
    })
}

/// Releases 117, 118 and 119
fn parse_tagged(data: &[u8]) -> Result<Parsed> {
    let mut cursor = Cursor::new(data, ByteOrder::Little);
    cursor.expect_tag("<stata_dta>")?;
    cursor.expect_tag("<header>")?;

    cursor.expect_tag("<release>")?;
    let release_text = cursor.fixed_str(3, TextEncoding::Windows1252)?;
    let release: u16 = release_text
        .parse()
        .map_err(|_| Error::invalid_format(format!("bad release '{}'", release_text)))?;
    let layout = Layout::for_release(release)?;
    if !layout.is_tagged() {
        return Err(Error::UnsupportedVersion(release));
    }
    let enc = layout.encoding;
    cursor.expect_tag("</release>")?;

    cursor.expect_tag("<byteorder>")?;
    let order = match cursor.take(3)? {
        b"MSF" => ByteOrder::Big,
        b"LSF" => ByteOrder::Little,
        other => {
            return Err(Error::invalid_format(format!(
                "unknown byte order '{}'",
                String::from_utf8_lossy(other)
            )))
        }
    };
    cursor.set_order(order);
    cursor.expect_tag("</byteorder>")?;

    cursor.expect_tag("<K>")?;
    let n_vars = if release >= 119 {
        cursor.u32()? as usize
    } else {
        usize::from(cursor.u16()?)
    };
    cursor.expect_tag("</K>")?;

    cursor.expect_tag("<N>")?;
    let n_rows = if release == 117 {
        u64::from(cursor.u32()?)
    } else {
        cursor.u64()?
    };
    cursor.expect_tag("</N>")?;

    cursor.expect_tag("<label>")?;
    let label_len = if release == 117 {
        usize::from(cursor.u8()?)
    } else {
        usize::from(cursor.u16()?)
    };
    let data_label = cursor.fixed_str(label_len, enc)?;
    cursor.expect_tag("</label>")?;

    cursor.expect_tag("<timestamp>")?;
    let ts_len = usize::from(cursor.u8()?);
    let timestamp = cursor.fixed_str(ts_len, enc)?;
    cursor.expect_tag("</timestamp>")?;
    cursor.expect_tag("</header>")?;

    let header = Header {
        layout,
        order,
        n_vars,
        n_rows,
        data_label,
        timestamp,
    };

    // sections are read in file order, so the offset map is not needed
    cursor.expect_tag("<map>")?;
    cursor.skip(MAP_ENTRIES * 8)?;
    cursor.expect_tag("</map>")?;

    cursor.expect_tag("<variable_types>")?;
    let types = (0..n_vars)
        .map(|_| cursor.u16().and_then(|code| layout.storage_type(code)))
        .collect::<Result<Vec<_>>>()?;
    cursor.expect_tag("</variable_types>")?;

    cursor.expect_tag("<varnames>")?;
    let names = read_strings(&mut cursor, n_vars, layout.name_len, enc)?;
    cursor.expect_tag("</varnames>")?;

    cursor.expect_tag("<sortlist>")?;
    let sort_width = if release >= 119 { 4 } else { 2 };
    cursor.skip((n_vars + 1) * sort_width)?;
    cursor.expect_tag("</sortlist>")?;

    cursor.expect_tag("<formats>")?;
    let formats = read_strings(&mut cursor, n_vars, layout.format_len, enc)?;
    cursor.expect_tag("</formats>")?;

    cursor.expect_tag("<value_label_names>")?;
    let label_sets = read_strings(&mut cursor, n_vars, layout.name_len, enc)?;
    cursor.expect_tag("</value_label_names>")?;

    cursor.expect_tag("<variable_labels>")?;
    let labels = read_strings(&mut cursor, n_vars, layout.label_len, enc)?;
    cursor.expect_tag("</variable_labels>")?;

    cursor.expect_tag("<characteristics>")?;
    while cursor.peek_tag("<ch>") {
        cursor.expect_tag("<ch>")?;
        let len = cursor.u32()? as usize;
        cursor.skip(len)?;
        cursor.expect_tag("</ch>")?;
    }
    cursor.expect_tag("</characteristics>")?;

    let variables = Descriptors {
        types,
        names,
        formats,
        label_sets,
        labels,
    }
    .into_variables();

    cursor.expect_tag("<data>")?;
    trace!(offset = cursor.position(), "data section");
    let (mut columns, strl_slots) = read_rows(&mut cursor, &header, &variables)?;
    cursor.expect_tag("</data>")?;

    cursor.expect_tag("<strls>")?;
    trace!(offset = cursor.position(), "strls");
    let strls = read_strls(&mut cursor, &layout)?;
    cursor.expect_tag("</strls>")?;
    resolve_strls(&mut columns, strl_slots, &strls);

    cursor.expect_tag("<value_labels>")?;
    trace!(offset = cursor.position(), "value labels");
    let mut label_sets = IndexMap::new();
    while cursor.peek_tag("<lbl>") {
        cursor.expect_tag("<lbl>")?;
        let len = cursor.len32()?;
        let name = cursor.fixed_str(layout.name_len, enc)?;
        cursor.skip(LABEL_PADDING)?;
        let table = cursor.take(len)?;
        label_sets.insert(name, parse_label_table(table, order, enc)?);
        cursor.expect_tag("</lbl>")?;
    }
    cursor.expect_tag("</value_labels>")?;
    cursor.expect_tag("</stata_dta>")?;

    Ok(Parsed {
        header,
        variables,
        columns,
        label_sets,
    })
}

/// Location of a strL reference in the data section
struct StrlSlot {
    column: usize,
    row: usize,
    key: (u64, u64),
}

fn read_rows(
    cursor: &mut Cursor<'_>,
    header: &Header,
    variables: &[VariableInfo],
) -> Result<(Vec<Vec<Value>>, Vec<StrlSlot>)> {
    let row_width: usize = variables.iter().map(|v| v.storage_type.width()).sum();
    if row_width == 0 {
        // no bytes per observation, so nothing to read whatever N says
        return Ok((vec![Vec::new(); variables.len()], Vec::new()));
    }
    let n_rows = usize::try_from(header.n_rows)
        .map_err(|_| Error::invalid_format("observation count does not fit in memory"))?;
    let needed = n_rows
        .checked_mul(row_width)
        .ok_or_else(|| Error::invalid_format("data section size overflows"))?;
    if needed > cursor.remaining() {
        return Err(Error::invalid_format(format!(
            "data section needs {} bytes but only {} remain",
            needed,
            cursor.remaining()
        )));
    }

    let mut columns: Vec<Vec<Value>> = variables
        .iter()
        .map(|_| Vec::with_capacity(n_rows))
        .collect();
    let mut strls = Vec::new();

    for row in 0..n_rows {
        for (column, variable) in variables.iter().enumerate() {
            let value = match variable.storage_type {
                StorageType::StrL => {
                    let v_len = header.layout.strl_v_len();
                    let v = cursor.uint(v_len)?;
                    let o = cursor.uint(StorageType::StrL.width() - v_len)?;
                    let key = (v, o);
                    strls.push(StrlSlot { column, row, key });
                    Value::Missing
                }
                ty => read_cell(cursor, ty, header.layout.encoding)?,
            };
            columns[column].push(value);
        }
    }
    Ok((columns, strls))
}

fn read_cell(cursor: &mut Cursor<'_>, ty: StorageType, enc: TextEncoding) -> Result<Value> {
    let value = match ty {
        StorageType::Byte => {
            let v = cursor.i8()?;
            if v > MAX_BYTE {
                Value::Missing
            } else {
                Value::Int(i64::from(v))
            }
        }
        StorageType::Int => {
            let v = cursor.i16()?;
            if v > MAX_INT {
                Value::Missing
            } else {
                Value::Int(i64::from(v))
            }
        }
        StorageType::Long => {
            let v = cursor.i32()?;
            if v > MAX_LONG {
                Value::Missing
            } else {
                Value::Int(i64::from(v))
            }
        }
        StorageType::Float => {
            let v = cursor.f32()?;
            if float_is_missing(v) {
                Value::Missing
            } else {
                Value::Float(widen_f32(v))
            }
        }
        StorageType::Double => {
            let v = cursor.f64()?;
            if double_is_missing(v) {
                Value::Missing
            } else {
                Value::Float(v)
            }
        }
        StorageType::Str(width) => Value::Str(cursor.fixed_str(usize::from(width), enc)?),
        StorageType::StrL => {
            return Err(Error::invalid_format("strL cell outside the data section"));
        }
    };
    Ok(value)
}

/// Widen through the shortest decimal form so `1.1f32` prints as `1.1`
fn widen_f32(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

fn read_strls(cursor: &mut Cursor<'_>, layout: &Layout) -> Result<HashMap<(u64, u64), String>> {
    let mut strls = HashMap::new();
    while cursor.peek_tag("GSO") {
        cursor.expect_tag("GSO")?;
        let v = u64::from(cursor.u32()?);
        let o = if layout.release == 117 {
            u64::from(cursor.u32()?)
        } else {
            cursor.u64()?
        };
        let kind = cursor.u8()?;
        let len = cursor.u32()? as usize;
        let bytes = cursor.take(len)?;
        let text = if kind == GSO_ASCII {
            layout.encoding.decode(bytes)
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };
        strls.insert((v, o), text);
    }
    Ok(strls)
}

fn resolve_strls(
    columns: &mut [Vec<Value>],
    slots: Vec<StrlSlot>,
    strls: &HashMap<(u64, u64), String>,
) {
    let mut unresolved = 0usize;
    for slot in slots {
        let value = match strls.get(&slot.key) {
            Some(text) => Value::Str(text.clone()),
            None if slot.key == (0, 0) => Value::Str(String::new()),
            None => {
                unresolved += 1;
                Value::Missing
            }
        };
        columns[slot.column][slot.row] = value;
    }
    if unresolved > 0 {
        warn!(count = unresolved, "strL references without a matching GSO entry");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateKind {
    /// Days since 1960-01-01
    Date,
    /// Milliseconds since 1960-01-01 00:00:00
    DateTime,
}

impl DateKind {
    fn from_format(format: &str) -> Option<Self> {
        let body = format
            .strip_prefix('%')?
            .trim_start_matches(['-', '~']);
        if body.starts_with("td") || body.starts_with('d') {
            Some(DateKind::Date)
        } else if body.starts_with("tc") || body.starts_with("tC") {
            Some(DateKind::DateTime)
        } else {
            None
        }
    }
}

fn stata_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1960, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn to_date(value: &Value, kind: DateKind) -> Option<Value> {
    let n = match value {
        Value::Int(i) => *i,
        Value::Float(x) if x.is_finite() => x.round() as i64,
        _ => return None,
    };
    let epoch = stata_epoch()?;
    match kind {
        DateKind::Date => epoch
            .date()
            .checked_add_signed(TimeDelta::try_days(n)?)
            .map(Value::Date),
        DateKind::DateTime => epoch
            .checked_add_signed(TimeDelta::try_milliseconds(n)?)
            .map(Value::DateTime),
    }
}

fn convert_dates(values: &mut [Value], kind: DateKind) {
    for value in values.iter_mut() {
        if let Some(converted) = to_date(value, kind) {
            *value = converted;
        }
    }
}
