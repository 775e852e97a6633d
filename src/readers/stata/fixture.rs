//! Test-only writer producing small `.dta` files for releases 113-119.

use std::path::Path;

use crate::types::{ByteOrder, StorageType, Value};

use super::layout::{Layout, MAX_DOUBLE_BITS, MAX_FLOAT_BITS};

const TIMESTAMP: &str = "15 Jan 2024 10:30";

#[derive(Debug, Clone)]
pub(crate) struct FixtureVar {
    name: String,
    label: String,
    ty: StorageType,
    format: String,
    label_set: String,
}

impl FixtureVar {
    pub fn new(name: &str, ty: StorageType) -> Self {
        let format = match ty {
            StorageType::Str(n) => format!("%{}s", n),
            StorageType::StrL => "%9s".to_string(),
            _ => "%9.0g".to_string(),
        };
        Self {
            name: name.to_string(),
            label: String::new(),
            ty,
            format,
            label_set: String::new(),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = format.to_string();
        self
    }

    pub fn label_set(mut self, name: &str) -> Self {
        self.label_set = name.to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DtaFixture {
    release: u16,
    order: ByteOrder,
    data_label: String,
    vars: Vec<FixtureVar>,
    rows: Vec<Vec<Value>>,
    label_sets: Vec<(String, Vec<(i32, String)>)>,
}

impl DtaFixture {
    pub fn new(release: u16, order: ByteOrder) -> Self {
        Self {
            release,
            order,
            data_label: String::new(),
            vars: Vec::new(),
            rows: Vec::new(),
            label_sets: Vec::new(),
        }
    }

    pub fn data_label(mut self, label: &str) -> Self {
        self.data_label = label.to_string();
        self
    }

    pub fn var(mut self, var: FixtureVar) -> Self {
        self.vars.push(var);
        self
    }

    pub fn row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn label_set(mut self, name: &str, entries: &[(i32, &str)]) -> Self {
        let entries = entries
            .iter()
            .map(|(code, label)| (*code, label.to_string()))
            .collect();
        self.label_sets.push((name.to_string(), entries));
        self
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let layout = Layout::for_release(self.release).unwrap();
        let mut w = Writer::new(self.order);
        if layout.is_tagged() {
            self.write_tagged(&mut w, &layout);
        } else {
            self.write_fixed(&mut w, &layout);
        }
        w.buf
    }

    fn write_fixed(&self, w: &mut Writer, layout: &Layout) {
        let order_marker = match self.order {
            ByteOrder::Big => 1,
            ByteOrder::Little => 2,
        };
        w.bytes(&[self.release as u8, order_marker, 1, 0]);
        w.u16(self.vars.len() as u16);
        w.u32(self.rows.len() as u32);
        w.text(&self.data_label, 81);
        w.text(TIMESTAMP, 18);

        for var in &self.vars {
            w.bytes(&[old_type_code(var.ty)]);
        }
        self.write_descriptors(w, layout, 2);

        // one expansion field, then the terminator
        w.bytes(&[1]);
        w.i32(4);
        w.bytes(b"note");
        w.bytes(&[0]);
        w.i32(0);

        for row in &self.rows {
            for (var, value) in self.vars.iter().zip(row) {
                write_cell(w, var.ty, value);
            }
        }

        for (name, entries) in &self.label_sets {
            let table = label_table_bytes(entries, self.order);
            w.i32(table.len() as i32);
            w.text(name, layout.name_len);
            w.bytes(&[0, 0, 0]);
            w.bytes(&table);
        }
    }

    fn write_tagged(&self, w: &mut Writer, layout: &Layout) {
        let release = self.release;
        w.bytes(b"<stata_dta><header><release>");
        w.bytes(release.to_string().as_bytes());
        w.bytes(b"</release><byteorder>");
        w.bytes(match self.order {
            ByteOrder::Big => b"MSF",
            ByteOrder::Little => b"LSF",
        });
        w.bytes(b"</byteorder><K>");
        if release >= 119 {
            w.u32(self.vars.len() as u32);
        } else {
            w.u16(self.vars.len() as u16);
        }
        w.bytes(b"</K><N>");
        if release == 117 {
            w.u32(self.rows.len() as u32);
        } else {
            w.u64(self.rows.len() as u64);
        }
        w.bytes(b"</N><label>");
        if release == 117 {
            w.bytes(&[self.data_label.len() as u8]);
        } else {
            w.u16(self.data_label.len() as u16);
        }
        w.bytes(self.data_label.as_bytes());
        w.bytes(b"</label><timestamp>");
        w.bytes(&[TIMESTAMP.len() as u8]);
        w.bytes(TIMESTAMP.as_bytes());
        w.bytes(b"</timestamp></header>");

        w.bytes(b"<map>");
        for _ in 0..14 {
            w.u64(0);
        }
        w.bytes(b"</map>");

        w.bytes(b"<variable_types>");
        for var in &self.vars {
            w.u16(new_type_code(var.ty));
        }
        w.bytes(b"</variable_types>");

        let sort_width = if release >= 119 { 4 } else { 2 };
        w.bytes(b"<varnames>");
        for var in &self.vars {
            w.text(&var.name, layout.name_len);
        }
        w.bytes(b"</varnames><sortlist>");
        w.bytes(&vec![0; (self.vars.len() + 1) * sort_width]);
        w.bytes(b"</sortlist><formats>");
        for var in &self.vars {
            w.text(&var.format, layout.format_len);
        }
        w.bytes(b"</formats><value_label_names>");
        for var in &self.vars {
            w.text(&var.label_set, layout.name_len);
        }
        w.bytes(b"</value_label_names><variable_labels>");
        for var in &self.vars {
            w.text(&var.label, layout.label_len);
        }
        w.bytes(b"</variable_labels>");

        w.bytes(b"<characteristics><ch>");
        w.u32(5);
        w.bytes(b"_dta\0");
        w.bytes(b"</ch></characteristics>");

        let mut gsos = Vec::new();
        w.bytes(b"<data>");
        for (row_index, row) in self.rows.iter().enumerate() {
            for (col_index, (var, value)) in self.vars.iter().zip(row).enumerate() {
                if var.ty == StorageType::StrL {
                    let key = (col_index as u64 + 1, row_index as u64 + 1);
                    let v_len = layout.strl_v_len();
                    w.uint(key.0, v_len);
                    w.uint(key.1, 8 - v_len);
                    gsos.push((key, value.to_string()));
                } else {
                    write_cell(w, var.ty, value);
                }
            }
        }
        w.bytes(b"</data>");

        w.bytes(b"<strls>");
        for ((v, o), text) in gsos {
            w.bytes(b"GSO");
            w.u32(v as u32);
            if release == 117 {
                w.u32(o as u32);
            } else {
                w.u64(o);
            }
            w.bytes(&[130]);
            w.u32(text.len() as u32 + 1);
            w.bytes(text.as_bytes());
            w.bytes(&[0]);
        }
        w.bytes(b"</strls>");

        w.bytes(b"<value_labels>");
        for (name, entries) in &self.label_sets {
            let table = label_table_bytes(entries, self.order);
            w.bytes(b"<lbl>");
            w.i32(table.len() as i32);
            w.text(name, layout.name_len);
            w.bytes(&[0, 0, 0]);
            w.bytes(&table);
            w.bytes(b"</lbl>");
        }
        w.bytes(b"</value_labels></stata_dta>");
    }

    fn write_descriptors(&self, w: &mut Writer, layout: &Layout, sort_width: usize) {
        for var in &self.vars {
            w.text(&var.name, layout.name_len);
        }
        w.bytes(&vec![0; (self.vars.len() + 1) * sort_width]);
        for var in &self.vars {
            w.text(&var.format, layout.format_len);
        }
        for var in &self.vars {
            w.text(&var.label_set, layout.name_len);
        }
        for var in &self.vars {
            w.text(&var.label, layout.label_len);
        }
    }
}

/// Encode a value-label table in the given byte order
fn label_table_bytes(entries: &[(i32, String)], order: ByteOrder) -> Vec<u8> {
    let mut text = Vec::new();
    let mut offsets = Vec::new();
    for (_, label) in entries {
        offsets.push(text.len() as i32);
        text.extend_from_slice(label.as_bytes());
        text.push(0);
    }
    let mut w = Writer::new(order);
    w.i32(entries.len() as i32);
    w.i32(text.len() as i32);
    for offset in offsets {
        w.i32(offset);
    }
    for (code, _) in entries {
        w.i32(*code);
    }
    w.bytes(&text);
    w.buf
}

fn old_type_code(ty: StorageType) -> u8 {
    match ty {
        StorageType::Str(n) => n as u8,
        StorageType::Byte => 251,
        StorageType::Int => 252,
        StorageType::Long => 253,
        StorageType::Float => 254,
        StorageType::Double => 255,
        StorageType::StrL => panic!("strL needs release 117 or later"),
    }
}

fn new_type_code(ty: StorageType) -> u16 {
    match ty {
        StorageType::Str(n) => n,
        StorageType::StrL => 32768,
        StorageType::Double => 65526,
        StorageType::Float => 65527,
        StorageType::Long => 65528,
        StorageType::Int => 65529,
        StorageType::Byte => 65530,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(x) => Some(*x as i64),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn write_cell(w: &mut Writer, ty: StorageType, value: &Value) {
    match ty {
        StorageType::Byte => w.bytes(&[as_i64(value).map_or(101, |v| v as i8) as u8]),
        StorageType::Int => w.u16(as_i64(value).map_or(32741, |v| v as i16) as u16),
        StorageType::Long => w.u32(as_i64(value).map_or(2_147_483_621, |v| v as i32) as u32),
        StorageType::Float => w.u32(
            as_f64(value).map_or(MAX_FLOAT_BITS + 1, |v| (v as f32).to_bits()),
        ),
        StorageType::Double => {
            w.u64(as_f64(value).map_or(MAX_DOUBLE_BITS + 1, f64::to_bits))
        }
        StorageType::Str(n) => w.text(&value.to_string(), usize::from(n)),
        StorageType::StrL => panic!("strL cells are written by the tagged writer"),
    }
}

struct Writer {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Writer {
    fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn uint(&mut self, value: u64, width: usize) {
        let be = value.to_be_bytes();
        let tail = &be[8 - width..];
        match self.order {
            ByteOrder::Big => self.buf.extend_from_slice(tail),
            ByteOrder::Little => self.buf.extend(tail.iter().rev()),
        }
    }

    fn u16(&mut self, value: u16) {
        self.uint(u64::from(value), 2);
    }

    fn u32(&mut self, value: u32) {
        self.uint(u64::from(value), 4);
    }

    fn i32(&mut self, value: i32) {
        self.u32(value as u32);
    }

    fn u64(&mut self, value: u64) {
        self.uint(value, 8);
    }

    /// NUL-padded fixed-width text
    fn text(&mut self, text: &str, width: usize) {
        let bytes = text.as_bytes();
        assert!(bytes.len() <= width, "'{}' does not fit in {} bytes", text, width);
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + width - bytes.len(), 0);
    }
}
