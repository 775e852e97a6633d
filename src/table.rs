use crate::error::Error;
use crate::types::{Result, Value};

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// In-memory table of rows x named columns. Column order is authoritative
/// and names may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl DataTable {
    /// Build a table from columns of equal length
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != n_rows) {
            return Err(Error::InvalidInput(format!(
                "column '{}' has {} rows, expected {}",
                bad.name,
                bad.values.len(),
                n_rows
            )));
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the first column with the given name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Replace all column names at once, keeping order
    pub fn rename_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        if names.len() != self.columns.len() {
            return Err(Error::InvalidInput(format!(
                "cannot rename {} columns with {} names",
                self.columns.len(),
                names.len()
            )));
        }
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name.as_ref().to_string();
        }
        Ok(())
    }

    /// Cells of one row, in column order
    pub fn row(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.columns.iter().filter_map(move |c| c.values.get(index))
    }

    /// Render the first `n` rows as tab-separated lines with a header
    pub fn head(&self, n: usize) -> String {
        let mut lines = vec![self.column_names().join("\t")];
        for index in 0..n.min(self.n_rows) {
            let cells: Vec<String> = self.row(index).map(|v| v.to_string()).collect();
            lines.push(cells.join("\t"));
        }
        lines.join("\n")
    }
}
