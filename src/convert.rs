use std::path::Path;

use tracing::{debug, info, info_span, warn};

use crate::decode::{decode_columns, DecodeReport};
use crate::metadata::{normalize, MetadataAttributes, NormalizedMetadata};
use crate::output::{write_metadata_csv, write_table_csv, OutputPaths};
use crate::readers::{create_reader, Dataset};
use crate::table::DataTable;
use crate::types::{ConvertOptions, FileMetadata, ReadOptions, Result};

/// Result of a conversion run
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub paths: OutputPaths,
    pub metadata: NormalizedMetadata,
    /// `None` when decoding was disabled
    pub decode_report: Option<DecodeReport>,
    pub warnings: Vec<String>,
}

/// Read a data file and return its table and metadata
pub fn read_dataset(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    let mut reader = create_reader(path)?;
    reader.read(options)
}

/// Read a data file and return only its metadata
pub fn inspect_file(path: &Path, options: &ReadOptions) -> Result<FileMetadata> {
    Ok(read_dataset(path, options)?.metadata)
}

/// Convert a data file into the renamed, metadata and decoded CSV files
pub fn convert_file(path: &Path, options: &ConvertOptions) -> Result<ConversionResult> {
    let span = info_span!("convert", input = %path.display());
    let _guard = span.enter();

    let Dataset {
        mut table,
        metadata: file_metadata,
    } = read_dataset(path, &options.read)?;
    info!(
        rows = table.n_rows(),
        columns = table.n_cols(),
        release = file_metadata.release,
        "loaded dataset"
    );

    let labels: Vec<&str> = file_metadata
        .variables
        .iter()
        .map(|v| v.display_name())
        .collect();
    table.rename_columns(&labels)?;
    preview(&table, options.preview_rows, "renamed table");

    std::fs::create_dir_all(&options.output_dir)?;
    let paths = OutputPaths::new(path, &options.output_dir);

    write_table_csv(&table, &paths.data)?;
    info!(path = %paths.data.display(), "wrote data");

    let attributes = MetadataAttributes::collect(&file_metadata);
    let metadata = normalize(&attributes);
    debug!(rows = metadata.len(), "normalized metadata");
    write_metadata_csv(&metadata, options.header_style, &paths.metadata)?;
    info!(path = %paths.metadata.display(), "wrote metadata");

    let mut warnings = Vec::new();
    let decode_report = if options.decode {
        let report = decode_columns(&mut table, &metadata, options.decode_source);
        info!(
            decoded = report.decoded.len(),
            not_found = report.not_found.len(),
            cells = report.replaced_cells,
            "decoded value labels"
        );
        warnings.extend(report.warnings());
        preview(&table, options.preview_rows, "decoded table");

        write_table_csv(&table, &paths.decoded)?;
        info!(path = %paths.decoded.display(), "wrote decoded data");
        Some(report)
    } else {
        debug!("decoding disabled");
        None
    };

    for warning in &warnings {
        warn!("{}", warning);
    }

    Ok(ConversionResult {
        paths,
        metadata,
        decode_report,
        warnings,
    })
}

fn preview(table: &DataTable, rows: usize, what: &str) {
    if rows > 0 {
        info!("{} (first {} rows):\n{}", what, rows, table.head(rows));
    }
}
