use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::defaults::OUTPUT_SUFFIX;
use crate::data::{CellValue, RowTable};
use crate::errors::SamplerError;
use crate::sampler::SampleSelection;

/// Load a headed CSV table. Short records are padded with nulls.
pub fn read_csv<R: Read>(reader: R) -> Result<RowTable, SamplerError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|name| name.trim().is_empty()) {
        return Err(SamplerError::MissingHeaders);
    }

    let mut table = RowTable::new(headers.iter().map(|name| name.trim().to_string()));
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(CellValue::parse).collect())?;
    }
    debug!(
        rows = table.len(),
        columns = table.columns().len(),
        "loaded csv table"
    );
    Ok(table)
}

/// Load a headed CSV table from `path`.
pub fn read_csv_path(path: &Path) -> Result<RowTable, SamplerError> {
    let table = read_csv(File::open(path)?)?;
    info!(
        "[audit:csv] read {} rows from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Write the header and the selected rows (ascending table order); returns rows written.
pub fn write_csv<W: Write>(
    table: &RowTable,
    selection: &SampleSelection,
    writer: W,
) -> Result<usize, SamplerError> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(table.columns())?;
    let mut written = 0;
    for row in selection.rows(table) {
        writer.write_record(row.iter().map(CellValue::render))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Write the selected rows to `path`, replacing any existing file.
pub fn write_csv_path(
    path: &Path,
    table: &RowTable,
    selection: &SampleSelection,
) -> Result<usize, SamplerError> {
    let written = write_csv(table, selection, File::create(path)?)?;
    info!("[audit:csv] wrote {} rows to {}", written, path.display());
    Ok(written)
}

/// `<stem> Audit Sample.csv` next to `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}"))
}
