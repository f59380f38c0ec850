//! Report writer: records → `.xlsx`.
//!
//! One worksheet, the fifteen canonical headers in bold on a frozen first
//! row, then one row per record. The qualifications column holds a
//! `;`-separated list; each separator becomes a line break inside the cell
//! so the list reads vertically in Excel.
//!
//! The file is written to `<name>.tmp` next to the target and renamed into
//! place, so a crash never leaves a half-written report under the real name.

use crate::error::Pdf2XlsxError;
use crate::record::{FieldRecord, CANONICAL_FIELDS, QUALIFICATIONS_FIELD};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Worksheet name.
pub const SHEET_NAME: &str = "Export";

const DEFAULT_COLUMN_WIDTH: f64 = 24.0;
const QUALIFICATIONS_COLUMN_WIDTH: f64 = 48.0;

/// Write `records` to `dir/file_name`.
///
/// Returns `Ok(None)` without touching the disk when `records` is empty.
pub fn write_report(
    records: &[FieldRecord],
    dir: &Path,
    file_name: &str,
) -> Result<Option<PathBuf>, Pdf2XlsxError> {
    let path = dir.join(file_name);
    if records.is_empty() {
        info!("No records extracted, {} not written", path.display());
        return Ok(None);
    }

    let mut workbook =
        build_workbook(records).map_err(|e| write_failed(&path, e.to_string()))?;

    let tmp_path = dir.join(format!("{file_name}.tmp"));
    workbook
        .save(&tmp_path)
        .map_err(|e| write_failed(&path, e.to_string()))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        write_failed(&path, e.to_string())
    })?;

    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(Some(path))
}

/// Cell text for the qualifications column.
pub fn format_qualifications(value: &str) -> String {
    value.replace(';', "\n")
}

fn build_workbook(records: &[FieldRecord]) -> Result<Workbook, XlsxError> {
    let header = Format::new().set_bold();
    let wrap = Format::new().set_text_wrap().set_align(FormatAlign::Top);
    let plain = Format::new().set_align(FormatAlign::Top);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in CANONICAL_FIELDS.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *name, &header)?;
        let width = if *name == QUALIFICATIONS_FIELD {
            QUALIFICATIONS_COLUMN_WIDTH
        } else {
            DEFAULT_COLUMN_WIDTH
        };
        sheet.set_column_width(col, width)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, (name, value)) in record.iter().enumerate() {
            let Some(value) = value else { continue };
            let col = col as u16;
            if name == QUALIFICATIONS_FIELD {
                sheet.write_string_with_format(row, col, format_qualifications(value), &wrap)?;
            } else {
                sheet.write_string_with_format(row, col, value, &plain)?;
            }
        }
    }

    debug!("Built worksheet with {} data rows", records.len());
    Ok(workbook)
}

fn write_failed(path: &Path, detail: String) -> Pdf2XlsxError {
    Pdf2XlsxError::ReportWriteFailed {
        path: path.to_path_buf(),
        detail,
    }
}
