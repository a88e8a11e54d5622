//! Spreadsheet codec
//!
//! Workbooks are written with `rust_xlsxwriter` and read with `calamine`.
//! Only the first worksheet is read; its first row is the header.
//!
//! Readers trim trailing empty rows from a worksheet, so the row count is
//! also stored in a hidden sheet and all-empty rows at the end are restored
//! from it.

use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use calamine::{Data, Reader, Sheets, open_workbook_auto_from_rs};
use rust_xlsxwriter::{Workbook, Worksheet};

use super::frame::{Frame, TabularEngine};
use super::{CodecOptions, FormatCodec};
use crate::error::{Error, Result};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";

/// Worksheet row limit (header included)
const MAX_ROWS: usize = 1_048_576;

/// Worksheet column limit
const MAX_COLUMNS: usize = 16_384;

/// Hidden worksheet holding the data row count in A1
const META_SHEET: &str = "_bk_meta";

/// Spreadsheet workbook; `.xls` destinations get the legacy content type but
/// the same OOXML body
#[derive(Debug)]
pub struct ExcelCodec {
    content_type: &'static str,
}

impl ExcelCodec {
    pub fn xlsx() -> Self {
        Self {
            content_type: XLSX_CONTENT_TYPE,
        }
    }

    pub fn xls() -> Self {
        Self {
            content_type: XLS_CONTENT_TYPE,
        }
    }
}

impl FormatCodec for ExcelCodec {
    fn content_type(&self) -> &'static str {
        self.content_type
    }

    fn encode(&self, frame: &Frame, _options: &CodecOptions) -> Result<Vec<u8>> {
        let batch = frame.batch();
        if batch.num_rows() + 1 > MAX_ROWS || batch.num_columns() > MAX_COLUMNS {
            return Err(Error::Codec(format!(
                "spreadsheet limits exceeded: {} rows x {} columns",
                batch.num_rows(),
                batch.num_columns()
            )));
        }

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();

        for (col, field) in batch.schema().fields().iter().enumerate() {
            sheet
                .write_string(0, col as u16, field.name())
                .map_err(xlsx_err)?;
            write_column(sheet, col as u16, batch.column(col))?;
        }

        let meta = workbook.add_worksheet().set_name(META_SHEET).map_err(xlsx_err)?;
        meta.set_hidden(true);
        meta.write_number(0, 0, batch.num_rows() as f64).map_err(xlsx_err)?;

        workbook.save_to_buffer().map_err(xlsx_err)
    }

    fn decode(&self, raw: &[u8], engine: TabularEngine, _options: &CodecOptions) -> Result<Frame> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(raw.to_vec()))
            .map_err(|e| Error::Codec(format!("spreadsheet: {e}")))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Codec("spreadsheet has no worksheet".into()))?
            .map_err(|e| Error::Codec(format!("spreadsheet: {e}")))?;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Frame::new(engine, RecordBatch::new_empty(Arc::new(Schema::empty()))));
        };
        let names: Vec<String> = header.iter().map(|c| c.to_string()).collect();

        let empty = Data::Empty;
        let mut cells: Vec<Vec<&Data>> = vec![Vec::new(); names.len()];
        for row in rows {
            for (col, cell) in row.iter().enumerate().take(names.len()) {
                cells[col].push(cell);
            }
        }
        if let Some(count) = stored_row_count(&mut workbook) {
            for column in &mut cells {
                if column.len() < count {
                    column.resize(count, &empty);
                }
            }
        }

        let columns = names
            .into_iter()
            .zip(cells.iter().map(|c| infer_column(c)))
            .collect::<Vec<_>>();
        Frame::from_columns(engine, columns)
    }
}

/// Row count recorded by [`ExcelCodec::encode`], if the workbook has one
fn stored_row_count<R: Read + Seek>(workbook: &mut Sheets<R>) -> Option<usize> {
    if !workbook.sheet_names().iter().any(|n| n == META_SHEET) {
        return None;
    }
    let range = workbook.worksheet_range(META_SHEET).ok()?;
    match range.get_value((0, 0))? {
        Data::Int(n) => usize::try_from(*n).ok(),
        Data::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as usize),
        _ => None,
    }
}

fn write_column(sheet: &mut Worksheet, col: u16, array: &ArrayRef) -> Result<()> {
    match array.data_type() {
        DataType::Boolean => {
            let values = downcast::<BooleanArray>(array)?;
            for (i, v) in values.iter().enumerate() {
                if let Some(v) = v {
                    sheet.write_boolean(i as u32 + 1, col, v).map_err(xlsx_err)?;
                }
            }
        }
        dt if dt.is_numeric() => {
            let floats = cast(array, &DataType::Float64).map_err(|e| Error::Codec(e.to_string()))?;
            let values = downcast::<Float64Array>(&floats)?;
            for (i, v) in values.iter().enumerate() {
                if let Some(v) = v {
                    sheet.write_number(i as u32 + 1, col, v).map_err(xlsx_err)?;
                }
            }
        }
        _ => {
            let strings = cast(array, &DataType::Utf8).map_err(|e| Error::Codec(e.to_string()))?;
            let values = downcast::<StringArray>(&strings)?;
            for (i, v) in values.iter().enumerate() {
                if let Some(v) = v {
                    sheet.write_string(i as u32 + 1, col, v).map_err(xlsx_err)?;
                }
            }
        }
    }
    Ok(())
}

/// Pick the narrowest column type that holds every non-empty cell:
/// integral numbers become Int64, other numbers Float64, booleans Boolean,
/// anything else Utf8.
fn infer_column(cells: &[&Data]) -> ArrayRef {
    let present = || cells.iter().filter(|c| !matches!(c, Data::Empty));

    let numeric = present().all(|c| matches!(c, Data::Int(_) | Data::Float(_)));
    let boolean = present().all(|c| matches!(c, Data::Bool(_)));
    let any = present().next().is_some();

    if any && numeric {
        let integral = present().all(|c| match c {
            Data::Int(_) => true,
            Data::Float(f) => f.fract() == 0.0 && f.abs() < 9.0e15,
            _ => false,
        });
        if integral {
            return Arc::new(Int64Array::from_iter(cells.iter().map(|c| match c {
                Data::Int(i) => Some(*i),
                Data::Float(f) => Some(*f as i64),
                _ => None,
            })));
        }
        return Arc::new(Float64Array::from_iter(cells.iter().map(|c| match c {
            Data::Int(i) => Some(*i as f64),
            Data::Float(f) => Some(*f),
            _ => None,
        })));
    }

    if any && boolean {
        return Arc::new(BooleanArray::from_iter(cells.iter().map(|c| match c {
            Data::Bool(b) => Some(*b),
            _ => None,
        })));
    }

    Arc::new(StringArray::from_iter(cells.iter().map(|c| match c {
        Data::Empty => None,
        other => Some(other.to_string()),
    })))
}

fn downcast<T: Array + 'static>(array: &ArrayRef) -> Result<&T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Codec(format!("unexpected column type {}", array.data_type())))
}

fn xlsx_err(e: rust_xlsxwriter::XlsxError) -> Error {
    Error::Codec(format!("spreadsheet: {e}"))
}
