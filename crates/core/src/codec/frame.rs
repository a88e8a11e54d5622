//! In-memory tabular frames
//!
//! A frame is an Arrow record batch tagged with the engine flavour it was
//! produced for. The engine decides frame-level conventions such as whether
//! a row index exists.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Flavour of tabular frame produced by `load`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabularEngine {
    /// Row-indexed frames; an index column may be written to CSV
    #[default]
    #[serde(alias = "pandas")]
    PandasLike,
    /// Index-free frames
    #[serde(alias = "polars")]
    PolarsLike,
}

impl TabularEngine {
    pub const fn as_str(self) -> &'static str {
        match self {
            TabularEngine::PandasLike => "pandas-like",
            TabularEngine::PolarsLike => "polars-like",
        }
    }

    /// Whether frames of this engine carry a row index
    pub const fn has_index(self) -> bool {
        matches!(self, TabularEngine::PandasLike)
    }
}

impl fmt::Display for TabularEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabularEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pandas" | "pandas-like" => Ok(TabularEngine::PandasLike),
            "polars" | "polars-like" => Ok(TabularEngine::PolarsLike),
            other => Err(Error::UnsupportedOutputType(other.to_string())),
        }
    }
}

/// Default serialization format for frames uploaded without an extension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    #[default]
    Parquet,
    Xlsx,
    Xls,
}

impl FileType {
    /// Extension including the leading dot
    pub const fn extension(self) -> &'static str {
        match self {
            FileType::Csv => ".csv",
            FileType::Parquet => ".parquet",
            FileType::Xlsx => ".xlsx",
            FileType::Xls => ".xls",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension()[1..])
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "parquet" => Ok(FileType::Parquet),
            "xlsx" => Ok(FileType::Xlsx),
            "xls" => Ok(FileType::Xls),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A row/column table
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    engine: TabularEngine,
    batch: RecordBatch,
}

impl Frame {
    pub fn new(engine: TabularEngine, batch: RecordBatch) -> Self {
        Self { engine, batch }
    }

    /// Build a frame from named columns of equal length
    pub fn from_columns<I, S>(engine: TabularEngine, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: AsRef<str>,
    {
        let batch = RecordBatch::try_from_iter(columns).map_err(|e| Error::Codec(e.to_string()))?;
        Ok(Self::new(engine, batch))
    }

    pub fn engine(&self) -> TabularEngine {
        self.engine
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Batch with a leading unnamed row-number column, as written by
    /// index-carrying engines
    pub(crate) fn batch_with_index(&self) -> Result<RecordBatch> {
        let rows = self.batch.num_rows() as i64;
        let index: ArrayRef = Arc::new(Int64Array::from_iter_values(0..rows));

        let mut fields = vec![Arc::new(Field::new("", DataType::Int64, false))];
        fields.extend(self.batch.schema().fields().iter().cloned());

        let mut columns = vec![index];
        columns.extend(self.batch.columns().iter().cloned());

        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .map_err(|e| Error::Codec(e.to_string()))
    }

    /// Number of null cells across all columns
    pub fn null_count(&self) -> usize {
        self.batch.columns().iter().map(|c| c.null_count()).sum()
    }

    /// First `n` rows as display strings; nulls render empty
    pub fn head_rows(&self, n: usize) -> Result<Vec<Vec<String>>> {
        (0..n.min(self.num_rows()))
            .map(|row| {
                self.batch
                    .columns()
                    .iter()
                    .map(|col| {
                        if col.is_null(row) {
                            Ok(String::new())
                        } else {
                            array_value_to_string(col, row).map_err(|e| Error::Codec(e.to_string()))
                        }
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}
