//! CSV codec backed by `arrow::csv`

use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;

use super::frame::{Frame, TabularEngine};
use super::{CodecOptions, FormatCodec};
use crate::error::{Error, Result};

/// Rows sampled for schema inference
const INFER_MAX_RECORDS: usize = 1000;

/// Comma (or configured separator) delimited text with a header row
#[derive(Debug, Default)]
pub struct CsvCodec;

impl FormatCodec for CsvCodec {
    fn content_type(&self) -> &'static str {
        "text/csv"
    }

    fn encode(&self, frame: &Frame, options: &CodecOptions) -> Result<Vec<u8>> {
        let batch = if options.include_index && frame.engine().has_index() {
            frame.batch_with_index()?
        } else {
            frame.batch().clone()
        };

        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(options.csv_separator)
            .build(Vec::new());
        writer.write(&batch).map_err(codec_err)?;
        let utf8 = writer.into_inner();

        if options.encoding == super::TextEncoding::Utf8 {
            return Ok(utf8);
        }
        let text = String::from_utf8(utf8).map_err(|e| Error::Codec(e.to_string()))?;
        options.encoding.encode(&text)
    }

    fn decode(&self, raw: &[u8], engine: TabularEngine, options: &CodecOptions) -> Result<Frame> {
        let text = options.encoding.decode(raw)?;
        let format = Format::default()
            .with_header(true)
            .with_delimiter(options.csv_separator);

        let (schema, _) = format
            .infer_schema(Cursor::new(text.as_bytes()), Some(INFER_MAX_RECORDS))
            .map_err(codec_err)?;
        let schema = Arc::new(schema);

        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .build(Cursor::new(text.as_bytes()))
            .map_err(codec_err)?;

        let batches = reader
            .collect::<std::result::Result<Vec<RecordBatch>, _>>()
            .map_err(codec_err)?;
        let batch = concat_batches(&schema, &batches).map_err(codec_err)?;

        Ok(Frame::new(engine, batch))
    }
}

fn codec_err(e: arrow::error::ArrowError) -> Error {
    Error::Codec(format!("csv: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TextEncoding;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};

    fn frame(engine: TabularEngine) -> Frame {
        Frame::from_columns(
            engine,
            [
                ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
                ("price", Arc::new(Float64Array::from(vec![1.5, 2.25, -3.75])) as ArrayRef),
                ("city", Arc::new(StringArray::from(vec!["Paris", "Zürich", "Oslo"])) as ArrayRef),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_keeps_shape_and_values() {
        let options = CodecOptions::default();
        let input = frame(TabularEngine::PolarsLike);
        let bytes = CsvCodec.encode(&input, &options).unwrap();
        let output = CsvCodec.decode(&bytes, TabularEngine::PolarsLike, &options).unwrap();

        assert_eq!(output.shape(), input.shape());
        assert_eq!(output.column_names(), input.column_names());
        for name in input.column_names() {
            assert_eq!(output.column(&name), input.column(&name), "column {name}");
        }
    }

    #[test]
    fn test_separator_is_applied() {
        let options = CodecOptions {
            csv_separator: b';',
            ..Default::default()
        };
        let bytes = CsvCodec.encode(&frame(TabularEngine::PolarsLike), &options).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("id;price;city\n"));

        let output = CsvCodec.decode(&bytes, TabularEngine::PandasLike, &options).unwrap();
        assert_eq!(output.shape(), (3, 3));
        assert_eq!(output.engine(), TabularEngine::PandasLike);
    }

    #[test]
    fn test_index_only_for_index_engines() {
        let options = CodecOptions {
            include_index: true,
            ..Default::default()
        };

        let bytes = CsvCodec.encode(&frame(TabularEngine::PandasLike), &options).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(",id,price,city\n0,1,"));

        let bytes = CsvCodec.encode(&frame(TabularEngine::PolarsLike), &options).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("id,price,city\n1,"));
    }

    #[test]
    fn test_no_index_by_default() {
        let bytes = CsvCodec
            .encode(&frame(TabularEngine::PandasLike), &CodecOptions::default())
            .unwrap();
        assert!(String::from_utf8(bytes).unwrap().starts_with("id,"));
    }

    #[test]
    fn test_latin1_encoding() {
        let options = CodecOptions {
            encoding: TextEncoding::Latin1,
            ..Default::default()
        };
        let bytes = CsvCodec.encode(&frame(TabularEngine::PolarsLike), &options).unwrap();
        assert!(bytes.contains(&0xFC));
        let output = CsvCodec.decode(&bytes, TabularEngine::PolarsLike, &options).unwrap();
        assert_eq!(output.column("city"), frame(TabularEngine::PolarsLike).column("city"));
    }
}
