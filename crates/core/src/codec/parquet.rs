//! Parquet codec backed by the `parquet` crate's Arrow integration

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::frame::{Frame, TabularEngine};
use super::{CodecOptions, FormatCodec};
use crate::error::{Error, Result};

/// Columnar binary serialization; never writes a row index
#[derive(Debug, Default)]
pub struct ParquetCodec;

impl FormatCodec for ParquetCodec {
    fn content_type(&self) -> &'static str {
        "application/octet-stream"
    }

    fn encode(&self, frame: &Frame, _options: &CodecOptions) -> Result<Vec<u8>> {
        let batch = frame.batch();
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut buffer = Vec::new();
        {
            let mut writer =
                ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props)).map_err(codec_err)?;
            writer.write(batch).map_err(codec_err)?;
            writer.close().map_err(codec_err)?;
        }

        tracing::debug!(
            rows = batch.num_rows(),
            size_bytes = buffer.len(),
            "Parquet serialization completed"
        );
        Ok(buffer)
    }

    fn decode(&self, raw: &[u8], engine: TabularEngine, _options: &CodecOptions) -> Result<Frame> {
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(raw)).map_err(codec_err)?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(codec_err)?;

        let batches = reader
            .collect::<std::result::Result<Vec<RecordBatch>, _>>()
            .map_err(|e| Error::Codec(format!("parquet: {e}")))?;
        let batch =
            concat_batches(&schema, &batches).map_err(|e| Error::Codec(format!("parquet: {e}")))?;

        Ok(Frame::new(engine, batch))
    }
}

fn codec_err(e: parquet::errors::ParquetError) -> Error {
    Error::Codec(format!("parquet: {e}"))
}
