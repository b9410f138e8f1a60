use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{ArrayRef, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rows buffered in memory before each flush. Tunable; affects peak memory,
/// never the recorded contents.
pub const DEFAULT_BATCH_ROWS: usize = 1000;

fn manifest_schema() -> Schema {
    Schema::new(vec![
        Field::new("path", DataType::Utf8, false),
        Field::new("checksum", DataType::Utf8, false),
    ])
}

/// Temp name a manifest is staged under until it is published.
pub(crate) fn staging_path(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .ok_or_else(|| anyhow!("manifest destination {} has no file name", dest.display()))?;
    Ok(dest.with_file_name(format!(".{}.tmp", name.to_string_lossy())))
}

/// Streaming manifest writer: two Utf8 columns `path`, `checksum`, SNAPPY
/// compressed, rows in whatever order they arrive.
///
/// Rows are staged into fixed-size record batches. The file is written to a
/// dot-prefixed temp name next to the destination and renamed over it only
/// after a clean close, so a crashed or failed scan never leaves a
/// valid-looking manifest behind.
pub struct ManifestWriter {
    writer: Option<ArrowWriter<File>>,
    schema: Arc<Schema>,
    paths: Vec<String>,
    checksums: Vec<String>,
    batch_rows: usize,
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    rows_written: u64,
}

impl ManifestWriter {
    pub fn create(dest: &Path) -> Result<Self> {
        Self::with_batch_rows(dest, DEFAULT_BATCH_ROWS)
    }

    pub fn with_batch_rows(dest: &Path, batch_rows: usize) -> Result<Self> {
        let temp_path = staging_path(dest)?;
        let file = File::create(&temp_path)
            .with_context(|| format!("create manifest temp {}", temp_path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_key_value_metadata(Some(vec![KeyValue::new(
                "created_utc".to_string(),
                Some(chrono::Utc::now().to_rfc3339()),
            )]))
            .build();
        let schema = Arc::new(manifest_schema());
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .context("create parquet writer")?;
        Ok(Self {
            writer: Some(writer),
            schema,
            paths: Vec::with_capacity(batch_rows.max(1)),
            checksums: Vec::with_capacity(batch_rows.max(1)),
            batch_rows: batch_rows.max(1),
            temp_path: Some(temp_path),
            final_path: dest.to_path_buf(),
            rows_written: 0,
        })
    }

    pub fn append(&mut self, rel_path: &str, checksum_hex: &str) -> Result<()> {
        self.paths.push(rel_path.to_string());
        self.checksums.push(checksum_hex.to_string());
        if self.paths.len() >= self.batch_rows {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.paths.is_empty() {
            return Ok(());
        }
        let paths = StringArray::from(std::mem::take(&mut self.paths));
        let checksums = StringArray::from(std::mem::take(&mut self.checksums));
        let batch = RecordBatch::try_new(
            self.schema.clone(),
            vec![Arc::new(paths) as ArrayRef, Arc::new(checksums) as ArrayRef],
        )
        .context("build manifest batch")?;
        let writer =
            self.writer.as_mut().ok_or_else(|| anyhow!("manifest writer already finished"))?;
        writer.write(&batch).context("write manifest batch")?;
        self.rows_written += batch.num_rows() as u64;
        Ok(())
    }

    /// Flush, close, and publish the manifest. Returns the row count.
    pub fn finish(mut self) -> Result<u64> {
        self.flush_batch()?;
        let writer =
            self.writer.take().ok_or_else(|| anyhow!("manifest writer already finished"))?;
        writer.close().context("close parquet writer")?;
        let temp = self.temp_path.take().ok_or_else(|| anyhow!("manifest temp path missing"))?;
        fs::rename(&temp, &self.final_path).with_context(|| {
            format!("publish manifest {} -> {}", temp.display(), self.final_path.display())
        })?;
        Ok(self.rows_written)
    }
}

impl Drop for ManifestWriter {
    fn drop(&mut self) {
        // An unpublished temp file is an aborted scan; remove it.
        if let Some(temp) = self.temp_path.take() {
            drop(self.writer.take());
            if temp.exists() {
                let _ = fs::remove_file(&temp);
                log::warn!("removed unfinished manifest temp {}", temp.display());
            }
        }
    }
}

/// Load a manifest fully into memory: relative path -> checksum, both exactly
/// as written. Missing file, truncation, or a schema other than the two Utf8
/// columns is fatal.
pub fn read_manifest(path: &Path) -> Result<HashMap<String, String>> {
    let file =
        File::open(path).with_context(|| format!("open manifest {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("read manifest {}", path.display()))?;
    let schema = builder.schema().clone();
    let expected = manifest_schema();
    if schema.fields() != expected.fields() {
        bail!(
            "manifest {} has unexpected schema: got {:?}, want (path: Utf8, checksum: Utf8)",
            path.display(),
            schema
        );
    }
    let reader = builder.build().with_context(|| format!("read manifest {}", path.display()))?;
    let mut map = HashMap::new();
    for batch in reader {
        let batch =
            batch.with_context(|| format!("read manifest batch from {}", path.display()))?;
        let paths = column_as_string(&batch, 0, path)?;
        let checksums = column_as_string(&batch, 1, path)?;
        for i in 0..batch.num_rows() {
            map.insert(paths.value(i).to_string(), checksums.value(i).to_string());
        }
    }
    Ok(map)
}

fn column_as_string<'a>(
    batch: &'a RecordBatch,
    idx: usize,
    path: &Path,
) -> Result<&'a StringArray> {
    batch.column(idx).as_any().downcast_ref::<StringArray>().ok_or_else(|| {
        anyhow!("manifest {} column {} is not a string column", path.display(), idx)
    })
}
