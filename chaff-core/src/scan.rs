use anyhow::Result;
use std::path::Path;

use crate::fingerprint::HashKey;
use crate::manifest::{ManifestWriter, DEFAULT_BATCH_ROWS};
use crate::pipeline::{scan_records, PipelineConfig};
use crate::progress::Progress;
use crate::walk::build_globset;

/// Options shared by scan and reconcile runs.
#[derive(Clone)]
pub struct ScanOptions {
    pub key: HashKey,
    pub workers: usize,
    pub queue_depth: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub batch_rows: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            key: HashKey::default(),
            workers: pipeline.workers,
            queue_depth: pipeline.queue_depth,
            include: Vec::new(),
            exclude: Vec::new(),
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

impl ScanOptions {
    pub(crate) fn pipeline(&self) -> PipelineConfig {
        PipelineConfig { workers: self.workers, queue_depth: self.queue_depth }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScanReport {
    /// Rows persisted; equals the number of regular files enumerated.
    pub files: u64,
}

/// Walk `root`, fingerprint every regular file, and publish the manifest at
/// `manifest_out`. Any walk, hash, or write failure aborts the whole scan
/// and leaves no manifest behind.
pub fn scan(
    root: &Path,
    manifest_out: &Path,
    opts: &ScanOptions,
    progress: &Progress,
) -> Result<ScanReport> {
    // A manifest written into the scanned root must not record itself.
    let mut excludes = opts.exclude.clone();
    for target in [manifest_out.to_path_buf(), crate::manifest::staging_path(manifest_out)?] {
        if let Ok(rel) = target.strip_prefix(root) {
            excludes.push(globset::escape(&rel.to_string_lossy().replace('\\', "/")));
        }
    }
    let (include, exclude) = build_globset(&opts.include, &excludes)?;
    progress.set_stage("scanning");
    let mut writer = ManifestWriter::with_batch_rows(manifest_out, opts.batch_rows)?;
    let records = scan_records(root, opts.key, include, exclude, opts.pipeline(), progress);
    for record in records {
        let record = record?;
        writer.append(&record.rel_path, record.digest.to_hex().as_str())?;
    }
    let files = writer.finish()?;
    log::info!("scan of {} wrote {} rows to {}", root.display(), files, manifest_out.display());
    Ok(ScanReport { files })
}
