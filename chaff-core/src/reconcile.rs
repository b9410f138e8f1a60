use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::manifest::read_manifest;
use crate::pipeline::scan_records;
use crate::progress::Progress;
use crate::scan::ScanOptions;
use crate::walk::build_globset;

/// Outcome for one file of a reconcile pass. Decided by manifest lookup and
/// digest equality alone, never by path existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Relative path is recorded and the stored checksum matches.
    Duplicate,
    /// Path unknown, or known with a different checksum (content changed).
    Unrecorded,
}

pub fn classify(recorded: &HashMap<String, String>, rel_path: &str, checksum_hex: &str) -> Verdict {
    match recorded.get(rel_path) {
        Some(stored) if stored.as_str() == checksum_hex => Verdict::Duplicate,
        _ => Verdict::Unrecorded,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileReport {
    pub duplicates: u64,
    pub unrecorded: u64,
    pub deleted: u64,
}

/// Re-scan `root` and classify every file against the manifest at
/// `manifest_in`.
///
/// With `destructive` set, each `Duplicate` is deleted immediately on
/// classification; a deletion failure aborts the run and files already
/// removed stay removed. Without it nothing on disk is touched.
pub fn reconcile(
    root: &Path,
    manifest_in: &Path,
    destructive: bool,
    opts: &ScanOptions,
    progress: &Progress,
) -> Result<ReconcileReport> {
    let recorded = read_manifest(manifest_in)?;
    let (include, exclude) = build_globset(&opts.include, &opts.exclude)?;
    progress.set_stage("reconciling");
    let records = scan_records(root, opts.key, include, exclude, opts.pipeline(), progress);
    let mut report = ReconcileReport::default();
    for record in records {
        let record = record?;
        match classify(&recorded, &record.rel_path, record.digest.to_hex().as_str()) {
            Verdict::Duplicate => {
                report.duplicates += 1;
                if destructive {
                    fs::remove_file(&record.abs_path).with_context(|| {
                        format!("delete duplicate {}", record.abs_path.display())
                    })?;
                    report.deleted += 1;
                    log::debug!("deleted duplicate {}", record.abs_path.display());
                }
            }
            Verdict::Unrecorded => report.unrecorded += 1,
        }
    }
    log::info!(
        "reconcile of {} against {}: {} duplicate, {} unrecorded",
        root.display(),
        manifest_in.display(),
        report.duplicates,
        report.unrecorded
    );
    Ok(report)
}
