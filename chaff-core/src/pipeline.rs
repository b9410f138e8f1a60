use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::fingerprint::{fingerprint_file, Digest, HashKey};
use crate::progress::Progress;
use crate::walk::TreeWalk;

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Fixed number of hashing workers; caps open files and in-flight hashes.
    pub workers: usize,
    /// Capacity of the path and record queues.
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 8, queue_depth: 10_000 }
    }
}

/// One fingerprinted file. Produced exactly once per regular file seen by a
/// scan; `rel_path` is slash-normalized relative to the scan root so records
/// stay comparable across roots and platforms.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub digest: Digest,
}

/// Unordered stream of scan records.
///
/// One producer thread walks the tree into a bounded path queue; `workers`
/// threads pull paths, fingerprint them, and push records into a bounded
/// output queue this iterator drains. The stream ends only once the walk is
/// exhausted and every worker has exited. Record order across workers is
/// arbitrary.
///
/// The first error (walk failure, unreadable file, path outside the root)
/// is yielded to the consumer and raises a stop flag so the producer and the
/// remaining workers drain out instead of running to completion.
pub struct RecordStream {
    rx: Receiver<Result<FileRecord>>,
    producer: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

/// Spawn the scan pipeline over `root`.
pub fn scan_records(
    root: &Path,
    key: HashKey,
    include: GlobSet,
    exclude: GlobSet,
    cfg: PipelineConfig,
    progress: &Progress,
) -> RecordStream {
    let (path_tx, path_rx) = bounded::<Result<PathBuf>>(cfg.queue_depth.max(1));
    let (rec_tx, rec_rx) = bounded::<Result<FileRecord>>(cfg.queue_depth.max(1));
    let stop = Arc::new(AtomicBool::new(false));

    let producer = {
        let root = root.to_path_buf();
        let stop = stop.clone();
        let progress = progress.clone();
        thread::spawn(move || {
            for entry in TreeWalk::new(&root, include, exclude) {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let failed = entry.is_err();
                if path_tx.send(entry).is_err() {
                    return;
                }
                if failed {
                    return;
                }
                progress.inc_found();
            }
            log::debug!("enumeration complete: {} files", progress.found());
        })
    };

    let mut workers = Vec::with_capacity(cfg.workers.max(1));
    for _ in 0..cfg.workers.max(1) {
        let rx = path_rx.clone();
        let tx = rec_tx.clone();
        let stop = stop.clone();
        let progress = progress.clone();
        let root = root.to_path_buf();
        workers.push(thread::spawn(move || {
            while let Ok(entry) = rx.recv() {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let record = entry.and_then(|path| to_record(&root, &key, &path));
                let failed = record.is_err();
                if failed {
                    stop.store(true, Ordering::Relaxed);
                }
                if tx.send(record).is_err() || failed {
                    return;
                }
                progress.inc_hashed();
            }
        }));
    }
    drop(path_rx);
    drop(rec_tx);

    RecordStream { rx: rec_rx, producer: Some(producer), workers, stop }
}

fn to_record(root: &Path, key: &HashKey, path: &Path) -> Result<FileRecord> {
    let rel = path.strip_prefix(root).with_context(|| {
        format!("path {} is not under scan root {}", path.display(), root.display())
    })?;
    let rel_path = rel.to_string_lossy().replace('\\', "/");
    let digest = fingerprint_file(key, path)?;
    Ok(FileRecord { abs_path: path.to_path_buf(), rel_path, digest })
}

impl Iterator for RecordStream {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.recv() {
            Ok(Ok(record)) => Some(Ok(record)),
            Ok(Err(e)) => {
                self.stop.store(true, Ordering::Relaxed);
                Some(Err(e))
            }
            // All senders gone: walk exhausted and every worker exited.
            Err(_) => {
                self.join_all();
                None
            }
        }
    }
}

impl RecordStream {
    fn join_all(&mut self) {
        if let Some(h) = self.producer.take() {
            let _ = h.join();
        }
        for h in self.workers.drain(..) {
            let _ = h.join();
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        // Dropping the receiver disconnects the output queue; raising the
        // flag lets blocked threads notice before their next send.
        self.stop.store(true, Ordering::Relaxed);
    }
}
