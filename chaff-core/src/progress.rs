use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

/// Shared run counters. `files_found` tracks enumeration, `files_hashed`
/// tracks records leaving the worker pool; both are read after the run for
/// the final report and, optionally, by a periodic stderr reporter.
#[derive(Clone)]
pub struct Progress {
    enabled: bool,
    stage: Arc<Mutex<String>>,
    files_found: Arc<AtomicUsize>,
    files_hashed: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stage: Arc::new(Mutex::new(String::new())),
            files_found: Arc::new(AtomicUsize::new(0)),
            files_hashed: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_stage(&self, s: &str) {
        if self.enabled {
            if let Ok(mut stage) = self.stage.lock() {
                *stage = s.to_string();
            }
        }
    }

    pub fn inc_found(&self) {
        self.files_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hashed(&self) {
        self.files_hashed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn found(&self) -> usize {
        self.files_found.load(Ordering::Relaxed)
    }

    pub fn hashed(&self) -> usize {
        self.files_hashed.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        self.running.store(true, Ordering::Relaxed);
        let stage = self.stage.clone();
        let found = self.files_found.clone();
        let hashed = self.files_hashed.clone();
        let running = self.running.clone();
        thread::spawn(move || {
            let t0 = Instant::now();
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(5));
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let s = stage.lock().map(|s| s.clone()).unwrap_or_default();
                eprintln!(
                    "[{:>4}s] {} | found {} | hashed {}",
                    t0.elapsed().as_secs(),
                    s,
                    found.load(Ordering::Relaxed),
                    hashed.load(Ordering::Relaxed)
                );
            }
        });
    }

    pub fn stop(&self) {
        if self.enabled {
            self.running.store(false, Ordering::Relaxed);
        }
    }
}
