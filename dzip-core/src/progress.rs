use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

struct Counters {
    stage: Mutex<String>,
    files_done: AtomicU64,
    files_total: AtomicU64,
    bytes_done: AtomicU64,
    bytes_total: AtomicU64,
    running: AtomicBool,
}

/// Wall-clock progress reporter: a background thread prints one stderr
/// line every 5 seconds while an operation runs. A disabled reporter is
/// a no-op.
#[derive(Clone)]
pub struct Progress {
    enabled: bool,
    counters: Arc<Counters>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            counters: Arc::new(Counters {
                stage: Mutex::new(String::new()),
                files_done: AtomicU64::new(0),
                files_total: AtomicU64::new(0),
                bytes_done: AtomicU64::new(0),
                bytes_total: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_stage(&self, s: &str) {
        if self.enabled {
            *self.counters.stage.lock().unwrap() = s.to_string();
        }
    }

    pub fn set_files_total(&self, n: u64) {
        self.counters.files_total.store(n, Ordering::Relaxed);
    }

    pub fn inc_file(&self) {
        self.counters.files_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_bytes_total(&self, n: u64) {
        self.counters.bytes_total.store(n, Ordering::Relaxed);
        self.counters.bytes_done.store(0, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, n: u64) {
        self.counters.bytes_done.fetch_add(n, Ordering::Relaxed);
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        let c = self.counters.clone();
        c.running.store(true, Ordering::Relaxed);
        thread::spawn(move || {
            let t0 = Instant::now();
            while c.running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(5));
                if !c.running.load(Ordering::Relaxed) {
                    break;
                }
                let secs = t0.elapsed().as_secs().max(1);
                let done = c.bytes_done.load(Ordering::Relaxed);
                eprintln!(
                    "[{:>4}s] {} | files {}/{} | {:.1} MiB/s",
                    secs,
                    c.stage.lock().unwrap(),
                    c.files_done.load(Ordering::Relaxed),
                    c.files_total.load(Ordering::Relaxed),
                    done as f64 / (1024.0 * 1024.0) / secs as f64,
                );
            }
        });
    }

    pub fn stop(&self) {
        if self.enabled {
            self.counters.running.store(false, Ordering::Relaxed);
        }
    }
}
