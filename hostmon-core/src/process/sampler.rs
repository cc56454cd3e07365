use super::query::{compare_records, ProcessQuery};
use super::record::{ProcessField, ProcessRecord, ProjectedRecord};
use super::snapshot::ProcessTableSnapshot;
use super::source::{ProcessSource, SysinfoProcessSource};
use crate::error::{SamplerError, SourceResult};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest refresh period the loop accepts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    /// Full enumerations run and discarded by `start()` before the first
    /// published snapshot.
    pub cold_start_passes: usize,
    /// Pause between cold start passes so CPU percentages cover a real interval.
    pub warmup: Duration,
    pub fields: Vec<ProcessField>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            cold_start_passes: 2,
            warmup: sysinfo::MINIMUM_CPU_UPDATE_INTERVAL,
            fields: ProcessField::default_set(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Stopped,
    Running,
}

struct Shared {
    source: Mutex<Box<dyn ProcessSource>>,
    published: Mutex<Arc<ProcessTableSnapshot>>,
    fields: Vec<ProcessField>,
}

impl Shared {
    fn enumerate(&self) -> SourceResult<Vec<ProcessRecord>> {
        self.source.lock().enumerate(&self.fields)
    }

    /// Enumerate outside the snapshot lock, then swap the new snapshot in.
    fn refresh(&self) -> SourceResult<u64> {
        let started = Instant::now();
        let records = self.enumerate()?;
        let count = records.len();
        let taken_at = Utc::now();

        let generation = {
            let mut published = self.published.lock();
            let generation = published.generation() + 1;
            *published = Arc::new(ProcessTableSnapshot::new(generation, taken_at, records));
            generation
        };

        debug!(
            generation,
            processes = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "published process snapshot"
        );
        Ok(generation)
    }
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Background process table sampler.
///
/// `start()` warms the source up, publishes a first snapshot and hands the
/// refresh loop to a dedicated thread. Readers on any thread get the latest
/// complete snapshot through [`ProcessSampler::snapshot`] without waiting
/// for a refresh in progress.
pub struct ProcessSampler {
    shared: Arc<Shared>,
    config: SamplerConfig,
    /// Serializes `start()` and `stop()`.
    lifecycle: Mutex<()>,
    /// Set for the length of a cold start.
    starting: AtomicBool,
    worker: Mutex<Option<Worker>>,
}

impl ProcessSampler {
    pub fn new<S: ProcessSource + 'static>(source: S, config: SamplerConfig) -> Self {
        let shared = Arc::new(Shared {
            source: Mutex::new(Box::new(source)),
            published: Mutex::new(Arc::new(ProcessTableSnapshot::default())),
            fields: config.fields.clone(),
        });
        Self {
            shared,
            config,
            lifecycle: Mutex::new(()),
            starting: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Sampler over the live process table with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SysinfoProcessSource::new(), SamplerConfig::default())
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn state(&self) -> SamplerState {
        if self.starting.load(Ordering::SeqCst) || self.worker.lock().is_some() {
            SamplerState::Running
        } else {
            SamplerState::Stopped
        }
    }

    /// Start sampling. Calling it on a running sampler does nothing.
    ///
    /// Blocks for the cold start and the first refresh.
    pub fn start(&self) -> Result<(), SamplerError> {
        let _lifecycle = self.lifecycle.lock();
        if self.worker.lock().is_some() {
            return Ok(());
        }

        self.starting.store(true, Ordering::SeqCst);
        // The worker is installed before the flag drops, so state() never flickers
        let result = self.launch().map(|worker| {
            *self.worker.lock() = Some(worker);
        });
        self.starting.store(false, Ordering::SeqCst);
        result
    }

    /// Cold start, first refresh and the worker thread. Runs without the
    /// worker lock so `state()` and readers stay responsive.
    fn launch(&self) -> Result<Worker, SamplerError> {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            fields = self.shared.fields.len(),
            "starting process sampler"
        );

        // CPU usage is a delta between two enumerations; discard the first ones
        for _ in 0..self.config.cold_start_passes {
            self.shared.enumerate().map_err(SamplerError::ColdStart)?;
            if !self.config.warmup.is_zero() {
                thread::sleep(self.config.warmup);
            }
        }
        self.shared.refresh().map_err(SamplerError::ColdStart)?;
        info!(passes = self.config.cold_start_passes, "cold start finished");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(SamplerError::Runtime)?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let period = self.config.interval.max(MIN_INTERVAL);

        let handle = thread::Builder::new()
            .name("process-sampler".to_string())
            .spawn(move || runtime.block_on(refresh_loop(shared, period, shutdown_rx)))
            .map_err(SamplerError::Spawn)?;

        Ok(Worker { shutdown, handle })
    }

    /// Stop sampling and wait for the refresh loop to exit.
    ///
    /// Calling it on a stopped sampler does nothing. Once it returns the
    /// published snapshot no longer changes.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        // The loop may already be gone; a closed channel is fine
        let _ = worker.shutdown.send(());
        if worker.handle.join().is_err() {
            warn!("process sampler thread panicked");
        }
        info!("process sampler stopped");
    }

    /// Shared handle to the latest complete snapshot.
    pub fn snapshot(&self) -> Arc<ProcessTableSnapshot> {
        Arc::clone(&self.shared.published.lock())
    }

    /// Copy of the latest process list.
    pub fn processes(&self) -> Vec<ProcessRecord> {
        self.snapshot().records().to_vec()
    }

    pub fn query(&self, query: &ProcessQuery) -> Vec<ProjectedRecord> {
        self.snapshot().query(query)
    }

    pub fn sort_processes(&self, by: ProcessField, descending: bool) -> Vec<ProcessRecord> {
        let mut records = self.processes();
        records.sort_by(|a, b| compare_records(a, b, by, descending));
        records
    }

    pub fn filter_by_user(&self, username: &str) -> Vec<ProcessRecord> {
        self.snapshot()
            .records()
            .iter()
            .filter(|r| r.username() == Some(username))
            .cloned()
            .collect()
    }
}

impl Drop for ProcessSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh_loop(shared: Arc<Shared>, period: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Err means the sampler was dropped without a send; exit either way
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = shared.refresh() {
                    warn!(error = %e, "process enumeration failed, keeping previous snapshot");
                }
            }
        }
    }
    debug!("process refresh loop exited");
}
