//! Frame-processing loop and the session that owns it.
//!
//! `MonitorSession` owns everything the loop and the operator share: the active
//! slot layout, the classifier, the detector registry, the frame-source factory and
//! the output sink. At most one worker thread runs at a time.
//!
//! Per frame the worker:
//! 1. Checks its cancellation token (the only stop point; frames are never interrupted)
//! 2. Pulls the next frame (the source rewinds at end of stream)
//! 3. Runs detection
//! 4. Copies the live slot collection and classifies against the copy
//! 5. Publishes the snapshot
//!
//! The frame source is owned by a guard that closes it on every exit path.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::detect::BackendRegistry;
use crate::frame::Frame;
use crate::ingest::{FrameSource, FrameSourceFactory};
use crate::layout::SlotLayout;
use crate::occupancy::{OccupancyClassifier, OccupancySnapshot};

/// Cooperative stop flag shared between a session and its worker.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives one occupancy snapshot per processed frame.
pub trait OccupancySink: Send {
    fn publish(&mut self, source_id: &str, frame: &Frame, snapshot: &OccupancySnapshot);
}

/// Logs counts at debug level.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl OccupancySink for LogSink {
    fn publish(&mut self, source_id: &str, frame: &Frame, snapshot: &OccupancySnapshot) {
        log::debug!(
            "source={} frame={} total={} free={}",
            source_id,
            frame.sequence,
            snapshot.total,
            snapshot.free
        );
    }
}

/// A published snapshot, tagged with the source it was computed for.
#[derive(Clone, Debug)]
pub struct OccupancyUpdate {
    pub source_id: String,
    pub frame_sequence: u64,
    pub snapshot: OccupancySnapshot,
}

/// Forwards snapshots over a channel. A dropped receiver is ignored.
pub struct ChannelSink {
    tx: Sender<OccupancyUpdate>,
}

impl ChannelSink {
    pub fn new(tx: Sender<OccupancyUpdate>) -> Self {
        Self { tx }
    }
}

impl OccupancySink for ChannelSink {
    fn publish(&mut self, source_id: &str, frame: &Frame, snapshot: &OccupancySnapshot) {
        let _ = self.tx.send(OccupancyUpdate {
            source_id: source_id.to_string(),
            frame_sequence: frame.sequence,
            snapshot: snapshot.clone(),
        });
    }
}

/// Pacing and bookkeeping for the frame loop.
#[derive(Clone, Debug)]
pub struct LoopSettings {
    /// Minimum time between frames; zero disables pacing.
    pub frame_interval: Duration,
    pub health_log_interval: Duration,
    /// Back-off after a failed read or detection.
    pub error_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(100),
            health_log_interval: Duration::from_secs(5),
            error_backoff: Duration::from_millis(200),
        }
    }
}

/// Counters reported by a worker when it stops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub last_total: usize,
    pub last_free: usize,
}

struct Worker {
    token: CancellationToken,
    source_id: String,
    handle: JoinHandle<Result<LoopStats>>,
}

/// Shared state handed to the worker thread.
#[derive(Clone)]
struct LoopContext {
    layout: Arc<Mutex<SlotLayout>>,
    classifier: Arc<OccupancyClassifier>,
    detectors: Arc<BackendRegistry>,
    sink: Arc<Mutex<dyn OccupancySink>>,
    settings: LoopSettings,
}

/// Session context: replaces process-wide mutable state with one owned object.
pub struct MonitorSession {
    ctx: LoopContext,
    sources: Arc<dyn FrameSourceFactory>,
    worker: Option<Worker>,
    last_stats: Option<LoopStats>,
}

impl MonitorSession {
    pub fn new(
        layout: SlotLayout,
        classifier: OccupancyClassifier,
        detectors: BackendRegistry,
        sources: Arc<dyn FrameSourceFactory>,
        sink: Arc<Mutex<dyn OccupancySink>>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            ctx: LoopContext {
                layout: Arc::new(Mutex::new(layout)),
                classifier: Arc::new(classifier),
                detectors: Arc::new(detectors),
                sink,
                settings,
            },
            sources,
            worker: None,
            last_stats: None,
        }
    }

    /// Locks the live layout for reading or mutation.
    pub fn layout(&self) -> Result<MutexGuard<'_, SlotLayout>> {
        self.ctx
            .layout
            .lock()
            .map_err(|_| anyhow!("slot layout lock poisoned"))
    }

    pub fn source_id(&self) -> Result<String> {
        Ok(self.layout()?.source_id().to_string())
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Counters of the most recently stopped worker.
    pub fn last_stats(&self) -> Option<&LoopStats> {
        self.last_stats.as_ref()
    }

    /// Opens the frame source for the active layout and starts the worker.
    ///
    /// Fails without starting anything when the source cannot be opened.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(anyhow!("frame loop already running"));
        }
        let source_id = self.source_id()?;
        let source = self
            .sources
            .open(&source_id)
            .with_context(|| format!("failed to open video source {}", source_id))?;

        let token = CancellationToken::new();
        let ctx = self.ctx.clone();
        let worker_token = token.clone();
        let worker_source = source_id.clone();
        let handle = std::thread::Builder::new()
            .name(format!("frame-loop-{}", source_id))
            .spawn(move || run_frame_loop(ctx, source, &worker_source, worker_token))
            .context("spawn frame loop thread")?;

        log::info!("frame loop started for source {}", source_id);
        self.worker = Some(Worker {
            token,
            source_id,
            handle,
        });
        Ok(())
    }

    /// Signals the worker and blocks until it has released its frame source.
    ///
    /// Returns the worker's counters, or `None` when nothing was running.
    pub fn stop(&mut self) -> Result<Option<LoopStats>> {
        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        worker.token.cancel();
        let stats = worker
            .handle
            .join()
            .map_err(|_| anyhow!("frame loop for {} panicked", worker.source_id))??;
        log::info!(
            "frame loop stopped for source {} after {} frame(s)",
            worker.source_id,
            stats.frames_processed
        );
        self.last_stats = Some(stats.clone());
        Ok(Some(stats))
    }

    /// Stop the loop, activate `source_id` and its layout, start a new loop.
    ///
    /// The new layout is loaded before anything stops: an invalid id or unreadable
    /// layout leaves the current loop running. If the new source cannot be opened
    /// the error is returned and no loop runs; there is no fallback to the
    /// previous source.
    pub fn change_source(&mut self, source_id: &str) -> Result<()> {
        let slots = self.layout()?.load(source_id)?;
        self.stop()?;
        self.layout()?.activate(source_id, slots);
        self.start()
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("frame loop shutdown failed: {}", e);
        }
    }
}

/// Owns the frame source for the worker's lifetime and closes it on drop.
struct SourceGuard {
    source: Box<dyn FrameSource>,
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.source.close();
    }
}

fn run_frame_loop(
    ctx: LoopContext,
    source: Box<dyn FrameSource>,
    source_id: &str,
    token: CancellationToken,
) -> Result<LoopStats> {
    let mut guard = SourceGuard { source };
    let mut stats = LoopStats::default();
    let mut last_health_log = Instant::now();

    while !token.is_cancelled() {
        let started = Instant::now();

        let frame = match guard.source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame read failed on {}: {}", source_id, e);
                stats.frames_skipped += 1;
                std::thread::sleep(ctx.settings.error_backoff);
                continue;
            }
        };

        let detections = match ctx.detectors.detect(&frame) {
            Ok(result) => result.detections,
            Err(e) => {
                log::error!("detection failed on {} frame {}: {}", source_id, frame.sequence, e);
                stats.frames_skipped += 1;
                std::thread::sleep(ctx.settings.error_backoff);
                continue;
            }
        };

        let slots = ctx
            .layout
            .lock()
            .map_err(|_| anyhow!("slot layout lock poisoned"))?
            .snapshot();
        let snapshot = ctx.classifier.classify(&slots, &detections);

        ctx.sink
            .lock()
            .map_err(|_| anyhow!("occupancy sink lock poisoned"))?
            .publish(source_id, &frame, &snapshot);

        stats.frames_processed += 1;
        stats.last_total = snapshot.total;
        stats.last_free = snapshot.free;

        if last_health_log.elapsed() >= ctx.settings.health_log_interval {
            let source_stats = guard.source.stats();
            log::info!(
                "source={} health={} frames={} loops={} total={} free={}",
                source_id,
                guard.source.is_healthy(),
                source_stats.frames_captured,
                source_stats.loops,
                snapshot.total,
                snapshot.free
            );
            last_health_log = Instant::now();
        }

        let elapsed = started.elapsed();
        if elapsed < ctx.settings.frame_interval {
            std::thread::sleep(ctx.settings.frame_interval - elapsed);
        }
    }

    Ok(stats)
}
