//! Parking Monitor
//!
//! This crate implements slot-occupancy monitoring for a fixed camera over a parking area.
//!
//! # Architecture
//!
//! An operator draws polygonal slots over the video. For every frame, vehicle detections
//! are reconciled against the slots: a slot is occupied when its centroid lies inside a
//! vehicle's bounding box. The engine keeps four rules:
//!
//! 1. **Centroid test**: occupancy is decided by one point per slot, not by area overlap.
//! 2. **First match wins**: each detection claims at most one free slot, in collection order.
//! 3. **Snapshot per frame**: classification runs on a copy of the slot collection.
//! 4. **Eager persistence**: every committed slot change is saved immediately.
//!
//! # Module Structure
//!
//! - `geometry`: points, polygons, centroid, containment
//! - `slots` / `storage` / `layout`: slot model, persistence, the active layout
//! - `detect` / `occupancy`: detector backends and the per-frame classifier
//! - `ingest` / `frame` / `monitor`: frame sources and the frame-processing loop
//! - `interaction`: operator clicks and commands
//! - `config`: file + env configuration

use anyhow::{anyhow, Result};
use std::sync::OnceLock;

pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod interaction;
pub mod layout;
pub mod monitor;
pub mod occupancy;
pub mod slots;
pub mod storage;

pub use config::MonitorConfig;
pub use detect::{
    BackendRegistry, Detection, DetectionResult, DetectorBackend, ObjectLabel, StubBackend,
    UnknownClassId,
};
pub use frame::Frame;
pub use geometry::{centroid, contains, GeometryError, Point, Polygon};
pub use ingest::{FileConfig, FileSource, FrameSource, FrameSourceFactory, MediaLibrary};
pub use interaction::{ClickOutcome, Command, MouseButton, Operator};
pub use layout::SlotLayout;
pub use monitor::{
    CancellationToken, ChannelSink, LogSink, LoopSettings, LoopStats, MonitorSession,
    OccupancySink, OccupancyUpdate,
};
pub use occupancy::{OccupancyClassifier, OccupancySnapshot, SlotStatus};
pub use slots::{Slot, SlotCollection};
pub use storage::{open_store, FileSlotStore, InMemorySlotStore, SlotStore, SqliteSlotStore};

/// A video-source identifier names a persisted layout file, so it is restricted
/// to a path-safe allowlist.
///
/// Allowed: "1", "lot_a", "north-gate"
/// Disallowed: empty, longer than 64 chars, anything with dots, slashes or whitespace.
pub fn validate_source_id(source_id: &str) -> Result<()> {
    static SOURCE_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = SOURCE_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex"));

    if !re.is_match(source_id) {
        return Err(anyhow!(
            "invalid source id '{}': must match ^[A-Za-z0-9_-]{{1,64}}$",
            source_id
        ));
    }
    Ok(())
}

/// Builds the detector registry described by configuration.
///
/// With a model path and the `backend-tract` feature, the ONNX backend is the
/// default; otherwise a stub backend that reports no detections is used.
pub fn build_detectors(cfg: &MonitorConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match &cfg.detector.model_path {
        #[cfg(feature = "backend-tract")]
        Some(path) => {
            let mut backend =
                detect::TractBackend::new(path, cfg.detector.input_size, cfg.detector.input_size)?;
            if let Some(threshold) = cfg.detector.confidence_threshold {
                backend = backend.with_threshold(threshold);
            }
            registry.register(backend);
        }
        #[cfg(not(feature = "backend-tract"))]
        Some(path) => {
            return Err(anyhow!(
                "model {} configured but the backend-tract feature is disabled",
                path.display()
            ));
        }
        None => {
            log::warn!("no detection model configured; using stub detector (no detections)");
        }
    }
    registry.register(StubBackend::new());
    registry.warm_up_all()?;
    Ok(registry)
}

/// Wires a session from configuration: store, layout, detectors, media and sink.
pub fn build_session(
    cfg: &MonitorConfig,
    sink: std::sync::Arc<std::sync::Mutex<dyn OccupancySink>>,
) -> Result<MonitorSession> {
    let store = open_store(&cfg.store)?;
    let layout = SlotLayout::open(store, &cfg.media.initial_source)?;
    let detectors = build_detectors(cfg)?;
    let media = MediaLibrary {
        root: cfg.media.root.clone(),
        target_fps: cfg.media.target_fps,
        width: cfg.media.width,
        height: cfg.media.height,
    };
    Ok(MonitorSession::new(
        layout,
        OccupancyClassifier::new(cfg.detector.vehicle_labels.clone()),
        detectors,
        std::sync::Arc::new(media),
        sink,
        LoopSettings {
            frame_interval: cfg.frame_interval(),
            health_log_interval: cfg.health_log_interval,
            ..LoopSettings::default()
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_are_path_safe() {
        for ok in ["1", "lot_a", "North-Gate", "a".repeat(64).as_str()] {
            assert!(validate_source_id(ok).is_ok(), "{}", ok);
        }
        for bad in ["", "..", "a/b", "a b", "x.mp4", "a".repeat(65).as_str()] {
            assert!(validate_source_id(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn stub_detectors_without_model() {
        let registry = build_detectors(&MonitorConfig::default()).unwrap();
        assert_eq!(registry.default_name(), Some("stub"));
    }
}
