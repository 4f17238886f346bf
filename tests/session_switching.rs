use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use parking_monitor::ingest::FileStats;
use parking_monitor::{
    BackendRegistry, ChannelSink, ClickOutcome, Detection, FileSlotStore, Frame, FrameSource,
    FrameSourceFactory, InMemorySlotStore, LoopSettings, MediaLibrary, MonitorSession,
    MouseButton, ObjectLabel, OccupancyClassifier, OccupancyUpdate, Operator, Point, Slot,
    SlotCollection, SlotLayout, SlotStore, StubBackend,
};

struct CountingSource {
    source_id: String,
    sequence: u64,
    closed: Arc<AtomicUsize>,
}

impl FrameSource for CountingSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.sequence += 1;
        Ok(Frame::blank(16, 16, self.sequence))
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.sequence,
            loops: 0,
            path: self.source_id.clone(),
        }
    }
}

fn square(x: i32, y: i32, side: i32) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + side, y),
        Point::new(x + side, y + side),
        Point::new(x, y + side),
    ]
}

fn seeded_store() -> InMemorySlotStore {
    let mut store = InMemorySlotStore::new();
    let one: SlotCollection = [Slot::new(square(0, 0, 10)).unwrap()].into_iter().collect();
    let two: SlotCollection = [
        Slot::new(square(0, 0, 10)).unwrap(),
        Slot::new(square(100, 0, 10)).unwrap(),
    ]
    .into_iter()
    .collect();
    store.save(&one, "1").unwrap();
    store.save(&two, "2").unwrap();
    store
}

fn fast_loop() -> LoopSettings {
    LoopSettings {
        frame_interval: Duration::from_millis(1),
        health_log_interval: Duration::from_secs(60),
        error_backoff: Duration::from_millis(1),
    }
}

fn detectors() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::fixed(vec![Detection::new(
        0.0,
        0.0,
        20.0,
        20.0,
        0.9,
        ObjectLabel::Car.class_id(),
    )]));
    registry
}

fn session_with(
    factory: Arc<dyn FrameSourceFactory>,
) -> (MonitorSession, Receiver<OccupancyUpdate>) {
    session_on(Box::new(seeded_store()), factory)
}

fn session_on(
    store: Box<dyn SlotStore>,
    factory: Arc<dyn FrameSourceFactory>,
) -> (MonitorSession, Receiver<OccupancyUpdate>) {
    let (tx, rx) = mpsc::channel();
    let layout = SlotLayout::open(store, "1").unwrap();
    let session = MonitorSession::new(
        layout,
        OccupancyClassifier::default(),
        detectors(),
        factory,
        Arc::new(Mutex::new(ChannelSink::new(tx))),
        fast_loop(),
    );
    (session, rx)
}

fn counting_factory(closed: Arc<AtomicUsize>, fail_on: &'static str) -> Arc<dyn FrameSourceFactory> {
    Arc::new(move |source_id: &str| -> Result<Box<dyn FrameSource>> {
        if source_id == fail_on {
            return Err(anyhow!("no media for source {}", source_id));
        }
        Ok(Box::new(CountingSource {
            source_id: source_id.to_string(),
            sequence: 0,
            closed: closed.clone(),
        }))
    })
}

fn wait_for(rx: &Receiver<OccupancyUpdate>, source_id: &str) -> OccupancyUpdate {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("timed out waiting for an update");
        let update = rx.recv_timeout(remaining).expect("frame loop stalled");
        if update.source_id == source_id {
            return update;
        }
    }
}

#[test]
fn switching_sources_classifies_against_new_layout() {
    let closed = Arc::new(AtomicUsize::new(0));
    let (mut session, rx) = session_with(counting_factory(closed.clone(), "none"));
    session.start().unwrap();

    let first = wait_for(&rx, "1");
    assert_eq!(first.snapshot.total, 1);
    assert_eq!(first.snapshot.free, 0);

    session.change_source("2").unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(session.source_id().unwrap(), "2");

    // Every update produced after the switch uses source 2's slots.
    let update = wait_for(&rx, "2");
    assert_eq!(update.snapshot.total, 2);
    assert_eq!(update.snapshot.free, 1);

    let stats = session.stop().unwrap().unwrap();
    assert!(stats.frames_processed >= 1);
    assert_eq!((stats.last_total, stats.last_free), (2, 1));
    assert_eq!(closed.load(Ordering::SeqCst), 2);
    while let Ok(update) = rx.try_recv() {
        if update.source_id == "2" {
            assert_eq!(update.snapshot.total, 2);
        }
    }
}

#[test]
fn failed_open_leaves_session_stopped_on_new_source() {
    let closed = Arc::new(AtomicUsize::new(0));
    let (mut session, rx) = session_with(counting_factory(closed.clone(), "3"));
    session.start().unwrap();
    wait_for(&rx, "1");

    assert!(session.change_source("3").is_err());
    assert!(!session.is_running());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    // The layout switch already happened; there is no fallback.
    assert_eq!(session.source_id().unwrap(), "3");
    assert!(session.layout().unwrap().slots().is_empty());
    assert!(session.stop().unwrap().is_none());
}

#[test]
fn slots_added_while_running_reach_the_loop() {
    let closed = Arc::new(AtomicUsize::new(0));
    let (session, rx) = session_with(counting_factory(closed.clone(), "none"));
    let mut operator = Operator::new(session);
    operator.session_mut().start().unwrap();
    wait_for(&rx, "1");

    for corner in square(100, 0, 10) {
        operator.click(corner, MouseButton::Primary).unwrap();
    }
    assert_eq!(operator.commit_slot().unwrap(), Some(1));
    assert!(operator.pending_points().is_empty());

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let update = wait_for(&rx, "1");
        if update.snapshot.total == 2 {
            assert_eq!(update.snapshot.free, 1);
            break;
        }
        assert!(Instant::now() < deadline, "new slot never classified");
    }

    operator.shutdown().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn stub_media_library_drives_the_loop() {
    let media = MediaLibrary {
        root: "stub://media".to_string(),
        target_fps: 1000,
        width: 64,
        height: 48,
    };
    let (mut session, rx) = session_with(Arc::new(media));
    session.start().unwrap();
    let update = wait_for(&rx, "1");
    assert_eq!(update.snapshot.total, 1);
    drop(session);
}

#[test]
fn rejected_source_id_keeps_current_loop_running() {
    let closed = Arc::new(AtomicUsize::new(0));
    let (mut session, rx) = session_with(counting_factory(closed.clone(), "none"));
    session.start().unwrap();
    wait_for(&rx, "1");

    for bad in ["../x", "bad id", ""] {
        assert!(session.change_source(bad).is_err(), "{:?}", bad);
        assert!(session.is_running());
        assert_eq!(session.source_id().unwrap(), "1");
    }
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    // Still classifying source 1 after the rejected switches.
    while rx.try_recv().is_ok() {}
    assert_eq!(wait_for(&rx, "1").snapshot.total, 1);

    session.stop().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn corrupt_layout_keeps_current_loop_running() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("4.json"), r#"{"slots": 3}"#).unwrap();
    let store = FileSlotStore::open(dir.path()).unwrap();
    let closed = Arc::new(AtomicUsize::new(0));
    let (mut session, rx) = session_on(Box::new(store), counting_factory(closed.clone(), "none"));
    session.start().unwrap();
    wait_for(&rx, "1");

    assert!(session.change_source("4").is_err());
    assert!(session.is_running());
    assert_eq!(session.source_id().unwrap(), "1");
    assert_eq!(closed.load(Ordering::SeqCst), 0);
}

#[test]
fn operator_pending_points_undo_and_secondary_clicks() {
    let (session, _rx) = session_with(counting_factory(Arc::new(AtomicUsize::new(0)), "none"));
    let mut operator = Operator::new(session);

    assert_eq!(operator.undo_last_point(), None);

    operator.click(Point::new(100, 0), MouseButton::Primary).unwrap();
    operator.click(Point::new(110, 0), MouseButton::Primary).unwrap();
    assert_eq!(
        operator.click(Point::new(999, 999), MouseButton::Primary).unwrap(),
        ClickOutcome::PointAdded { pending: 3 }
    );
    assert_eq!(operator.undo_last_point(), Some(Point::new(999, 999)));
    assert_eq!(
        operator.pending_points(),
        &[Point::new(100, 0), Point::new(110, 0)]
    );

    // Two points are not a slot; they stay pending and nothing is stored.
    assert_eq!(operator.commit_slot().unwrap(), None);
    assert_eq!(operator.pending_points().len(), 2);
    assert_eq!(operator.session().layout().unwrap().slots().len(), 1);

    operator.click(Point::new(110, 10), MouseButton::Primary).unwrap();
    assert_eq!(operator.commit_slot().unwrap(), Some(1));
    assert!(operator.pending_points().is_empty());

    assert_eq!(
        operator.click(Point::new(500, 500), MouseButton::Secondary).unwrap(),
        ClickOutcome::NothingRemoved
    );
    assert_eq!(operator.session().layout().unwrap().slots().len(), 2);

    match operator.click(Point::new(5, 5), MouseButton::Secondary).unwrap() {
        ClickOutcome::SlotRemoved { slot } => {
            assert_eq!(slot.points(), square(0, 0, 10).as_slice())
        }
        other => panic!("expected a removed slot, got {:?}", other),
    }
    let layout = operator.session().layout().unwrap();
    assert_eq!(layout.slots().len(), 1);
    assert_eq!(
        layout.slots().get(0).unwrap().points(),
        &[Point::new(100, 0), Point::new(110, 0), Point::new(110, 10)]
    );
}
