use parking_monitor::{
    contains, Detection, FileSlotStore, GeometryError, ObjectLabel, OccupancyClassifier, Point,
    Polygon, Slot, SlotCollection, SlotLayout, SlotStore,
};

fn car(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection::new(x1, y1, x2, y2, 0.9, ObjectLabel::Car.class_id())
}

fn square(x: i32, y: i32, side: i32) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + side, y),
        Point::new(x + side, y + side),
        Point::new(x, y + side),
    ]
}

#[test]
fn saved_layout_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileSlotStore::open(dir.path()).unwrap();
    let slots: SlotCollection = [
        Slot::new(square(0, 0, 10)).unwrap(),
        Slot::new(vec![Point::new(5, 5), Point::new(40, 8), Point::new(22, 30)]).unwrap(),
    ]
    .into_iter()
    .collect();

    store.save(&slots, "lot_a").unwrap();
    let reloaded = store.load("lot_a").unwrap();
    assert_eq!(reloaded, slots);

    // A fresh store over the same directory sees the same layout.
    let mut other = FileSlotStore::open(dir.path()).unwrap();
    assert_eq!(other.load("lot_a").unwrap(), slots);
}

#[test]
fn short_polygons_leave_layout_and_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSlotStore::open(dir.path()).unwrap();
    let path = store.path_for("1").unwrap();
    let mut layout = SlotLayout::open(Box::new(store), "1").unwrap();
    layout.add_slot(&square(0, 0, 10)).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert_eq!(
        layout
            .add_slot(&[Point::new(1, 1), Point::new(5, 5)])
            .unwrap(),
        None
    );
    assert_eq!(layout.slots().len(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn remove_takes_only_the_first_overlapping_slot() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSlotStore::open(dir.path()).unwrap();
    let mut layout = SlotLayout::open(Box::new(store), "1").unwrap();
    layout.add_slot(&square(0, 0, 20)).unwrap();
    layout.add_slot(&square(5, 5, 20)).unwrap();

    let removed = layout.remove_slot_at(Point::new(10, 10)).unwrap().unwrap();
    assert_eq!(removed.points(), square(0, 0, 20).as_slice());
    assert_eq!(layout.slots().len(), 1);
    assert_eq!(layout.slots().get(0).unwrap().points(), square(5, 5, 20).as_slice());

    assert!(layout.remove_slot_at(Point::new(500, 500)).unwrap().is_none());
    assert_eq!(layout.slots().len(), 1);
}

#[test]
fn one_car_over_one_of_two_slots() {
    let slots: SlotCollection = [
        Slot::new(square(0, 0, 10)).unwrap(),
        Slot::new(square(100, 0, 10)).unwrap(),
    ]
    .into_iter()
    .collect();
    assert_eq!(slots.get(0).unwrap().centroid(), Point::new(5, 5));

    let snapshot = OccupancyClassifier::default().classify(&slots, &[car(0.0, 0.0, 20.0, 20.0)]);
    assert_eq!(snapshot.total, 2);
    assert_eq!(snapshot.free, 1);
    assert_eq!(snapshot.is_occupied(0), Some(true));
    assert_eq!(snapshot.is_occupied(1), Some(false));
    assert_eq!(snapshot.summary(), "Total space: 2\nFree space: 1");
}

#[test]
fn non_vehicle_detections_occupy_nothing() {
    let slots: SlotCollection = [Slot::new(square(0, 0, 10)).unwrap()].into_iter().collect();
    let person = Detection::new(0.0, 0.0, 20.0, 20.0, 0.9, ObjectLabel::Pedestrian.class_id());

    let snapshot = OccupancyClassifier::default().classify(&slots, &[person]);
    assert_eq!(snapshot.total, 1);
    assert_eq!(snapshot.free, 1);
}

#[test]
fn empty_polygon_has_no_centroid() {
    assert_eq!(
        Polygon::new(Vec::new()).centroid(),
        Err(GeometryError::EmptyPolygon)
    );
    let polygons = vec![Polygon::new(square(0, 0, 10)), Polygon::new(Vec::new())];
    assert!(OccupancyClassifier::default()
        .classify_polygons(&polygons, &[car(0.0, 0.0, 20.0, 20.0)])
        .is_err());
}

#[test]
fn containment_is_consistent_for_concave_slots() {
    // U shape with its notch open at y = 30; the notch is outside.
    let u = Polygon::new(vec![
        Point::new(0, 0),
        Point::new(30, 0),
        Point::new(30, 30),
        Point::new(20, 30),
        Point::new(20, 10),
        Point::new(10, 10),
        Point::new(10, 30),
        Point::new(0, 30),
    ]);
    assert!(contains(Point::new(5, 20), u.points()));
    assert!(contains(Point::new(25, 20), u.points()));
    assert!(!u.contains(Point::new(15, 20)));
    assert!(u.contains(Point::new(15, 5)));
}
