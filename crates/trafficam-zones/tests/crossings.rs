use trafficam_zones::{
    Anchor, AttributeMemory, BoundingBox, ClipContext, CrossingEvent, Detection, EventTracker,
    VehicleColor, ZoneConfig, ZoneSet,
};

/// Two entry zones on the left, one exit zone on the right.
fn zone_set() -> ZoneSet {
    let config: ZoneConfig = serde_json::from_str(
        r#"{
            "zones_in": [
                [[0, 0], [100, 0], [100, 100], [0, 100]],
                [[0, 200], [100, 200], [100, 300], [0, 300]]
            ],
            "zones_out": [[[400, 0], [500, 0], [500, 300], [400, 300]]]
        }"#,
    )
    .unwrap();
    ZoneSet::from_config(&config, Anchor::Center).unwrap()
}

fn det_at(id: u64, cx: f32, cy: f32) -> Detection {
    Detection::new(id, BoundingBox::new(cx - 10.0, cy - 10.0, cx + 10.0, cy + 10.0))
}

/// Frame-indexed detections for a short synthetic clip.
fn scripted_frame(frame: u64) -> Vec<Detection> {
    let mut dets = Vec::new();
    // id 7 starts in entry zone 1 at frame 30, reaches the exit at frame 90
    if (30..=90).contains(&frame) {
        let t = (frame - 30) as f32 / 60.0;
        dets.push(det_at(7, 50.0 + t * 350.0, 250.0).with_label("car"));
    }
    // id 9 only ever shows up inside the exit zone
    if (10..40).contains(&frame) {
        dets.push(det_at(9, 450.0, 150.0).with_label("bus"));
    }
    // id 11 enters zone 0 and never leaves the frame through an exit
    if frame >= 20 {
        dets.push(det_at(11, 50.0, 50.0));
    }
    dets
}

fn run_clip() -> (Vec<CrossingEvent>, EventTracker) {
    let zones = zone_set();
    let mut tracker = EventTracker::new(
        30.0,
        ClipContext {
            rotunda: "R2".into(),
            schedule: "evening".into(),
            day: "friday".into(),
        },
    )
    .unwrap();
    for frame in 0..120 {
        let dets = scripted_frame(frame);
        let matches = zones.match_detections(&dets);
        tracker.update(frame, &dets, &matches);
    }
    (tracker.events().to_vec(), tracker)
}

#[test]
fn scripted_clip_produces_one_crossing() {
    let (events, tracker) = run_clip();
    assert_eq!(events.len(), 1);

    let ev = &events[0];
    assert_eq!(ev.object_id, 7);
    assert_eq!((ev.entry_zone, ev.exit_zone), (1, 0));
    assert_eq!(ev.entry_time, 1.0);
    assert_eq!(ev.exit_time, 3.0);
    assert_eq!(ev.dwell, 2.0);
    assert_eq!(ev.vehicle_type, "car");
    assert_eq!(ev.entry_time_hms(), "00:00:1.000");
    assert_eq!((ev.rotunda.as_str(), ev.day.as_str()), ("R2", "friday"));

    // id 9's exits were orphans, id 11 is still open
    assert_eq!(tracker.counts().total(), 1);
    assert_eq!(tracker.counts().count(0, 1), 1);
    assert!(tracker.counts().get(0, 0).is_none());
    assert_eq!(tracker.open_records().keys().copied().collect::<Vec<_>>(), vec![11]);
}

#[test]
fn exit_time_never_precedes_entry_time() {
    let (events, _) = run_clip();
    assert!(events.iter().all(|e| e.exit_time >= e.entry_time && e.dwell >= 0.0));
}

#[test]
fn identical_input_gives_identical_events() {
    let (a, ta) = run_clip();
    let (b, tb) = run_clip();
    assert_eq!(a, b);
    assert_eq!(ta.counts(), tb.counts());
}

#[test]
fn filtered_detections_only_cover_objects_with_an_entry() {
    let zones = zone_set();
    let mut tracker = EventTracker::new(30.0, ClipContext::default()).unwrap();
    let dets = scripted_frame(30);
    let matches = zones.match_detections(&dets);
    let tagged = tracker.update(30, &dets, &matches);

    let ids: Vec<u64> = tagged.iter().map(|t| t.detection.object_id).collect();
    assert_eq!(ids, vec![7, 11]);
    assert_eq!(tagged[0].entry_zone, 1);
    assert_eq!(tagged[1].entry_zone, 0);
}

#[test]
fn remembered_attributes_reach_the_event() {
    let zones = zone_set();
    let mut memory = AttributeMemory::new();
    let mut tracker = EventTracker::new(10.0, ClipContext::default()).unwrap();

    let mut first = vec![Detection {
        color: Some(VehicleColor::Blue),
        ..det_at(3, 300.0, 50.0).with_label("truck")
    }];
    memory.fill(&mut first);
    let m = zones.match_detections(&first);
    tracker.update(0, &first, &m);

    // label and color dropped by the detector from here on
    for (frame, x) in [(5, 50.0), (10, 450.0)] {
        let mut dets = vec![det_at(3, x, 50.0)];
        memory.fill(&mut dets);
        let m = zones.match_detections(&dets);
        tracker.update(frame, &dets, &m);
    }

    let ev = &tracker.events()[0];
    assert_eq!(ev.vehicle_type, "truck");
    assert_eq!(ev.vehicle_color, "blue");
    assert_eq!(ev.dwell, 0.5);
}
