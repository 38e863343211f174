use tempfile::TempDir;

use roi_congestion::regions::{authoring_scale, DrawingEvent, SessionState};
use roi_congestion::{
    DrawingSession, FileConfig, FileSource, NoProgress, PipelineDriver, PipelineSettings, Point,
    RegionStore, RunState, ScriptedBackend,
};
use roi_congestion::output::ImageSequenceSink;

#[test]
fn drawn_regions_round_trip_and_drive_a_run() {
    let dir = TempDir::new().unwrap();
    let store = RegionStore::new(dir.path().join("regions.json"));
    let scale = authoring_scale(2560, 1440);
    assert_eq!(scale, 0.5);

    let mut session = DrawingSession::new(scale).unwrap();
    let events = [
        DrawingEvent::AddPoint(Point::new(10, 10)),
        DrawingEvent::AddPoint(Point::new(100, 10)),
        DrawingEvent::AddPoint(Point::new(999, 999)),
        DrawingEvent::Undo,
        DrawingEvent::AddPoint(Point::new(100, 100)),
        DrawingEvent::ClosePolygon,
        DrawingEvent::AddPoint(Point::new(200, 200)),
        DrawingEvent::AddPoint(Point::new(300, 200)),
        DrawingEvent::ClosePolygon, // two points: discarded
        DrawingEvent::AddPoint(Point::new(150, 150)),
        DrawingEvent::AddPoint(Point::new(250, 150)),
        DrawingEvent::AddPoint(Point::new(250, 250)),
    ];
    for event in events {
        assert_eq!(session.handle(event, &store).unwrap(), SessionState::Drawing);
    }
    assert_eq!(
        session.handle(DrawingEvent::Save, &store).unwrap(),
        SessionState::Saved
    );
    assert!(session.handle(DrawingEvent::Undo, &store).is_err());

    let loaded = store.load().unwrap();
    assert_eq!(loaded.scale(), 0.5);
    assert_eq!(loaded.len(), 2);
    assert_eq!(
        loaded.get(0).unwrap().vertices(),
        &[Point::new(10, 10), Point::new(100, 10), Point::new(100, 100)]
    );

    let mut driver = PipelineDriver::new(store, PipelineSettings::default());
    let mut sink = ImageSequenceSink::new(dir.path().join("out"));
    let summary = driver
        .run(
            &mut FileSource::new(FileConfig {
                path: "stub://authoring?frames=8&width=1280&height=720".to_string(),
            })
            .unwrap(),
            &mut ScriptedBackend::constant(Vec::new()),
            &mut sink,
            &mut NoProgress,
        )
        .unwrap();
    assert_eq!(summary.frames_written, 2);
    assert_eq!(driver.state(), &RunState::Completed);
    assert_eq!(sink.frames_written(), 2);
}

#[test]
fn cancelled_session_leaves_the_file_untouched() {
    let dir = TempDir::new().unwrap();
    let store = RegionStore::new(dir.path().join("regions.json"));
    let mut session = DrawingSession::new(1.0).unwrap();
    for (x, y) in [(0, 0), (10, 0), (10, 10)] {
        session.add_point(Point::new(x, y)).unwrap();
    }
    session.close_polygon().unwrap();
    assert_eq!(
        session.handle(DrawingEvent::Cancel, &store).unwrap(),
        SessionState::Cancelled
    );
    assert!(!store.exists());
}
