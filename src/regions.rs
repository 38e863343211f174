//! Region persistence and authoring.
//!
//! - `RegionSet`: the polygons of one run plus the scale they were authored at.
//! - `RegionStore`: JSON persistence of a `RegionSet` (load validates, save overwrites).
//! - `DrawingSession`: explicit authoring state for an interactive editor. The editor
//!   forwards its input events here; nothing is kept in process-wide state.
//!
//! File format:
//!
//! ```json
//! { "scale": 0.5, "polygons": [ [ {"x": 10, "y": 20}, ... ], ... ] }
//! ```
//!
//! Array order defines region ids (0-indexed).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::geometry::{Point, Polygon};
use crate::PipelineError;

pub const DEFAULT_REGIONS_PATH: &str = "regions.json";

/// Largest preview size the authoring editor displays a first frame at.
pub const MAX_AUTHORING_WIDTH: u32 = 1280;
pub const MAX_AUTHORING_HEIGHT: u32 = 720;

/// Scale at which regions are authored for a video of the given native size.
///
/// Frames larger than 1280x720 are shown downscaled; smaller frames keep scale 1.0.
pub fn authoring_scale(width: u32, height: u32) -> f64 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    let scale_x = MAX_AUTHORING_WIDTH as f64 / width as f64;
    let scale_y = MAX_AUTHORING_HEIGHT as f64 / height as f64;
    1.0_f64.min(scale_x).min(scale_y)
}

// ----------------------------------------------------------------------------
// RegionSet
// ----------------------------------------------------------------------------

/// All regions of interest for one run. Read-only once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionSet {
    scale: f64,
    regions: Vec<Polygon>,
}

impl RegionSet {
    pub fn new(scale: f64, regions: Vec<Polygon>) -> Result<Self> {
        validate_scale(scale)?;
        Ok(Self { scale, regions })
    }

    /// Empty set at scale 1.0. Nothing can match against it.
    pub fn empty() -> Self {
        Self {
            scale: 1.0,
            regions: Vec::new(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn regions(&self) -> &[Polygon] {
        &self.regions
    }

    /// Region polygon by id.
    pub fn get(&self, id: usize) -> Option<&Polygon> {
        self.regions.get(id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterate `(region_id, polygon)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Polygon)> {
        self.regions.iter().enumerate()
    }
}

fn validate_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(anyhow!("region scale must be a positive number, got {}", scale));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// RegionStore
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RegionFile {
    #[serde(default = "default_scale")]
    scale: f64,
    polygons: Vec<Vec<Point>>,
}

fn default_scale() -> f64 {
    1.0
}

/// JSON-backed persistence for a `RegionSet`.
#[derive(Clone, Debug)]
pub struct RegionStore {
    path: PathBuf,
}

impl RegionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load and validate the persisted region set.
    pub fn load(&self) -> std::result::Result<RegionSet, PipelineError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::RegionsNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(self.malformed(format!("unreadable: {}", e))),
        };
        let file: RegionFile =
            serde_json::from_str(&raw).map_err(|e| self.malformed(e.to_string()))?;

        let mut regions = Vec::with_capacity(file.polygons.len());
        for (id, points) in file.polygons.into_iter().enumerate() {
            let count = points.len();
            let polygon = Polygon::new(points).ok_or_else(|| {
                self.malformed(format!(
                    "polygon {} has {} point(s), at least {} required",
                    id,
                    count,
                    Polygon::MIN_VERTICES
                ))
            })?;
            regions.push(polygon);
        }

        RegionSet::new(file.scale, regions).map_err(|e| self.malformed(e.to_string()))
    }

    /// Load, degrading a missing or malformed file to an empty set.
    ///
    /// Callers must refuse to start a run on an empty set.
    pub fn load_or_empty(&self) -> RegionSet {
        match self.load() {
            Ok(set) => set,
            Err(e) => {
                log::warn!("{}; continuing with no regions", e);
                RegionSet::empty()
            }
        }
    }

    /// Replace the persisted region set.
    pub fn save(&self, set: &RegionSet) -> Result<()> {
        let file = RegionFile {
            scale: set.scale,
            polygons: set
                .regions
                .iter()
                .map(|poly| poly.vertices().to_vec())
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing regions to {}", self.path.display()))?;
        log::info!(
            "saved {} region(s) to {} with scale={}",
            set.len(),
            self.path.display(),
            set.scale
        );
        Ok(())
    }

    fn malformed(&self, reason: String) -> PipelineError {
        PipelineError::MalformedRegions {
            path: self.path.clone(),
            reason,
        }
    }
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new(DEFAULT_REGIONS_PATH)
    }
}

// ----------------------------------------------------------------------------
// DrawingSession
// ----------------------------------------------------------------------------

/// Input events an authoring editor forwards to its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawingEvent {
    AddPoint(Point),
    ClosePolygon,
    Undo,
    Save,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Drawing,
    Saved,
    Cancelled,
}

/// Mutable authoring state for one editing session.
///
/// The session ends on `save` or `cancel`; further events are rejected.
#[derive(Debug)]
pub struct DrawingSession {
    scale: f64,
    polygons: Vec<Polygon>,
    pending: Vec<Point>,
    state: SessionState,
}

impl DrawingSession {
    pub fn new(scale: f64) -> Result<Self> {
        validate_scale(scale)?;
        Ok(Self {
            scale,
            polygons: Vec::new(),
            pending: Vec::new(),
            state: SessionState::Drawing,
        })
    }

    /// Continue editing an existing set.
    pub fn from_region_set(set: RegionSet) -> Self {
        Self {
            scale: set.scale,
            polygons: set.regions,
            pending: Vec::new(),
            state: SessionState::Drawing,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn pending(&self) -> &[Point] {
        &self.pending
    }

    pub fn add_point(&mut self, point: Point) -> Result<()> {
        self.ensure_open()?;
        self.pending.push(point);
        Ok(())
    }

    /// Drop the most recent in-progress point.
    pub fn undo(&mut self) -> Result<Option<Point>> {
        self.ensure_open()?;
        Ok(self.pending.pop())
    }

    /// Close the in-progress polygon.
    ///
    /// Returns the new region id, or `None` when fewer than three points were
    /// pending (those points are discarded).
    pub fn close_polygon(&mut self) -> Result<Option<usize>> {
        self.ensure_open()?;
        let points = std::mem::take(&mut self.pending);
        match Polygon::new(points) {
            Some(polygon) => {
                self.polygons.push(polygon);
                let id = self.polygons.len() - 1;
                log::info!("region #{} closed ({} points)", id, self.polygons[id].len());
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Close any pending polygon, persist all polygons and end the session.
    pub fn save(&mut self, store: &RegionStore) -> Result<RegionSet> {
        self.ensure_open()?;
        if self.pending.len() >= Polygon::MIN_VERTICES {
            self.close_polygon()?;
        }
        self.pending.clear();
        let set = RegionSet::new(self.scale, self.polygons.clone())?;
        store.save(&set)?;
        self.state = SessionState::Saved;
        Ok(set)
    }

    /// End the session without persisting anything.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.pending.clear();
        self.state = SessionState::Cancelled;
        log::info!("drawing session cancelled without saving");
        Ok(())
    }

    /// Dispatch one editor event.
    pub fn handle(&mut self, event: DrawingEvent, store: &RegionStore) -> Result<SessionState> {
        match event {
            DrawingEvent::AddPoint(p) => self.add_point(p)?,
            DrawingEvent::ClosePolygon => {
                self.close_polygon()?;
            }
            DrawingEvent::Undo => {
                self.undo()?;
            }
            DrawingEvent::Save => {
                self.save(store)?;
            }
            DrawingEvent::Cancel => self.cancel()?,
        }
        Ok(self.state)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state != SessionState::Drawing {
            return Err(anyhow!("drawing session already ended ({:?})", self.state));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> RegionStore {
        RegionStore::new(dir.path().join("regions.json"))
    }

    fn square(offset: i32) -> Polygon {
        Polygon::new(vec![
            Point::new(offset, offset),
            Point::new(offset + 100, offset),
            Point::new(offset + 100, offset + 100),
            Point::new(offset, offset + 100),
        ])
        .unwrap()
    }

    #[test]
    fn authoring_scale_caps_large_frames() {
        assert_eq!(authoring_scale(640, 480), 1.0);
        assert_eq!(authoring_scale(2560, 1440), 0.5);
        assert!((authoring_scale(1920, 1080) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(authoring_scale(0, 0), 1.0);
    }

    #[test]
    fn missing_file_is_regions_not_found() {
        let dir = TempDir::new().unwrap();
        let err = store_in(&dir).load().unwrap_err();
        assert!(matches!(err, PipelineError::RegionsNotFound { .. }));
        assert!(store_in(&dir).load_or_empty().is_empty());
    }

    #[test]
    fn two_point_polygon_is_malformed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"scale": 1.0, "polygons": [[{"x": 0, "y": 0}, {"x": 5, "y": 5}]]}"#,
        )
        .unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRegions { .. }));
        assert!(err.to_string().contains("polygon 0 has 2 point(s)"));
    }

    #[test]
    fn non_numeric_coordinates_are_malformed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"scale": 1.0, "polygons": [[{"x": "a", "y": 0}, {"x": 5, "y": 5}, {"x": 1, "y": 9}]]}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            PipelineError::MalformedRegions { .. }
        ));
    }

    #[test]
    fn zero_scale_is_malformed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"scale": 0.0, "polygons": []}"#).unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            PipelineError::MalformedRegions { .. }
        ));
    }

    #[test]
    fn missing_scale_defaults_to_one() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"polygons": [[{"x": 0, "y": 0}, {"x": 5, "y": 0}, {"x": 5, "y": 5}]]}"#,
        )
        .unwrap();
        let set = store.load().unwrap();
        assert_eq!(set.scale(), 1.0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&RegionSet::new(1.0, vec![square(0), square(200)]).unwrap())
            .unwrap();
        store
            .save(&RegionSet::new(0.5, vec![square(50)]).unwrap())
            .unwrap();
        let set = store.load().unwrap();
        assert_eq!(set.scale(), 0.5);
        assert_eq!(set.regions(), &[square(50)]);
    }

    #[test]
    fn session_closes_only_polygons_with_three_points() {
        let mut session = DrawingSession::new(1.0).unwrap();
        session.add_point(Point::new(0, 0)).unwrap();
        session.add_point(Point::new(10, 0)).unwrap();
        assert_eq!(session.close_polygon().unwrap(), None);
        assert!(session.pending().is_empty());

        for p in [(0, 0), (10, 0), (10, 10)] {
            session.add_point(p.into()).unwrap();
        }
        assert_eq!(session.close_polygon().unwrap(), Some(0));
        assert_eq!(session.polygons().len(), 1);
    }

    #[test]
    fn session_undo_removes_last_pending_point() {
        let mut session = DrawingSession::new(1.0).unwrap();
        session.add_point(Point::new(1, 1)).unwrap();
        session.add_point(Point::new(2, 2)).unwrap();
        assert_eq!(session.undo().unwrap(), Some(Point::new(2, 2)));
        assert_eq!(session.pending(), &[Point::new(1, 1)]);
        session.undo().unwrap();
        assert_eq!(session.undo().unwrap(), None);
    }

    #[test]
    fn session_save_closes_pending_polygon_and_ends() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut session = DrawingSession::new(0.5).unwrap();
        for p in [(0, 0), (40, 0), (40, 40), (0, 40)] {
            session
                .handle(DrawingEvent::AddPoint(p.into()), &store)
                .unwrap();
        }
        let state = session.handle(DrawingEvent::Save, &store).unwrap();
        assert_eq!(state, SessionState::Saved);

        let set = store.load().unwrap();
        assert_eq!(set.scale(), 0.5);
        assert_eq!(set.len(), 1);
        assert_eq!(set.regions()[0].len(), 4);

        assert!(session.add_point(Point::new(1, 1)).is_err());
    }

    #[test]
    fn session_cancel_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut session = DrawingSession::new(1.0).unwrap();
        for p in [(0, 0), (40, 0), (40, 40)] {
            session.add_point(p.into()).unwrap();
        }
        session.close_polygon().unwrap();
        assert_eq!(
            session.handle(DrawingEvent::Cancel, &store).unwrap(),
            SessionState::Cancelled
        );
        assert!(!store.exists());
        assert!(session.save(&store).is_err());
    }
}
