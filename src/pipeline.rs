//! Run orchestration.
//!
//! `PipelineDriver` executes one run over a frame source:
//!
//! 1. Load regions (`Idle`); a missing, malformed or empty region set fails the run
//!    before any frame is read.
//! 2. Open the source and read the first frame; failure here is `SourceUnavailable`.
//! 3. `Running`: every Nth frame (1-based counter, `counter % N == 0`) is scaled to
//!    the region authoring scale, run through the detector, counted, annotated and
//!    written. Skipped frames are neither analysed nor written.
//! 4. Any per-frame failure aborts the run. A read failure after the first frame
//!    ends the stream instead.
//!
//! The sink is finalised and progress completed on every exit path.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::annotate::FrameAnnotator;
use crate::detect::{DetectorBackend, VehicleClass};
use crate::evaluate::{evaluate, CongestionStatus, FrameCounts, ThresholdConfig};
use crate::frame::{scaled_dimensions, Frame, SourceInfo};
use crate::ingest::FrameSource;
use crate::output::FrameSink;
use crate::regions::{RegionSet, RegionStore};
use crate::PipelineError;

pub const DEFAULT_FRAME_SKIP: u32 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Process every Nth frame.
    pub frame_skip: u32,
    pub thresholds: ThresholdConfig,
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.frame_skip == 0 {
            return Err(PipelineError::InvalidConfig(
                "frame skip interval must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            thresholds: ThresholdConfig::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Cancellation and progress
// ----------------------------------------------------------------------------

/// Cooperative cancellation flag, checked once per sampled frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// `frames_read / total_frames`, clamped to 1.0; 0.0 while the total is unknown.
    pub fraction: f64,
    pub frames_read: u64,
    pub total_frames: Option<u64>,
}

/// Receives progress during a run and exactly one terminal signal.
pub trait ProgressReporter {
    fn update(&mut self, progress: Progress);

    fn finish(&mut self, result: Result<&RunSummary, &PipelineError>);
}

/// Reporter that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&mut self, _progress: Progress) {}

    fn finish(&mut self, _result: Result<&RunSummary, &PipelineError>) {}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub fraction: f64,
    pub frames_read: u64,
    pub total_frames: Option<u64>,
    /// `Some(true)` after success, `Some(false)` after failure.
    pub succeeded: Option<bool>,
    pub error: Option<String>,
}

/// Polled progress value, shareable with another thread (e.g. a UI).
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    inner: Arc<Mutex<ProgressSnapshot>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with<F: FnOnce(&mut ProgressSnapshot)>(&self, f: F) {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl ProgressReporter for SharedProgress {
    fn update(&mut self, progress: Progress) {
        self.with(|snap| {
            snap.fraction = snap.fraction.max(progress.fraction);
            snap.frames_read = progress.frames_read;
            snap.total_frames = progress.total_frames;
        });
    }

    fn finish(&mut self, result: Result<&RunSummary, &PipelineError>) {
        self.with(|snap| {
            snap.fraction = 1.0;
            match result {
                Ok(_) => snap.succeeded = Some(true),
                Err(e) => {
                    snap.succeeded = Some(false);
                    snap.error = Some(e.to_string());
                }
            }
        });
    }
}

// ----------------------------------------------------------------------------
// Run state and summary
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed(PipelineError),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// Analysis result of one sampled frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub status: CongestionStatus,
    pub counts: BTreeMap<VehicleClass, u32>,
    pub overall: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_written: u64,
    pub congested_frames: u64,
    pub peak_counts: BTreeMap<VehicleClass, u32>,
    pub peak_overall: u32,
    /// Read error that ended the stream early, if any.
    pub stream_error: Option<String>,
    /// Per-frame results; empty unless the driver keeps frame reports.
    pub frames: Vec<FrameReport>,
}

impl RunSummary {
    fn record(
        &mut self,
        frame: u64,
        counts: &FrameCounts,
        status: CongestionStatus,
        thresholds: &ThresholdConfig,
        keep_report: bool,
    ) {
        let per_class: BTreeMap<VehicleClass, u32> = thresholds
            .counted_classes()
            .map(|(class, _)| (class, counts.get(class)))
            .collect();
        for (class, count) in &per_class {
            let peak = self.peak_counts.entry(*class).or_insert(0);
            *peak = (*peak).max(*count);
        }
        self.peak_overall = self.peak_overall.max(counts.overall());
        if status == CongestionStatus::Congested {
            self.congested_frames += 1;
        }
        if !keep_report {
            return;
        }
        self.frames.push(FrameReport {
            frame,
            status,
            counts: per_class,
            overall: counts.overall(),
        });
    }
}

// ----------------------------------------------------------------------------
// PipelineDriver
// ----------------------------------------------------------------------------

pub struct PipelineDriver {
    store: RegionStore,
    settings: PipelineSettings,
    annotator: FrameAnnotator,
    cancel: CancelToken,
    frame_reports: bool,
    state: RunState,
    summary: RunSummary,
}

impl PipelineDriver {
    pub fn new(store: RegionStore, settings: PipelineSettings) -> Self {
        Self {
            store,
            settings,
            annotator: FrameAnnotator::default(),
            cancel: CancelToken::new(),
            frame_reports: false,
            state: RunState::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Keep a `FrameReport` per analysed frame in the summary. Off by default;
    /// only the aggregate counters are kept otherwise.
    pub fn with_frame_reports(mut self, keep: bool) -> Self {
        self.frame_reports = keep;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Counters of the last run, including partial counts of a failed run.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Execute one run. A driver runs once; a second call is rejected.
    pub fn run<S, D, K>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        sink: &mut K,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError>
    where
        S: FrameSource + ?Sized,
        D: DetectorBackend + ?Sized,
        K: FrameSink + ?Sized,
    {
        if self.state != RunState::Idle {
            return Err(PipelineError::InvalidConfig(
                "pipeline driver has already run".to_string(),
            ));
        }

        let mut result = self.execute(source, detector, sink, progress);

        // Cleanup runs on every path: finalise the sink, then complete progress.
        if let Err(e) = sink.finish() {
            let finish_error = PipelineError::SinkWriteFailure {
                frame: None,
                message: format!("finalising {}: {:#}", sink.describe(), e),
            };
            if let Err(primary) = &result {
                log::warn!("{} (after {})", finish_error, primary);
            } else {
                result = Err(finish_error);
            }
        }

        match &result {
            Ok(summary) => {
                self.state = RunState::Completed;
                progress.finish(Ok(summary));
                log::info!(
                    "run completed: {} frame(s) read, {} written, {} congested",
                    summary.frames_read,
                    summary.frames_written,
                    summary.congested_frames
                );
            }
            Err(e) => {
                self.state = RunState::Failed(e.clone());
                progress.finish(Err(e));
                log::error!("run failed: {}", e);
            }
        }
        result
    }

    fn execute<S, D, K>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        sink: &mut K,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError>
    where
        S: FrameSource + ?Sized,
        D: DetectorBackend + ?Sized,
        K: FrameSink + ?Sized,
    {
        self.summary = RunSummary::default();
        self.settings.validate()?;

        let regions = self.store.load()?;
        if regions.is_empty() {
            return Err(PipelineError::NoRegions {
                path: self.store.path().to_path_buf(),
            });
        }

        let unavailable = |message: String| PipelineError::SourceUnavailable(message);
        let info = source
            .open()
            .map_err(|e| unavailable(format!("{}: {:#}", source.describe(), e)))?;
        let first = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(unavailable(format!("{}: no frames", source.describe())));
            }
            Err(e) => {
                return Err(unavailable(format!("{}: {:#}", source.describe(), e)));
            }
        };

        detector
            .warm_up()
            .map_err(|e| PipelineError::DetectorFailure {
                frame: 0,
                message: format!("{} warm-up: {:#}", detector.name(), e),
            })?;

        let (width, height) = scaled_dimensions(info.width, info.height, regions.scale());
        sink.begin(&info, width, height)
            .map_err(|e| PipelineError::SinkWriteFailure {
                frame: None,
                message: format!("opening {}: {:#}", sink.describe(), e),
            })?;

        log::info!(
            "run started: source={} {}x{} @ {:.2} fps, frames={}, regions={} scale={}, every {} frame(s), detector={}, output={}",
            source.describe(),
            info.width,
            info.height,
            info.fps,
            info.frame_count.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            regions.len(),
            regions.scale(),
            self.settings.frame_skip,
            detector.name(),
            sink.describe()
        );
        let limits: Vec<String> = self
            .settings
            .thresholds
            .counted_classes()
            .map(|(class, t)| format!("{}>{}", class.name(), t))
            .collect();
        log::info!(
            "congested when {} or total>{}",
            limits.join(", "),
            self.settings.thresholds.overall()
        );
        self.state = RunState::Running;

        self.process_stream(first, &info, &regions, source, detector, sink, progress)?;
        Ok(self.summary.clone())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_stream<S, D, K>(
        &mut self,
        first: Frame,
        info: &SourceInfo,
        regions: &RegionSet,
        source: &mut S,
        detector: &mut D,
        sink: &mut K,
        progress: &mut dyn ProgressReporter,
    ) -> Result<(), PipelineError>
    where
        S: FrameSource + ?Sized,
        D: DetectorBackend + ?Sized,
        K: FrameSink + ?Sized,
    {
        let skip = self.settings.frame_skip as u64;
        let mut last_status: Option<CongestionStatus> = None;
        let mut fraction = 0.0_f64;
        let mut next = Some(first);

        while let Some(frame) = next.take() {
            self.summary.frames_read += 1;
            let frames_read = self.summary.frames_read;

            if frames_read % skip == 0 {
                if self.cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled { frame: frames_read });
                }

                if let Some(total) = info.frame_count.filter(|n| *n > 0) {
                    fraction = fraction.max((frames_read as f64 / total as f64).min(1.0));
                }
                progress.update(Progress {
                    fraction,
                    frames_read,
                    total_frames: info.frame_count,
                });

                let status = self.process_frame(frame, regions, detector, sink)?;
                if last_status != Some(status) {
                    log::info!("frame {}: status {}", frames_read, status);
                    last_status = Some(status);
                }
            }

            next = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!(
                        "read failure after frame {}: {:#}; treating as end of stream",
                        frames_read,
                        e
                    );
                    self.summary.stream_error = Some(format!("{:#}", e));
                    None
                }
            };
        }
        Ok(())
    }

    fn process_frame<D, K>(
        &mut self,
        frame: Frame,
        regions: &RegionSet,
        detector: &mut D,
        sink: &mut K,
    ) -> Result<CongestionStatus, PipelineError>
    where
        D: DetectorBackend + ?Sized,
        K: FrameSink + ?Sized,
    {
        let index = frame.index;
        let mut frame = frame
            .scaled(regions.scale())
            .map_err(|e| PipelineError::FramePreparation {
                frame: index,
                message: format!("scaling by {}: {:#}", regions.scale(), e),
            })?;

        let detections = detector
            .detect(frame.pixels(), frame.width(), frame.height())
            .map_err(|e| PipelineError::DetectorFailure {
                frame: index,
                message: format!("{}: {:#}", detector.name(), e),
            })?;
        self.summary.frames_processed += 1;

        let thresholds = &self.settings.thresholds;
        let (counts, status) = evaluate(&detections, regions, thresholds);
        log::debug!(
            "frame {}: {} detection(s), overall {} -> {}",
            index,
            detections.len(),
            counts.overall(),
            status
        );

        self.annotator
            .annotate(frame.image_mut(), regions, status, &counts, thresholds);
        sink.write(&frame)
            .map_err(|e| PipelineError::SinkWriteFailure {
                frame: Some(index),
                message: format!("{}: {:#}", sink.describe(), e),
            })?;
        self.summary.frames_written += 1;
        self.summary
            .record(index, &counts, status, thresholds, self.frame_reports);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_frame_skip_is_invalid() {
        let settings = PipelineSettings {
            frame_skip: 0,
            ..PipelineSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(PipelineSettings::default().validate().is_ok());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn shared_progress_is_monotonic_and_completes() {
        let shared = SharedProgress::new();
        let mut reporter = shared.clone();
        reporter.update(Progress {
            fraction: 0.5,
            frames_read: 50,
            total_frames: Some(100),
        });
        reporter.update(Progress {
            fraction: 0.25,
            frames_read: 51,
            total_frames: Some(100),
        });
        assert_eq!(shared.snapshot().fraction, 0.5);
        assert_eq!(shared.snapshot().succeeded, None);

        reporter.finish(Err(&PipelineError::Cancelled { frame: 52 }));
        let snap = shared.snapshot();
        assert_eq!(snap.fraction, 1.0);
        assert_eq!(snap.succeeded, Some(false));
        assert!(snap.error.unwrap().contains("cancelled"));
    }
}
