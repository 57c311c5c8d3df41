//! Scan run orchestration.
//!
//! A state machine sequences the pipeline stages against a wall-clock
//! deadline. Each processing state calls exactly one stage; any failure
//! moves straight to Failed carrying the stage's error code and whatever
//! partial artifacts exist. The deadline is checked before entering every
//! state past Capturing. A stage already running is never preempted, so the
//! worst case overshoots the budget by at most one stage.

use std::time::{Duration, Instant};

use image::RgbImage;

use crate::module::error::ScanError;
use crate::module::sink::{DebugArtifact, DebugSink};
use crate::module::util::conf::Config;
use crate::module::vision::bands::{self, BandRegion};
use crate::module::vision::camera::ImageSource;
use crate::module::vision::classify::{self, BandLabel};
use crate::module::vision::color::ColorTable;
use crate::module::vision::preprocess::{self, PreprocArtifacts};
use crate::module::vision::resolve::{self, Reading};
use crate::module::vision::roi::{self, Roi};

/// States of one trigger cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Triggered,
    Capturing,
    Preprocessing,
    LocatingRoi,
    Segmenting,
    Classifying,
    Resolving,
    Success,
    Failed,
}

/// Wall-clock budget started on Capturing entry.
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_millis(budget_ms),
        }
    }

    /// Fails with `Timeout` once the budget is spent.
    pub fn check(&self) -> Result<(), ScanError> {
        if self.started.elapsed() > self.budget {
            Err(ScanError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Best-available partial artifacts, carried to the error sink on failure.
#[derive(Debug, Clone, Default)]
pub struct RunArtifacts {
    pub input: Option<RgbImage>,
    pub preproc: Option<PreprocArtifacts>,
    pub roi: Option<Roi>,
    pub bands: Option<Vec<BandRegion>>,
    pub labels: Option<Vec<BandLabel>>,
}

impl RunArtifacts {
    /// Most recent successful image artifact, for error-path persistence.
    pub fn latest(&self) -> Option<(&'static str, DebugArtifact)> {
        if let Some(roi) = &self.roi {
            return Some(("last_roi", DebugArtifact::Rgb(roi.crop.clone())));
        }
        if let Some(pre) = &self.preproc {
            return Some(("last_pre", DebugArtifact::Rgb(pre.rgb.clone())));
        }
        self.input
            .as_ref()
            .map(|img| ("last_input", DebugArtifact::Rgb(img.clone())))
    }
}

/// Per-stage wall-clock timings in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct RunTimings {
    pub capture_ms: u128,
    pub preprocess_ms: u128,
    pub roi_ms: u128,
    pub segment_ms: u128,
    pub classify_ms: u128,
    pub resolve_ms: u128,
    pub total_ms: u128,
}

/// Everything one run produced.
pub struct RunReport {
    pub outcome: Result<Reading, ScanError>,
    pub artifacts: RunArtifacts,
    pub timings: RunTimings,
    /// Timestamp tag shared by all of this run's debug artifacts.
    pub ts: String,
}

/// Sequences the pipeline for one trigger at a time.
///
/// The color table and configuration are read-only for the process lifetime;
/// the debug sink is an optional side channel passed in explicitly so the
/// pipeline itself stays side-effect free.
pub struct Orchestrator<'a> {
    conf: &'a Config,
    table: &'a ColorTable,
    debug: Option<&'a DebugSink>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(conf: &'a Config, table: &'a ColorTable, debug: Option<&'a DebugSink>) -> Self {
        Self { conf, table, debug }
    }

    /// Run the full pipeline once against the deadline budget.
    ///
    /// Always returns a report; the outcome is exactly one reading or one
    /// error code.
    pub fn run_once(&self, source: &mut dyn ImageSource) -> RunReport {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S%3f").to_string();
        let mut artifacts = RunArtifacts::default();
        let mut timings = RunTimings::default();

        let started = Instant::now();
        let outcome = self.execute(source, &ts, &mut artifacts, &mut timings);
        timings.total_ms = started.elapsed().as_millis();

        let terminal = match &outcome {
            Ok(_) => ScanState::Success,
            Err(_) => ScanState::Failed,
        };
        log::debug!("scan {}: {:?} in {} ms", ts, terminal, timings.total_ms);
        log::trace!("state {:?} -> {:?}", terminal, ScanState::Idle);
        log::debug!(
            "timings {}: capture {} pre {} roi {} seg {} cls {} res {} total {}",
            ts,
            timings.capture_ms,
            timings.preprocess_ms,
            timings.roi_ms,
            timings.segment_ms,
            timings.classify_ms,
            timings.resolve_ms,
            timings.total_ms
        );

        RunReport {
            outcome,
            artifacts,
            timings,
            ts,
        }
    }

    fn execute(
        &self,
        source: &mut dyn ImageSource,
        ts: &str,
        artifacts: &mut RunArtifacts,
        timings: &mut RunTimings,
    ) -> Result<Reading, ScanError> {
        let mut state = ScanState::Idle;
        self.advance(&mut state, ScanState::Triggered, None)?;

        // The deadline clock starts on Capturing entry; the capture call has
        // its own sub-budget on top.
        self.advance(&mut state, ScanState::Capturing, None)?;
        let deadline = Deadline::start(self.conf.runtime.budget_ms);
        let input = timed(&mut timings.capture_ms, || source.capture())?;
        if timings.capture_ms > self.conf.camera.capture_budget_ms as u128 {
            return Err(ScanError::Capture(format!(
                "capture took {} ms, budget {} ms",
                timings.capture_ms, self.conf.camera.capture_budget_ms
            )));
        }
        self.save_debug(ts, "input", || DebugArtifact::Rgb(input.clone()));
        artifacts.input = Some(input);

        self.advance(&mut state, ScanState::Preprocessing, Some(&deadline))?;
        let input_ref = artifacts.input.as_ref().expect("input just stored");
        let pre = timed(&mut timings.preprocess_ms, || {
            preprocess::preprocess(input_ref, &self.conf.preprocess)
        })?;
        self.save_debug(ts, "pre", || DebugArtifact::Rgb(pre.rgb.clone()));
        artifacts.preproc = Some(pre);

        self.advance(&mut state, ScanState::LocatingRoi, Some(&deadline))?;
        let pre_ref = artifacts.preproc.as_ref().expect("preproc just stored");
        let located = timed(&mut timings.roi_ms, || {
            roi::detect(pre_ref, &self.conf.roi)
        })?;
        log::debug!(
            "roi {}x{} at ({}, {}), angle {:.2} rad, confidence {:.2}",
            located.width,
            located.height,
            located.x,
            located.y,
            located.angle,
            located.confidence
        );
        self.save_debug(ts, "roi_mask", || DebugArtifact::Gray(located.mask.clone()));
        self.save_debug(ts, "roi", || DebugArtifact::Rgb(located.crop.clone()));
        let roi_confidence = located.confidence;
        artifacts.roi = Some(located);

        self.advance(&mut state, ScanState::Segmenting, Some(&deadline))?;
        let roi_ref = artifacts.roi.as_ref().expect("roi just stored");
        let (regions, separation) = timed(&mut timings.segment_ms, || {
            bands::segment(roi_ref, &self.conf.segmentation)
        })?;
        for region in &regions {
            let tag = format!("band{}", region.index);
            self.save_debug(ts, &tag, || DebugArtifact::Rgb(region.crop.clone()));
        }
        artifacts.bands = Some(regions);

        self.advance(&mut state, ScanState::Classifying, Some(&deadline))?;
        let bands_ref = artifacts.bands.as_ref().expect("bands just stored");
        let labels = timed(&mut timings.classify_ms, || {
            classify::classify(bands_ref, self.table, &self.conf.classification)
        })?;
        artifacts.labels = Some(labels);

        self.advance(&mut state, ScanState::Resolving, Some(&deadline))?;
        let labels_ref = artifacts.labels.as_ref().expect("labels just stored");
        let reading = timed(&mut timings.resolve_ms, || {
            resolve::resolve(labels_ref, roi_confidence, separation)
        })?;

        Ok(reading)
    }

    /// Enter the next state, checking the deadline first.
    fn advance(
        &self,
        state: &mut ScanState,
        next: ScanState,
        deadline: Option<&Deadline>,
    ) -> Result<(), ScanError> {
        if let Some(deadline) = deadline {
            deadline.check()?;
        }
        log::trace!("state {:?} -> {:?}", state, next);
        *state = next;
        Ok(())
    }

    fn save_debug(&self, ts: &str, tag: &str, make: impl FnOnce() -> DebugArtifact) {
        if let Some(sink) = self.debug {
            sink.save(ts, tag, make());
        }
    }
}

fn timed<T>(slot: &mut u128, f: impl FnOnce() -> T) -> T {
    let t = Instant::now();
    let out = f();
    *slot = t.elapsed().as_millis();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Rgb};
    use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

    const BODY: Rgb<u8> = Rgb([205, 170, 130]);
    const BG: Rgb<u8> = Rgb([245, 245, 245]);

    struct FixtureSource {
        img: RgbImage,
    }

    impl ImageSource for FixtureSource {
        fn capture(&mut self) -> Result<RgbImage, ScanError> {
            Ok(self.img.clone())
        }
    }

    struct DelayedSource {
        img: RgbImage,
        delay_ms: u64,
    }

    impl ImageSource for DelayedSource {
        fn capture(&mut self) -> Result<RgbImage, ScanError> {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
            Ok(self.img.clone())
        }
    }

    fn test_conf() -> Config {
        let mut conf = Config::template();
        // Debug builds are slow; only the timeout tests pin the budget down.
        conf.runtime.budget_ms = 60_000;
        conf
    }

    fn draw_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    /// A synthetic 47 kΩ ±5% resistor: yellow, violet, orange, gold.
    fn synthetic_resistor() -> RgbImage {
        let mut img = RgbImage::from_pixel(320, 240, BG);
        draw_rect(&mut img, 80, 100, 240, 140, BODY);
        draw_rect(&mut img, 100, 100, 110, 140, Rgb([124, 88, 24])); // yellow
        draw_rect(&mut img, 135, 100, 145, 140, Rgb([51, 42, 68])); // violet
        draw_rect(&mut img, 170, 100, 180, 140, Rgb([149, 60, 31])); // orange
        draw_rect(&mut img, 205, 100, 215, 140, Rgb([120, 64, 39])); // gold
        img
    }

    #[test]
    fn full_pipeline_reads_47k() {
        let conf = test_conf();
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);
        let mut source = FixtureSource {
            img: synthetic_resistor(),
        };
        let report = orchestrator.run_once(&mut source);
        let reading = report.outcome.unwrap();
        assert!((reading.ohms - 47_000.0).abs() < 1e-6);
        assert_eq!(reading.tolerance, "±5%");
        assert!(reading.confidence > 0.0);
    }

    #[test]
    fn rotation_invariance_quarter_turn() {
        let conf = test_conf();
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);

        let mut source = FixtureSource {
            img: synthetic_resistor(),
        };
        let upright = orchestrator.run_once(&mut source).outcome.unwrap();

        let mut source = FixtureSource {
            img: imageops::rotate90(&synthetic_resistor()),
        };
        let turned = orchestrator.run_once(&mut source).outcome.unwrap();

        assert!((upright.ohms - turned.ohms).abs() < 1e-6);
        assert_eq!(upright.tolerance, turned.tolerance);
    }

    #[test]
    fn rotation_invariance_arbitrary_angle() {
        let conf = test_conf();
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);

        let tilted = rotate_about_center(
            &synthetic_resistor(),
            0.5, // ~29 degrees
            Interpolation::Bilinear,
            BG,
        );
        let mut source = FixtureSource { img: tilted };
        let reading = orchestrator.run_once(&mut source).outcome.unwrap();
        assert!((reading.ohms - 47_000.0).abs() < 1e-6);
        assert_eq!(reading.tolerance, "±5%");
    }

    #[test]
    fn idempotence_test() {
        let conf = test_conf();
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);
        let mut source = FixtureSource {
            img: synthetic_resistor(),
        };
        let first = orchestrator.run_once(&mut source).outcome;
        let second = orchestrator.run_once(&mut source).outcome;
        assert_eq!(first, second);
    }

    #[test]
    fn all_white_reports_roi_not_found() {
        let conf = test_conf();
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);
        let mut source = FixtureSource {
            img: RgbImage::from_pixel(320, 240, BG),
        };
        let report = orchestrator.run_once(&mut source);
        assert_eq!(report.outcome, Err(ScanError::RoiNotFound));
        // Partial artifacts up to the failing stage are carried along.
        assert!(report.artifacts.preproc.is_some());
        assert!(report.artifacts.roi.is_none());
    }

    #[test]
    fn delayed_capture_times_out() {
        let mut conf = test_conf();
        conf.runtime.budget_ms = 20;
        conf.camera.capture_budget_ms = 10_000;
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);
        let mut source = DelayedSource {
            img: synthetic_resistor(),
            delay_ms: 60,
        };
        let report = orchestrator.run_once(&mut source);
        assert_eq!(report.outcome, Err(ScanError::Timeout));
    }

    #[test]
    fn capture_sub_budget_expiry_is_capture_failure() {
        let mut conf = test_conf();
        conf.runtime.budget_ms = 60_000;
        conf.camera.capture_budget_ms = 10;
        let table = ColorTable::new();
        let orchestrator = Orchestrator::new(&conf, &table, None);
        let mut source = DelayedSource {
            img: synthetic_resistor(),
            delay_ms: 60,
        };
        let report = orchestrator.run_once(&mut source);
        assert!(matches!(report.outcome, Err(ScanError::Capture(_))));
    }
}
