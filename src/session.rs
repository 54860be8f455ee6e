//! Frame loop for one video analysis session.
//!
//! A session owns the frame source, the detector backend and the grouping
//! engine. Each `step` reads exactly one frame, so stream exhaustion is seen
//! before the throttle is consulted.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::DistancingConfig;
use crate::detect::{
    BackendRegistry, DetectionCapability, DetectorBackend, SharedBackend, StubBackend,
};
use crate::frame::Frame;
use crate::grouping::{FrameAnalysis, ProximityEngine};
use crate::ingest::FileSource;
use crate::palette::Palette;
use crate::throttle::FrameThrottle;

/// Outcome of reading one frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The source has no more frames. Terminal.
    Exhausted,
    /// A frame was read but not analyzed; the stream is still readable.
    Skipped { frame_index: u64 },
    Analyzed(AnalyzedFrame),
}

/// A frame that went through detection and grouping, returned for rendering.
#[derive(Debug)]
pub struct AnalyzedFrame {
    pub frame: Frame,
    pub analysis: FrameAnalysis,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_read: u64,
    pub frames_analyzed: u64,
    pub people_seen: u64,
    /// Distinct violating pairs summed over analyzed frames.
    pub violating_pairs: u64,
    pub elapsed: Duration,
}

impl SessionStats {
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_read as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct AnalysisSession {
    source: FileSource,
    detector: SharedBackend,
    engine: ProximityEngine,
    throttle: FrameThrottle,
    frame_index: u64,
    stats: SessionStats,
}

impl AnalysisSession {
    pub fn new(
        source: FileSource,
        detector: SharedBackend,
        engine: ProximityEngine,
        throttle: FrameThrottle,
    ) -> Self {
        Self {
            source,
            detector,
            engine,
            throttle,
            frame_index: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn with_backend<B: DetectorBackend + 'static>(
        source: FileSource,
        backend: B,
        engine: ProximityEngine,
        throttle: FrameThrottle,
    ) -> Self {
        Self::new(source, Arc::new(Mutex::new(backend)), engine, throttle)
    }

    /// Assemble source, detector and engine from configuration.
    pub fn from_config(cfg: &DistancingConfig) -> Result<Self> {
        let source = FileSource::new(cfg.source.clone())?;
        let registry = build_registry(cfg)?;
        let detector = registry.backend_for_capability(DetectionCapability::PersonDetection)?;
        let selected = lock_backend(&detector)?.name();
        if selected != cfg.detector.backend {
            log::warn!(
                "detector backend '{}' cannot detect people, using '{}'",
                cfg.detector.backend,
                selected
            );
        }
        let palette = match cfg.palette_seed {
            Some(seed) => Palette::from_seed(seed),
            None => Palette::generate(),
        };
        let engine = ProximityEngine::with_params(palette, cfg.engine);
        let throttle = FrameThrottle::new(cfg.throttle_interval)?;
        Ok(Self::new(source, detector, engine, throttle))
    }

    /// Connect the source and warm the detector up.
    pub fn start(&mut self) -> Result<()> {
        self.source.connect()?;
        let name = {
            let mut detector = self.lock_detector()?;
            detector
                .warm_up()
                .with_context(|| format!("warm-up of detector '{}' failed", detector.name()))?;
            detector.name()
        };
        log::info!(
            "session started: detector={} throttle=1/{} group_ratio={} max_height_diff={}",
            name,
            self.throttle.interval(),
            self.engine.params().group_ratio,
            self.engine.params().max_height_diff
        );
        Ok(())
    }

    /// Read and, when the throttle allows, analyze the next frame.
    pub fn step(&mut self) -> Result<FrameOutcome> {
        let Some(frame) = self.source.next_frame()? else {
            return Ok(FrameOutcome::Exhausted);
        };
        self.frame_index += 1;
        self.stats.frames_read += 1;
        let frame_index = self.frame_index;

        if !self.throttle.should_analyze(frame_index) {
            return Ok(FrameOutcome::Skipped { frame_index });
        }

        let detections = {
            let mut detector = self.lock_detector()?;
            frame
                .run_detector(&mut *detector)
                .with_context(|| format!("detector failed on frame {}", frame_index))?
        };
        let people = detections.people();
        let analysis = self
            .engine
            .analyze(&people)
            .with_context(|| format!("frame {} rejected by grouping engine", frame_index))?;

        self.stats.frames_analyzed += 1;
        self.stats.people_seen += people.len() as u64;
        self.stats.violating_pairs += analysis.unique_pairs().count() as u64;
        log::debug!(
            "frame {}: {} people in {} groups, {} violations",
            frame_index,
            people.len(),
            analysis.groups.len(),
            analysis.violations.len()
        );

        Ok(FrameOutcome::Analyzed(AnalyzedFrame { frame, analysis }))
    }

    /// Step until the source is exhausted or `on_outcome` returns false.
    pub fn run<F>(&mut self, mut on_outcome: F) -> Result<SessionStats>
    where
        F: FnMut(&FrameOutcome) -> Result<bool>,
    {
        let started = Instant::now();
        loop {
            let outcome = self.step()?;
            let exhausted = matches!(outcome, FrameOutcome::Exhausted);
            let keep_going = on_outcome(&outcome)?;
            if exhausted || !keep_going {
                break;
            }
        }
        self.stats.elapsed += started.elapsed();
        log::info!(
            "session finished: {} frames read, {} analyzed, {} violating pairs",
            self.stats.frames_read,
            self.stats.frames_analyzed,
            self.stats.violating_pairs
        );
        Ok(self.stats.clone())
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn engine(&self) -> &ProximityEngine {
        &self.engine
    }

    /// Index of the last frame read (0 before the first read).
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    fn lock_detector(&self) -> Result<MutexGuard<'_, dyn DetectorBackend + 'static>> {
        lock_backend(&self.detector)
    }
}

fn lock_backend(backend: &SharedBackend) -> Result<MutexGuard<'_, dyn DetectorBackend + 'static>> {
    backend.lock().map_err(|_| anyhow!("detector lock poisoned"))
}

/// Backends this build can offer, with the configured one as default.
fn build_registry(cfg: &DistancingConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::demo());

    #[cfg(feature = "backend-tract")]
    if cfg.detector.backend == "tract" {
        let backend = crate::detect::TractBackend::new(
            cfg.detector.model_path(),
            cfg.detector.input_size,
        )?
        .with_confidence_threshold(cfg.detector.confidence_threshold)
        .with_nms_threshold(cfg.detector.nms_threshold);
        registry.register(backend);
    }

    registry.set_default(&cfg.detector.backend).with_context(|| {
        format!(
            "detector backend '{}' is not available (registered: {})",
            cfg.detector.backend,
            registry.list().join(", ")
        )
    })?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, StubBackend};
    use crate::ingest::FileConfig;
    use crate::palette::Palette;

    fn session(frames: u64, script: Vec<Vec<Detection>>) -> AnalysisSession {
        let source = FileSource::new(FileConfig {
            width: 4,
            height: 4,
            ..FileConfig::stub("session", frames)
        })
        .unwrap();
        let mut session = AnalysisSession::with_backend(
            source,
            StubBackend::scripted(script),
            ProximityEngine::new(Palette::from_seed(9)),
            FrameThrottle::default(),
        );
        session.start().unwrap();
        session
    }

    #[test]
    fn steps_follow_throttle_then_exhaust() {
        let mut session = session(5, Vec::new());
        let kinds: Vec<&str> = std::iter::from_fn(|| {
            Some(match session.step().unwrap() {
                FrameOutcome::Exhausted => return None,
                FrameOutcome::Skipped { .. } => "skip",
                FrameOutcome::Analyzed(_) => "analyze",
            })
        })
        .collect();
        assert_eq!(kinds, vec!["analyze", "skip", "skip", "analyze", "skip"]);
        assert!(matches!(session.step().unwrap(), FrameOutcome::Exhausted));
        assert_eq!(session.frame_index(), 5);
    }

    #[test]
    fn exhaustion_wins_over_throttle() {
        // Frame 4 would be analyzed, but the stream ends after 3.
        let mut session = session(3, Vec::new());
        for _ in 0..3 {
            session.step().unwrap();
        }
        assert!(matches!(session.step().unwrap(), FrameOutcome::Exhausted));
    }

    #[test]
    fn run_counts_violations() {
        let close_pair = vec![
            Detection::person(0, 0, 40, 100, 0.9),
            Detection::person(30, 0, 40, 100, 0.9),
        ];
        let mut session = session(8, vec![close_pair]);
        let stats = session.run(|_| Ok(true)).unwrap();

        assert_eq!(stats.frames_read, 8);
        assert_eq!(stats.frames_analyzed, 3);
        assert_eq!(stats.people_seen, 6);
        assert_eq!(stats.violating_pairs, 3);
    }

    #[test]
    fn contract_violation_stops_the_session() {
        let broken = vec![Detection::person(0, 0, 0, 10, 0.9)];
        let mut session = session(2, vec![broken]);
        let err = session.step().unwrap_err();
        assert!(format!("{:#}", err).contains("non-positive size"));
    }

    #[test]
    fn from_config_builds_stub_session() {
        let cfg = DistancingConfig::from_toml_str(
            "[source]\npath = \"stub://cfg\"\nwidth = 8\nheight = 8\nmax_frames = 4\n\n[engine]\nseed = 17\n\n[throttle]\ninterval = 2",
        )
        .unwrap();
        let mut session = AnalysisSession::from_config(&cfg).unwrap();
        session.start().unwrap();
        let stats = session.run(|_| Ok(true)).unwrap();

        assert_eq!(stats.frames_read, 4);
        assert_eq!(stats.frames_analyzed, 3);
        assert!(session
            .engine()
            .palette()
            .iter()
            .eq(Palette::from_seed(17).iter()));
    }

    #[test]
    fn from_config_rejects_unavailable_backend() {
        let cfg = DistancingConfig::from_toml_str("[detector]\nbackend = \"opencv\"").unwrap();
        let err = AnalysisSession::from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("opencv"));
    }

    #[test]
    fn callback_can_stop_early() {
        let mut session = session(100, Vec::new());
        let stats = session
            .run(|outcome| Ok(!matches!(outcome, FrameOutcome::Skipped { .. })))
            .unwrap();
        assert_eq!(stats.frames_read, 2);
    }
}
