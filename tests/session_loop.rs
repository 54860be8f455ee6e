use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use distancing_kernel::{
    annotate, AnalysisSession, BackendRegistry, DetectionCapability, DetectionResult,
    DetectorBackend, DistancingConfig, DrawCommand, FileConfig, FileSource, FrameOutcome,
    FrameThrottle, Palette, ProximityEngine, RecordingRenderer, SharedBackend,
};

fn stub_config(frames: u64) -> DistancingConfig {
    DistancingConfig::from_toml_str(&format!(
        "[source]\npath = \"stub://plaza\"\nwidth = 64\nheight = 48\nmax_frames = {}\n\n[engine]\nseed = 3\n",
        frames
    ))
    .expect("config")
}

#[test]
fn demo_crowd_flags_the_close_pair() {
    let mut session = AnalysisSession::from_config(&stub_config(8)).unwrap();
    session.start().unwrap();

    let mut analyzed = Vec::new();
    let mut skipped = Vec::new();
    let mut commands = Vec::new();
    let stats = session
        .run(|outcome| {
            match outcome {
                FrameOutcome::Analyzed(frame) => {
                    assert_eq!(frame.frame.width, 64);
                    analyzed.push(frame.frame.index);
                    let mut renderer = RecordingRenderer::new();
                    annotate(&frame.analysis, &mut renderer);
                    commands.push(renderer.commands);
                }
                FrameOutcome::Skipped { frame_index } => skipped.push(*frame_index),
                FrameOutcome::Exhausted => {}
            }
            Ok(true)
        })
        .unwrap();

    assert_eq!(analyzed, vec![1, 4, 8]);
    assert_eq!(skipped, vec![2, 3, 5, 6, 7]);
    assert_eq!(stats.frames_read, 8);
    assert_eq!(stats.people_seen, 6);
    assert_eq!(stats.violating_pairs, 1);

    // Frame 1: one pair drawn in both orders, a line and two markers each.
    assert_eq!(commands[0].len(), 6);
    let color = Palette::from_seed(3).color(1);
    assert!(commands[0].iter().all(|cmd| match cmd {
        DrawCommand::Line { color: c, .. } | DrawCommand::Circle { color: c, .. } => *c == color,
    }));
    assert!(commands[1].is_empty());
    assert!(commands[2].is_empty());
}

struct FailingBackend;

impl DetectorBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::PersonDetection)
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        Err(anyhow!("model not loaded"))
    }
}

#[test]
fn detector_errors_name_the_frame() {
    let mut registry = BackendRegistry::new();
    registry.register(FailingBackend);
    let backend: SharedBackend = registry.get("failing").unwrap();

    let source = FileSource::new(FileConfig::stub("failing", 3)).unwrap();
    let mut session = AnalysisSession::new(
        source,
        backend,
        ProximityEngine::new(Palette::from_seed(1)),
        FrameThrottle::default(),
    );
    session.start().unwrap();

    let err = session.step().unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("detector failed on frame 1"));
    assert!(chain.contains("model not loaded"));
}

#[test]
fn every_frame_analyzed_with_interval_one() {
    let mut cfg = stub_config(5);
    cfg.throttle_interval = 1;
    let mut session = AnalysisSession::from_config(&cfg).unwrap();
    session.start().unwrap();
    let stats = session.run(|_| Ok(true)).unwrap();
    assert_eq!(stats.frames_analyzed, 5);
    assert!(stats.frames_per_second() >= 0.0);
}

#[test]
fn shared_backend_is_visible_to_the_session() {
    let backend: SharedBackend = Arc::new(Mutex::new(distancing_kernel::StubBackend::demo()));
    let source = FileSource::new(FileConfig::stub("shared", 1)).unwrap();
    let mut session = AnalysisSession::new(
        source,
        Arc::clone(&backend),
        ProximityEngine::new(Palette::from_seed(1)),
        FrameThrottle::default(),
    );
    session.start().unwrap();
    session.run(|_| Ok(true)).unwrap();

    let mut guard = backend.lock().unwrap();
    // The session consumed the first scripted frame; the next call gets the second.
    let next = guard.detect(&[], 0, 0).unwrap();
    assert_eq!(next.people().len(), 2);
}
