use std::{
    f32::consts::PI,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use image::RgbImage;
use psy_visualiser_core::{
    AudioDecoder, AudioMuxer, CancelToken, FileCoverLoader, FrameSink, RenderConfig,
    RenderManager, RenderOutcome, RenderProgress, Resolution, Result, VideoEncoder,
    VisualizerError, Waveform,
};

const SAMPLE_RATE: u32 = 8_000;

/// Produces a chirp of fixed length whatever the path.
struct ToneDecoder {
    seconds: f32,
}

impl AudioDecoder for ToneDecoder {
    fn decode(&self, _path: &Path, _target_rate: u32) -> Result<Waveform> {
        let len = (self.seconds * SAMPLE_RATE as f32) as usize;
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (2.0 * PI * (150.0 + 600.0 * t) * t).sin()
            })
            .collect();
        Waveform::from_raw(samples, SAMPLE_RATE)
    }
}

#[derive(Default)]
struct Recorded {
    opened: Mutex<Option<(u32, u32, u32)>>,
    frames: Mutex<Vec<(u32, u32)>>,
    aborted: AtomicBool,
    trims: Mutex<Vec<Option<f32>>>,
}

struct MemoryEncoder {
    recorded: Arc<Recorded>,
    frame_delay: Duration,
}

struct MemorySink {
    path: std::path::PathBuf,
    recorded: Arc<Recorded>,
    frame_delay: Duration,
}

impl VideoEncoder for MemoryEncoder {
    fn start(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameSink>> {
        *self.recorded.opened.lock().unwrap() = Some((width, height, fps));
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            recorded: self.recorded.clone(),
            frame_delay: self.frame_delay,
        }))
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if !self.frame_delay.is_zero() {
            thread::sleep(self.frame_delay);
        }
        self.recorded.frames.lock().unwrap().push(frame.dimensions());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let frames = self.recorded.frames.lock().unwrap().len();
        fs::write(&self.path, format!("{frames} frames"))?;
        Ok(())
    }

    fn abort(self: Box<Self>) {
        self.recorded.aborted.store(true, Ordering::SeqCst);
    }
}

struct CopyMuxer {
    recorded: Arc<Recorded>,
    fail: bool,
}

impl AudioMuxer for CopyMuxer {
    fn mux(&self, video: &Path, _audio: &Path, output: &Path, duration: Option<f32>) -> Result<()> {
        self.recorded.trims.lock().unwrap().push(duration);
        if self.fail {
            fs::write(output, b"partial")?;
            return Err(VisualizerError::Mux("no audio stream".into()));
        }
        fs::copy(video, output)?;
        Ok(())
    }
}

struct Harness {
    manager: RenderManager,
    recorded: Arc<Recorded>,
}

fn harness(seconds: f32, mux_fails: bool, frame_delay: Duration) -> Harness {
    let recorded = Arc::new(Recorded::default());
    let manager = RenderManager::with_collaborators(
        Arc::new(ToneDecoder { seconds }),
        Arc::new(FileCoverLoader),
        Arc::new(MemoryEncoder {
            recorded: recorded.clone(),
            frame_delay,
        }),
        Arc::new(CopyMuxer {
            recorded: recorded.clone(),
            fail: mux_fails,
        }),
    );
    Harness { manager, recorded }
}

fn small_config() -> RenderConfig {
    RenderConfig {
        resolution: Resolution::new(32, 18),
        fps: 10,
        text: Some("TEST".into()),
        ..RenderConfig::default()
    }
}

fn temp_leftovers(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".psy-visualiser-"))
        .collect()
}

#[test]
fn complete_render_writes_output_and_removes_temp() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let Harness { manager, recorded } = harness(1.5, false, Duration::ZERO);

    let mut updates = Vec::new();
    let outcome = manager
        .render_video(
            &dir.path().join("song.wav"),
            &output,
            &small_config(),
            &CancelToken::new(),
            |progress| updates.push(progress),
        )
        .unwrap();

    assert_eq!(
        outcome,
        RenderOutcome::Complete {
            path: output.clone(),
            frames: 15
        }
    );
    assert_eq!(fs::read_to_string(&output).unwrap(), "15 frames");
    assert_eq!(*recorded.opened.lock().unwrap(), Some((32, 18, 10)));
    assert!(recorded.frames.lock().unwrap().iter().all(|dims| *dims == (32, 18)));
    assert_eq!(*recorded.trims.lock().unwrap(), vec![None]);
    assert_eq!(updates.len(), 15);
    assert_eq!(updates.last(), Some(&RenderProgress { frame: 15, total: 15 }));
    assert!(temp_leftovers(dir.path()).is_empty());
    assert!(!manager.is_busy());
}

#[test]
fn mux_failure_keeps_the_silent_video() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let Harness { manager, .. } = harness(1.0, true, Duration::ZERO);

    let outcome = manager
        .render_video(
            &dir.path().join("song.wav"),
            &output,
            &small_config(),
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

    let silent = dir.path().join("clip.silent.mp4");
    match &outcome {
        RenderOutcome::SilentOnly { path, reason } => {
            assert_eq!(path, &silent);
            assert!(reason.contains("no audio stream"));
        }
        other => panic!("expected a silent-only outcome, got {other:?}"),
    }
    assert_eq!(outcome.path(), silent.as_path());
    assert!(silent.exists());
    assert!(!output.exists());
    assert!(temp_leftovers(dir.path()).is_empty());
}

#[test]
fn cancelled_render_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let Harness { manager, recorded } = harness(1.0, false, Duration::ZERO);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = manager
        .render_video(&dir.path().join("song.wav"), &output, &small_config(), &cancel, |_| {})
        .unwrap_err();

    assert!(matches!(err, VisualizerError::Cancelled));
    assert!(recorded.aborted.load(Ordering::SeqCst));
    assert!(recorded.frames.lock().unwrap().is_empty());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(!manager.is_busy());
}

#[test]
fn preview_halves_resolution_and_trims_audio() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("preview.mp4");
    let Harness { manager, recorded } = harness(1.5, false, Duration::ZERO);
    let config = RenderConfig {
        resolution: Resolution::new(64, 36),
        preview_seconds: Some(1.0),
        ..RenderConfig::default()
    };

    let outcome = manager
        .render_video(&dir.path().join("song.wav"), &output, &config, &CancelToken::new(), |_| {})
        .unwrap();

    assert!(matches!(outcome, RenderOutcome::Complete { frames: 15, .. }));
    assert_eq!(*recorded.opened.lock().unwrap(), Some((32, 18, 15)));
    assert_eq!(*recorded.trims.lock().unwrap(), vec![Some(1.0)]);
}

#[test]
fn only_one_render_runs_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("song.wav");
    let Harness { manager, .. } = harness(3.0, false, Duration::from_millis(20));

    let handle = manager
        .spawn_render(audio.clone(), dir.path().join("clip.mp4"), small_config())
        .unwrap();
    assert!(manager.is_busy());
    assert!(matches!(
        manager.render_still(&audio, &small_config(), None),
        Err(VisualizerError::Busy)
    ));
    assert!(matches!(
        manager.spawn_render(audio.clone(), dir.path().join("other.mp4"), small_config()),
        Err(VisualizerError::Busy)
    ));

    handle.cancel();
    assert!(handle.cancel_token().is_cancelled());
    assert!(matches!(handle.join(), Err(VisualizerError::Cancelled)));
    assert!(!manager.is_busy());
    assert!(manager.render_still(&audio, &small_config(), Some(0)).is_ok());
}

#[test]
fn worker_render_reports_progress() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let Harness { manager, .. } = harness(1.0, false, Duration::ZERO);

    let handle = manager
        .spawn_render(dir.path().join("song.wav"), output.clone(), small_config())
        .unwrap();
    while !handle.is_finished() {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.progress(), RenderProgress { frame: 10, total: 10 });
    assert_eq!(handle.join().unwrap().path(), output.as_path());
    assert!(!manager.is_busy());
}

#[test]
fn still_frames_use_effective_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("song.wav");
    let Harness { manager, recorded } = harness(1.0, false, Duration::ZERO);

    let still = manager
        .render_still(&audio, &small_config(), Some(10_000))
        .unwrap();
    assert_eq!(still.dimensions(), (32, 18));

    let preview = RenderConfig {
        resolution: Resolution::new(40, 24),
        preview_seconds: Some(0.5),
        ..RenderConfig::default()
    };
    let still = manager.render_still(&audio, &preview, None).unwrap();
    assert_eq!(still.dimensions(), (20, 12));

    assert!(recorded.opened.lock().unwrap().is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn empty_audio_is_rejected() {
    struct Silence;
    impl AudioDecoder for Silence {
        fn decode(&self, _path: &Path, target_rate: u32) -> Result<Waveform> {
            Waveform::new(Vec::new(), target_rate)
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let recorded = Arc::new(Recorded::default());
    let manager = RenderManager::with_collaborators(
        Arc::new(Silence),
        Arc::new(FileCoverLoader),
        Arc::new(MemoryEncoder {
            recorded: recorded.clone(),
            frame_delay: Duration::ZERO,
        }),
        Arc::new(CopyMuxer {
            recorded,
            fail: false,
        }),
    );

    let err = manager
        .render_video(
            &dir.path().join("empty.wav"),
            &dir.path().join("clip.mp4"),
            &small_config(),
            &CancelToken::new(),
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, VisualizerError::Decoder(_)));
    assert!(!manager.is_busy());
}

#[test]
fn missing_cover_falls_back_to_no_cover() {
    let dir = tempfile::tempdir().unwrap();
    let Harness { manager, .. } = harness(1.0, false, Duration::ZERO);
    let config = RenderConfig {
        cover_path: Some(dir.path().join("missing.png")),
        ..small_config()
    };

    let still = manager
        .render_still(&dir.path().join("song.wav"), &config, Some(3))
        .unwrap();
    assert_eq!(still.dimensions(), (32, 18));
}
