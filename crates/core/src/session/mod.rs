//! Render sessions: one active render at a time, driven to completion on
//! the caller's thread or on a worker.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use image::RgbImage;

use crate::{
    analysis::SpectralAnalyzer,
    assets::{load_cover, CoverLoader, FileCoverLoader},
    audio::{AudioDecoder, AutoDecoder},
    config::RenderConfig,
    record::{AudioMuxer, FfmpegEncoder, FfmpegMuxer, VideoEncoder},
    visualizer::VisualizerOrchestrator,
    Result, VisualizerError,
};

/// Shared cancellation flag, checked once per frame boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Frames finished so far out of `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderProgress {
    pub frame: usize,
    pub total: usize,
}

impl RenderProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.frame as f32 / self.total as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// Video with audio written to `path`.
    Complete { path: PathBuf, frames: usize },
    /// Muxing failed; the silent video was kept at `path`.
    SilentOnly { path: PathBuf, reason: String },
}

impl RenderOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RenderOutcome::Complete { path, .. } | RenderOutcome::SilentOnly { path, .. } => path,
        }
    }
}

/// The external pieces a render talks to.
#[derive(Clone)]
struct Collaborators {
    decoder: Arc<dyn AudioDecoder>,
    cover_loader: Arc<dyn CoverLoader>,
    encoder: Arc<dyn VideoEncoder>,
    muxer: Arc<dyn AudioMuxer>,
}

/// Owns the collaborators and the single render slot.
#[derive(Clone)]
pub struct RenderManager {
    collaborators: Collaborators,
    slot: Arc<AtomicBool>,
}

impl Default for RenderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderManager {
    /// ffmpeg-backed decode, encode and mux; covers read from disk.
    pub fn new() -> Self {
        Self::with_collaborators(
            Arc::new(AutoDecoder::default()),
            Arc::new(FileCoverLoader),
            Arc::new(FfmpegEncoder::default()),
            Arc::new(FfmpegMuxer::default()),
        )
    }

    pub fn with_collaborators(
        decoder: Arc<dyn AudioDecoder>,
        cover_loader: Arc<dyn CoverLoader>,
        encoder: Arc<dyn VideoEncoder>,
        muxer: Arc<dyn AudioMuxer>,
    ) -> Self {
        Self {
            collaborators: Collaborators {
                decoder,
                cover_loader,
                encoder,
                muxer,
            },
            slot: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<RenderPermit> {
        self.slot
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| VisualizerError::Busy)?;
        Ok(RenderPermit(self.slot.clone()))
    }

    /// Renders `audio` into `output` on the calling thread.
    pub fn render_video(
        &self,
        audio: &Path,
        output: &Path,
        config: &RenderConfig,
        cancel: &CancelToken,
        progress: impl FnMut(RenderProgress),
    ) -> Result<RenderOutcome> {
        let _permit = self.acquire()?;
        self.collaborators
            .render_video(audio, output, config, cancel, progress)
    }

    /// Renders a single frame (the middle one by default) for checking
    /// settings without encoding anything.
    pub fn render_still(
        &self,
        audio: &Path,
        config: &RenderConfig,
        frame: Option<usize>,
    ) -> Result<RgbImage> {
        let _permit = self.acquire()?;
        self.collaborators.render_still(audio, config, frame)
    }

    /// Starts [`Self::render_video`] on a worker thread. Fails with `Busy`
    /// immediately if another render is active.
    pub fn spawn_render(
        &self,
        audio: PathBuf,
        output: PathBuf,
        config: RenderConfig,
    ) -> Result<RenderHandle> {
        let permit = self.acquire()?;
        let cancel = CancelToken::new();
        let progress = Arc::new(ProgressCounter::default());
        let collaborators = self.collaborators.clone();

        let worker_cancel = cancel.clone();
        let worker_progress = progress.clone();
        let thread = thread::Builder::new()
            .name("psy-visualiser-render".into())
            .spawn(move || {
                let _permit = permit;
                collaborators.render_video(&audio, &output, &config, &worker_cancel, |p| {
                    worker_progress.store(p)
                })
            })?;

        Ok(RenderHandle {
            cancel,
            progress,
            thread,
        })
    }
}

/// Releases the render slot when dropped.
struct RenderPermit(Arc<AtomicBool>);

impl Drop for RenderPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct ProgressCounter {
    frame: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressCounter {
    fn store(&self, progress: RenderProgress) {
        self.total.store(progress.total, Ordering::Relaxed);
        self.frame.store(progress.frame, Ordering::Relaxed);
    }

    fn load(&self) -> RenderProgress {
        RenderProgress {
            frame: self.frame.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}

/// A render running on a worker thread.
pub struct RenderHandle {
    cancel: CancelToken,
    progress: Arc<ProgressCounter>,
    thread: JoinHandle<Result<RenderOutcome>>,
}

impl RenderHandle {
    /// Requests a stop after the frame currently being rendered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> RenderProgress {
        self.progress.load()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<RenderOutcome> {
        self.thread
            .join()
            .map_err(|_| VisualizerError::msg("render worker panicked"))?
    }
}

impl Collaborators {
    /// Decodes and analyses `audio`, loading the cover art concurrently.
    fn prepare(
        &self,
        audio: &Path,
        config: &RenderConfig,
    ) -> Result<VisualizerOrchestrator> {
        let waveform = self.decoder.decode(audio, config.sample_rate)?;
        if waveform.is_empty() {
            return Err(VisualizerError::decoder(format!(
                "{} contains no audio samples",
                audio.display()
            )));
        }

        let (analyzer, cover) = thread::scope(|scope| {
            let analysis =
                scope.spawn(|| SpectralAnalyzer::analyze(&waveform, config.fps, config.quality()));
            let cover = load_cover(self.cover_loader.as_ref(), config.cover_path.as_deref());
            let analyzer = analysis
                .join()
                .map_err(|_| VisualizerError::msg("spectral analysis panicked"))?;
            Ok::<_, VisualizerError>((analyzer?, cover))
        })?;

        Ok(VisualizerOrchestrator::new(config, Arc::new(analyzer), cover))
    }

    fn render_video(
        &self,
        audio: &Path,
        output: &Path,
        config: &RenderConfig,
        cancel: &CancelToken,
        mut progress: impl FnMut(RenderProgress),
    ) -> Result<RenderOutcome> {
        let config = config.effective()?;
        let mut orchestrator = self.prepare(audio, &config)?;
        let timeline = *orchestrator.timeline();
        let total = timeline.frame_count();
        if total == 0 {
            return Err(VisualizerError::msg(format!(
                "{} is shorter than one frame at {} fps",
                audio.display(),
                config.fps
            )));
        }

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".psy-visualiser-")
            .suffix(".mp4")
            .tempfile_in(dir)?
            .into_temp_path();

        tracing::info!(
            frames = total,
            fps = config.fps,
            resolution = %config.resolution,
            preview = config.is_preview(),
            "rendering video"
        );

        let mut sink = self.encoder.start(
            &temp,
            config.resolution.width,
            config.resolution.height,
            config.fps,
        )?;
        let log_every = config.fps.max(1) as usize;

        for frame_index in 0..total {
            if cancel.is_cancelled() {
                tracing::info!(frame = frame_index, "render cancelled");
                sink.abort();
                temp.close()?;
                return Err(VisualizerError::Cancelled);
            }
            let frame = orchestrator.render_next();
            if let Err(err) = sink.write_frame(&frame) {
                sink.abort();
                return Err(err);
            }
            let done = frame_index + 1;
            progress(RenderProgress { frame: done, total });
            if done % log_every == 0 {
                tracing::debug!(frame = done, total, "frames rendered");
            }
        }
        sink.finish()?;

        let trim = config.preview_seconds.map(|_| timeline.render_duration());
        match self.muxer.mux(&temp, audio, output, trim) {
            Ok(()) => {
                temp.close()?;
                tracing::info!(path = %output.display(), frames = total, "render complete");
                Ok(RenderOutcome::Complete {
                    path: output.to_path_buf(),
                    frames: total,
                })
            }
            Err(err) => {
                // ffmpeg may have left a truncated file behind.
                if output.exists() {
                    if let Err(remove_err) = std::fs::remove_file(output) {
                        tracing::warn!(%remove_err, path = %output.display(), "could not remove partial output");
                    }
                }
                let silent = silent_path(output);
                tracing::warn!(%err, path = %silent.display(), "adding audio failed, keeping silent video");
                temp.persist(&silent).map_err(|err| err.error)?;
                Ok(RenderOutcome::SilentOnly {
                    path: silent,
                    reason: err.to_string(),
                })
            }
        }
    }

    fn render_still(
        &self,
        audio: &Path,
        config: &RenderConfig,
        frame: Option<usize>,
    ) -> Result<RgbImage> {
        let config = config.effective()?;
        let mut orchestrator = self.prepare(audio, &config)?;
        let total = orchestrator.timeline().frame_count();
        let last = total.checked_sub(1).ok_or_else(|| {
            VisualizerError::msg(format!("{} is shorter than one frame", audio.display()))
        })?;
        let target = frame
            .unwrap_or_else(|| orchestrator.timeline().middle_frame())
            .min(last);

        // Trail and particle state depend on every earlier frame.
        loop {
            let image = orchestrator.render_next();
            if orchestrator.next_frame() > target {
                return Ok(image);
            }
        }
    }
}

/// `<dir>/<stem>.silent.mp4` next to the requested output.
fn silent_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".into());
    output.with_file_name(format!("{stem}.silent.mp4"))
}
