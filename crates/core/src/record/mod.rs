//! Video encode and audio mux collaborators.
//!
//! Frames leave the renderer as raw RGB and are piped into an external
//! `ffmpeg` process; the soundtrack is attached in a second, copy-only pass.

use std::{
    io::{self, Write},
    path::Path,
    process::{Child, ChildStdin, Command, Stdio},
};

use image::RgbImage;

use crate::{Result, VisualizerError};

const DEFAULT_PROGRAM: &str = "ffmpeg";
const EVEN_PAD_FILTER: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

/// Receives finished frames in order.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flushes and closes the container.
    fn finish(self: Box<Self>) -> Result<()>;

    /// Stops without producing a usable file. The caller removes the path.
    fn abort(self: Box<Self>);
}

/// Opens a silent video container at `path`.
pub trait VideoEncoder: Send + Sync {
    fn start(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameSink>>;
}

/// Attaches the original soundtrack to a silent video.
pub trait AudioMuxer: Send + Sync {
    /// `duration` trims the result (previews).
    fn mux(&self, video: &Path, audio: &Path, output: &Path, duration: Option<f32>) -> Result<()>;
}

/// H.264 encoder fed with `rgb24` frames over stdin.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }
}

impl FfmpegEncoder {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, path: &Path, width: u32, height: u32, fps: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-video_size")
            .arg(format!("{width}x{height}"))
            .arg("-framerate")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-")
            .arg("-an")
            // yuv420p needs even sides; odd canvases get one black row/column.
            .arg("-vf")
            .arg(EVEN_PAD_FILTER)
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-f")
            .arg("mp4")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn start(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameSink>> {
        let mut child = self
            .command(path, width, height, fps)
            .spawn()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => VisualizerError::Encoder(
                    "ffmpeg is required to encode video (install ffmpeg and retry)".into(),
                ),
                _ => VisualizerError::Encoder(format!("failed to run ffmpeg: {err}")),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            VisualizerError::Encoder("failed to open ffmpeg stdin for rawvideo input".into())
        })?;
        tracing::debug!(path = %path.display(), width, height, fps, "video encoder started");

        Ok(Box::new(FfmpegSink {
            child: Some(child),
            stdin: Some(stdin),
            width,
            height,
            frames: 0,
        }))
    }
}

struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frames: usize,
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(VisualizerError::Encoder(format!(
                "frame is {}x{} but the encoder was opened at {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VisualizerError::Encoder("encoder input already closed".into()))?;
        stdin.write_all(frame.as_raw()).map_err(|err| {
            VisualizerError::Encoder(format!("write frame {} to ffmpeg: {err}", self.frames))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() {
            return Err(VisualizerError::Encoder(format!(
                "ffmpeg exited with status {status} after {} frames",
                self.frames
            )));
        }
        tracing::debug!(frames = self.frames, "video encoder finished");
        Ok(())
    }

    fn abort(mut self: Box<Self>) {
        self.kill();
    }
}

impl FfmpegSink {
    fn kill(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Copies the video stream and encodes the audio as AAC.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: String,
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }
}

impl FfmpegMuxer {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, video: &Path, audio: &Path, output: &Path, duration: Option<f32>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio);
        if let Some(seconds) = duration {
            cmd.arg("-t").arg(format!("{seconds:.6}"));
        }
        cmd.arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .arg("-c:v")
            .arg("copy")
            .arg("-c:a")
            .arg("aac")
            .arg("-shortest")
            .arg("-y")
            .arg(output)
            .stdin(Stdio::null());
        cmd
    }
}

impl AudioMuxer for FfmpegMuxer {
    fn mux(&self, video: &Path, audio: &Path, output: &Path, duration: Option<f32>) -> Result<()> {
        let result = self
            .command(video, audio, output, duration)
            .output()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => {
                    VisualizerError::Mux("ffmpeg is required to add the audio track".into())
                }
                _ => VisualizerError::Mux(format!("failed to run ffmpeg: {err}")),
            })?;
        if !result.status.success() {
            return Err(VisualizerError::Mux(format!(
                "ffmpeg exited with status {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}
