//! Core library for the Psy Visualiser.
//!
//! Audio is decoded once and analysed into a spectrogram up front; the
//! [`VisualizerOrchestrator`] then walks the track frame by frame, drawing a
//! starfield, eight mirrored band waveforms, cover art with pulsing rings and
//! an optional caption onto a decaying trail buffer. [`RenderManager`] wraps
//! that loop with decoding, video encoding and audio muxing.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod beat;
pub mod config;
pub mod error;
pub mod palette;
pub mod record;
pub mod render;
pub mod session;
pub mod timeline;
pub mod visualizer;

pub use analysis::{SpectralAnalyzer, Spectrogram};
pub use assets::{load_cover, CoverLoader, FileCoverLoader};
pub use audio::{AudioDecoder, AutoDecoder, FfmpegDecoder, WavDecoder, Waveform};
pub use beat::BeatDetector;
pub use config::{
    CoverShape, Quality, RenderConfig, Resolution, RingShape, RotationAxis, StarfieldRotation,
};
pub use error::{Result, VisualizerError};
pub use palette::{ColorPalette, FrequencyBand, Palette};
pub use record::{AudioMuxer, FfmpegEncoder, FfmpegMuxer, FrameSink, VideoEncoder};
pub use render::FrameCompositor;
pub use session::{CancelToken, RenderHandle, RenderManager, RenderOutcome, RenderProgress};
pub use timeline::RenderTimeline;
pub use visualizer::{AnimationState, FrameSignals, VisualizerOrchestrator};
