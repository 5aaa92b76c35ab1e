use std::sync::Arc;

use image::RgbImage;

use crate::{
    analysis::SpectralAnalyzer,
    beat::BeatDetector,
    config::RenderConfig,
    palette::FrequencyBand,
    render::{raster::scale_pixels, CoverFrame, FrameCompositor, TextFade},
    timeline::RenderTimeline,
    Result, VisualizerError,
};

const TRAIL_DECAY: f32 = 0.85;
const ROTATION_BASE_STEP: f32 = 0.001;
const ROTATION_VOLUME_STEP: f32 = 0.015;
const HUE_BASE_STEP: f32 = 0.5;

/// Animation values carried from one frame to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationState {
    /// Radians; only ever increases.
    pub rotation: f32,
    /// Tracked alongside `rotation` but not drawn.
    pub cover_rotation: f32,
    /// Degrees in `[0, 360)`.
    pub hue_offset: f32,
    pub text_fade: TextFade,
}

impl AnimationState {
    pub fn advance(&mut self, volume: f32) {
        let step = ROTATION_BASE_STEP + volume * ROTATION_VOLUME_STEP;
        self.rotation += step;
        self.cover_rotation -= step * 2.0;
        self.hue_offset = (self.hue_offset + HUE_BASE_STEP + volume).rem_euclid(360.0);
    }
}

/// Per-frame values the orchestrator derived, kept for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSignals {
    pub frame_index: usize,
    pub volume: f32,
    pub beat: f32,
    pub fade: Option<f32>,
}

/// Owns every piece of mutable render state and turns frame indices into
/// finished images, strictly in order.
#[derive(Debug)]
pub struct VisualizerOrchestrator {
    analyzer: Arc<SpectralAnalyzer>,
    bands: Vec<FrequencyBand>,
    beat: BeatDetector,
    state: AnimationState,
    compositor: FrameCompositor,
    timeline: RenderTimeline,
    trail: Option<RgbImage>,
    width: u32,
    height: u32,
    next_frame: usize,
    last: Option<FrameSignals>,
}

impl VisualizerOrchestrator {
    /// `config` must already be effective (see [`RenderConfig::effective`]).
    pub fn new(
        config: &RenderConfig,
        analyzer: Arc<SpectralAnalyzer>,
        cover: Option<RgbImage>,
    ) -> Self {
        let timeline =
            RenderTimeline::new(analyzer.duration_seconds(), config.fps, config.preview_seconds);
        Self {
            bands: config.palette.bands(),
            beat: BeatDetector::new(),
            state: AnimationState::default(),
            compositor: FrameCompositor::new(config, cover),
            timeline,
            trail: None,
            width: config.resolution.width,
            height: config.resolution.height,
            next_frame: 0,
            last: None,
            analyzer,
        }
    }

    pub fn timeline(&self) -> &RenderTimeline {
        &self.timeline
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn last_signals(&self) -> Option<FrameSignals> {
        self.last
    }

    /// Index of the next frame [`Self::render_next`] will produce.
    pub fn next_frame(&self) -> usize {
        self.next_frame
    }

    pub fn is_finished(&self) -> bool {
        self.next_frame >= self.timeline.frame_count()
    }

    /// Mean band level at `frame_index` relative to the loudest bin of the
    /// track; 0 for silence.
    pub fn volume_intensity(&self, frame_index: usize) -> f32 {
        let values = self.analyzer.band_values(frame_index, &self.bands);
        if values.is_empty() {
            return 0.0;
        }
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        mean / self.analyzer.normalizer()
    }

    pub fn render_next(&mut self) -> RgbImage {
        let frame_index = self.next_frame;
        self.render_frame(frame_index)
    }

    /// Renders `frame_index`, which must not precede a frame already
    /// rendered.
    pub fn try_render_frame(&mut self, frame_index: usize) -> Result<RgbImage> {
        if frame_index < self.next_frame {
            return Err(VisualizerError::msg(format!(
                "frame {frame_index} was requested after frame {} had already been rendered",
                self.next_frame - 1
            )));
        }
        Ok(self.render_frame(frame_index))
    }

    fn render_frame(&mut self, frame_index: usize) -> RgbImage {
        let volume = self.volume_intensity(frame_index);
        let beat = self.beat.detect(&self.analyzer, frame_index);
        self.state.advance(volume);

        let mut image = decay_trail(self.trail.take(), self.width, self.height);

        self.compositor.draw_starfield(&mut image, volume);
        self.compositor.draw_waveforms(
            &mut image,
            &self.analyzer,
            frame_index,
            &self.bands,
            self.state.hue_offset,
            self.state.rotation,
        );
        self.compositor.draw_cover_and_rings(
            &mut image,
            &CoverFrame {
                volume,
                beat,
                rotation: self.state.rotation,
                hue_offset: self.state.hue_offset,
                bands: &self.bands,
            },
        );
        if self.compositor.has_text() {
            let alpha = self.state.text_fade.push(volume, beat);
            self.compositor.draw_text(&mut image, alpha);
        }

        self.trail = Some(image.clone());

        let fade = self.timeline.fade_amount(frame_index);
        if let Some(amount) = fade {
            scale_pixels(&mut image, 1.0 - amount);
        }

        self.next_frame = frame_index + 1;
        self.last = Some(FrameSignals {
            frame_index,
            volume,
            beat,
            fade,
        });
        image
    }
}

/// Multiplies the previous frame by the trail decay, or starts from black.
pub(crate) fn decay_trail(trail: Option<RgbImage>, width: u32, height: u32) -> RgbImage {
    match trail {
        Some(mut image) if image.dimensions() == (width, height) => {
            scale_pixels(&mut image, TRAIL_DECAY);
            image
        }
        _ => RgbImage::new(width, height),
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::{audio::Waveform, config::Resolution, render::raster::brightness};

    fn analyzer(samples: Vec<f32>, fps: u32) -> Arc<SpectralAnalyzer> {
        let waveform = Waveform::from_raw(samples, 8_000).unwrap();
        Arc::new(SpectralAnalyzer::analyze(&waveform, fps, crate::config::Quality::Reduced).unwrap())
    }

    fn chirp(seconds: f32) -> Vec<f32> {
        let len = (seconds * 8_000.0) as usize;
        (0..len)
            .map(|i| {
                let t = i as f32 / 8_000.0;
                (2.0 * PI * (60.0 + 400.0 * t) * t).sin() * (t * 3.0).sin().abs()
            })
            .collect()
    }

    fn config() -> RenderConfig {
        RenderConfig {
            resolution: Resolution::new(96, 64),
            fps: 10,
            sample_rate: 8_000,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn hue_and_rotation_advance_per_frame() {
        let mut state = AnimationState::default();
        state.advance(0.0);
        assert!((state.rotation - 0.001).abs() < 1e-7);
        assert!((state.cover_rotation + 0.002).abs() < 1e-7);
        assert!((state.hue_offset - 0.5).abs() < 1e-6);

        for _ in 0..5_000 {
            state.advance(1.0);
            assert!((0.0..360.0).contains(&state.hue_offset));
        }
    }

    #[test]
    fn pure_decay_never_brightens() {
        let mut trail = RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 255]));
        let mut previous = brightness(&trail);
        for _ in 0..40 {
            trail = decay_trail(Some(trail), 8, 8);
            let current = brightness(&trail);
            assert!(current <= previous);
            previous = current;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn mismatched_trail_restarts_from_black() {
        let trail = RgbImage::from_pixel(4, 4, image::Rgb([200, 200, 200]));
        let fresh = decay_trail(Some(trail), 8, 8);
        assert_eq!(fresh.dimensions(), (8, 8));
        assert_eq!(brightness(&fresh), 0);
    }

    #[test]
    fn silent_track_has_zero_volume() {
        let mut orchestrator =
            VisualizerOrchestrator::new(&config(), analyzer(vec![0.0; 16_000], 10), None);
        for _ in 0..5 {
            orchestrator.render_next();
            let signals = orchestrator.last_signals().unwrap();
            assert_eq!(signals.volume, 0.0);
            assert_eq!(signals.beat, 0.0);
        }
    }

    #[test]
    fn same_seed_renders_identical_frames() {
        let shared = analyzer(chirp(2.0), 10);
        let mut a = VisualizerOrchestrator::new(&config(), shared.clone(), None);
        let mut b = VisualizerOrchestrator::new(&config(), shared, None);
        for _ in 0..8 {
            assert_eq!(a.render_next(), b.render_next());
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn frames_cannot_be_rendered_backwards() {
        let mut orchestrator = VisualizerOrchestrator::new(&config(), analyzer(chirp(1.0), 10), None);
        orchestrator.try_render_frame(3).unwrap();
        assert_eq!(orchestrator.next_frame(), 4);
        assert!(orchestrator.try_render_frame(2).is_err());
    }

    #[test]
    fn render_count_follows_timeline() {
        let mut orchestrator = VisualizerOrchestrator::new(&config(), analyzer(chirp(1.5), 10), None);
        assert_eq!(orchestrator.timeline().frame_count(), 15);
        let mut frames = 0;
        while !orchestrator.is_finished() {
            let frame = orchestrator.render_next();
            assert_eq!(frame.dimensions(), (96, 64));
            frames += 1;
        }
        assert_eq!(frames, 15);
        // fade covers the final 20 frames, so every frame fades here
        assert!(orchestrator.last_signals().unwrap().fade.unwrap() > 0.9);
    }
}
