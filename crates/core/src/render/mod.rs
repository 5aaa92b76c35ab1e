//! Drawing stages that make up one frame.
//!
//! Each stage writes straight into the caller's canvas; per-frame animation
//! values (volume, beat, rotation, hue) are passed in so the compositor only
//! carries what must persist between frames: the particle pool and the
//! resized cover cache.

pub mod cover;
pub mod raster;
pub mod starfield;
pub mod text;
pub mod transform;
pub mod waveform;

use image::RgbImage;

pub use cover::{CoverFrame, CoverPainter};
pub use raster::Layer;
pub use starfield::{Star, Starfield};
pub use text::{TextFade, TextOverlay};
pub use waveform::WaveformPainter;

use crate::{
    analysis::SpectralAnalyzer,
    config::{RenderConfig, RotationAxis, StarfieldRotation},
    palette::FrequencyBand,
};

#[derive(Debug, Clone)]
pub struct FrameCompositor {
    starfield: Option<Starfield>,
    starfield_rotation: StarfieldRotation,
    waveform: WaveformPainter,
    waveform_rotation: RotationAxis,
    cover: CoverPainter,
    text: Option<TextOverlay>,
}

impl FrameCompositor {
    /// Builds every stage for an already-effective `config`.
    pub fn new(config: &RenderConfig, cover: Option<RgbImage>) -> Self {
        let (width, height) = (config.resolution.width, config.resolution.height);
        let quality = config.quality();
        let base_size = CoverPainter::base_size_for(width, height, config.cover_size);

        let starfield = (!config.disable_starfield)
            .then(|| Starfield::new(width, height, quality.star_count(), config.star_seed));
        let text = config
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(|text| TextOverlay::new(text, cover.as_ref().map(|_| base_size)));

        Self {
            starfield,
            starfield_rotation: config.starfield_rotation,
            waveform: WaveformPainter::new(width, height, quality),
            waveform_rotation: config.waveform_rotation,
            cover: CoverPainter::new(
                cover,
                config.cover_shape,
                config.ring_shape,
                config.ring_rotation,
                !config.disable_rings,
                base_size,
            ),
            text,
        }
    }

    pub fn starfield(&self) -> Option<&Starfield> {
        self.starfield.as_ref()
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn base_size(&self) -> u32 {
        self.cover.base_size()
    }

    /// Advances the particles and draws them; no-op when disabled.
    pub fn draw_starfield(&mut self, canvas: &mut RgbImage, volume: f32) {
        if let Some(starfield) = &mut self.starfield {
            starfield.update(volume, self.starfield_rotation);
            starfield.draw(canvas);
        }
    }

    /// The waveform layer for one frame, blurred and rotated but not yet
    /// composited.
    pub fn waveform_layer(
        &self,
        analyzer: &SpectralAnalyzer,
        frame_index: usize,
        bands: &[FrequencyBand],
        hue_offset: f32,
        rotation: f32,
    ) -> Layer {
        let layer = self.waveform.paint(analyzer, frame_index, bands, hue_offset);
        transform::apply_rotation(&layer, self.waveform_rotation, rotation)
    }

    pub fn draw_waveforms(
        &self,
        canvas: &mut RgbImage,
        analyzer: &SpectralAnalyzer,
        frame_index: usize,
        bands: &[FrequencyBand],
        hue_offset: f32,
        rotation: f32,
    ) {
        self.waveform_layer(analyzer, frame_index, bands, hue_offset, rotation)
            .cutout_onto(canvas);
    }

    pub fn draw_cover_and_rings(&mut self, canvas: &mut RgbImage, frame: &CoverFrame<'_>) {
        self.cover.draw(canvas, frame);
    }

    pub fn draw_text(&self, canvas: &mut RgbImage, alpha: f32) {
        if let Some(text) = &self.text {
            text.draw(canvas, alpha);
        }
    }
}
