use std::f32::consts::PI;

use super::raster::{fill_ellipse, fill_polygon, stroke_polyline, Layer, Point};
use crate::{
    analysis::SpectralAnalyzer,
    config::Quality,
    palette::{hsv_to_rgb, scale_rgb, FrequencyBand},
};

const AMPLITUDE_SCALE: f32 = 0.65;
const LAYER_HUE_STEP: f32 = 40.0;
const LAYER_PHASE_STEP: f32 = 0.3;
const PEAK_STRIDE: usize = 15;
const PEAK_THRESHOLD: f32 = 0.7;

/// Paints the eight mirrored band waveforms onto a fresh [`Layer`].
#[derive(Debug, Clone, Copy)]
pub struct WaveformPainter {
    width: u32,
    height: u32,
    quality: Quality,
}

impl WaveformPainter {
    pub fn new(width: u32, height: u32, quality: Quality) -> Self {
        Self {
            width,
            height,
            quality,
        }
    }

    /// Builds the blurred, unrotated waveform layer for one frame.
    pub fn paint(
        &self,
        analyzer: &SpectralAnalyzer,
        frame_index: usize,
        bands: &[FrequencyBand],
        hue_offset: f32,
    ) -> Layer {
        let mut layer = Layer::new(self.width, self.height);
        if bands.is_empty() {
            return layer;
        }

        let band_height = (self.height as usize / bands.len()) as f32;
        let points = self.quality.waveform_points();
        let last_band = (bands.len() - 1).max(1) as f32;

        for (band_index, band) in bands.iter().enumerate() {
            let values = analyzer.band_waveform(frame_index, band_index, bands, points);
            let center_y = (band_index as f32 + 0.5) * band_height;
            let base_hue = (hue_offset + band.hue_offset).rem_euclid(360.0);
            let sensitivity = 1.0 + (band_index as f32 / last_band) * 2.0;

            for layer_index in 0..2u32 {
                let hue = (base_hue + layer_index as f32 * LAYER_HUE_STEP).rem_euclid(360.0);
                let color = hsv_to_rgb(hue, band.saturation, band.brightness);
                let phase = layer_index as f32 * LAYER_PHASE_STEP;

                let (upper, lower) = self.envelopes(
                    &values,
                    center_y,
                    band_height * AMPLITUDE_SCALE * sensitivity,
                    phase,
                    hue_offset,
                );

                if layer_index == 0 && upper.len() > 1 {
                    let outline: Vec<Point> =
                        upper.iter().chain(lower.iter().rev()).copied().collect();
                    self.fill(&mut layer, &outline, color);
                }
                if upper.len() > 1 {
                    self.glow_lines(&mut layer, &[&upper[..], &lower[..]], color, 6 - layer_index);
                }

                self.peak_markers(&mut layer, &values, center_y, base_hue);
            }
        }

        layer.blurred(self.quality.blur_radius())
    }

    /// Mirrored upper/lower envelopes around `center_y`.
    fn envelopes(
        &self,
        values: &[f32],
        center_y: f32,
        gain: f32,
        phase: f32,
        hue_offset: f32,
    ) -> (Vec<Point>, Vec<Point>) {
        let len = values.len().max(1) as f32;
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let t = i as f32 / len;
                let x = (t * self.width as f32).trunc();
                let amplitude = value * gain;
                let fundamental = (t * PI * 4.0 + phase).sin() * amplitude;
                let harmonic = (t * PI * 8.0 + phase * 2.0).sin() * amplitude * 0.3;
                let drift = (t * PI * 2.0 + hue_offset * 0.02).cos() * amplitude * 0.2;
                let offset = fundamental + harmonic + drift;
                (
                    (x, (center_y + offset).trunc()),
                    (x, (center_y - offset).trunc()),
                )
            })
            .unzip()
    }

    fn fill(&self, layer: &mut Layer, outline: &[Point], color: [u8; 3]) {
        fill_polygon(outline, self.width, self.height, |x, y| layer.put(x, y, color));
    }

    /// Wide dim passes narrowing to a crisp line on top.
    fn glow_lines(&self, layer: &mut Layer, lines: &[&[Point]], color: [u8; 3], crisp_width: u32) {
        let passes = self.quality.glow_passes();
        for thickness in (1..=passes).rev() {
            let glow = scale_rgb(color, (1.0 - thickness as f32 / passes as f32) * 0.5);
            for line in lines {
                stroke_polyline(line, (thickness + 8) as f32, self.width, self.height, |x, y| {
                    layer.put(x, y, glow)
                });
            }
        }
        for line in lines {
            stroke_polyline(line, crisp_width as f32, self.width, self.height, |x, y| {
                layer.put(x, y, color)
            });
        }
    }

    /// Radial glow on every 15th point above the peak threshold.
    fn peak_markers(&self, layer: &mut Layer, values: &[f32], center_y: f32, base_hue: f32) {
        let len = values.len().max(1) as f32;
        for (i, value) in values.iter().enumerate().step_by(PEAK_STRIDE) {
            if *value <= PEAK_THRESHOLD {
                continue;
            }
            let x = (i as f32 / len * self.width as f32).trunc();
            let color = hsv_to_rgb(base_hue + i as f32 * 2.0, 1.0, 1.0);

            for radius in (3..=10u32).rev() {
                let glow = scale_rgb(color, (1.0 - radius as f32 / 10.0) * 0.5);
                let r = radius as f32;
                fill_ellipse(x, center_y, r, r, self.width, self.height, |px, py| {
                    layer.put(px, py, glow)
                });
            }
            fill_ellipse(x, center_y, 3.0, 3.0, self.width, self.height, |px, py| {
                layer.put(px, py, color)
            });
        }
    }
}
