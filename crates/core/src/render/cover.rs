use image::{imageops::FilterType, Rgba, RgbaImage, RgbImage};

use super::raster::{composite_over, paste, stroke_ellipse, stroke_rect};
use crate::{
    config::{CoverShape, RingShape, RotationAxis},
    palette::{hsv_to_rgb, FrequencyBand},
};

const RING_COUNT: u32 = 3;
const RING_GLOW_STEPS: u32 = 8;
const BEAT_EXPANSION_PX: f32 = 80.0;

/// Per-frame inputs for the centre piece.
#[derive(Debug, Clone, Copy)]
pub struct CoverFrame<'a> {
    pub volume: f32,
    pub beat: f32,
    /// Animation rotation in radians; drives the X/Y ring squeeze.
    pub rotation: f32,
    pub hue_offset: f32,
    pub bands: &'a [FrequencyBand],
}

/// Draws the optional cover image and the three pulsing rings around it.
#[derive(Debug, Clone)]
pub struct CoverPainter {
    cover: Option<RgbImage>,
    cover_shape: CoverShape,
    ring_shape: RingShape,
    ring_rotation: RotationAxis,
    rings_enabled: bool,
    base_size: u32,
    resized: Option<RgbImage>,
}

impl CoverPainter {
    pub fn new(
        cover: Option<RgbImage>,
        cover_shape: CoverShape,
        ring_shape: RingShape,
        ring_rotation: RotationAxis,
        rings_enabled: bool,
        base_size: u32,
    ) -> Self {
        Self {
            cover,
            cover_shape,
            ring_shape,
            ring_rotation,
            rings_enabled,
            base_size,
            resized: None,
        }
    }

    /// `min(width, height) * 0.525 * cover_size`, truncated.
    pub fn base_size_for(width: u32, height: u32, cover_size: f32) -> u32 {
        (width.min(height) as f64 * 0.525 * cover_size as f64) as u32
    }

    pub fn base_size(&self) -> u32 {
        self.base_size
    }

    pub fn draw(&mut self, canvas: &mut RgbImage, frame: &CoverFrame<'_>) {
        self.draw_cover(canvas, frame);
        if self.rings_enabled {
            self.draw_rings(canvas, frame);
        }
    }

    fn draw_cover(&mut self, canvas: &mut RgbImage, frame: &CoverFrame<'_>) {
        let Some(cover) = &self.cover else {
            return;
        };
        let (cx, cy) = centre(canvas);
        let base = self.base_size as f32;

        match self.cover_shape {
            CoverShape::Square => {
                let side = (base * 1.2) as u32;
                if side == 0 {
                    return;
                }
                let resized = cached_resize(&mut self.resized, cover, side);
                let half = (side / 2) as i64;
                paste(canvas, resized, cx - half, cy - half, |_, _| true);
            }
            CoverShape::Round => {
                let radius =
                    (base * 0.6 * (1.0 + frame.volume * 0.3 + frame.beat * 0.5)) as u32;
                if radius == 0 {
                    return;
                }
                let resized = cached_resize(&mut self.resized, cover, radius * 2);
                let r = radius as f32;
                paste(canvas, resized, cx - radius as i64, cy - radius as i64, |x, y| {
                    let (dx, dy) = (x as f32 + 0.5 - r, y as f32 + 0.5 - r);
                    dx * dx + dy * dy <= r * r
                });
            }
        }
    }

    fn draw_rings(&self, canvas: &mut RgbImage, frame: &CoverFrame<'_>) {
        let (width, height) = canvas.dimensions();
        let (cx, cy) = centre(canvas);
        let (cx, cy) = (cx as f32, cy as f32);
        let (saturation, brightness) = frame
            .bands
            .first()
            .map(|band| (band.saturation, band.brightness))
            .unwrap_or((1.0, 0.9));

        let mut layer = RgbaImage::new(width, height);
        let line_width = (3.0 + frame.volume * 4.0 + frame.beat * 6.0).trunc();
        let squeeze = 0.6 + 0.4 * (frame.rotation * 2.0).cos();

        for ring in 0..RING_COUNT {
            let base_ring = self.base_size as f32 * (0.4 + ring as f32 * 0.2);
            let size = (base_ring + frame.beat * BEAT_EXPANSION_PX + frame.volume * 0.5 * base_ring)
                .trunc();
            let (half_w, half_h) = match self.ring_rotation {
                RotationAxis::X => (size, (size * squeeze).trunc()),
                RotationAxis::Y => ((size * squeeze).trunc(), size),
                RotationAxis::None | RotationAxis::Z => (size, size),
            };
            let [r, g, b] = hsv_to_rgb(
                (frame.hue_offset + ring as f32 * 60.0).rem_euclid(360.0),
                saturation,
                brightness,
            );

            for glow in (1..=RING_GLOW_STEPS).rev() {
                let alpha = ((200.0 + frame.beat * 55.0)
                    * (1.0 - glow as f32 / RING_GLOW_STEPS as f32)) as u8;
                let grow = glow as f32 * 2.0;
                self.outline(
                    &mut layer,
                    (cx, cy),
                    (half_w + grow, half_h + grow),
                    line_width + glow as f32,
                    Rgba([r, g, b, alpha]),
                );
            }
            self.outline(
                &mut layer,
                (cx, cy),
                (half_w, half_h),
                line_width,
                Rgba([r, g, b, 255]),
            );
        }

        composite_over(canvas, &layer);
    }

    fn outline(
        &self,
        layer: &mut RgbaImage,
        (cx, cy): (f32, f32),
        (half_w, half_h): (f32, f32),
        line_width: f32,
        color: Rgba<u8>,
    ) {
        let (width, height) = layer.dimensions();
        let mut plot = |x, y| layer.put_pixel(x, y, color);
        match self.ring_shape {
            RingShape::Circle => {
                stroke_ellipse(cx, cy, half_w, half_h, line_width, width, height, &mut plot)
            }
            RingShape::Square => stroke_rect(
                cx - half_w,
                cy - half_h,
                cx + half_w,
                cy + half_h,
                line_width,
                width,
                height,
                &mut plot,
            ),
        }
    }
}

fn centre(canvas: &RgbImage) -> (i64, i64) {
    ((canvas.width() / 2) as i64, (canvas.height() / 2) as i64)
}

/// Resizes `cover` to `side x side`, reusing the previous result when the
/// size did not change.
fn cached_resize<'a>(slot: &'a mut Option<RgbImage>, cover: &RgbImage, side: u32) -> &'a RgbImage {
    let stale = slot
        .as_ref()
        .map_or(true, |image| image.dimensions() != (side, side));
    if stale {
        *slot = Some(image::imageops::resize(cover, side, side, FilterType::CatmullRom));
    }
    slot.get_or_insert_with(|| RgbImage::new(side, side))
}
