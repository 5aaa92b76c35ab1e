use std::collections::VecDeque;

use image::{Rgba, RgbaImage, RgbImage};

use super::raster::composite_over;

const FADE_HISTORY: usize = 60;
const SHADOW_OFFSET: i64 = 3;
const GLYPH_W: i64 = 5;
const GLYPH_H: i64 = 7;
const COVER_GAP_PX: i64 = 40;

/// Rolling volume average that drives the caption opacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextFade {
    history: VecDeque<f32>,
}

impl TextFade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records this frame's volume and returns the caption alpha in `[0, 1]`.
    pub fn push(&mut self, volume: f32, beat: f32) -> f32 {
        self.history.push_back(volume);
        while self.history.len() > FADE_HISTORY {
            self.history.pop_front();
        }
        let average = self.history.iter().sum::<f32>() / self.history.len() as f32;
        (0.3 + average * 0.7 + beat * 0.2).clamp(0.0, 1.0)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// White caption with a drop shadow, placed below the cover when there is
/// one and at 70% of the height otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    text: String,
    below_cover: Option<u32>,
}

impl TextOverlay {
    /// `below_cover` is the cover base size when a cover is shown.
    pub fn new(text: impl Into<String>, below_cover: Option<u32>) -> Self {
        Self {
            text: text.into(),
            below_cover,
        }
    }

    /// Draws the caption at `alpha` (see [`TextFade::push`]).
    pub fn draw(&self, canvas: &mut RgbImage, alpha: f32) {
        if self.text.is_empty() || alpha <= 0.0 {
            return;
        }

        let (width, height) = canvas.dimensions();
        let scale = ((height as f32 * 0.08) as i64 / GLYPH_H).max(1);
        let glyphs = self.text.chars().count() as i64;
        let text_width = glyphs * (GLYPH_W + 1) * scale - scale;

        let x = (width as i64 - text_width) / 2;
        let y = match self.below_cover {
            Some(base) => (height / 2) as i64 + base as i64 + COVER_GAP_PX,
            None => (height as f32 * 0.7) as i64,
        };

        let mut layer = RgbaImage::new(width, height);
        let shadow = Rgba([0, 0, 0, (alpha * 180.0) as u8]);
        let fill = Rgba([255, 255, 255, (alpha * 255.0) as u8]);
        draw_string(&mut layer, &self.text, x + SHADOW_OFFSET, y + SHADOW_OFFSET, scale, shadow);
        draw_string(&mut layer, &self.text, x, y, scale, fill);
        composite_over(canvas, &layer);
    }
}

fn draw_string(layer: &mut RgbaImage, text: &str, x: i64, y: i64, scale: i64, color: Rgba<u8>) {
    let (width, height) = (layer.width() as i64, layer.height() as i64);
    for (index, ch) in text.chars().enumerate() {
        let origin_x = x + index as i64 * (GLYPH_W + 1) * scale;
        for (row, bits) in glyph_5x7(ch).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                let px = origin_x + col * scale;
                let py = y + row as i64 * scale;
                for oy in 0..scale {
                    for ox in 0..scale {
                        let (tx, ty) = (px + ox, py + oy);
                        if tx >= 0 && ty >= 0 && tx < width && ty < height {
                            layer.put_pixel(tx as u32, ty as u32, color);
                        }
                    }
                }
            }
        }
    }
}

fn glyph_5x7(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '\'' => [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        ' ' => [0; 7],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
