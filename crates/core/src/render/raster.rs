//! Scan-conversion helpers shared by the painters.
//!
//! Every routine clips against `width x height` and reports covered pixels
//! through a `plot(x, y)` callback, so the same rasterizer feeds RGB layers,
//! RGBA overlays and coverage masks.

use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};

pub type Point = (f32, f32);

/// Even-odd scanline fill sampled at pixel centres.
pub fn fill_polygon(points: &[Point], width: u32, height: u32, mut plot: impl FnMut(u32, u32)) {
    if points.len() < 3 || width == 0 || height == 0 {
        return;
    }

    let (min_y, max_y) = points
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
    let y_start = (min_y.floor().max(0.0)) as u32;
    let y_end = (max_y.ceil().min(height as f32 - 1.0)).max(-1.0) as i64;

    let mut crossings: Vec<f32> = Vec::with_capacity(points.len());
    for y in y_start as i64..=y_end {
        let sample_y = y as f32 + 0.5;
        crossings.clear();
        for i in 0..points.len() {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % points.len()];
            if (y0 <= sample_y && y1 > sample_y) || (y1 <= sample_y && y0 > sample_y) {
                let t = (sample_y - y0) / (y1 - y0);
                crossings.push(x0 + t * (x1 - x0));
            }
        }
        crossings.sort_by(f32::total_cmp);

        for span in crossings.chunks_exact(2) {
            let x_start = (span[0] - 0.5).ceil().max(0.0);
            let x_end = (span[1] - 0.5).floor().min(width as f32 - 1.0);
            if x_end < x_start {
                continue;
            }
            for x in x_start as u32..=x_end as u32 {
                plot(x, y as u32);
            }
        }
    }
}

/// Thick open polyline, one quad per segment.
pub fn stroke_polyline(
    points: &[Point],
    line_width: f32,
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32),
) {
    let half = (line_width * 0.5).max(0.5);
    for segment in points.windows(2) {
        let (x0, y0) = segment[0];
        let (x1, y1) = segment[1];
        let (dx, dy) = (x1 - x0, y1 - y0);
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f32::EPSILON {
            continue;
        }
        let (nx, ny) = (-dy / len * half, dx / len * half);
        let quad = [
            (x0 + nx, y0 + ny),
            (x1 + nx, y1 + ny),
            (x1 - nx, y1 - ny),
            (x0 - nx, y0 - ny),
        ];
        fill_polygon(&quad, width, height, &mut plot);
    }
}

/// Filled axis-aligned ellipse.
pub fn fill_ellipse(
    cx: f32,
    cy: f32,
    rx: f32,
    ry: f32,
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32),
) {
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }
    for_each_in_box(cx - rx, cy - ry, cx + rx, cy + ry, width, height, |x, y| {
        let (px, py) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
        if inside_ellipse(px, py, rx, ry) {
            plot(x, y);
        }
    });
}

/// Ellipse outline of `line_width` pixels drawn inward from `(rx, ry)`.
#[allow(clippy::too_many_arguments)]
pub fn stroke_ellipse(
    cx: f32,
    cy: f32,
    rx: f32,
    ry: f32,
    line_width: f32,
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32),
) {
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }
    let (inner_rx, inner_ry) = (rx - line_width, ry - line_width);
    for_each_in_box(cx - rx, cy - ry, cx + rx, cy + ry, width, height, |x, y| {
        let (px, py) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
        if !inside_ellipse(px, py, rx, ry) {
            return;
        }
        if inner_rx > 0.0 && inner_ry > 0.0 && inside_ellipse(px, py, inner_rx, inner_ry) {
            return;
        }
        plot(x, y);
    });
}

/// Rectangle outline of `line_width` pixels drawn inward from the box edge.
#[allow(clippy::too_many_arguments)]
pub fn stroke_rect(
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    line_width: f32,
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32),
) {
    let (ix0, iy0, ix1, iy1) = (x0 + line_width, y0 + line_width, x1 - line_width, y1 - line_width);
    for_each_in_box(x0, y0, x1, y1, width, height, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        let inside_inner = ix0 < ix1 && iy0 < iy1 && px > ix0 && px < ix1 && py > iy0 && py < iy1;
        if !inside_inner {
            plot(x, y);
        }
    });
}

fn inside_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> bool {
    (px * px) / (rx * rx) + (py * py) / (ry * ry) <= 1.0
}

fn for_each_in_box(
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    width: u32,
    height: u32,
    mut visit: impl FnMut(u32, u32),
) {
    if width == 0 || height == 0 || x1 < 0.0 || y1 < 0.0 {
        return;
    }
    let xs = x0.floor().max(0.0) as u32;
    let ys = y0.floor().max(0.0) as u32;
    let xe = (x1.ceil() as u32).min(width - 1);
    let ye = (y1.ceil() as u32).min(height - 1);
    for y in ys..=ye {
        for x in xs..=xe {
            visit(x, y);
        }
    }
}

/// Multiplies every channel by `factor`, truncating like an integer cast.
pub fn scale_pixels(image: &mut RgbImage, factor: f32) {
    for channel in image.iter_mut() {
        *channel = (*channel as f32 * factor) as u8;
    }
}

/// Source-over composite of an RGBA overlay onto an RGB canvas.
pub fn composite_over(dst: &mut RgbImage, src: &RgbaImage) {
    for (out, pixel) in dst.pixels_mut().zip(src.pixels()) {
        let alpha = pixel.0[3] as u32;
        if alpha == 0 {
            continue;
        }
        let inv = 255 - alpha;
        for c in 0..3 {
            out.0[c] = ((pixel.0[c] as u32 * alpha + out.0[c] as u32 * inv + 127) / 255) as u8;
        }
    }
}

/// Copies `src` onto `dst` with its top-left corner at `(left, top)`,
/// skipping pixels rejected by `mask` and anything off-canvas.
pub fn paste(
    dst: &mut RgbImage,
    src: &RgbImage,
    left: i64,
    top: i64,
    mask: impl Fn(u32, u32) -> bool,
) {
    for (x, y, pixel) in src.enumerate_pixels() {
        let (tx, ty) = (left + x as i64, top + y as i64);
        if tx < 0 || ty < 0 || tx >= dst.width() as i64 || ty >= dst.height() as i64 {
            continue;
        }
        if mask(x, y) {
            dst.put_pixel(tx as u32, ty as u32, *pixel);
        }
    }
}

/// Sum of all channel values; used as a cheap brightness measure.
pub fn brightness(image: &RgbImage) -> u64 {
    image.iter().map(|c| *c as u64).sum()
}

/// Waveform canvas: colour plus an explicit coverage mask, so a
/// deliberately black stroke is still distinguishable from "nothing drawn".
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub rgb: RgbImage,
    pub coverage: GrayImage,
}

impl Layer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            rgb: RgbImage::new(width, height),
            coverage: GrayImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn put(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.rgb.put_pixel(x, y, Rgb(color));
        self.coverage.put_pixel(x, y, Luma([255]));
    }

    pub fn covered(&self, x: u32, y: u32) -> bool {
        self.coverage.get_pixel(x, y).0[0] > 0
    }

    /// Gaussian blur applied identically to colour and coverage.
    pub fn blurred(&self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self.clone();
        }
        Self {
            rgb: image::imageops::blur(&self.rgb, sigma),
            coverage: image::imageops::blur(&self.coverage, sigma),
        }
    }

    /// Inverse-mapped bilinear resample: `source(x, y)` returns where the
    /// output pixel centre `(x, y)` samples from. Outside reads as empty.
    pub fn warped(&self, source: impl Fn(f32, f32) -> (f32, f32)) -> Self {
        let (width, height) = (self.width(), self.height());
        let mut out = Layer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let (sx, sy) = source(x as f32 + 0.5, y as f32 + 0.5);
                let (rgb, coverage) = self.sample_bilinear(sx - 0.5, sy - 0.5);
                out.rgb.put_pixel(x, y, Rgb(rgb));
                out.coverage.put_pixel(x, y, Luma([coverage]));
            }
        }
        out
    }

    fn sample_bilinear(&self, fx: f32, fy: f32) -> ([u8; 3], u8) {
        let (width, height) = (self.width() as i64, self.height() as i64);
        if !(fx > -1.0 && fy > -1.0 && fx < width as f32 && fy < height as f32) {
            return ([0; 3], 0);
        }
        let x0 = fx.floor() as i64;
        let y0 = fy.floor() as i64;
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let mut rgb = [0.0f32; 3];
        let mut coverage = 0.0f32;
        for (dx, dy, weight) in [
            (0, 0, (1.0 - tx) * (1.0 - ty)),
            (1, 0, tx * (1.0 - ty)),
            (0, 1, (1.0 - tx) * ty),
            (1, 1, tx * ty),
        ] {
            let (x, y) = (x0 + dx, y0 + dy);
            if weight <= 0.0 || x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            let pixel = self.rgb.get_pixel(x as u32, y as u32).0;
            for c in 0..3 {
                rgb[c] += pixel[c] as f32 * weight;
            }
            coverage += self.coverage.get_pixel(x as u32, y as u32).0[0] as f32 * weight;
        }
        (
            rgb.map(|c| c.round().clamp(0.0, 255.0) as u8),
            coverage.round().clamp(0.0, 255.0) as u8,
        )
    }

    /// Cut-out composite: every covered pixel overwrites `dst`.
    pub fn cutout_onto(&self, dst: &mut RgbImage) {
        for ((out, pixel), coverage) in dst
            .pixels_mut()
            .zip(self.rgb.pixels())
            .zip(self.coverage.pixels())
        {
            if coverage.0[0] > 0 {
                *out = *pixel;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(mut f: impl FnMut(&mut dyn FnMut(u32, u32))) -> usize {
        let mut hits = 0;
        f(&mut |_, _| hits += 1);
        hits
    }

    #[test]
    fn fills_axis_aligned_square() {
        let square = [(2.0, 2.0), (6.0, 2.0), (6.0, 6.0), (2.0, 6.0)];
        let hits = count(|plot| fill_polygon(&square, 10, 10, plot));
        assert_eq!(hits, 16);
    }

    #[test]
    fn polygon_fill_is_clipped() {
        let big = [(-5.0, -5.0), (50.0, -5.0), (50.0, 50.0), (-5.0, 50.0)];
        let hits = count(|plot| fill_polygon(&big, 8, 4, plot));
        assert_eq!(hits, 32);
    }

    #[test]
    fn thick_horizontal_line_covers_its_width() {
        let mut rows = std::collections::BTreeSet::new();
        stroke_polyline(&[(0.0, 5.0), (10.0, 5.0)], 4.0, 20, 20, |_, y| {
            rows.insert(y);
        });
        assert_eq!(rows.into_iter().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn ellipse_outline_leaves_centre_empty() {
        let mut centre_hit = false;
        let mut hits = 0;
        stroke_ellipse(20.0, 20.0, 10.0, 10.0, 2.0, 40, 40, |x, y| {
            hits += 1;
            if x == 20 && y == 20 {
                centre_hit = true;
            }
        });
        assert!(hits > 0);
        assert!(!centre_hit);
    }

    #[test]
    fn rect_outline_is_hollow() {
        let mut inner_hit = false;
        stroke_rect(0.0, 0.0, 9.0, 9.0, 1.0, 20, 20, |x, y| {
            if x == 4 && y == 4 {
                inner_hit = true;
            }
        });
        assert!(!inner_hit);
    }

    #[test]
    fn composite_respects_alpha() {
        let mut dst = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let src = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 128]));
        composite_over(&mut dst, &src);
        assert_eq!(dst.get_pixel(0, 0).0, [128, 128, 128]);
    }

    #[test]
    fn cutout_overwrites_only_covered_pixels() {
        let mut layer = Layer::new(2, 1);
        layer.put(1, 0, [0, 0, 0]);
        let mut dst = RgbImage::from_pixel(2, 1, Rgb([9, 9, 9]));
        layer.cutout_onto(&mut dst);
        assert_eq!(dst.get_pixel(0, 0).0, [9, 9, 9]);
        assert_eq!(dst.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn identity_warp_preserves_layer() {
        let mut layer = Layer::new(4, 4);
        layer.put(1, 2, [200, 100, 50]);
        let warped = layer.warped(|x, y| (x, y));
        assert_eq!(warped, layer);
    }

    #[test]
    fn scaling_never_brightens() {
        let mut image = RgbImage::from_pixel(3, 3, Rgb([255, 17, 1]));
        let before = brightness(&image);
        scale_pixels(&mut image, 0.85);
        assert!(brightness(&image) < before);
        assert_eq!(image.get_pixel(0, 0).0, [216, 14, 0]);
    }
}
