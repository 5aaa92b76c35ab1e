use std::f32::consts::PI;

use image::{Rgba, RgbaImage, RgbImage};

use super::raster::{composite_over, fill_ellipse};
use crate::config::StarfieldRotation;

const BASE_SPEED: f32 = 0.5;
const VOLUME_SPEED: f32 = 5.5;
const RESEED_SIGMA: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    /// Depth in `[0, 2)`; scales speed and brightness.
    pub z: f32,
    /// Core radius in pixels, 1 to 3.
    pub size: u32,
}

/// Fixed pool of particles streaming out from the canvas centre.
///
/// Randomness comes from an explicitly seeded generator so renders are
/// reproducible.
#[derive(Debug, Clone)]
pub struct Starfield {
    stars: Vec<Star>,
    rng: fastrand::Rng,
    width: u32,
    height: u32,
}

impl Starfield {
    pub fn new(width: u32, height: u32, count: usize, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let stars = (0..count)
            .map(|_| Star {
                x: rng.f32() * width as f32,
                y: rng.f32() * height as f32,
                z: rng.f32() * 2.0,
                size: rng.u32(1..4),
            })
            .collect();
        Self {
            stars,
            rng,
            width,
            height,
        }
    }

    /// Starts from an explicit particle set instead of a random one.
    pub fn with_stars(width: u32, height: u32, stars: Vec<Star>, seed: u64) -> Self {
        Self {
            stars,
            rng: fastrand::Rng::with_seed(seed),
            width,
            height,
        }
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Advances every particle one frame.
    pub fn update(&mut self, volume_intensity: f32, rotation: StarfieldRotation) {
        let speed = BASE_SPEED + volume_intensity * VOLUME_SPEED;
        let (cx, cy) = (self.width as f32 / 2.0, self.height as f32 / 2.0);

        for star in &mut self.stars {
            let spin = match rotation {
                StarfieldRotation::None => 0.0,
                StarfieldRotation::Cw => -speed * 0.01 * star.z,
                StarfieldRotation::Ccw => speed * 0.01 * star.z,
            };
            if spin != 0.0 {
                let (dx, dy) = (star.x - cx, star.y - cy);
                let angle = dy.atan2(dx) + spin;
                let distance = (dx * dx + dy * dy).sqrt();
                star.x = cx + distance * angle.cos();
                star.y = cy + distance * angle.sin();
            }

            let (dx, dy) = (star.x - cx, star.y - cy);
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > 0.0 {
                star.x += dx / distance * speed * star.z;
                star.y += dy / distance * speed * star.z;
            }

            let outside = star.x < 0.0
                || star.x > self.width as f32
                || star.y < 0.0
                || star.y > self.height as f32;
            if outside {
                star.x = cx + gaussian(&mut self.rng) * RESEED_SIGMA;
                star.y = cy + gaussian(&mut self.rng) * RESEED_SIGMA;
                star.z = self.rng.f32() * 2.0;
            }
        }
    }

    /// Soft white discs: three fading glow rings around a solid core,
    /// alpha-blended over `canvas`.
    pub fn draw(&self, canvas: &mut RgbImage) {
        let (width, height) = canvas.dimensions();
        let mut layer = RgbaImage::new(width, height);

        for star in &self.stars {
            let brightness = (150.0 + star.z * 50.0) as u8;
            let (x, y) = (star.x.trunc(), star.y.trunc());
            let size = star.size as f32;

            for glow in (1..=3).rev() {
                let alpha = (brightness as f32 * 0.3 * (1.0 - glow as f32 / 3.0)) as u8;
                let radius = size + glow as f32;
                fill_ellipse(x, y, radius, radius, width, height, |px, py| {
                    layer.put_pixel(px, py, Rgba([255, 255, 255, alpha]));
                });
            }
            fill_ellipse(x, y, size, size, width, height, |px, py| {
                layer.put_pixel(px, py, Rgba([255, 255, 255, brightness]));
            });
        }

        composite_over(canvas, &layer);
    }
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut fastrand::Rng) -> f32 {
    let u1 = rng.f32().max(f32::MIN_POSITIVE);
    let u2 = rng.f32();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_initialized_inside_canvas() {
        let field = Starfield::new(320, 200, 100, 1);
        assert_eq!(field.stars().len(), 100);
        for star in field.stars() {
            assert!((0.0..=320.0).contains(&star.x));
            assert!((0.0..=200.0).contains(&star.y));
            assert!((0.0..2.0).contains(&star.z));
            assert!((1..=3).contains(&star.size));
        }
    }

    fn star(x: f32, y: f32, z: f32) -> Star {
        Star { x, y, z, size: 2 }
    }

    fn radius(star: &Star, cx: f32, cy: f32) -> f32 {
        ((star.x - cx).powi(2) + (star.y - cy).powi(2)).sqrt()
    }

    #[test]
    fn stars_move_outward_by_depth_scaled_speed() {
        let mut field = Starfield::with_stars(400, 400, vec![star(250.0, 200.0, 1.0)], 0);
        field.update(0.0, StarfieldRotation::None);
        // speed 0.5 * depth 1.0 along +x
        assert!((field.stars()[0].x - 250.5).abs() < 1e-4);
        assert!((field.stars()[0].y - 200.0).abs() < 1e-4);

        field.update(1.0, StarfieldRotation::None);
        assert!((field.stars()[0].x - 256.5).abs() < 1e-3);
    }

    #[test]
    fn rotation_direction_follows_mode() {
        let start = vec![star(300.0, 200.0, 2.0)];
        let mut cw = Starfield::with_stars(400, 400, start.clone(), 0);
        let mut ccw = Starfield::with_stars(400, 400, start, 0);
        cw.update(0.5, StarfieldRotation::Cw);
        ccw.update(0.5, StarfieldRotation::Ccw);

        let (a, b) = (cw.stars()[0], ccw.stars()[0]);
        assert!(a.y < 200.0, "cw moves towards negative angles");
        assert!(b.y > 200.0);
        assert!((radius(&a, 200.0, 200.0) - radius(&b, 200.0, 200.0)).abs() < 1e-3);
        // radius grows by speed * depth = 3.25 * 2
        assert!((radius(&a, 200.0, 200.0) - 106.5).abs() < 1e-2);
    }

    #[test]
    fn escaped_stars_are_reseeded_near_centre() {
        let mut field = Starfield::with_stars(100, 100, vec![star(99.9, 50.0, 1.5)], 5);
        field.update(1.0, StarfieldRotation::None);
        let reseeded = field.stars()[0];
        assert!((reseeded.x - 50.0).abs() < 400.0);
        assert!((reseeded.y - 50.0).abs() < 400.0);
        assert!((0.0..2.0).contains(&reseeded.z));
        assert_ne!(reseeded, star(99.9, 50.0, 1.5));
    }

    #[test]
    fn same_seed_is_reproducible() {
        let mut a = Starfield::new(200, 100, 30, 42);
        let mut b = Starfield::new(200, 100, 30, 42);
        for _ in 0..50 {
            a.update(0.3, StarfieldRotation::Cw);
            b.update(0.3, StarfieldRotation::Cw);
        }
        assert_eq!(a.stars(), b.stars());
    }

    #[test]
    fn drawing_brightens_black_canvas() {
        let field = Starfield::new(64, 64, 10, 11);
        let mut canvas = RgbImage::new(64, 64);
        field.draw(&mut canvas);
        assert!(canvas.pixels().any(|p| p.0[0] > 100));
        assert!(canvas.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }
}
