use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::named_enum, Result, VisualizerError};

/// Contiguous frequency range with the colour it is drawn in.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBand {
    pub name: &'static str,
    pub min_hz: f32,
    pub max_hz: f32,
    /// Hue in degrees, `[0, 360)`.
    pub hue_offset: f32,
    pub saturation: f32,
    pub brightness: f32,
}

impl FrequencyBand {
    const fn new(name: &'static str, min_hz: f32, max_hz: f32, hue_offset: f32) -> Self {
        Self {
            name,
            min_hz,
            max_hz,
            hue_offset,
            saturation: 1.0,
            brightness: 1.0,
        }
    }
}

const DEFAULT_BANDS: [FrequencyBand; 8] = [
    FrequencyBand::new("Sub-Bass", 20.0, 40.0, 0.0),
    FrequencyBand::new("Bass", 40.0, 80.0, 45.0),
    FrequencyBand::new("Low-Bass", 80.0, 100.0, 90.0),
    FrequencyBand::new("Low-Mid", 100.0, 200.0, 135.0),
    FrequencyBand::new("Mid", 200.0, 400.0, 180.0),
    FrequencyBand::new("Upper-Mid", 400.0, 600.0, 225.0),
    FrequencyBand::new("High-Mid", 600.0, 800.0, 270.0),
    FrequencyBand::new("Presence", 800.0, 1000.0, 315.0),
];

/// The fixed eight-band layout with the default (rainbow) hues.
pub fn default_bands() -> Vec<FrequencyBand> {
    DEFAULT_BANDS.to_vec()
}

/// Hue table plus shared saturation/brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPalette {
    pub name: &'static str,
    pub hues: &'static [f32],
    pub saturation: f32,
    pub brightness: f32,
}

impl ColorPalette {
    pub const fn new(
        name: &'static str,
        hues: &'static [f32],
        saturation: f32,
        brightness: f32,
    ) -> Self {
        Self {
            name,
            hues,
            saturation,
            brightness,
        }
    }

    /// Overwrites band colours in order, wrapping the hue table if it is
    /// shorter than the band list.
    pub fn apply(&self, bands: &mut [FrequencyBand]) {
        if self.hues.is_empty() {
            return;
        }
        for (index, band) in bands.iter_mut().enumerate() {
            band.hue_offset = self.hues[index % self.hues.len()];
            band.saturation = self.saturation;
            band.brightness = self.brightness;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    Rainbow,
    Spring,
    Summer,
    Autumn,
    Winter,
    Ice,
    Fire,
    Water,
    Earth,
}

named_enum!(Palette, "palette", {
    Rainbow => "rainbow",
    Spring => "spring",
    Summer => "summer",
    Autumn => "autumn",
    Winter => "winter",
    Ice => "ice",
    Fire => "fire",
    Water => "water",
    Earth => "earth",
});

impl Palette {
    pub fn colors(self) -> ColorPalette {
        match self {
            Palette::Rainbow => ColorPalette::new(
                "Rainbow",
                &[0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0],
                1.0,
                1.0,
            ),
            Palette::Spring => ColorPalette::new(
                "Spring",
                &[80.0, 100.0, 120.0, 140.0, 280.0, 300.0, 320.0, 340.0],
                0.8,
                0.95,
            ),
            Palette::Summer => ColorPalette::new(
                "Summer",
                &[30.0, 45.0, 60.0, 180.0, 200.0, 220.0, 240.0, 260.0],
                1.0,
                1.0,
            ),
            Palette::Autumn => ColorPalette::new(
                "Autumn",
                &[0.0, 15.0, 30.0, 35.0, 40.0, 25.0, 20.0, 10.0],
                0.9,
                0.85,
            ),
            Palette::Winter => ColorPalette::new(
                "Winter",
                &[180.0, 200.0, 220.0, 240.0, 260.0, 200.0, 190.0, 210.0],
                0.7,
                0.9,
            ),
            Palette::Ice => ColorPalette::new(
                "Ice",
                &[180.0, 190.0, 200.0, 210.0, 220.0, 200.0, 195.0, 205.0],
                0.5,
                1.0,
            ),
            Palette::Fire => ColorPalette::new(
                "Fire",
                &[0.0, 10.0, 20.0, 30.0, 40.0, 25.0, 15.0, 35.0],
                1.0,
                0.95,
            ),
            Palette::Water => ColorPalette::new(
                "Water",
                &[160.0, 170.0, 180.0, 190.0, 150.0, 165.0, 175.0, 185.0],
                0.8,
                0.9,
            ),
            Palette::Earth => ColorPalette::new(
                "Earth",
                &[25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0],
                0.6,
                0.7,
            ),
        }
    }

    /// The default band layout with this palette applied.
    pub fn bands(self) -> Vec<FrequencyBand> {
        let mut bands = default_bands();
        self.colors().apply(&mut bands);
        bands
    }
}

/// HSV (hue in degrees) to 8-bit RGB, with the 1.2x vibrancy boost.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0);
    let c = value * saturation;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    let boost = |channel: f32| ((channel + m) * 255.0 * 1.2).clamp(0.0, 255.0) as u8;
    [boost(r), boost(g), boost(b)]
}

/// Multiplies every channel by `factor` (truncating).
pub fn scale_rgb(color: [u8; 3], factor: f32) -> [u8; 3] {
    color.map(|channel| (channel as f32 * factor) as u8)
}
