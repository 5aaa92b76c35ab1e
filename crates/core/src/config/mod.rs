use std::{fmt, fs, path::Path, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{palette::Palette, Result, VisualizerError};

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_STAR_SEED: u64 = 0x5EED_2025;
/// Frame rate used by previews when the caller kept the default rate.
pub const PREVIEW_FPS: u32 = 15;
pub const PREVIEW_RESOLUTION_DIVISOR: u32 = 2;

/// Implements `FromStr`/`Display` for plain enums selected by lower-case name.
macro_rules! named_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = VisualizerError;

            fn from_str(value: &str) -> Result<Self> {
                let needle = value.trim().to_ascii_lowercase();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.name() == needle)
                    .ok_or_else(|| {
                        let valid: Vec<&str> = $ty::ALL.iter().map(|v| v.name()).collect();
                        VisualizerError::config(format!(
                            "unknown {} `{}` (expected one of: {})",
                            $what,
                            value,
                            valid.join(", ")
                        ))
                    })
            }
        }
    };
}

pub(crate) use named_enum;

/// Rendering quality tier. Previews use [`Quality::Reduced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Reduced,
    Full,
}

impl Quality {
    /// STFT window length in samples.
    pub fn window_len(self) -> usize {
        match self {
            Quality::Reduced => 1024,
            Quality::Full => 2048,
        }
    }

    pub fn glow_passes(self) -> u32 {
        match self {
            Quality::Reduced => 6,
            Quality::Full => 12,
        }
    }

    pub fn waveform_points(self) -> usize {
        match self {
            Quality::Reduced => 100,
            Quality::Full => 150,
        }
    }

    pub fn star_count(self) -> usize {
        match self {
            Quality::Reduced => 100,
            Quality::Full => 200,
        }
    }

    pub fn blur_radius(self) -> f32 {
        match self {
            Quality::Reduced => 1.0,
            Quality::Full => 2.0,
        }
    }
}

/// Rotation applied to the waveform layer or the rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxis {
    None,
    X,
    Y,
    Z,
}

named_enum!(RotationAxis, "rotation axis", {
    None => "none",
    X => "x",
    Y => "y",
    Z => "z",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StarfieldRotation {
    None,
    Cw,
    Ccw,
}

named_enum!(StarfieldRotation, "starfield rotation", {
    None => "none",
    Cw => "cw",
    Ccw => "ccw",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingShape {
    Circle,
    Square,
}

named_enum!(RingShape, "ring shape", {
    Circle => "circle",
    Square => "square",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverShape {
    Square,
    Round,
}

named_enum!(CoverShape, "cover shape", {
    Square => "square",
    Round => "round",
});

/// Output canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const DEFAULT: Resolution = Resolution::new(1280, 720);
    pub const PHONE_VERTICAL: Resolution = Resolution::new(1080, 1920);
    pub const PHONE_HORIZONTAL: Resolution = Resolution::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Integer-divides both sides, never dropping below one pixel.
    pub fn scaled_down(self, divisor: u32) -> Self {
        let divisor = divisor.max(1);
        Self {
            width: (self.width / divisor).max(1),
            height: (self.height / divisor).max(1),
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = VisualizerError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || {
            VisualizerError::config(format!(
                "resolution `{value}` must look like WIDTHxHEIGHT (e.g. 1920x1080)"
            ))
        };
        let (w, h) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// Every knob the renderer consumes. Produced by the CLI or loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub resolution: Resolution,
    pub fps: u32,
    pub palette: Palette,
    pub waveform_rotation: RotationAxis,
    pub ring_rotation: RotationAxis,
    pub starfield_rotation: StarfieldRotation,
    pub ring_shape: RingShape,
    pub cover_path: Option<PathBuf>,
    pub cover_shape: CoverShape,
    pub cover_size: f32,
    pub disable_rings: bool,
    pub disable_starfield: bool,
    pub text: Option<String>,
    /// Render only the first N seconds at reduced quality.
    pub preview_seconds: Option<f32>,
    pub star_seed: u64,
    pub sample_rate: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::DEFAULT,
            fps: DEFAULT_FPS,
            palette: Palette::Rainbow,
            waveform_rotation: RotationAxis::Z,
            ring_rotation: RotationAxis::Z,
            starfield_rotation: StarfieldRotation::None,
            ring_shape: RingShape::Circle,
            cover_path: None,
            cover_shape: CoverShape::Square,
            cover_size: 1.0,
            disable_rings: false,
            disable_starfield: false,
            text: None,
            preview_seconds: None,
            star_seed: DEFAULT_STAR_SEED,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: RenderConfig = serde_json::from_str(&raw).map_err(|err| {
            VisualizerError::config(format!("{}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| VisualizerError::msg(err.to_string()))
    }

    pub fn is_preview(&self) -> bool {
        self.preview_seconds.is_some()
    }

    pub fn quality(&self) -> Quality {
        if self.is_preview() {
            Quality::Reduced
        } else {
            Quality::Full
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(VisualizerError::config("resolution must be at least 1x1"));
        }
        if self.fps == 0 {
            return Err(VisualizerError::config("fps must be >= 1"));
        }
        if self.sample_rate == 0 {
            return Err(VisualizerError::config("sample rate must be >= 1"));
        }
        if !(self.cover_size.is_finite() && self.cover_size > 0.0) {
            return Err(VisualizerError::config("cover size must be > 0"));
        }
        if let Some(seconds) = self.preview_seconds {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(VisualizerError::config("preview duration must be > 0 seconds"));
            }
        }
        Ok(())
    }

    /// Validates and applies the preview reductions (half resolution, 15 fps
    /// when the default rate was kept).
    pub fn effective(&self) -> Result<Self> {
        self.validate()?;
        let mut config = self.clone();
        if config.is_preview() {
            config.resolution = config.resolution.scaled_down(PREVIEW_RESOLUTION_DIVISOR);
            if config.fps == DEFAULT_FPS {
                config.fps = PREVIEW_FPS;
            }
        }
        Ok(config)
    }
}
