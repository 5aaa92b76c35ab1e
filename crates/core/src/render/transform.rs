use super::raster::Layer;
use crate::config::RotationAxis;

const TILT_STRENGTH: f32 = 0.3;

/// Applies the waveform rotation mode for `angle` (radians).
///
/// `Z` is a true rotation about the canvas centre. `X` and `Y` are cheap
/// shears that fake a tilt; uncovered regions stay empty.
pub fn apply_rotation(layer: &Layer, axis: RotationAxis, angle: f32) -> Layer {
    let (width, height) = (layer.width() as f32, layer.height() as f32);
    match axis {
        RotationAxis::None => layer.clone(),
        RotationAxis::Z => {
            let (cx, cy) = (width / 2.0, height / 2.0);
            let theta = -angle;
            let (sin, cos) = theta.sin_cos();
            layer.warped(|x, y| {
                let (dx, dy) = (x - cx, y - cy);
                (cos * dx + sin * dy + cx, -sin * dx + cos * dy + cy)
            })
        }
        RotationAxis::X => {
            let shear = TILT_STRENGTH * (angle * 2.0).sin();
            layer.warped(|x, y| (x, shear * x + y - height * shear / 2.0))
        }
        RotationAxis::Y => {
            let shear = TILT_STRENGTH * (angle * 2.0).sin();
            layer.warped(|x, y| (x + shear * y - width * shear / 2.0, y))
        }
    }
}
