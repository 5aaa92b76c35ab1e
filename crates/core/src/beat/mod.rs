use crate::analysis::SpectralAnalyzer;

pub const BASS_RANGE_HZ: (f32, f32) = (20.0, 250.0);
pub const LOW_MID_RANGE_HZ: (f32, f32) = (250.0, 1000.0);
const THRESHOLD_MULTIPLIER: f32 = 0.3;
const DECAY_FACTOR: f32 = 0.7;

/// Online transient detector over bass and low-mid energy.
///
/// One instance belongs to one render; [`BeatDetector::detect`] must be
/// called exactly once per frame, in frame order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatDetector {
    previous_energy: f32,
    intensity: f32,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current beat intensity in `[0, 1]`.
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn previous_energy(&self) -> f32 {
        self.previous_energy
    }

    /// Updates the detector from the (clamped) frame and returns the new
    /// intensity.
    pub fn detect(&mut self, analyzer: &SpectralAnalyzer, frame_index: usize) -> f32 {
        let spectrogram = analyzer.spectrogram();
        let bass = spectrogram.range_sum(frame_index, BASS_RANGE_HZ.0, BASS_RANGE_HZ.1);
        let low_mid = spectrogram.range_sum(frame_index, LOW_MID_RANGE_HZ.0, LOW_MID_RANGE_HZ.1);
        let threshold = analyzer.mean_column_sum() * THRESHOLD_MULTIPLIER;
        self.update(bass + low_mid, threshold)
    }

    /// Applies one step given this frame's low-band energy and the
    /// track-wide threshold.
    pub fn update(&mut self, total_energy: f32, threshold: f32) -> f32 {
        let energy_change = total_energy - self.previous_energy;

        if energy_change > threshold {
            self.intensity = if threshold > 0.0 {
                (energy_change / (threshold * 2.0)).min(1.0)
            } else {
                1.0
            };
        } else {
            self.intensity *= DECAY_FACTOR;
        }
        self.intensity = self.intensity.clamp(0.0, 1.0);

        self.previous_energy = total_energy;
        self.intensity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::Waveform, config::Quality};
    use std::f32::consts::PI;

    #[test]
    fn attack_is_proportional_and_capped() {
        let mut detector = BeatDetector::new();
        assert!((detector.update(3.0, 2.0) - 0.75).abs() < 1e-6);

        let mut detector = BeatDetector::new();
        assert_eq!(detector.update(100.0, 2.0), 1.0);
        assert_eq!(detector.previous_energy(), 100.0);
    }

    #[test]
    fn constant_energy_decays_geometrically() {
        let mut detector = BeatDetector::new();
        detector.update(10.0, 1.0);
        let mut expected = 1.0f32;
        for _ in 0..40 {
            expected *= 0.7;
            let value = detector.update(10.0, 1.0);
            assert!((value - expected).abs() < 1e-6);
            assert!(value >= 0.0);
        }
    }

    #[test]
    fn intensity_stays_in_unit_interval() {
        let mut detector = BeatDetector::new();
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..500 {
            let energy = rng.f32() * 1_000.0;
            let threshold = rng.f32() * 50.0;
            let value = detector.update(energy, threshold);
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn steady_tone_settles_near_zero() {
        let sample_rate = 44_100;
        let samples = (0..sample_rate)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let waveform = Waveform::from_raw(samples, sample_rate).unwrap();
        let analyzer = SpectralAnalyzer::analyze(&waveform, 30, Quality::Full).unwrap();

        let mut detector = BeatDetector::new();
        let mut last = 1.0;
        for frame in 0..20 {
            last = detector.detect(&analyzer, frame);
        }
        assert!(last < 0.01, "beat intensity {last} did not settle");
    }
}
