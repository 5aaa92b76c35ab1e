use std::{f32::consts::PI, fmt, ops::Range};

use realfft::RealFftPlanner;

use crate::{audio::Waveform, config::Quality, palette::FrequencyBand, Result, VisualizerError};

/// Dense magnitude spectrogram, stored frame-major so that every per-frame
/// query touches one contiguous column.
#[derive(Clone, PartialEq)]
pub struct Spectrogram {
    magnitudes: Vec<f32>,
    frequencies: Vec<f32>,
    frame_count: usize,
}

impl Spectrogram {
    /// Number of frequency bins per frame (`n_fft / 2 + 1`).
    pub fn bin_count(&self) -> usize {
        self.frequencies.len()
    }

    /// Number of STFT frames; never zero for a valid spectrogram.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Bin centre frequencies in Hz, ascending.
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    /// Clamps `frame_index` to the last available frame.
    pub fn clamp_frame(&self, frame_index: usize) -> usize {
        frame_index.min(self.frame_count.saturating_sub(1))
    }

    /// All bin magnitudes for one (clamped) frame.
    pub fn column(&self, frame_index: usize) -> &[f32] {
        let frame = self.clamp_frame(frame_index);
        let bins = self.bin_count();
        &self.magnitudes[frame * bins..(frame + 1) * bins]
    }

    /// Contiguous bin range whose frequencies lie in `[min_hz, max_hz]`.
    pub fn bin_range(&self, min_hz: f32, max_hz: f32) -> Range<usize> {
        let start = self.frequencies.partition_point(|f| *f < min_hz);
        let end = self.frequencies.partition_point(|f| *f <= max_hz);
        start..end.max(start)
    }

    /// Sum of magnitudes in `[min_hz, max_hz]` at one (clamped) frame.
    pub fn range_sum(&self, frame_index: usize, min_hz: f32, max_hz: f32) -> f32 {
        self.column(frame_index)[self.bin_range(min_hz, max_hz)]
            .iter()
            .sum()
    }
}

impl fmt::Debug for Spectrogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spectrogram")
            .field("bins", &self.bin_count())
            .field("frames", &self.frame_count)
            .finish()
    }
}

/// Short-time Fourier analysis of a whole track, computed once up front and
/// then shared read-only by every frame query.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    spectrogram: Spectrogram,
    sample_rate: u32,
    duration_seconds: f32,
    window_len: usize,
    hop_len: usize,
    global_max: f32,
    mean_column_sum: f32,
}

impl SpectralAnalyzer {
    /// Runs the STFT with a `quality`-sized Hann window and a hop of
    /// `sample_rate / fps` samples.
    pub fn analyze(waveform: &Waveform, fps: u32, quality: Quality) -> Result<Self> {
        Self::with_window(waveform, fps, quality.window_len())
    }

    pub fn with_window(waveform: &Waveform, fps: u32, window_len: usize) -> Result<Self> {
        if fps == 0 {
            return Err(VisualizerError::config("fps must be >= 1"));
        }
        if window_len < 2 {
            return Err(VisualizerError::config("analysis window must be >= 2 samples"));
        }

        let sample_rate = waveform.sample_rate();
        let hop_len = ((sample_rate / fps) as usize).max(1);
        let spectrogram = stft(waveform.samples(), sample_rate, window_len, hop_len)?;

        let global_max = spectrogram
            .magnitudes
            .iter()
            .fold(0.0f32, |acc, m| acc.max(*m));
        let total: f64 = spectrogram.magnitudes.iter().map(|m| *m as f64).sum();
        let mean_column_sum = (total / spectrogram.frame_count.max(1) as f64) as f32;

        tracing::info!(
            window_len,
            hop_len,
            bins = spectrogram.bin_count(),
            frames = spectrogram.frame_count(),
            "spectral analysis complete"
        );

        Ok(Self {
            spectrogram,
            sample_rate,
            duration_seconds: waveform.duration_seconds(),
            window_len,
            hop_len,
            global_max,
            mean_column_sum,
        })
    }

    pub fn spectrogram(&self) -> &Spectrogram {
        &self.spectrogram
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration_seconds
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop_len(&self) -> usize {
        self.hop_len
    }

    pub fn frame_count(&self) -> usize {
        self.spectrogram.frame_count()
    }

    /// Largest magnitude anywhere in the spectrogram.
    pub fn global_max(&self) -> f32 {
        self.global_max
    }

    /// `global_max`, or 1 for silent input so it can be used as a divisor.
    pub fn normalizer(&self) -> f32 {
        if self.global_max > 0.0 {
            self.global_max
        } else {
            1.0
        }
    }

    /// Average per-frame magnitude sum over the whole track.
    pub fn mean_column_sum(&self) -> f32 {
        self.mean_column_sum
    }

    /// Mean magnitude of each band at `frame_index` (0 for bands with no
    /// bins). Indices past the end are clamped to the last frame.
    pub fn band_values(&self, frame_index: usize, bands: &[FrequencyBand]) -> Vec<f32> {
        let column = self.spectrogram.column(frame_index);
        bands
            .iter()
            .map(|band| {
                let slice = &column[self.spectrogram.bin_range(band.min_hz, band.max_hz)];
                if slice.is_empty() {
                    0.0
                } else {
                    slice.iter().sum::<f32>() / slice.len() as f32
                }
            })
            .collect()
    }

    /// One band's magnitude slice at `frame_index`, nearest-index resampled
    /// to `point_count` values and divided by the global maximum.
    pub fn band_waveform(
        &self,
        frame_index: usize,
        band_index: usize,
        bands: &[FrequencyBand],
        point_count: usize,
    ) -> Vec<f32> {
        let Some(band) = bands.get(band_index) else {
            return vec![0.0; point_count];
        };
        let column = self.spectrogram.column(frame_index);
        let slice = &column[self.spectrogram.bin_range(band.min_hz, band.max_hz)];
        if slice.is_empty() {
            return vec![0.0; point_count];
        }

        let normalizer = self.normalizer();
        let last = (slice.len() - 1) as f64;
        let denom = point_count.saturating_sub(1).max(1) as f64;
        (0..point_count)
            .map(|i| {
                let index = if point_count == 1 {
                    0
                } else {
                    (i as f64 * last / denom) as usize
                };
                slice[index.min(slice.len() - 1)] / normalizer
            })
            .collect()
    }
}

/// Windowed FFT magnitudes: periodic Hann window, half a window of zero
/// padding on both sides, trailing zeros up to a whole hop, and magnitudes
/// scaled by `1 / sum(window)`.
fn stft(samples: &[f32], sample_rate: u32, window_len: usize, hop_len: usize) -> Result<Spectrogram> {
    let half = window_len / 2;
    let extended_len = samples.len() + 2 * half;
    let tail = if extended_len < window_len {
        window_len - extended_len
    } else {
        let remainder = (extended_len - window_len) % hop_len;
        ((hop_len - remainder) % hop_len) % window_len
    };
    let padded_len = extended_len + tail;

    let mut padded = vec![0.0f32; padded_len];
    padded[half..half + samples.len()].copy_from_slice(samples);

    let frame_count = (padded_len - window_len) / hop_len + 1;
    let bin_count = window_len / 2 + 1;

    let window: Vec<f32> = (0..window_len).map(|i| hann_value(i, window_len)).collect();
    let window_sum: f32 = window.iter().sum();
    let scale = if window_sum > 0.0 { 1.0 / window_sum } else { 1.0 };

    let mut planner = RealFftPlanner::<f32>::new();
    let plan = planner.plan_fft_forward(window_len);
    let mut input = plan.make_input_vec();
    let mut spectrum = plan.make_output_vec();
    let mut scratch = plan.make_scratch_vec();

    let mut magnitudes = Vec::with_capacity(frame_count * bin_count);
    for frame in 0..frame_count {
        let start = frame * hop_len;
        for ((slot, sample), weight) in input
            .iter_mut()
            .zip(&padded[start..start + window_len])
            .zip(&window)
        {
            *slot = sample * weight;
        }
        plan.process_with_scratch(&mut input, &mut spectrum, &mut scratch)?;
        magnitudes.extend(spectrum.iter().map(|bin| bin.norm() * scale));
    }

    let frequencies = (0..bin_count)
        .map(|k| k as f32 * sample_rate as f32 / window_len as f32)
        .collect();

    Ok(Spectrogram {
        magnitudes,
        frequencies,
        frame_count,
    })
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / len as f32).cos()
}
