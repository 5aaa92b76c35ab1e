use std::{
    io,
    path::Path,
    process::{Command, Stdio},
};

use hound::{SampleFormat, WavReader};

use crate::{Result, VisualizerError};

/// Normalized mono PCM. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wraps already-normalized samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VisualizerError::decoder("sample rate must be >= 1"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Peak-normalizes raw samples into `[-1, 1]`. Silence stays silent.
    pub fn from_raw(mut samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak > 0.0 {
            for sample in &mut samples {
                *sample /= peak;
            }
        }
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Turns an audio file into a mono [`Waveform`].
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path, target_rate: u32) -> Result<Waveform>;
}

/// Reads PCM/float WAV files directly. The file's own rate is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, path: &Path, _target_rate: u32) -> Result<Waveform> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let mono = mix_to_mono(&interleaved, channels);
        tracing::debug!(
            path = %path.display(),
            channels,
            sample_rate = spec.sample_rate,
            frames = mono.len(),
            "decoded wav"
        );
        Waveform::from_raw(mono, spec.sample_rate)
    }
}

/// Delegates decoding and resampling to an `ffmpeg` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: String,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegDecoder {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn decode(&self, path: &Path, target_rate: u32) -> Result<Waveform> {
        let child = Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-ar")
            .arg(target_rate.to_string())
            .arg("-ac")
            .arg("1")
            .arg("-f")
            .arg("f32le")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => VisualizerError::decoder(format!(
                    "ffmpeg is required to decode {} (install ffmpeg and retry)",
                    path.display()
                )),
                _ => VisualizerError::decoder(format!("failed to run ffmpeg: {err}")),
            })?;

        // Both pipes are drained together; a chatty stderr must not stall stdout.
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(VisualizerError::decoder(format!(
                "ffmpeg could not decode {} ({}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let samples = output
            .stdout
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Waveform::from_raw(samples, target_rate)
    }
}

/// `.wav` goes through [`WavDecoder`], everything else through ffmpeg.
#[derive(Debug, Default, Clone)]
pub struct AutoDecoder {
    wav: WavDecoder,
    ffmpeg: FfmpegDecoder,
}

impl AudioDecoder for AutoDecoder {
    fn decode(&self, path: &Path, target_rate: u32) -> Result<Waveform> {
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);

        let waveform = if is_wav {
            self.wav.decode(path, target_rate)?
        } else {
            self.ffmpeg.decode(path, target_rate)?
        };
        tracing::info!(
            path = %path.display(),
            duration = waveform.duration_seconds(),
            sample_rate = waveform.sample_rate(),
            "audio loaded"
        );
        Ok(waveform)
    }
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: &[[i16; 2]]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for sample in frame.iter().take(channels as usize) {
                writer.write_sample(*sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn normalizes_to_peak() {
        let waveform = Waveform::from_raw(vec![0.0, 0.25, -0.5], 100).unwrap();
        assert_eq!(waveform.samples(), &[0.0, 0.5, -1.0]);
        assert!((waveform.duration_seconds() - 0.03).abs() < 1e-6);
    }

    #[test]
    fn silence_is_not_divided_by_zero() {
        let waveform = Waveform::from_raw(vec![0.0; 16], 100).unwrap();
        assert!(waveform.samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(Waveform::new(vec![0.0], 0).is_err());
    }

    #[test]
    fn wav_decoder_mixes_stereo_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[[1000, 3000], [-2000, -2000], [0, 0]]);

        let waveform = AutoDecoder::default().decode(&path, 44_100).unwrap();
        assert_eq!(waveform.sample_rate(), 8_000);
        assert_eq!(waveform.samples().len(), 3);
        // means are 2000, -2000, 0 -> normalized by the 2000 peak
        assert!((waveform.samples()[0] - 1.0).abs() < 1e-6);
        assert!((waveform.samples()[1] + 1.0).abs() < 1e-6);
        assert_eq!(waveform.samples()[2], 0.0);
    }

    #[test]
    fn missing_wav_is_a_decoder_error() {
        let err = WavDecoder
            .decode(Path::new("/definitely/not/here.wav"), 44_100)
            .unwrap_err();
        assert!(matches!(err, VisualizerError::Decoder(_)));
    }

    #[test]
    fn missing_ffmpeg_binary_reports_requirement() {
        let decoder = FfmpegDecoder::with_program("ffmpeg-binary-that-does-not-exist");
        let err = decoder.decode(Path::new("song.mp3"), 44_100).unwrap_err();
        assert!(err.to_string().contains("ffmpeg is required"));
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> FfmpegDecoder {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        FfmpegDecoder::with_program(path.to_string_lossy().into_owned())
    }

    #[cfg(unix)]
    #[test]
    fn noisy_stderr_does_not_stall_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = fake_ffmpeg(
            dir.path(),
            r#"i=0
while [ $i -lt 3000 ]; do
  echo "[mp3 @ 0x5581] skipping damaged frame $i while resyncing the stream" >&2
  i=$((i + 1))
done
head -c 4000 /dev/zero
printf '\000\000\200\077'"#,
        );

        let waveform = decoder.decode(Path::new("damaged.mp3"), 22_050).unwrap();
        assert_eq!(waveform.sample_rate(), 22_050);
        assert_eq!(waveform.samples().len(), 1001);
        assert_eq!(waveform.samples()[1000], 1.0);
    }

    #[cfg(unix)]
    #[test]
    fn ffmpeg_failure_carries_its_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = fake_ffmpeg(
            dir.path(),
            r#"echo "Invalid data found when processing input" >&2
exit 1"#,
        );

        let err = decoder.decode(Path::new("broken.mp3"), 44_100).unwrap_err();
        assert!(matches!(err, VisualizerError::Decoder(ref msg) if msg.contains("Invalid data")));
    }
}
