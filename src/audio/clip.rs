//! Cue clip decoding
//!
//! The clip is read once, folded to mono and resampled to the rate the
//! graph renders at.

use crate::{HoldlineError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const RESAMPLE_CHUNK: usize = 1024;

/// Decoded mono clip at the graph's sample rate
#[derive(Clone, Debug)]
pub struct Clip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Clip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::from(samples),
            sample_rate,
        }
    }

    /// Decode `path` and convert it for a graph running at `target_rate`
    pub fn load<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Self> {
        let (interleaved, rate, channels) = read_wav(&path)?;
        let mono = downmix(&interleaved, channels);
        let samples = resample(&mono, rate, target_rate)?;
        if samples.is_empty() {
            return Err(HoldlineError::AudioProcessingError(format!(
                "Clip {} has no audio",
                path.as_ref().display()
            )));
        }

        info!(
            "Loaded cue clip {} ({:.1}s at {} Hz)",
            path.as_ref().display(),
            samples.len() as f32 / target_rate as f32,
            target_rate
        );
        Ok(Self::new(samples, target_rate))
    }

    pub fn samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Read a WAV file as interleaved `f32` samples.
///
/// Returns `(samples, sample_rate, channels)`.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32, u16)> {
    let mut reader = WavReader::open(path.as_ref())
        .map_err(|e| HoldlineError::IOError(format!("Failed to open WAV file: {}", e)))?;

    let spec = reader.spec();
    debug!(
        "Reading WAV file: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let read_err = |e: hound::Error| HoldlineError::IOError(format!("Failed to read sample: {}", e));
    let samples: Result<Vec<f32>> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map_err(read_err))
            .collect(),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32).map_err(read_err))
            .collect(),
        (SampleFormat::Int, bits) => {
            return Err(HoldlineError::AudioProcessingError(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }
    };

    Ok((samples?, spec.sample_rate, spec.channels))
}

/// Write 16-bit PCM
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| HoldlineError::IOError(format!("Failed to create WAV writer: {}", e)))?;
    for &sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .map_err(|e| HoldlineError::IOError(format!("Failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| HoldlineError::IOError(format!("Failed to finalize WAV file: {}", e)))?;
    Ok(())
}

/// Average interleaved frames down to one channel
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Sinc-resample a mono signal
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == 0 || output_rate == 0 {
        return Err(HoldlineError::ConfigError(
            "Sample rates must be greater than 0".into(),
        ));
    }
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| {
            HoldlineError::AudioProcessingError(format!("Failed to create resampler: {}", e))
        })?;

    let expected = (input.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    for chunk in input.chunks(RESAMPLE_CHUNK) {
        // Fixed-size input; the last chunk is zero-padded
        let mut block = vec![0.0f32; RESAMPLE_CHUNK];
        block[..chunk.len()].copy_from_slice(chunk);

        let planar = resampler
            .process(&[block], None)
            .map_err(|e| HoldlineError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&planar[0]);
    }
    output.truncate(expected);

    debug!(
        "Resampled {} frames at {} Hz -> {} frames at {} Hz",
        input.len(),
        input_rate,
        output.len(),
        output_rate
    );
    Ok(output)
}
