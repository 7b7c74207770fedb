//! Spectrum analyser tap
//!
//! Byte frequency data computed like a browser `AnalyserNode`: Blackman
//! window over the last `FFT_SIZE` samples, magnitudes smoothed over time,
//! converted to dB and mapped onto `0..=255`.

use super::buffer::SampleWindow;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

pub const FFT_SIZE: usize = 256;
pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;
pub const SMOOTHING: f32 = 0.8;
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

pub struct Analyser {
    window: SampleWindow,
    coefficients: Vec<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    spectrum: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new() -> Self {
        let coefficients = (0..FFT_SIZE)
            .map(|n| {
                let x = n as f32 / FFT_SIZE as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
        let spectrum = fft.make_output_vec();
        Self {
            window: SampleWindow::new(FFT_SIZE),
            coefficients,
            smoothed: vec![0.0; FREQUENCY_BIN_COUNT],
            fft,
            spectrum,
        }
    }

    /// Handle the graph writes rendered samples into
    pub fn tap(&self) -> SampleWindow {
        self.window.clone()
    }

    /// Current magnitudes, one byte per bin
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let mut samples: Vec<f32> = self
            .window
            .snapshot()
            .iter()
            .zip(&self.coefficients)
            .map(|(s, w)| s * w)
            .collect();
        if self.fft.process(&mut samples, &mut self.spectrum).is_err() {
            self.spectrum.fill(Complex::new(0.0, 0.0));
        }

        let range = MAX_DECIBELS - MIN_DECIBELS;
        // The Nyquist bin is not reported
        self.spectrum[..FREQUENCY_BIN_COUNT]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(bin, previous)| {
                let magnitude = bin.norm() / FFT_SIZE as f32;
                let smoothed = SMOOTHING * *previous + (1.0 - SMOOTHING) * magnitude;
                *previous = smoothed;

                let db = 20.0 * smoothed.max(1e-12).log10();
                let scaled = 255.0 * (db - MIN_DECIBELS) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.smoothed.fill(0.0);
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}
