//! Filter and dynamics nodes of the cue chain

use std::f32::consts::PI;

/// Butterworth response, no resonance peak
pub const DEFAULT_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Second-order section with RBJ cookbook coefficients
#[derive(Clone, Debug)]
pub struct Biquad {
    kind: FilterKind,
    sample_rate: f32,
    q: f32,
    frequency: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(kind: FilterKind, sample_rate: u32, frequency: f32) -> Self {
        let mut filter = Self {
            kind,
            sample_rate: sample_rate as f32,
            q: DEFAULT_Q,
            frequency: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        filter.set_frequency(frequency);
        filter
    }

    /// Retune the cutoff. Coefficients are only recomputed on change.
    pub fn set_frequency(&mut self, frequency: f32) {
        let nyquist = self.sample_rate / 2.0;
        let frequency = frequency.clamp(10.0, nyquist * 0.99);
        if (frequency - self.frequency).abs() < f32::EPSILON {
            return;
        }
        self.frequency = frequency;

        let w0 = 2.0 * PI * frequency / self.sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * self.q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match self.kind {
            FilterKind::LowPass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterKind::HighPass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Feed-forward compressor with a soft knee
#[derive(Clone, Debug)]
pub struct Compressor {
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    attack_coef: f32,
    release_coef: f32,
    /// Current gain reduction in dB (zero or negative)
    reduction_db: f32,
}

impl Compressor {
    pub fn new(
        sample_rate: u32,
        threshold_db: f32,
        knee_db: f32,
        ratio: f32,
        attack_secs: f32,
        release_secs: f32,
    ) -> Self {
        let rate = sample_rate as f32;
        Self {
            threshold_db,
            knee_db,
            ratio: ratio.max(1.0),
            attack_coef: (-1.0 / (attack_secs * rate)).exp(),
            release_coef: (-1.0 / (release_secs * rate)).exp(),
            reduction_db: 0.0,
        }
    }

    /// Threshold -20 dB, knee 10 dB, ratio 4:1, attack 3 ms, release 250 ms
    pub fn for_cue(sample_rate: u32) -> Self {
        Self::new(sample_rate, -20.0, 10.0, 4.0, 0.003, 0.25)
    }

    /// Static curve: output level for an input level, both in dB
    pub fn curve(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold_db;
        if 2.0 * over < -self.knee_db {
            input_db
        } else if 2.0 * over.abs() <= self.knee_db {
            let x = over + self.knee_db / 2.0;
            input_db + (1.0 / self.ratio - 1.0) * x * x / (2.0 * self.knee_db)
        } else {
            self.threshold_db + over / self.ratio
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let level_db = 20.0 * x.abs().max(1e-6).log10();
        let target = self.curve(level_db) - level_db;

        let coef = if target < self.reduction_db {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.reduction_db = coef * self.reduction_db + (1.0 - coef) * target;

        x * 10f32.powf(self.reduction_db / 20.0)
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn filtered_rms(filter: &mut Biquad, input: &[f32]) -> f32 {
        let output: Vec<f32> = input.iter().map(|&x| filter.process(x)).collect();
        // Skip the transient
        rms(&output[output.len() / 2..])
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        let rate = 16_000;
        let mut low = Biquad::new(FilterKind::LowPass, rate, 1200.0);
        let pass = filtered_rms(&mut low, &sine(200.0, rate, 8000));
        low.reset();
        let stop = filtered_rms(&mut low, &sine(6000.0, rate, 8000));

        assert!(pass > 0.6);
        assert!(stop < 0.1);
    }

    #[test]
    fn test_highpass_attenuates_lows() {
        let rate = 16_000;
        let mut high = Biquad::new(FilterKind::HighPass, rate, 400.0);
        let stop = filtered_rms(&mut high, &sine(50.0, rate, 8000));
        high.reset();
        let pass = filtered_rms(&mut high, &sine(3000.0, rate, 8000));

        assert!(stop < 0.05);
        assert!(pass > 0.6);
    }

    #[test]
    fn test_frequency_clamped_below_nyquist() {
        let mut low = Biquad::new(FilterKind::LowPass, 8000, 20_000.0);
        assert!(low.frequency < 4000.0);
        low.set_frequency(1.0);
        assert_eq!(low.frequency, 10.0);
    }

    #[test]
    fn test_compressor_curve() {
        let comp = Compressor::for_cue(16_000);
        // Well below the knee: untouched
        assert_eq!(comp.curve(-40.0), -40.0);
        // Well above: 4:1 over the threshold
        assert!((comp.curve(0.0) - -15.0).abs() < 1e-4);
        // Inside the knee: some reduction, but less than the full ratio
        let knee = comp.curve(-20.0);
        assert!(knee < -20.0 && knee > -20.0 - 15.0 / 4.0);
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let rate = 16_000;
        let mut comp = Compressor::for_cue(rate);
        let loud = sine(440.0, rate, 8000);
        let output: Vec<f32> = loud.iter().map(|&x| comp.process(x)).collect();

        assert!(comp.reduction_db < -3.0);
        assert!(rms(&output[4000..]) < rms(&loud[4000..]));
    }

    #[test]
    fn test_compressor_leaves_quiet_signal() {
        let rate = 16_000;
        let mut comp = Compressor::for_cue(rate);
        let quiet: Vec<f32> = sine(440.0, rate, 4000).iter().map(|x| x * 0.01).collect();
        let output: Vec<f32> = quiet.iter().map(|&x| comp.process(x)).collect();
        assert!((rms(&output) - rms(&quiet)).abs() < 1e-4);
    }
}
