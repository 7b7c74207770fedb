//! Fixed cue signal chain
//!
//! source → high-pass → low-pass → compressor → gain → analyser tap → out
//!
//! The graph keeps its own sample clock. Parameters are evaluated at
//! `frames_rendered / sample_rate`, so automation scheduled by the engine
//! lines up with what was actually played, whichever backend pulls samples.

use super::buffer::SampleWindow;
use super::filter::{Biquad, Compressor, FilterKind};
use super::param::AudioParam;
use super::source::LoopSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Frames rendered per parameter update of the filters
pub const RENDER_QUANTUM: usize = 128;

pub type SharedGraph = Arc<Mutex<SignalGraph>>;

pub struct SignalGraph {
    sample_rate: u32,
    frames_rendered: u64,
    source: Option<LoopSource>,
    stop_at: Option<u64>,
    highpass: Biquad,
    lowpass: Biquad,
    compressor: Compressor,
    pub(crate) highpass_hz: AudioParam,
    pub(crate) lowpass_hz: AudioParam,
    pub(crate) gain: AudioParam,
    tap: SampleWindow,
}

impl SignalGraph {
    pub fn new(sample_rate: u32, lowpass_hz: f32, highpass_hz: f32, tap: SampleWindow) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        Self {
            sample_rate,
            frames_rendered: 0,
            source: None,
            stop_at: None,
            highpass: Biquad::new(FilterKind::HighPass, sample_rate, highpass_hz),
            lowpass: Biquad::new(FilterKind::LowPass, sample_rate, lowpass_hz),
            compressor: Compressor::for_cue(sample_rate),
            highpass_hz: AudioParam::new(highpass_hz, 10.0, nyquist),
            lowpass_hz: AudioParam::new(lowpass_hz, 10.0, nyquist),
            gain: AudioParam::new(0.0, 0.0, 1.0),
            tap,
        }
    }

    pub fn shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render clock in seconds
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Replace the playing source. A source still fading out is dropped.
    pub fn start_source(&mut self, clip: Arc<[f32]>, offset_secs: f64) {
        let offset_frames = (offset_secs * self.sample_rate as f64) as u64;
        self.source = Some(LoopSource::new(clip, offset_frames));
        self.stop_at = None;
        self.highpass.reset();
        self.lowpass.reset();
        self.compressor.reset();
    }

    /// Release the source once the clock reaches `time`
    pub fn stop_source_at(&mut self, time: f64) {
        if self.source.is_some() {
            self.stop_at = Some((time * self.sample_rate as f64).ceil() as u64);
        }
    }

    pub fn release_source(&mut self) {
        self.source = None;
        self.stop_at = None;
    }

    /// Fill `out` with mono samples and advance the clock
    pub fn render(&mut self, out: &mut [f32]) {
        for block in out.chunks_mut(RENDER_QUANTUM) {
            let block_time = self.current_time();
            self.highpass
                .set_frequency(self.highpass_hz.value_at(block_time));
            self.lowpass.set_frequency(self.lowpass_hz.value_at(block_time));

            for (i, sample) in block.iter_mut().enumerate() {
                let frame = self.frames_rendered + i as u64;
                if self.stop_at.is_some_and(|stop| frame >= stop) {
                    self.release_source();
                }

                let input = self.source.as_mut().map_or(0.0, LoopSource::next_sample);
                let filtered = self.lowpass.process(self.highpass.process(input));
                let compressed = self.compressor.process(filtered);
                let t = frame as f64 / self.sample_rate as f64;
                *sample = compressed * self.gain.value_at(t);
            }

            self.frames_rendered += block.len() as u64;
            self.tap.push(block);
        }
    }
}

/// Pulls samples from a graph without an output device
pub struct OfflineRenderer {
    graph: SharedGraph,
}

impl OfflineRenderer {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.graph.lock().render(&mut out);
        out
    }

    /// Render `duration` worth of audio, advancing the graph clock
    pub fn render(&self, duration: Duration) -> Vec<f32> {
        let rate = self.graph.lock().sample_rate();
        let frames = (duration.as_secs_f64() * rate as f64).round() as usize;
        self.render_frames(frames)
    }

    pub fn current_time(&self) -> f64 {
        self.graph.lock().current_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const RATE: u32 = 16_000;

    fn clip() -> Arc<[f32]> {
        let samples: Vec<f32> = (0..RATE as usize)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / RATE as f32).sin() * 0.5)
            .collect();
        Arc::from(samples)
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_clock_advances_with_render() {
        let mut graph = SignalGraph::new(RATE, 2000.0, 100.0, SampleWindow::new(256));
        let mut out = vec![0.0; 1600];
        graph.render(&mut out);
        assert_eq!(graph.frames_rendered, 1600);
        assert!((graph.current_time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_silent_without_source() {
        let mut graph = SignalGraph::new(RATE, 2000.0, 100.0, SampleWindow::new(256));
        graph.gain.set_value_at_time(0.3, 0.0);
        let mut out = vec![1.0; 512];
        graph.render(&mut out);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_gain_shapes_output() {
        let graph = SignalGraph::new(RATE, 2000.0, 100.0, SampleWindow::new(256)).shared();
        let renderer = OfflineRenderer::new(graph.clone());
        {
            let mut g = graph.lock();
            g.start_source(clip(), 0.0);
            g.gain.set_value_at_time(0.3, 0.0);
        }

        let out = renderer.render(Duration::from_millis(500));
        let level = peak(&out[4000..]);
        assert!(level > 0.02 && level <= 0.3);

        let now = renderer.current_time();
        graph.lock().gain.set_value_at_time(0.0, now);
        let out = renderer.render(Duration::from_millis(100));
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_stop_releases_source() {
        let graph = SignalGraph::new(RATE, 2000.0, 100.0, SampleWindow::new(256)).shared();
        let renderer = OfflineRenderer::new(graph.clone());
        {
            let mut g = graph.lock();
            g.start_source(clip(), 0.0);
            g.stop_source_at(0.25);
        }

        renderer.render(Duration::from_millis(200));
        assert!(graph.lock().source.is_some());
        renderer.render(Duration::from_millis(100));
        assert!(!graph.lock().source.is_some());
    }

    #[test]
    fn test_tap_receives_output() {
        let tap = SampleWindow::new(256);
        let graph = SignalGraph::new(RATE, 2000.0, 100.0, tap.clone()).shared();
        {
            let mut g = graph.lock();
            g.start_source(clip(), 0.0);
            g.gain.set_value_at_time(0.3, 0.0);
        }
        OfflineRenderer::new(graph).render(Duration::from_millis(100));
        assert_eq!(tap.len(), 256);
        assert!(tap.snapshot().iter().any(|s| s.abs() > 0.01));
    }
}
