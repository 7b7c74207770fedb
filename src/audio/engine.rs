//! Ambient cue engine
//!
//! Owns the signal graph and drives it with parameter automation. It never
//! sees messages: the only input is the cue signal derived from the
//! conversation state.

use super::analyser::Analyser;
use super::clip::Clip;
use super::graph::{OfflineRenderer, SharedGraph, SignalGraph};
#[cfg(feature = "audio-io")]
use super::output::DeviceOutput;
use crate::conversation::CueSignal;
use crate::{HoldlineError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Filter band of the cue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueVariant {
    /// Hold music: LP 2000 Hz, HP 100 Hz
    #[default]
    Normal,
    /// Narrow band while transferring: LP 1200 Hz, HP 400 Hz
    Telephone,
}

impl CueVariant {
    pub fn lowpass_hz(&self) -> f32 {
        match self {
            CueVariant::Normal => 2000.0,
            CueVariant::Telephone => 1200.0,
        }
    }

    pub fn highpass_hz(&self) -> f32 {
        match self {
            CueVariant::Normal => 100.0,
            CueVariant::Telephone => 400.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CueLifecycle {
    /// Clip still decoding; `play` is dropped
    Loading,
    Idle,
    Playing,
    /// Output released; every call is a no-op
    Closed,
}

/// Observable state of the cue
#[derive(Clone, Debug, PartialEq)]
pub struct AudioState {
    pub is_playing: bool,
    pub variant: CueVariant,
    pub gain: f32,
    pub lowpass_hz: f32,
    pub highpass_hz: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    /// WAV clip looped while on hold or transferring
    pub clip_path: Option<PathBuf>,
    /// Gain reached at the end of a fade-in
    pub gain_ceiling: f32,
    /// Playback starts this far into the clip (modulo its length)
    pub loop_offset_secs: f64,
    pub waiting_fade_ms: u64,
    pub transfer_fade_ms: u64,
    pub stop_fade_ms: u64,
    /// Low-pass cutoff a normal fade-in sweeps up from
    pub sweep_start_hz: f32,
    /// Low-pass cutoff a fade-out sweeps down to
    pub sweep_floor_hz: f32,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            clip_path: None,
            gain_ceiling: 0.3,
            loop_offset_secs: 1000.0,
            waiting_fade_ms: 1000,
            transfer_fade_ms: 800,
            stop_fade_ms: 800,
            sweep_start_hz: 500.0,
            sweep_floor_hz: 200.0,
        }
    }
}

impl CueConfig {
    pub fn with_clip(mut self, path: impl Into<PathBuf>) -> Self {
        self.clip_path = Some(path.into());
        self
    }

    pub fn waiting_fade(&self) -> Duration {
        Duration::from_millis(self.waiting_fade_ms)
    }

    pub fn transfer_fade(&self) -> Duration {
        Duration::from_millis(self.transfer_fade_ms)
    }

    pub fn stop_fade(&self) -> Duration {
        Duration::from_millis(self.stop_fade_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gain_ceiling) {
            return Err(HoldlineError::ConfigError(format!(
                "gain_ceiling must be within 0..=1, got {}",
                self.gain_ceiling
            )));
        }
        if self.sweep_start_hz <= 0.0 || self.sweep_floor_hz <= 0.0 {
            return Err(HoldlineError::ConfigError(
                "Filter sweep frequencies must be positive".into(),
            ));
        }
        Ok(())
    }
}

struct EngineState {
    lifecycle: CueLifecycle,
    variant: CueVariant,
    clip: Option<Clip>,
    #[cfg(feature = "audio-io")]
    output: Option<DeviceOutput>,
}

impl EngineState {
    #[cfg(feature = "audio-io")]
    fn release_output(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.stop();
        }
    }

    #[cfg(not(feature = "audio-io"))]
    fn release_output(&mut self) {}
}

pub struct AudioCueEngine {
    state: Mutex<EngineState>,
    graph: SharedGraph,
    analyser: Mutex<Analyser>,
    ready_tx: watch::Sender<bool>,
    config: CueConfig,
}

impl AudioCueEngine {
    /// Engine rendering at `sample_rate`, waiting for its clip
    pub fn new(sample_rate: u32, config: CueConfig) -> Arc<Self> {
        let analyser = Analyser::new();
        let variant = CueVariant::Normal;
        let graph = SignalGraph::new(
            sample_rate,
            variant.lowpass_hz(),
            variant.highpass_hz(),
            analyser.tap(),
        )
        .shared();
        let (ready_tx, _) = watch::channel(false);

        Arc::new(Self {
            state: Mutex::new(EngineState {
                lifecycle: CueLifecycle::Loading,
                variant,
                clip: None,
                #[cfg(feature = "audio-io")]
                output: None,
            }),
            graph,
            analyser: Mutex::new(analyser),
            ready_tx,
            config,
        })
    }

    /// Engine plus a renderer that advances its clock on demand
    pub fn offline(sample_rate: u32, config: CueConfig) -> (Arc<Self>, OfflineRenderer) {
        let engine = Self::new(sample_rate, config);
        let renderer = OfflineRenderer::new(Arc::clone(&engine.graph));
        (engine, renderer)
    }

    /// Engine playing on the default output device
    #[cfg(feature = "audio-io")]
    pub fn with_device(config: CueConfig) -> Result<Arc<Self>> {
        let mut output = DeviceOutput::new()?;
        let engine = Self::new(output.sample_rate(), config);
        output.start(Arc::clone(&engine.graph))?;
        engine.state.lock().output = Some(output);
        Ok(engine)
    }

    /// Decode the configured clip off the async runtime, then become ready
    pub async fn load(&self) -> Result<()> {
        let path = self
            .config
            .clip_path
            .clone()
            .ok_or_else(|| HoldlineError::ConfigError("No cue clip configured".into()))?;
        let rate = self.sample_rate();

        let clip = tokio::task::spawn_blocking(move || Clip::load(path, rate))
            .await
            .map_err(|e| HoldlineError::AudioProcessingError(format!("Clip decode task failed: {}", e)))??;
        self.set_clip(clip);
        Ok(())
    }

    /// Install a decoded clip and signal readiness
    pub fn set_clip(&self, clip: Clip) {
        {
            let mut state = self.state.lock();
            if state.lifecycle == CueLifecycle::Closed {
                debug!("Engine closed, ignoring clip");
                return;
            }
            if clip.sample_rate() != self.sample_rate() {
                warn!(
                    "Clip rate {} Hz differs from graph rate {} Hz",
                    clip.sample_rate(),
                    self.sample_rate()
                );
            }
            state.clip = Some(clip);
            if state.lifecycle == CueLifecycle::Loading {
                state.lifecycle = CueLifecycle::Idle;
            }
        }
        info!("Audio cue ready");
        self.ready_tx.send_replace(true);
    }

    pub fn config(&self) -> &CueConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.lock().sample_rate()
    }

    pub fn lifecycle(&self) -> CueLifecycle {
        self.state.lock().lifecycle
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            self.lifecycle(),
            CueLifecycle::Idle | CueLifecycle::Playing
        )
    }

    pub fn is_playing(&self) -> bool {
        self.lifecycle() == CueLifecycle::Playing
    }

    /// Readiness channel; flips to `true` once the clip is decoded
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Start the cue with a fade-in. No-op unless idle and ready.
    pub fn play(&self, variant: CueVariant, fade_in: Duration) {
        let mut state = self.state.lock();
        match state.lifecycle {
            CueLifecycle::Idle => {}
            CueLifecycle::Loading => {
                debug!("Cue not ready, dropping play");
                return;
            }
            CueLifecycle::Playing | CueLifecycle::Closed => return,
        }
        let Some(clip) = state.clip.as_ref().map(Clip::samples) else {
            return;
        };

        let mut graph = self.graph.lock();
        let now = graph.current_time();
        let end = now + fade_in.as_secs_f64();

        graph.start_source(clip, self.config.loop_offset_secs);

        graph.gain.cancel_and_hold_at_time(now);
        graph.gain.set_value_at_time(0.0, now);
        graph
            .gain
            .linear_ramp_to_value_at_time(self.config.gain_ceiling, end);

        graph.highpass_hz.cancel_and_hold_at_time(now);
        graph.highpass_hz.set_value_at_time(variant.highpass_hz(), now);
        graph.lowpass_hz.cancel_and_hold_at_time(now);
        match variant {
            CueVariant::Normal => {
                graph
                    .lowpass_hz
                    .set_value_at_time(self.config.sweep_start_hz, now);
                graph
                    .lowpass_hz
                    .exponential_ramp_to_value_at_time(variant.lowpass_hz(), end);
            }
            CueVariant::Telephone => {
                graph.lowpass_hz.set_value_at_time(variant.lowpass_hz(), now);
            }
        }

        state.lifecycle = CueLifecycle::Playing;
        state.variant = variant;
        debug!("Cue playing ({:?}, fade {:?})", variant, fade_in);
    }

    /// Fade the cue out and release the source when the fade ends.
    /// No-op unless playing.
    pub fn stop(&self, fade_out: Duration) {
        let mut state = self.state.lock();
        if state.lifecycle != CueLifecycle::Playing {
            return;
        }

        let mut graph = self.graph.lock();
        let now = graph.current_time();
        let end = now + fade_out.as_secs_f64();

        graph.gain.cancel_and_hold_at_time(now);
        graph.gain.linear_ramp_to_value_at_time(0.0, end);
        graph.lowpass_hz.cancel_and_hold_at_time(now);
        graph
            .lowpass_hz
            .exponential_ramp_to_value_at_time(self.config.sweep_floor_hz, end);
        graph.stop_source_at(end);

        state.lifecycle = CueLifecycle::Idle;
        debug!("Cue stopping (fade {:?})", fade_out);
    }

    /// Bring the cue in line with the conversation
    pub fn follow(&self, signal: CueSignal) {
        let target = match signal {
            CueSignal::Waiting => Some((CueVariant::Normal, self.config.waiting_fade())),
            CueSignal::Transferring => Some((CueVariant::Telephone, self.config.transfer_fade())),
            CueSignal::None => None,
        };

        match target {
            Some((variant, fade)) => {
                let retune = {
                    let state = self.state.lock();
                    state.lifecycle == CueLifecycle::Playing && state.variant != variant
                };
                if retune {
                    self.stop(Duration::ZERO);
                }
                self.play(variant, fade);
            }
            None => self.stop(self.config.stop_fade()),
        }
    }

    /// Current byte spectrum of the output. Does not touch playback.
    pub fn spectrum(&self) -> Vec<u8> {
        self.analyser.lock().byte_frequency_data()
    }

    pub fn audio_state(&self) -> AudioState {
        let (is_playing, variant) = {
            let state = self.state.lock();
            (state.lifecycle == CueLifecycle::Playing, state.variant)
        };
        let graph = self.graph.lock();
        let now = graph.current_time();
        AudioState {
            is_playing,
            variant,
            gain: graph.gain.value_at(now),
            lowpass_hz: graph.lowpass_hz.value_at(now),
            highpass_hz: graph.highpass_hz.value_at(now),
        }
    }

    /// Silence the cue and release the output device
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.lifecycle == CueLifecycle::Closed {
            return;
        }
        {
            let mut graph = self.graph.lock();
            let now = graph.current_time();
            graph.gain.cancel_and_hold_at_time(now);
            graph.gain.set_value_at_time(0.0, now);
            graph.release_source();
        }
        state.release_output();
        state.lifecycle = CueLifecycle::Closed;
        state.clip = None;
        drop(state);

        self.analyser.lock().reset();
        self.ready_tx.send_replace(false);
        info!("Audio cue closed");
    }
}
