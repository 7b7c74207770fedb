//! Ambient audio cue
//!
//! A looping clip pushed through a fixed filter chain. Graph nodes stay
//! private to this module; callers drive the `AudioCueEngine` only.

pub mod analyser;
pub mod buffer;
pub mod clip;
pub mod engine;
mod filter;
pub mod follower;
mod graph;
#[cfg(feature = "audio-io")]
pub mod output;
mod param;
mod source;

pub use analyser::{Analyser, FFT_SIZE, FREQUENCY_BIN_COUNT};
pub use buffer::SampleWindow;
pub use clip::{read_wav, write_wav, Clip};
pub use engine::{AudioCueEngine, AudioState, CueConfig, CueLifecycle, CueVariant};
pub use follower::CueFollower;
pub use graph::{OfflineRenderer, RENDER_QUANTUM};
#[cfg(feature = "audio-io")]
pub use output::DeviceOutput;
