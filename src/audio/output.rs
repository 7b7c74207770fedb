use super::graph::SharedGraph;
use crate::{HoldlineError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// Default output device driven by a `SignalGraph`.
///
/// The cpal stream lives on its own thread for its whole life, so this
/// handle can move between tasks.
pub struct DeviceOutput {
    sample_rate: u32,
    channels: u16,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl DeviceOutput {
    /// Probe the default output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| HoldlineError::AudioDeviceError("No output device available".into()))?;

        let config = device.default_output_config().map_err(|e| {
            HoldlineError::AudioDeviceError(format!("Failed to get output config: {}", e))
        })?;

        info!(
            "Using output device: {} ({} Hz, {} channels)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate().0,
            config.channels()
        );

        Ok(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            worker: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start pulling audio from `graph`
    pub fn start(&mut self, graph: SharedGraph) -> Result<()> {
        if self.worker.is_some() {
            warn!("Output already running");
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let handle = std::thread::Builder::new()
            .name("holdline-audio-out".into())
            .spawn(move || {
                let stream = match open_stream(graph) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Park until the handle is stopped or dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| HoldlineError::AudioDeviceError(format!("Failed to spawn output thread: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|e| HoldlineError::ChannelError(e.to_string()))??;

        self.worker = Some((shutdown_tx, handle));
        info!("Started audio output");
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some((shutdown_tx, handle)) = self.worker.take() {
            let _ = shutdown_tx.send(());
            if handle.join().is_err() {
                error!("Audio output thread panicked");
            }
            info!("Stopped audio output");
        }
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(graph: SharedGraph) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| HoldlineError::AudioDeviceError("No output device available".into()))?;
    let supported = device.default_output_config().map_err(|e| {
        HoldlineError::AudioDeviceError(format!("Failed to get output config: {}", e))
    })?;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let stream = match format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, graph),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, graph),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, graph),
        other => Err(HoldlineError::AudioDeviceError(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| HoldlineError::AudioDeviceError(format!("Failed to start output stream: {}", e)))?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    graph: SharedGraph,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mono = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                mono.resize(frames, 0.0);
                graph.lock().render(&mut mono);

                for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                    frame.fill(T::from_sample(sample));
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| HoldlineError::AudioDeviceError(format!("Failed to build output stream: {}", e)))
}
