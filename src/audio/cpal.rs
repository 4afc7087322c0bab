// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use super::mixer::{ActiveSource, AudioMixer};
use super::source::RateShiftedSource;
use super::{next_source_id, OutputSink, SampleBuffer, SinkError, VoiceHandle};
use crate::config::EngineConfig;
use crate::playsync::CancelHandle;

/// An output sink backed by a cpal stream. Voices are handed to the audio callback over a
/// channel and mixed there.
pub struct Sink {
    /// The device name.
    name: String,
    /// The mixer shared with the audio callback.
    mixer: AudioMixer,
    /// Channel for adding sources without taking the mixer lock on the caller's thread.
    source_tx: Sender<ActiveSource>,
    /// Dropping this sender ends the output thread.
    shutdown_tx: Option<Sender<()>>,
    /// The thread that owns the cpal stream.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl Sink {
    /// Lists the names of all output devices across the available hosts.
    pub fn list() -> Result<Vec<String>, SinkError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut names = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = e.to_string(), host = host_id.name(), "Unable to open host");
                    continue;
                }
            };
            let devices = match host.output_devices() {
                Ok(devices) => devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };
            names.extend(devices.filter_map(|device| device_name(&device)));
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Opens the configured device (or the default one) and starts its output stream.
    pub fn get(config: &EngineConfig) -> Result<Sink, SinkError> {
        let host = cpal::default_host();
        let device = match config.device() {
            Some(name) => host
                .output_devices()
                .map_err(|e| SinkError::Device(e.to_string()))?
                .find(|device| device_name(device).is_some_and(|n| n.trim() == name))
                .ok_or_else(|| SinkError::DeviceNotFound(name.to_string()))?,
            None => host
                .default_output_device()
                .ok_or(SinkError::NoDefaultDevice)?,
        };
        let name = device_name(&device).unwrap_or_else(|| "unknown device".to_string());
        let sample_format = device
            .default_output_config()
            .map_err(|e| SinkError::Device(e.to_string()))?
            .sample_format();

        let mixer = AudioMixer::new(config.channels(), config.sample_rate());
        let stream_config = cpal::StreamConfig {
            channels: mixer.num_channels(),
            sample_rate: mixer.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), SinkError>>(1);

        // The stream is created and kept on its own thread, since cpal streams are not Send
        // on every platform.
        let callback_mixer = mixer.clone();
        let output_thread = thread::spawn(move || {
            let stream = match build_stream(
                &device,
                &stream_config,
                sample_format,
                callback_mixer,
                source_rx,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(SinkError::Device(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Blocks until the sink is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(SinkError::StreamClosed);
            }
        }

        info!(
            device = name,
            channels = mixer.num_channels(),
            sample_rate = mixer.sample_rate(),
            format = ?sample_format,
            "CPAL output stream started"
        );

        Ok(Sink {
            name,
            mixer,
            source_tx,
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

impl OutputSink for Sink {
    fn create_voice(
        &self,
        buffer: &SampleBuffer,
        rate: f64,
        looping: bool,
    ) -> Result<Box<dyn VoiceHandle>, SinkError> {
        let source = RateShiftedSource::new(buffer.clone(), rate, self.mixer.sample_rate(), looping);
        Ok(Box::new(Voice {
            id: next_source_id(),
            source: Some(source),
            cancel_handle: CancelHandle::new(),
            source_tx: self.source_tx.clone(),
        }))
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        let stopped = self.mixer.clear();
        if stopped > 0 {
            debug!(stopped, "Cleared voices on output shutdown");
        }

        self.shutdown_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// A voice routed through the cpal mixer.
struct Voice {
    id: u64,
    /// Present until the voice is started.
    source: Option<RateShiftedSource>,
    cancel_handle: CancelHandle,
    source_tx: Sender<ActiveSource>,
}

impl VoiceHandle for Voice {
    fn start(&mut self) -> Result<(), SinkError> {
        if self.cancel_handle.is_cancelled() {
            return Err(SinkError::StreamClosed);
        }
        let Some(source) = self.source.take() else {
            return Ok(());
        };
        self.source_tx
            .send(ActiveSource {
                source,
                cancel_handle: self.cancel_handle.clone(),
            })
            .map_err(|_| SinkError::StreamClosed)?;
        debug!(id = self.id, "Voice handed to the output stream");
        Ok(())
    }

    fn stop(&mut self) {
        self.source = None;
        self.cancel_handle.cancel();
    }

    fn is_finished(&self) -> bool {
        self.source.is_none() && self.cancel_handle.is_cancelled()
    }
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> Option<String> {
    device.name().ok()
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: AudioMixer,
    source_rx: Receiver<ActiveSource>,
) -> Result<cpal::Stream, SinkError> {
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, mixer, source_rx),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, mixer, source_rx),
        cpal::SampleFormat::I32 => build_typed_stream::<i32>(device, config, mixer, source_rx),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, mixer, source_rx),
        other => {
            return Err(SinkError::Device(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };
    stream.map_err(|e| SinkError::Device(e.to_string()))
}

/// Builds a stream whose callback drains newly started voices into the mixer, mixes one block
/// in f32 and converts it to the device format.
fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: AudioMixer,
    source_rx: Receiver<ActiveSource>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(source) = source_rx.try_recv() {
                mixer.add_source(source);
            }

            scratch.resize(data.len(), 0.0);
            mixer.process_into_output(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}
