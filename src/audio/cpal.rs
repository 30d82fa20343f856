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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::mixer::{ActiveSource, AudioMixer};
use super::{AudioError, ContextState};
use crate::{config, playsync::CancelHandle, synth::Pluck};

/// A small wrapper around a cpal::Device. Once opened with `get`, it owns a continuous output
/// stream that pulls from the mixer.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The running output, if this device has been opened.
    output: Option<OutputManager>,
}

/// Owns the output thread and the mixer it renders from.
struct OutputManager {
    /// The core audio mixer.
    mixer: AudioMixer,
    /// While set, the callback outputs silence and the clock holds still.
    suspended: Arc<AtomicBool>,
    /// The lifecycle state reported to the scheduler.
    state: Mutex<ContextState>,
    /// Releases the output thread, which drops the stream.
    close_handle: CancelHandle,
    /// Handle to the output thread (keeps the stream alive).
    output_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds a callback that mixes into a scratch buffer and converts to the stream's sample type.
fn create_callback<T>(
    mixer: AudioMixer,
    suspended: Arc<AtomicBool>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = mixer.num_channels() as usize;
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        if suspended.load(Ordering::Relaxed) {
            data.fill(T::from_sample(0.0f32));
            return;
        }

        scratch.resize(data.len(), 0.0);
        mixer.process_into_output(&mut scratch, data.len() / channels);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src.clamp(-1.0, 1.0));
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: AudioMixer,
    suspended: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            create_callback::<T>(mixer, suspended),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}

impl OutputManager {
    /// Starts the output thread. The stream is created inside the thread and lives until the
    /// close handle is cancelled. Returns once the stream is playing or has failed to start.
    fn start(
        device: cpal::Device,
        sample_format: cpal::SampleFormat,
        stream_config: cpal::StreamConfig,
    ) -> Result<OutputManager, AudioError> {
        let mixer = AudioMixer::new(stream_config.channels, stream_config.sample_rate);
        let suspended = Arc::new(AtomicBool::new(false));
        let close_handle = CancelHandle::new();
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);

        let output_thread = {
            let mixer = mixer.clone();
            let suspended = suspended.clone();
            let close_handle = close_handle.clone();
            thread::spawn(move || {
                let stream_result = match sample_format {
                    cpal::SampleFormat::F32 => {
                        build_stream::<f32>(&device, &stream_config, mixer, suspended)
                    }
                    cpal::SampleFormat::I16 => {
                        build_stream::<i16>(&device, &stream_config, mixer, suspended)
                    }
                    cpal::SampleFormat::I32 => {
                        build_stream::<i32>(&device, &stream_config, mixer, suspended)
                    }
                    other => Err(AudioError::Stream(format!(
                        "unsupported sample format {}",
                        other
                    ))),
                };

                let stream = match stream_result.and_then(|stream| {
                    stream
                        .play()
                        .map_err(|e| AudioError::Stream(e.to_string()))?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };

                info!("CPAL output stream started successfully");
                let _ = started_tx.send(Ok(()));

                // Keep the stream alive until the device is closed.
                close_handle.wait(Arc::new(AtomicBool::new(false)));
                drop(stream);
            })
        };

        match started_rx.recv() {
            Ok(Ok(())) => Ok(OutputManager {
                mixer,
                suspended,
                state: Mutex::new(ContextState::Running),
                close_handle,
                output_thread: Mutex::new(Some(output_thread)),
            }),
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e)
            }
            Err(_) => Err(AudioError::Stream(
                "output thread exited before the stream started".to_string(),
            )),
        }
    }

    fn close(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        *state = ContextState::Closed;
        drop(state);

        self.mixer.clear();
        self.close_handle.cancel();
        if let Some(thread) = self.output_thread.lock().take() {
            if thread.join().is_err() {
                error!("Error while joining the output thread");
            }
        }
        Ok(())
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Device {
    /// Lists cpal output devices.
    pub fn list() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to open host"
                    );
                    continue;
                }
            };
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name().unwrap_or_default(),
                        max_channels,
                        host_id,
                        device,
                        output: None,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Opens the configured device and starts its output stream. The name "default" picks
    /// the default host's default output.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let span = span!(Level::INFO, "open device (cpal)");
        let _enter = span.enter();

        let name = config.device();
        let mut device = if name == config::DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
            Device {
                name: device.name().unwrap_or_default(),
                max_channels: 0,
                host_id: host.id(),
                device,
                output: None,
            }
        } else {
            Device::list()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?
        };

        let supported = device
            .device
            .default_output_config()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        let sample_rate = config
            .sample_rate()
            .unwrap_or_else(|| supported.sample_rate());
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        device.max_channels = device.max_channels.max(supported.channels());

        info!(
            device = device.name,
            sample_rate,
            channels = stream_config.channels,
            "Opening audio output."
        );

        device.output = Some(OutputManager::start(
            device.device.clone(),
            supported.sample_format(),
            stream_config,
        )?);
        Ok(device)
    }

    fn output(&self) -> Result<&OutputManager, AudioError> {
        self.output.as_ref().ok_or(AudioError::Closed)
    }
}

impl super::Device for Device {
    fn sample_rate(&self) -> u32 {
        self.output
            .as_ref()
            .map(|output| output.mixer.sample_rate())
            .unwrap_or(0)
    }

    fn current_time(&self) -> f64 {
        self.output
            .as_ref()
            .map(|output| output.mixer.current_time())
            .unwrap_or(0.0)
    }

    fn state(&self) -> ContextState {
        self.output
            .as_ref()
            .map(|output| *output.state.lock())
            .unwrap_or(ContextState::Closed)
    }

    fn resume(&self) -> Result<(), AudioError> {
        let output = self.output()?;
        let mut state = output.state.lock();
        match *state {
            ContextState::Closed => Err(AudioError::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                output.suspended.store(false, Ordering::Relaxed);
                *state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn suspend(&self) -> Result<(), AudioError> {
        let output = self.output()?;
        let mut state = output.state.lock();
        match *state {
            ContextState::Closed => Err(AudioError::Closed),
            _ => {
                output.suspended.store(true, Ordering::Relaxed);
                *state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    fn schedule_pluck(
        &self,
        pluck: Pluck,
        at: f64,
        cancel_handle: CancelHandle,
    ) -> Result<u64, AudioError> {
        let output = self.output()?;
        if *output.state.lock() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        let start_frame = output.mixer.frame_at(at);
        Ok(output
            .mixer
            .add_source(ActiveSource::new(pluck, start_frame, cancel_handle)))
    }

    fn stop_sources(&self, source_ids: &[u64]) {
        if let Some(output) = self.output.as_ref() {
            output.mixer.remove_sources(source_ids);
        }
    }

    fn active_sources(&self) -> usize {
        self.output
            .as_ref()
            .map(|output| output.mixer.active_count())
            .unwrap_or(0)
    }

    fn close(&self) -> Result<(), AudioError> {
        let output = self.output()?;
        output.close()?;
        info!(device = self.name, "Closed audio output.");
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Option<&super::mock::Device> {
        None
    }
}
