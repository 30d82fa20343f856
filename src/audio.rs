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
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config;
use crate::playsync::CancelHandle;
use crate::synth::Pluck;

pub mod cpal;
pub mod mixer;
pub mod mock;

/// Errors raised by the audio output context.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("no device found with name {0}")]
    DeviceNotFound(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("audio context could not be resumed: {0}")]
    ResumeRejected(String),

    #[error("audio context is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The lifecycle state of an audio output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// The clock is advancing and scheduled sources will sound.
    Running,
    /// Output is held; the clock does not advance until resumed.
    Suspended,
    /// The context has been released and can't be used again.
    Closed,
}

/// An audio output context. Supplies the audio clock, accepts plucks scheduled against it,
/// and can be suspended, resumed and closed.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// The output sample rate.
    fn sample_rate(&self) -> u32;

    /// The audio clock, in seconds since the context was opened.
    fn current_time(&self) -> f64;

    /// The current lifecycle state.
    fn state(&self) -> ContextState;

    /// Resumes a suspended context. Resuming a running context is a no-op.
    fn resume(&self) -> Result<(), AudioError>;

    /// Holds output. Scheduled sources wait until the context is resumed.
    fn suspend(&self) -> Result<(), AudioError>;

    /// Schedules a pluck to start at `at` seconds on the audio clock. Returns the source ID.
    fn schedule_pluck(
        &self,
        pluck: Pluck,
        at: f64,
        cancel_handle: CancelHandle,
    ) -> Result<u64, AudioError>;

    /// Stops the given sources immediately.
    fn stop_sources(&self, source_ids: &[u64]);

    /// The number of sources that are scheduled or sounding.
    fn active_sources(&self) -> usize;

    /// Stops every source and releases the output.
    fn close(&self) -> Result<(), AudioError>;

    #[cfg(test)]
    fn to_mock(&self) -> Option<&mock::Device>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn fmt::Display>>, AudioError> {
    Ok(cpal::Device::list()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn fmt::Display> = Box::new(device);
            device
        })
        .collect())
}

/// Opens the device named in the configuration. Names starting with "mock" yield a mock device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(
            device,
            config.sample_rate().unwrap_or(mock::DEFAULT_SAMPLE_RATE),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let device = get_device(&config::Audio::new("mock")).unwrap();
        assert_eq!(device.state(), ContextState::Running);
        assert_eq!(device.sample_rate(), 44100);
        assert!(device.to_mock().is_some());
        assert_eq!(device.to_string(), "mock (Mock)");
    }

    #[test]
    fn test_get_suspended_mock_device() {
        let device = get_device(&config::Audio::new("mock-suspended")).unwrap();
        assert_eq!(device.state(), ContextState::Suspended);
        assert!(device.resume().is_ok());
        assert_eq!(device.state(), ContextState::Running);

        assert!(device.suspend().is_ok());
        assert_eq!(device.state(), ContextState::Suspended);
    }
}
