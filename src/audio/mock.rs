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
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::mixer::{ActiveSource, AudioMixer};
use super::{AudioError, ContextState};
use crate::playsync::CancelHandle;
use crate::synth::Pluck;

/// Sample rate used when the configuration doesn't name one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A mock device. Nothing reaches a speaker; the clock only moves when frames are rendered
/// explicitly, which makes scheduling fully deterministic.
///
/// - `mock-suspended` starts suspended and resumes on request.
/// - `mock-blocked` starts suspended and refuses every resume, like a browser autoplay policy.
pub struct Device {
    name: String,
    mixer: AudioMixer,
    state: Mutex<ContextState>,
    blocked: bool,
    resume_attempts: AtomicUsize,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        let blocked = name == "mock-blocked";
        let state = if blocked || name == "mock-suspended" {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Device {
            name: name.to_string(),
            mixer: AudioMixer::new(2, sample_rate),
            state: Mutex::new(state),
            blocked,
            resume_attempts: AtomicUsize::new(0),
        }
    }

    /// Renders frames through the mixer, advancing the audio clock. A suspended or closed
    /// device renders nothing.
    pub fn render(&self, num_frames: usize) -> Vec<f32> {
        if *self.state.lock() != ContextState::Running {
            return Vec::new();
        }
        self.mixer.process_frames(num_frames)
    }

    /// Start frames of every scheduled source, in scheduling order.
    pub fn scheduled_start_frames(&self) -> Vec<u64> {
        self.mixer
            .get_active_sources()
            .read()
            .iter()
            .map(|source| source.start_frame)
            .collect()
    }

    /// The number of times resume has been requested.
    pub fn resume_attempts(&self) -> usize {
        self.resume_attempts.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.mixer.current_time()
    }

    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.resume_attempts.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        match *state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::Closed),
            ContextState::Suspended if self.blocked => Err(AudioError::ResumeRejected(
                "output blocked until a user gesture".to_string(),
            )),
            ContextState::Suspended => {
                *state = ContextState::Running;
                info!(device = self.name, "Resumed mock audio context.");
                Ok(())
            }
        }
    }

    fn suspend(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        *state = ContextState::Suspended;
        Ok(())
    }

    fn schedule_pluck(
        &self,
        pluck: Pluck,
        at: f64,
        cancel_handle: CancelHandle,
    ) -> Result<u64, AudioError> {
        if *self.state.lock() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        let start_frame = self.mixer.frame_at(at);
        debug!(
            device = self.name,
            frequency = pluck.frequency(),
            start_frame,
            "Scheduling pluck (mock)."
        );
        Ok(self
            .mixer
            .add_source(ActiveSource::new(pluck, start_frame, cancel_handle)))
    }

    fn stop_sources(&self, source_ids: &[u64]) {
        self.mixer.remove_sources(source_ids);
    }

    fn active_sources(&self) -> usize {
        self.mixer.active_count()
    }

    fn close(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        self.mixer.clear();
        *state = ContextState::Closed;
        info!(device = self.name, "Closed mock audio context.");
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Option<&Device> {
        Some(self)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
