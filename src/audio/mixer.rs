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
// Core mixing logic shared by the cpal and mock devices. The mixer owns the
// sample clock: every rendered frame advances it, and sources are scheduled
// against it.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::playsync::CancelHandle;
use crate::synth::Pluck;

/// Global atomic counter for generating unique source IDs
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Mixes scheduled plucks into interleaved output frames.
#[derive(Clone)]
pub struct AudioMixer {
    /// Sources waiting to start or currently sounding.
    active_sources: Arc<RwLock<Vec<ActiveSource>>>,
    /// Frames rendered since the mixer was created.
    clock: Arc<AtomicU64>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

/// Represents a scheduled pluck in the mixer
pub struct ActiveSource {
    /// Unique ID for this source
    pub id: u64,
    /// Clock frame at which the pluck starts sounding.
    pub start_frame: u64,
    /// The synthesized voice.
    pub pluck: Pluck,
    /// Whether this source has finished playing
    pub is_finished: Arc<AtomicBool>,
    /// Cancel handle shared with the rest of the performance
    pub cancel_handle: CancelHandle,
}

impl ActiveSource {
    /// Creates a source with a fresh ID.
    pub fn new(pluck: Pluck, start_frame: u64, cancel_handle: CancelHandle) -> Self {
        Self {
            id: SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            start_frame,
            pluck,
            is_finished: Arc::new(AtomicBool::new(false)),
            cancel_handle,
        }
    }
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            active_sources: Arc::new(RwLock::new(Vec::new())),
            clock: Arc::new(AtomicU64::new(0)),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    /// Adds a new source to the mixer and returns its ID.
    pub fn add_source(&self, source: ActiveSource) -> u64 {
        let id = source.id;
        self.active_sources.write().push(source);
        id
    }

    /// Removes sources by ID, silencing them immediately.
    pub fn remove_sources(&self, source_ids: &[u64]) {
        if source_ids.is_empty() {
            return;
        }
        let mut sources = self.active_sources.write();
        sources.retain(|source| {
            if source_ids.contains(&source.id) {
                source.is_finished.store(true, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
    }

    /// Removes every source.
    pub fn clear(&self) {
        let mut sources = self.active_sources.write();
        for source in sources.iter() {
            source.is_finished.store(true, Ordering::Relaxed);
        }
        sources.clear();
    }

    /// Mixes `num_frames` frames into `output` (interleaved) and advances the clock.
    /// Sources that are cancelled or have run out are dropped.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let channels = self.num_channels as usize;
        let num_frames = num_frames.min(output.len() / channels);
        output[..num_frames * channels].fill(0.0);

        let block_start = self.clock.load(Ordering::Acquire);
        let block_end = block_start + num_frames as u64;

        let mut sources = self.active_sources.write();
        sources.retain_mut(|active_source| {
            if active_source.is_finished.load(Ordering::Relaxed)
                || active_source.cancel_handle.is_cancelled()
            {
                return false;
            }
            if active_source.start_frame >= block_end {
                return true;
            }

            let offset = active_source.start_frame.saturating_sub(block_start) as usize;
            for frame in output[offset * channels..num_frames * channels].chunks_mut(channels) {
                match active_source.pluck.next_sample() {
                    Some(sample) => frame.iter_mut().for_each(|out| *out += sample),
                    None => break,
                }
            }

            if active_source.pluck.is_finished() {
                active_source.is_finished.store(true, Ordering::Relaxed);
                return false;
            }
            true
        });
        drop(sources);

        self.clock.store(block_end, Ordering::Release);
    }

    /// Renders `num_frames` frames into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// The number of sources that are scheduled or sounding.
    pub fn active_count(&self) -> usize {
        self.active_sources.read().len()
    }

    /// Frames rendered so far.
    pub fn clock_frames(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Seconds rendered so far.
    pub fn current_time(&self) -> f64 {
        self.clock_frames() as f64 / self.sample_rate as f64
    }

    /// Converts an audio-clock time to a frame index.
    pub fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Gets a reference to the active sources
    pub fn get_active_sources(&self) -> Arc<RwLock<Vec<ActiveSource>>> {
        self.active_sources.clone()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn pluck(sample_rate: u32) -> Pluck {
        Pluck::with_rng(196.0, false, sample_rate, &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn test_source_waits_for_start_frame() {
        let mixer = AudioMixer::new(2, 8000);
        mixer.add_source(ActiveSource::new(pluck(8000), 10, CancelHandle::new()));

        let frames = mixer.process_frames(20);
        assert_eq!(frames.len(), 40);
        assert!(frames[..20].iter().all(|s| *s == 0.0));
        assert_eq!(mixer.clock_frames(), 20);
        assert_eq!(mixer.active_count(), 1);

        // Both channels carry the same mono signal.
        for frame in frames.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_source_finishes() {
        let mixer = AudioMixer::new(1, 8000);
        let source = ActiveSource::new(pluck(8000), 0, CancelHandle::new());
        let finished = source.is_finished.clone();
        mixer.add_source(source);

        // A pluck lasts 1.5 seconds.
        mixer.process_frames(11999);
        assert_eq!(mixer.active_count(), 1);
        mixer.process_frames(10);
        assert_eq!(mixer.active_count(), 0);
        assert!(finished.load(Ordering::Relaxed));
    }

    #[test]
    fn test_cancelled_sources_are_dropped() {
        let mixer = AudioMixer::new(1, 8000);
        let cancel_handle = CancelHandle::new();
        for start in [0, 100, 200] {
            mixer.add_source(ActiveSource::new(pluck(8000), start, cancel_handle.clone()));
        }
        mixer.add_source(ActiveSource::new(pluck(8000), 0, CancelHandle::new()));
        assert_eq!(mixer.active_count(), 4);

        cancel_handle.cancel();
        mixer.process_frames(1);
        assert_eq!(mixer.active_count(), 1);
    }

    #[test]
    fn test_remove_sources() {
        let mixer = AudioMixer::new(1, 8000);
        let first = mixer.add_source(ActiveSource::new(pluck(8000), 0, CancelHandle::new()));
        let second = mixer.add_source(ActiveSource::new(pluck(8000), 0, CancelHandle::new()));
        assert_ne!(first, second);

        mixer.remove_sources(&[first]);
        assert_eq!(mixer.active_count(), 1);

        mixer.clear();
        assert_eq!(mixer.active_count(), 0);
        assert!(mixer.process_frames(16).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_frame_at() {
        let mixer = AudioMixer::new(2, 44100);
        assert_eq!(mixer.frame_at(0.05), 2205);
        assert_eq!(mixer.frame_at(-1.0), 0);
        assert_eq!(mixer.current_time(), 0.0);
    }
}
