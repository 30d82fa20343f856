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
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::audio;
use crate::pattern::PatternKey;
use crate::playsync::CancelHandle;

/// The live resources of one performance: the sources it put on the mixer and the timers
/// driving its highlights. Cancelling releases all of them at once.
pub(super) struct Performance {
    /// The pattern being played.
    key: PatternKey,
    /// Shared by every source of this performance.
    cancel_handle: CancelHandle,
    /// The device the sources were scheduled on, if the performance is audible.
    device: Option<Arc<dyn audio::Device>>,
    source_ids: Vec<u64>,
    timers: Vec<JoinHandle<()>>,
}

impl Performance {
    pub(super) fn new(
        key: PatternKey,
        cancel_handle: CancelHandle,
        device: Option<Arc<dyn audio::Device>>,
    ) -> Performance {
        Performance {
            key,
            cancel_handle,
            device,
            source_ids: Vec::new(),
            timers: Vec::new(),
        }
    }

    pub(super) fn key(&self) -> PatternKey {
        self.key
    }

    pub(super) fn add_source(&mut self, source_id: u64) {
        self.source_ids.push(source_id);
    }

    pub(super) fn add_timer(&mut self, timer: JoinHandle<()>) {
        self.timers.push(timer);
    }

    pub(super) fn num_sources(&self) -> usize {
        self.source_ids.len()
    }

    /// Timers that have not fired to completion yet.
    pub(super) fn pending_timers(&self) -> usize {
        self.timers.iter().filter(|timer| !timer.is_finished()).count()
    }

    /// Aborts every timer and stops every source. Calling this again does nothing.
    pub(super) fn cancel(&mut self) {
        self.cancel_handle.cancel();
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        if let Some(device) = self.device.take() {
            device.stop_sources(&self.source_ids);
        }
        self.source_ids.clear();
    }
}

impl Drop for Performance {
    fn drop(&mut self) {
        self.cancel();
    }
}
