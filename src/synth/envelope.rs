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

/// Exponential ramps can't reach zero, so the envelope rests here.
pub const FLOOR: f64 = 0.0001;

/// Time to reach the peak, in seconds.
pub const ATTACK: f64 = 0.015;

/// Time at which the decay reaches the floor, in seconds.
pub const DECAY_END: f64 = 1.4;

/// Gain envelope for a pluck: an exponential rise from the floor to the peak,
/// then an exponential fall back to the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    peak: f64,
}

impl Envelope {
    pub fn new(peak: f64) -> Self {
        Self {
            peak: peak.max(FLOOR),
        }
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Returns the gain at `t` seconds after the pluck starts.
    pub fn gain_at(&self, t: f64) -> f64 {
        if t <= 0.0 {
            FLOOR
        } else if t < ATTACK {
            exponential_ramp(FLOOR, self.peak, t / ATTACK)
        } else if t < DECAY_END {
            exponential_ramp(self.peak, FLOOR, (t - ATTACK) / (DECAY_END - ATTACK))
        } else {
            FLOOR
        }
    }
}

/// Interpolates from `from` to `to` along an exponential curve, `progress` in [0, 1].
fn exponential_ramp(from: f64, to: f64, progress: f64) -> f64 {
    from * (to / from).powf(progress.clamp(0.0, 1.0))
}
