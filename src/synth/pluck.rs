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
use rand::Rng;

use super::envelope::Envelope;
use super::filter::LowPass;

/// How long the tonal oscillator rings, in seconds.
pub const OSCILLATOR_LENGTH: f64 = 1.5;

/// How long the noise transient lasts, in seconds.
pub const NOISE_LENGTH: f64 = 0.4;

/// Decay constant of the noise burst, in samples.
const NOISE_DECAY_SAMPLES: f64 = 1500.0;

const ACCENT_PEAK: f64 = 0.9;
const PEAK: f64 = 0.6;
const ACCENT_CUTOFF_HZ: f32 = 2200.0;
const CUTOFF_HZ: f32 = 1800.0;

/// One synthesized pluck: a triangle tone plus a decaying noise burst, low-passed and shaped
/// by a fixed gain envelope. Only the noise content is random.
#[derive(Debug)]
pub struct Pluck {
    frequency: f64,
    accent: bool,
    sample_rate: u32,
    /// Oscillator phase in [0, 1).
    phase: f64,
    /// Frames rendered so far.
    frame: u64,
    /// Frame at which the oscillator stops.
    end_frame: u64,
    noise: Vec<f32>,
    envelope: Envelope,
    filter: LowPass,
}

impl Pluck {
    /// Creates a pluck with noise drawn from the thread-local generator.
    pub fn new(frequency: f64, accent: bool, sample_rate: u32) -> Self {
        Self::with_rng(frequency, accent, sample_rate, &mut rand::thread_rng())
    }

    /// Creates a pluck with noise drawn from the given generator.
    pub fn with_rng<R: Rng + ?Sized>(
        frequency: f64,
        accent: bool,
        sample_rate: u32,
        rng: &mut R,
    ) -> Self {
        let noise_len = (sample_rate as f64 * NOISE_LENGTH) as usize;
        let noise = (0..noise_len)
            .map(|i| {
                let white: f64 = rng.gen_range(-1.0..=1.0);
                (white * (-(i as f64) / NOISE_DECAY_SAMPLES).exp()) as f32
            })
            .collect();

        let (peak, cutoff_hz) = if accent {
            (ACCENT_PEAK, ACCENT_CUTOFF_HZ)
        } else {
            (PEAK, CUTOFF_HZ)
        };

        Self {
            frequency,
            accent,
            sample_rate,
            phase: 0.0,
            frame: 0,
            end_frame: (sample_rate as f64 * OSCILLATOR_LENGTH).round() as u64,
            noise,
            envelope: Envelope::new(peak),
            filter: LowPass::new(cutoff_hz, sample_rate),
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn is_accented(&self) -> bool {
        self.accent
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.filter.cutoff_hz()
    }

    /// Total length of the pluck in frames.
    pub fn duration_frames(&self) -> u64 {
        self.end_frame
    }

    pub fn is_finished(&self) -> bool {
        self.frame >= self.end_frame
    }

    /// Renders the next sample, or None once the oscillator has stopped.
    pub fn next_sample(&mut self) -> Option<f32> {
        if self.is_finished() {
            return None;
        }

        let t = self.frame as f64 / self.sample_rate as f64;
        let tone = triangle(self.phase);
        self.phase = (self.phase + self.frequency / self.sample_rate as f64).fract();

        let noise = self.noise.get(self.frame as usize).copied().unwrap_or(0.0);
        let filtered = self.filter.process(tone as f32 + noise);

        self.frame += 1;
        Some(filtered * self.envelope.gain_at(t) as f32)
    }
}

/// A triangle wave that starts at zero and rises to 1.0 at a quarter cycle.
fn triangle(phase: f64) -> f64 {
    4.0 * ((phase + 0.75).fract() - 0.5).abs() - 1.0
}
