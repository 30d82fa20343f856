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

use fundsp::hacker::*;

/// Butterworth Q.
const Q: f32 = 0.707;

/// A single-channel low-pass filter.
pub struct LowPass {
    cutoff_hz: f32,
    filter: An<FixedSvf<f64, LowpassMode<f64>>>,
}

impl LowPass {
    pub fn new(cutoff_hz: f32, sample_rate: u32) -> Self {
        let mut filter = lowpass_hz(cutoff_hz, Q);
        filter.set_sample_rate(sample_rate as f64);
        Self { cutoff_hz, filter }
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    /// Filters one sample.
    pub fn process(&mut self, sample: f32) -> f32 {
        let input = Frame::from([sample]);
        let output = self.filter.tick(&input);
        output[0]
    }
}

impl fmt::Debug for LowPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowPass")
            .field("cutoff_hz", &self.cutoff_hz)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn rms_after_filter(frequency: f32, cutoff_hz: f32) -> f32 {
        let sample_rate = 44100;
        let mut filter = LowPass::new(cutoff_hz, sample_rate);
        let samples: Vec<f32> = (0..sample_rate)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .map(|s| filter.process(s))
            .skip(4410)
            .collect();
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_passes_low_frequencies() {
        // A unit sine has an RMS of ~0.707.
        assert!(rms_after_filter(200.0, 1800.0) > 0.6);
    }

    #[test]
    fn test_attenuates_high_frequencies() {
        assert!(rms_after_filter(12000.0, 1800.0) < 0.1);
    }
}
