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
use std::time::Duration;

use crate::pattern::{Pattern, STRINGS};

pub use crate::pattern::SUBDIVISION;

/// The pause between triggering a performance and its first pluck.
pub const LEAD_IN: Duration = Duration::from_millis(50);

/// The share of one step a highlight stays lit.
pub const RELEASE_FRACTION: f64 = 0.7;

/// How long the performance stays marked as running after its last step, to let the final
/// pluck ring out.
pub const TAIL: Duration = Duration::from_millis(1200);

/// One note of a performance, placed in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedNote {
    /// Position in the pattern.
    pub index: usize,
    pub string_index: usize,
    pub frequency: f64,
    pub accent: bool,
    /// Seconds from the trigger to the pluck.
    pub offset: f64,
}

impl PlannedNote {
    /// The offset as a timer delay.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.offset)
    }
}

/// The timing of one performance of a pattern. Computing a plan has no side effects; the
/// scheduler turns it into plucks and timers.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformancePlan {
    step: f64,
    notes: Vec<PlannedNote>,
}

impl PerformancePlan {
    pub fn new(pattern: &Pattern) -> PerformancePlan {
        let step = pattern.step_seconds();
        let lead_in = LEAD_IN.as_secs_f64();
        let notes = pattern
            .sequence
            .iter()
            .enumerate()
            .map(|(index, note)| PlannedNote {
                index,
                string_index: note.string_index,
                frequency: note.frequency,
                accent: note.accent,
                offset: lead_in + index as f64 * step,
            })
            .collect();

        PerformancePlan { step, notes }
    }

    /// Seconds between consecutive notes.
    pub fn step_seconds(&self) -> f64 {
        self.step
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs_f64(self.step)
    }

    /// How long each highlight stays lit.
    pub fn release(&self) -> Duration {
        Duration::from_secs_f64(self.step * RELEASE_FRACTION)
    }

    /// How long the performance is marked as running: every step plus the tail.
    pub fn total(&self) -> Duration {
        Duration::from_secs_f64(self.notes.len() as f64 * self.step) + TAIL
    }

    pub fn notes(&self) -> &[PlannedNote] {
        &self.notes
    }
}

impl fmt::Display for PerformancePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  #  string  frequency  accent  at")?;
        for note in &self.notes {
            writeln!(
                f,
                "{:>3}  {:^6}  {:>7.2}Hz  {:^6}  {:>7.1}ms",
                note.index,
                STRINGS[note.string_index].label,
                note.frequency,
                if note.accent { "!" } else { "" },
                note.offset * 1000.0
            )?;
        }
        write!(
            f,
            "step {:.2}ms, highlight {:.2}ms, performing for {:.0}ms",
            self.step * 1000.0,
            self.release().as_secs_f64() * 1000.0,
            self.total().as_secs_f64() * 1000.0
        )
    }
}
