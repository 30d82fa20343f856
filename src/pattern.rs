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

use clap::ValueEnum;
use serde::Deserialize;

/// Eighth-note spacing: each step is half a beat.
pub const SUBDIVISION: f64 = 0.5;

/// A physical string on the dombyra.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DombyraString {
    /// The label printed under the string.
    pub label: &'static str,
    /// The open-tuning frequency in hertz.
    pub frequency: f64,
}

/// The three strings, lowest first.
pub const STRINGS: [DombyraString; 3] = [
    DombyraString {
        label: "G",
        frequency: 196.0,
    },
    DombyraString {
        label: "D",
        frequency: 293.66,
    },
    DombyraString {
        label: "A",
        frequency: 440.0,
    },
];

/// A single stroke in a pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Index into STRINGS.
    pub string_index: usize,
    /// The pitch to sound, in hertz.
    pub frequency: f64,
    /// Accented notes are louder and brighter.
    pub accent: bool,
}

const fn note(string_index: usize, frequency: f64) -> Note {
    Note {
        string_index,
        frequency,
        accent: false,
    }
}

const fn accent(string_index: usize, frequency: f64) -> Note {
    Note {
        string_index,
        frequency,
        accent: true,
    }
}

/// A fixed melodic figure with its tempo.
#[derive(Debug, PartialEq)]
pub struct Pattern {
    pub title: &'static str,
    pub description: &'static str,
    pub bpm: f64,
    pub sequence: &'static [Note],
}

impl Pattern {
    /// The spacing between consecutive notes.
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(self.step_seconds())
    }

    /// The spacing between consecutive notes, in seconds.
    pub fn step_seconds(&self) -> f64 {
        60.0 / self.bpm * SUBDIVISION
    }

    /// The number of strokes in the pattern.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} BPM, {} strokes)",
            self.title,
            self.bpm,
            self.sequence.len()
        )
    }
}

static FESTIVE_STEPPE: Pattern = Pattern {
    title: "Праздничный наигрыш",
    description: "Быстрый ритм с акцентами для шумных юрточных вечеринок.",
    bpm: 132.0,
    sequence: &[
        accent(0, 196.0),
        note(1, 293.66),
        note(2, 440.0),
        note(1, 329.63),
        accent(0, 220.0),
        note(2, 493.88),
        note(1, 261.63),
        note(0, 174.61),
    ],
};

static SUNRISE_MEDITATION: Pattern = Pattern {
    title: "Рассветное созерцание",
    description: "Медленное, медитативное перетекание утренних лучей.",
    bpm: 82.0,
    sequence: &[
        note(2, 392.0),
        note(2, 440.0),
        note(1, 293.66),
        note(0, 196.0),
        note(1, 246.94),
        note(0, 174.61),
        note(2, 349.23),
        note(1, 261.63),
    ],
};

static PLAYFUL_ECHO: Pattern = Pattern {
    title: "Игривое эхо",
    description: "Обезьяньи выкрутасы и подражание голосам птиц.",
    bpm: 104.0,
    sequence: &[
        note(1, 311.13),
        note(2, 466.16),
        note(1, 277.18),
        note(0, 207.65),
        accent(2, 415.3),
        note(1, 293.66),
        note(0, 174.61),
        note(2, 349.23),
    ],
};

/// Identifies one of the built-in patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKey {
    #[default]
    #[serde(alias = "festive")]
    #[value(alias = "festive")]
    FestiveSteppe,
    #[serde(alias = "sunrise")]
    #[value(alias = "sunrise")]
    SunriseMeditation,
    #[serde(alias = "playful")]
    #[value(alias = "playful")]
    PlayfulEcho,
}

impl PatternKey {
    /// All keys, in display order.
    pub const ALL: [PatternKey; 3] = [
        PatternKey::FestiveSteppe,
        PatternKey::SunriseMeditation,
        PatternKey::PlayfulEcho,
    ];

    /// Returns the pattern this key names.
    pub fn pattern(self) -> &'static Pattern {
        match self {
            PatternKey::FestiveSteppe => &FESTIVE_STEPPE,
            PatternKey::SunriseMeditation => &SUNRISE_MEDITATION,
            PatternKey::PlayfulEcho => &PLAYFUL_ECHO,
        }
    }

    /// The kebab-case name used on the command line and in config files.
    pub fn name(self) -> &'static str {
        match self {
            PatternKey::FestiveSteppe => "festive-steppe",
            PatternKey::SunriseMeditation => "sunrise-meditation",
            PatternKey::PlayfulEcho => "playful-echo",
        }
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
