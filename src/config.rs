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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use crate::pattern::PatternKey;

mod audio;
mod error;

pub use self::audio::{Audio, DEFAULT_DEVICE};
pub use self::error::ConfigError;

/// The YAML configuration for a stage: where to send audio and which pattern to start on.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct StageConfig {
    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,

    /// The pattern selected when the stage starts.
    pattern: Option<PatternKey>,
}

impl StageConfig {
    /// Creates a new stage configuration.
    pub fn new(audio: Audio, pattern: Option<PatternKey>) -> StageConfig {
        StageConfig { audio, pattern }
    }

    /// Parse a stage configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<StageConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<StageConfig>()?)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the initial pattern, if one is configured.
    pub fn pattern(&self) -> Option<PatternKey> {
        self.pattern
    }

    /// Replaces the configured audio device, keeping the other audio settings.
    pub fn with_device(mut self, device: &str) -> StageConfig {
        self.audio = self.audio.with_device(device);
        self
    }
}
