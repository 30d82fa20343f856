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
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, span, warn, Level, Span};

use crate::audio::{self, AudioError, ContextState};
use crate::config::{self, StageConfig};
use crate::pattern::{Pattern, PatternKey};
use crate::playsync::CancelHandle;
use crate::stage::{self, StageView};
use crate::synth::Pluck;

use self::performance::Performance;
use self::plan::PerformancePlan;

mod performance;
pub mod plan;
#[cfg(test)]
mod tests;

/// What a call to `perform` set in motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSummary {
    pub pattern: PatternKey,
    pub notes: usize,
    /// Spacing between notes.
    pub step: Duration,
    /// How long the stage stays marked as performing.
    pub duration: Duration,
    /// False when the audio context was unavailable and only the highlights run.
    pub audible: bool,
}

/// Turns the selected pattern into plucks on the audio clock and highlight pulses on the
/// stage view. Owns the audio context and at most one live performance.
pub struct Scheduler {
    /// How to open the audio context.
    audio: config::Audio,
    /// The audio context, opened on first use and reused across performances.
    device: Option<Arc<dyn audio::Device>>,
    /// The pattern the next performance will play.
    selected: PatternKey,
    /// The current or most recent performance.
    performance: Option<Performance>,
    /// Publishes the stage view to the presentation layer.
    view: Arc<watch::Sender<StageView>>,
    /// The logging span.
    span: Span,
}

impl Scheduler {
    /// Creates a scheduler. Nothing is opened until the first performance.
    pub fn new(audio: config::Audio) -> Scheduler {
        let (view, _) = watch::channel(StageView::default());
        Scheduler {
            audio,
            device: None,
            selected: PatternKey::default(),
            performance: None,
            view: Arc::new(view),
            span: span!(Level::INFO, "scheduler"),
        }
    }

    /// Creates a scheduler from a stage configuration, starting on its configured pattern.
    pub fn from_config(config: &StageConfig) -> Scheduler {
        let mut scheduler = Scheduler::new(config.audio().clone());
        if let Some(key) = config.pattern() {
            scheduler.selected = key;
        }
        scheduler
    }

    /// Selects the pattern for the next performance. A running performance keeps playing;
    /// a finished one is discarded.
    pub fn select_pattern(&mut self, key: PatternKey) {
        let span = self.span.clone();
        let _enter = span.enter();

        debug!(pattern = key.name(), "Selected pattern.");
        self.selected = key;
        if !self.is_performing() {
            self.performance = None;
        }
    }

    pub fn selected_pattern(&self) -> PatternKey {
        self.selected
    }

    /// The pattern the next performance will play.
    pub fn pattern(&self) -> &'static Pattern {
        self.selected.pattern()
    }

    /// Opens the audio context if needed and makes sure it is running. A context that can't
    /// be resumed is released, so the next call starts over.
    pub fn open(&mut self) -> Result<(), AudioError> {
        if self
            .device
            .as_ref()
            .is_some_and(|device| device.state() == ContextState::Closed)
        {
            self.device = None;
        }

        let device = match &self.device {
            Some(device) => device.clone(),
            None => {
                let device = audio::get_device(&self.audio)?;
                info!(device = device.to_string(), "Opened audio context.");
                self.device = Some(device.clone());
                device
            }
        };

        if device.state() == ContextState::Suspended {
            if let Err(e) = device.resume() {
                self.device = None;
                if let Err(close_err) = device.close() {
                    debug!(err = close_err.to_string(), "Error closing unusable context.");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Plays the selected pattern, cancelling whatever was playing before. Returns at once;
    /// the work runs on the audio clock and on tokio timers. Must be called within a tokio
    /// runtime.
    pub fn perform(&mut self) -> PerformanceSummary {
        let span = self.span.clone();
        let _enter = span.enter();

        self.cancel_performance();

        let device = match self.open() {
            Ok(()) => self.device.clone(),
            Err(e) => {
                warn!(
                    err = e.to_string(),
                    "Audio is unavailable, performing without sound."
                );
                None
            }
        };

        let key = self.selected;
        let plan = PerformancePlan::new(key.pattern());
        let cancel_handle = CancelHandle::new();
        let mut performance = Performance::new(key, cancel_handle.clone(), device.clone());

        if let Some(device) = device.as_ref() {
            let start_at = device.current_time();
            for note in plan.notes() {
                let pluck = Pluck::new(note.frequency, note.accent, device.sample_rate());
                match device.schedule_pluck(pluck, start_at + note.offset, cancel_handle.clone())
                {
                    Ok(source_id) => performance.add_source(source_id),
                    Err(e) => warn!(
                        err = e.to_string(),
                        note = note.index,
                        "Unable to schedule pluck."
                    ),
                }
            }
        }

        stage::start(&self.view);
        for note in plan.notes() {
            performance.add_timer(tokio::spawn(highlight_pulse(
                self.view.clone(),
                note.string_index,
                note.delay(),
                plan.release(),
            )));
        }
        performance.add_timer(tokio::spawn(reset_stage(self.view.clone(), plan.total())));

        let summary = PerformanceSummary {
            pattern: key,
            notes: plan.notes().len(),
            step: plan.step(),
            duration: plan.total(),
            audible: performance.num_sources() > 0,
        };
        info!(
            pattern = key.name(),
            notes = summary.notes,
            step_ms = plan.step_seconds() * 1000.0,
            audible = summary.audible,
            "Performance started."
        );

        self.performance = Some(performance);
        summary
    }

    /// Cancels everything, closes the audio context and resets the stage. Safe to call at any
    /// time, any number of times.
    pub fn teardown(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        self.cancel_performance();
        if let Some(device) = self.device.take() {
            match device.close() {
                Ok(()) => info!("Closed audio context."),
                Err(e) => debug!(err = e.to_string(), "Ignoring error closing audio context."),
            }
        }
        stage::reset(&self.view);
    }

    /// Cancels the current performance, if any, and clears its highlights.
    fn cancel_performance(&mut self) {
        if let Some(mut performance) = self.performance.take() {
            if performance.pending_timers() > 0 {
                info!(pattern = performance.key().name(), "Cancelling performance.");
            }
            performance.cancel();
            stage::reset(&self.view);
        }
    }

    /// The current stage view.
    pub fn view(&self) -> StageView {
        *self.view.borrow()
    }

    pub fn is_performing(&self) -> bool {
        self.view.borrow().performing
    }

    pub fn active_string(&self) -> Option<usize> {
        self.view.borrow().active_string
    }

    /// Subscribes to stage view changes.
    pub fn subscribe(&self) -> watch::Receiver<StageView> {
        self.view.subscribe()
    }

    /// Timers of the current performance that have not completed.
    pub fn pending_timers(&self) -> usize {
        self.performance
            .as_ref()
            .map(|performance| performance.pending_timers())
            .unwrap_or(0)
    }

    /// Sources waiting on or sounding through the audio context.
    pub fn live_sources(&self) -> usize {
        self.device
            .as_ref()
            .map(|device| device.active_sources())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn device(&self) -> Option<Arc<dyn audio::Device>> {
        self.device.clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Lights a string when its note sounds and releases it after the highlight time.
async fn highlight_pulse(
    view: Arc<watch::Sender<StageView>>,
    string_index: usize,
    delay: Duration,
    release: Duration,
) {
    tokio::time::sleep(delay).await;
    stage::highlight(&view, string_index);
    tokio::time::sleep(release).await;
    stage::release_highlight(&view, string_index);
}

/// Returns the stage to idle once the performance has had time to ring out.
async fn reset_stage(view: Arc<watch::Sender<StageView>>, after: Duration) {
    tokio::time::sleep(after).await;
    stage::reset(&view);
}
