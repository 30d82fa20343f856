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
use std::time::Duration;

use ::config::{Config, File, FileFormat};
use tokio::time::{sleep_until, Instant};

use super::*;

fn scheduler(device: &str) -> Scheduler {
    Scheduler::new(crate::config::Audio::new(device))
}

/// Waits until the given number of milliseconds after start.
async fn at(start: Instant, millis: u64) {
    sleep_until(start + Duration::from_millis(millis)).await;
}

fn expected_start_frames(pattern: &Pattern, start_at: f64, sample_rate: f64) -> Vec<u64> {
    let step = 60.0 / pattern.bpm * 0.5;
    (0..pattern.len())
        .map(|i| ((start_at + 0.05 + i as f64 * step) * sample_rate).round() as u64)
        .collect()
}

fn assert_frames_close(actual: &[u64], expected: &[u64]) {
    assert_eq!(actual.len(), expected.len());
    for (actual, expected) in actual.iter().zip(expected) {
        assert!(
            actual.abs_diff(*expected) <= 1,
            "start frame {} expected {}",
            actual,
            expected
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_festive_performance() {
    let start = Instant::now();
    let mut scheduler = scheduler("mock");
    scheduler.select_pattern(PatternKey::FestiveSteppe);

    let summary = scheduler.perform();
    assert_eq!(summary.pattern, PatternKey::FestiveSteppe);
    assert_eq!(summary.notes, 8);
    assert!(summary.audible);
    assert_eq!(summary.step.as_micros(), 227_272);
    assert_eq!(summary.duration.as_millis(), 3018);

    let device = scheduler.device().expect("device should be open");
    let mock = device.to_mock().expect("device should be a mock");
    let start_frames = mock.scheduled_start_frames();
    assert_frames_close(
        &start_frames,
        &expected_start_frames(PatternKey::FestiveSteppe.pattern(), 0.0, 44100.0),
    );
    assert_eq!(start_frames[0], 2205);
    assert_eq!(start_frames[1], 12228);

    assert_eq!(scheduler.live_sources(), 8);
    assert_eq!(scheduler.pending_timers(), 9);
    assert!(scheduler.is_performing());

    at(start, 3000).await;
    assert!(scheduler.is_performing());

    at(start, 3030).await;
    assert!(!scheduler.is_performing());
    assert_eq!(scheduler.active_string(), None);
    assert_eq!(scheduler.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_highlights_follow_notes() {
    let start = Instant::now();
    let mut scheduler = scheduler("mock");
    let mut receiver = scheduler.subscribe();

    scheduler.perform();
    assert!(receiver.borrow_and_update().performing);
    assert_eq!(scheduler.active_string(), None);

    // Notes land at 50ms + i * 227.27ms and stay lit for 159.09ms.
    at(start, 60).await;
    assert_eq!(scheduler.active_string(), Some(0));
    at(start, 220).await;
    assert_eq!(scheduler.active_string(), None);
    at(start, 290).await;
    assert_eq!(scheduler.active_string(), Some(1));
    at(start, 520).await;
    assert_eq!(scheduler.active_string(), Some(2));
    at(start, 740).await;
    assert_eq!(scheduler.active_string(), Some(1));

    let strings: Vec<usize> = PatternKey::FestiveSteppe
        .pattern()
        .sequence
        .iter()
        .map(|note| note.string_index)
        .collect();
    assert_eq!(strings, vec![0, 1, 2, 1, 0, 2, 1, 0]);

    at(start, 3100).await;
    assert!(receiver.has_changed().unwrap());
    assert_eq!(*receiver.borrow_and_update(), StageView::default());
}

#[tokio::test(start_paused = true)]
async fn test_double_perform_replaces_first() {
    let mut scheduler = scheduler("mock");

    scheduler.perform();
    let device = scheduler.device().expect("device should be open");
    assert_eq!(device.active_sources(), 8);

    scheduler.perform();
    assert_eq!(device.active_sources(), 8);
    assert_eq!(scheduler.live_sources(), 8);
    assert_eq!(scheduler.pending_timers(), 9);
    assert_eq!(
        device.to_mock().unwrap().scheduled_start_frames().len(),
        8
    );
}

#[tokio::test(start_paused = true)]
async fn test_rapid_triggers() {
    let start = Instant::now();
    let mut scheduler = scheduler("mock");

    for _ in 0..5 {
        scheduler.perform();
    }
    assert_eq!(scheduler.live_sources(), 8);
    assert_eq!(scheduler.pending_timers(), 9);

    // Retrigger mid-performance as well.
    at(start, 400).await;
    scheduler.perform();
    assert_eq!(scheduler.live_sources(), 8);
    assert_eq!(scheduler.pending_timers(), 9);
    assert_eq!(scheduler.active_string(), None);

    // Only the last performance resets the stage.
    at(start, 3100).await;
    assert!(scheduler.is_performing());
    at(start, 3450).await;
    assert!(!scheduler.is_performing());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_mid_performance() {
    let start = Instant::now();
    let mut scheduler = scheduler("mock");
    scheduler.perform();

    at(start, 300).await;
    assert_eq!(scheduler.active_string(), Some(1));
    let device = scheduler.device().expect("device should be open");

    scheduler.teardown();
    assert_eq!(scheduler.pending_timers(), 0);
    assert_eq!(scheduler.live_sources(), 0);
    assert_eq!(device.active_sources(), 0);
    assert_eq!(device.state(), ContextState::Closed);
    assert_eq!(scheduler.view(), StageView::default());

    // Nothing fires after teardown.
    at(start, 4000).await;
    assert_eq!(scheduler.view(), StageView::default());

    // A second teardown is a no-op.
    scheduler.teardown();
    assert_eq!(scheduler.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_when_idle() {
    let mut scheduler = scheduler("mock");
    scheduler.teardown();
    scheduler.teardown();
    assert!(scheduler.device().is_none());
    assert_eq!(scheduler.view(), StageView::default());
}

#[tokio::test(start_paused = true)]
async fn test_perform_after_teardown_reopens() {
    let mut scheduler = scheduler("mock");
    scheduler.perform();
    scheduler.teardown();

    let summary = scheduler.perform();
    assert!(summary.audible);
    assert_eq!(scheduler.live_sources(), 8);
    assert_eq!(
        scheduler.device().map(|device| device.state()),
        Some(ContextState::Running)
    );
}

#[tokio::test(start_paused = true)]
async fn test_select_pattern_while_idle() {
    let start = Instant::now();
    let mut scheduler = scheduler("mock");

    scheduler.select_pattern(PatternKey::SunriseMeditation);
    assert_eq!(scheduler.selected_pattern(), PatternKey::SunriseMeditation);
    assert_eq!(scheduler.pattern().bpm, 82.0);
    assert!(scheduler.device().is_none());
    assert_eq!(scheduler.pending_timers(), 0);
    assert_eq!(scheduler.live_sources(), 0);
    assert!(!scheduler.is_performing());

    let summary = scheduler.perform();
    assert_eq!(summary.pattern, PatternKey::SunriseMeditation);
    assert_eq!(summary.duration.as_millis(), 4126);

    at(start, 4200).await;
    assert!(!scheduler.is_performing());
    // The mock clock never ran, so the plucks are still queued.
    assert_eq!(scheduler.live_sources(), 8);

    scheduler.select_pattern(PatternKey::PlayfulEcho);
    assert_eq!(scheduler.live_sources(), 0);
    assert_eq!(scheduler.pending_timers(), 0);
    assert!(scheduler.device().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_select_pattern_while_performing() {
    let mut scheduler = scheduler("mock");
    scheduler.perform();

    scheduler.select_pattern(PatternKey::PlayfulEcho);
    assert!(scheduler.is_performing());
    assert_eq!(scheduler.live_sources(), 8);
    assert_eq!(scheduler.pending_timers(), 9);

    let summary = scheduler.perform();
    assert_eq!(summary.pattern, PatternKey::PlayfulEcho);
    assert_eq!(scheduler.live_sources(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_audio_performs_silently() {
    let start = Instant::now();
    let mut scheduler = scheduler("mock-blocked");

    assert!(matches!(
        scheduler.open(),
        Err(AudioError::ResumeRejected(_))
    ));
    assert!(scheduler.device().is_none());

    let summary = scheduler.perform();
    assert!(!summary.audible);
    assert!(scheduler.device().is_none());
    assert_eq!(scheduler.live_sources(), 0);
    assert_eq!(scheduler.pending_timers(), 9);
    assert!(scheduler.is_performing());

    at(start, 60).await;
    assert_eq!(scheduler.active_string(), Some(0));

    at(start, 3100).await;
    assert!(!scheduler.is_performing());

    // Every trigger tries the audio again.
    assert!(!scheduler.perform().audible);
}

#[tokio::test(start_paused = true)]
async fn test_suspended_context_is_resumed() {
    let mut scheduler = scheduler("mock-suspended");

    assert!(scheduler.perform().audible);
    let device = scheduler.device().expect("device should be open");
    assert_eq!(device.state(), ContextState::Running);
    assert_eq!(device.to_mock().unwrap().resume_attempts(), 1);

    device.suspend().unwrap();
    assert!(scheduler.perform().audible);
    assert_eq!(device.state(), ContextState::Running);
    assert_eq!(device.to_mock().unwrap().resume_attempts(), 2);
    assert_eq!(device.active_sources(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_plucks_follow_audio_clock() {
    let mut scheduler = scheduler("mock");
    scheduler.open().unwrap();
    let device = scheduler.device().expect("device should be open");
    let mock = device.to_mock().unwrap();

    // Half a second of audio has already played.
    mock.render(22050);
    scheduler.perform();
    let start_frames = mock.scheduled_start_frames();
    assert_frames_close(
        &start_frames,
        &expected_start_frames(PatternKey::FestiveSteppe.pattern(), 0.5, 44100.0),
    );
    assert_eq!(start_frames[0], 24255);

    // Silence until the first pluck, then sound.
    let lead_in = mock.render(2205);
    assert!(lead_in.iter().all(|sample| *sample == 0.0));
    let first_note = mock.render(1000);
    assert!(first_note.iter().any(|sample| *sample != 0.0));
}

#[tokio::test(start_paused = true)]
async fn test_from_config() {
    let config: StageConfig = Config::builder()
        .add_source(File::from_str(
            r#"
            audio:
              device: mock
              sample_rate: 48000
            pattern: playful
            "#,
            FileFormat::Yaml,
        ))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    let mut scheduler = Scheduler::from_config(&config);
    assert_eq!(scheduler.selected_pattern(), PatternKey::PlayfulEcho);

    scheduler.perform();
    let device = scheduler.device().expect("device should be open");
    assert_eq!(device.sample_rate(), 48000);
    assert_frames_close(
        &device.to_mock().unwrap().scheduled_start_frames(),
        &expected_start_frames(PatternKey::PlayfulEcho.pattern(), 0.0, 48000.0),
    );
}

#[tokio::test(start_paused = true)]
async fn test_drop_tears_down() {
    let mut scheduler = scheduler("mock");
    scheduler.perform();
    let device = scheduler.device().expect("device should be open");

    drop(scheduler);
    assert_eq!(device.state(), ContextState::Closed);
    assert_eq!(device.active_sources(), 0);
}
