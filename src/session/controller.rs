//! Recording session controller
//!
//! Tracks whether a capture is running, the status text shown while it
//! runs, and whether the recording-option controls may be edited. It does
//! not own the model; every transition that touches the model takes it as
//! an argument.

use std::time::Duration;

use crate::error::{Result, TimelineError};
use crate::model::{ModelEvent, TimelineModel};

use super::types::{PendingStop, RecordingOptions, RecordingState, ToggleButtonState};

pub const STATUS_INITIALIZING: &str = "Initializing recording\u{2026}";
pub const STATUS_RETRIEVING: &str = "Retrieving events\u{2026}";
pub const STATUS_LOADING: &str = "Loading\u{2026}";

/// Default time to keep recording after a reload's load event
pub const DEFAULT_RECORD_AFTER_LOAD: Duration = Duration::from_millis(3000);

/// Recording session controller
#[derive(Debug)]
pub struct SessionController {
    state: RecordingState,
    options: RecordingOptions,
    /// `None` while the status pane is hidden
    status: Option<String>,
    controls_enabled: bool,
    operation_in_progress: bool,
    /// Set only for recordings started by a page reload
    auto_record_generation: Option<u64>,
    next_generation: u64,
    record_after_load: Duration,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(RecordingOptions::default())
    }
}

impl SessionController {
    /// Create a new controller
    pub fn new(options: RecordingOptions) -> Self {
        Self {
            state: RecordingState::Idle,
            options,
            status: None,
            controls_enabled: true,
            operation_in_progress: false,
            auto_record_generation: None,
            next_generation: 0,
            record_after_load: DEFAULT_RECORD_AFTER_LOAD,
        }
    }

    /// Set how long to keep recording after a reload's load event
    pub fn set_record_after_load(&mut self, delay: Duration) {
        self.record_after_load = delay;
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Text of the status pane, `None` when hidden
    pub fn status_text(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Whether recording-option controls can be changed
    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Whether a load is running
    pub fn operation_in_progress(&self) -> bool {
        self.operation_in_progress
    }

    pub fn options(&self) -> &RecordingOptions {
        &self.options
    }

    /// Change capture options; ignored while a recording runs
    pub fn set_options(&mut self, options: RecordingOptions) -> bool {
        if !self.controls_enabled {
            tracing::warn!("Recording options are locked while recording");
            return false;
        }
        self.options = options;
        true
    }

    pub fn auto_record_generation(&self) -> Option<u64> {
        self.auto_record_generation
    }

    /// Whether capture (or loading) is in progress
    pub fn recording_in_progress(&self) -> bool {
        self.state.is_toggled()
    }

    /// Title and enabled state of the record toggle
    pub fn toggle_button(&self) -> ToggleButtonState {
        match self.state {
            RecordingState::Recording | RecordingState::Loading => ToggleButtonState {
                toggled: true,
                title: "Stop",
                enabled: true,
            },
            RecordingState::StopPending => ToggleButtonState {
                toggled: false,
                title: "Stop pending",
                enabled: false,
            },
            RecordingState::Idle => ToggleButtonState {
                toggled: false,
                title: "Record",
                enabled: true,
            },
        }
    }

    fn update_status(&mut self, text: impl Into<String>) {
        self.status = Some(text.into());
    }

    fn hide_status(&mut self) {
        self.status = None;
    }

    /// Start a capture
    ///
    /// Recordings not started by the user are tied to a fresh auto-record
    /// generation so a later reload stop can tell them apart.
    pub fn start_recording(&mut self, model: &mut TimelineModel, user_initiated: bool) {
        self.update_status(STATUS_INITIALIZING);
        self.auto_record_generation = if user_initiated {
            None
        } else {
            self.next_generation += 1;
            Some(self.next_generation)
        };
        tracing::info!(
            "Starting recording (user initiated: {}, options: {:?})",
            user_initiated,
            self.options
        );
        model.start_recording();
        self.state = RecordingState::Recording;
        self.controls_enabled = false;
    }

    /// Request a stop; the model finishes asynchronously from our view
    ///
    /// Ignored unless a capture or load is in progress. When the model has
    /// nothing to stop it will never report `RecordingStopped`, so the
    /// session goes straight back to idle.
    pub fn stop_recording(&mut self, model: &mut TimelineModel) {
        if !self.recording_in_progress() {
            tracing::debug!("Stop requested while {:?}, ignoring", self.state);
            return;
        }
        self.auto_record_generation = None;
        self.controls_enabled = true;
        if !model.is_recording() {
            self.state = RecordingState::Idle;
            self.hide_status();
            return;
        }
        self.state = RecordingState::StopPending;
        model.stop_recording();
        if self.status.is_some() {
            self.update_status(STATUS_RETRIEVING);
        }
    }

    /// Start or stop depending on the current state
    ///
    /// Returns false when the toggle is disabled or a load is running.
    pub fn toggle_recording(&mut self, model: &mut TimelineModel) -> bool {
        if !self.toggle_button().enabled || self.operation_in_progress {
            return false;
        }
        if self.recording_in_progress() {
            self.stop_recording(model);
        } else {
            self.start_recording(model, true);
        }
        true
    }

    /// React to a model notification
    pub fn handle_model_event(&mut self, event: &ModelEvent) {
        match event {
            ModelEvent::RecordingStarted { from_file } => {
                if *from_file {
                    self.state = RecordingState::Loading;
                    self.update_status(STATUS_LOADING);
                } else {
                    self.state = RecordingState::Recording;
                    self.update_status(format!("{} events collected", 0));
                }
            }
            ModelEvent::RecordingStopped => {
                self.state = RecordingState::Idle;
                self.hide_status();
            }
            ModelEvent::BufferUsage(usage) => {
                self.update_status(format!("Buffer usage {}%", percent(*usage)));
            }
            ModelEvent::RetrieveEventsProgress(progress) => {
                self.update_status(format!("{} {}%", STATUS_RETRIEVING, percent(*progress)));
            }
            ModelEvent::RecordsCleared | ModelEvent::RecordFilterChanged => {}
        }
    }

    /// A page reload is about to happen
    ///
    /// Starts a non-user recording unless a load or recording is running.
    pub fn will_reload_page(&mut self, model: &mut TimelineModel) -> bool {
        if self.operation_in_progress || self.recording_in_progress() {
            return false;
        }
        self.start_recording(model, false);
        true
    }

    /// The reloaded page fired its load event
    ///
    /// Returns the stop to schedule, if this recording was started by the
    /// reload.
    pub fn load_event_fired(&self) -> Option<PendingStop> {
        if !self.recording_in_progress() {
            return None;
        }
        let generation = self.auto_record_generation?;
        tracing::debug!(
            "Scheduling stop of auto recording {} in {:?}",
            generation,
            self.record_after_load
        );
        Some(PendingStop {
            generation,
            delay: self.record_after_load,
        })
    }

    /// Stop only if `generation` is still the current auto recording
    pub fn stop_if_generation(&mut self, model: &mut TimelineModel, generation: u64) -> bool {
        if self.auto_record_generation != Some(generation) {
            tracing::debug!("Ignoring stale auto-record stop {}", generation);
            return false;
        }
        self.stop_recording(model);
        true
    }

    /// Enter the loading state, stopping any running capture
    pub fn prepare_to_load(&mut self, model: &mut TimelineModel) -> Result<()> {
        if self.operation_in_progress {
            return Err(TimelineError::OperationInProgress(
                "a trace is already being loaded".to_string(),
            ));
        }
        if self.recording_in_progress() {
            self.stop_recording(model);
        }
        self.operation_in_progress = true;
        Ok(())
    }

    /// Leave the loading state
    pub fn finish_loading(&mut self) {
        self.operation_in_progress = false;
        if self.state == RecordingState::Loading {
            self.state = RecordingState::Idle;
        }
        self.hide_status();
    }

    /// Fail if saving is currently blocked
    pub fn check_can_save(&self) -> Result<()> {
        if self.operation_in_progress {
            return Err(TimelineError::OperationInProgress(
                "cannot save while a trace is loading".to_string(),
            ));
        }
        Ok(())
    }
}

fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).round() as i64
}
