//! Session data types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// State of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// Nothing is being captured
    #[default]
    Idle,
    /// Live capture in progress
    Recording,
    /// Stop requested, events are still being retrieved
    StopPending,
    /// A trace file is being loaded
    Loading,
}

impl RecordingState {
    /// Whether the record toggle is in its pressed state
    pub fn is_toggled(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Loading)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordingState::Idle => "Idle",
            RecordingState::Recording => "Recording",
            RecordingState::StopPending => "Stop pending",
            RecordingState::Loading => "Loading",
        }
    }
}

/// Capture options passed to the model when recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingOptions {
    /// Sample JavaScript stacks
    pub enable_js_sampling: bool,
    /// Record memory counters
    pub capture_memory: bool,
    /// Capture layer trees and paint pictures
    pub capture_layers_and_pictures: bool,
    /// Capture film-strip screenshots
    pub capture_film_strip: bool,
    /// Capture network requests
    pub capture_network: bool,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            enable_js_sampling: true,
            capture_memory: false,
            capture_layers_and_pictures: false,
            capture_film_strip: false,
            capture_network: false,
        }
    }
}

/// Presentation of the record toggle button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleButtonState {
    pub toggled: bool,
    pub title: &'static str,
    pub enabled: bool,
}

/// A deferred stop scheduled after a page load event
///
/// The host waits `delay` and then calls
/// [`SessionController::stop_if_generation`](super::SessionController::stop_if_generation)
/// with `generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStop {
    pub generation: u64,
    pub delay: Duration,
}
