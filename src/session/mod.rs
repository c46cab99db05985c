//! Recording session control
//!
//! The [`SessionController`] drives capture start/stop, status text and
//! auto-recording of page reloads. [`Progress`] is the handle long-running
//! loads report through and check for cancellation.

pub mod controller;
pub mod progress;
pub mod types;

pub use controller::SessionController;
pub use progress::{CancellationFlag, Progress, ProgressIndicator};
pub use types::{PendingStop, RecordingOptions, RecordingState, ToggleButtonState};
