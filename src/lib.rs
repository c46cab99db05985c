//! # Timeline Inspector
//!
//! Core of a performance timeline panel: a record model fed by a trace
//! recorder or a saved trace file, range aggregation by category, text
//! search over visible records, and the selection/details workflow that
//! ties them together.
//!
//! ## Architecture
//!
//! - **Model**: Record tree, frames, screenshots and network requests, with
//!   filters deciding what is visible
//! - **Analysis**: Cached per-category range aggregation and record search
//! - **Session**: Recording lifecycle, reload auto-recording and progress
//! - **Panel**: Selection, window and details state driven by model events
//! - **Communication**: Crossbeam channels from the model to its observers
//!
//! ## Configuration
//!
//! Settings are stored as TOML in the platform-appropriate data directory
//! under `dev.timeline-inspector`, or at the path named by
//! `TIMELINE_INSPECTOR_CONFIG`:
//!
//! - **Linux**: `~/.local/share/dev.timeline-inspector/`
//! - **macOS**: `~/Library/Application Support/dev.timeline-inspector/`
//! - **Windows**: `%APPDATA%\dev.timeline-inspector\`
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use timeline_inspector::{InspectorConfig, ProgressIndicator, TimelinePanel};
//!
//! # fn main() -> timeline_inspector::Result<()> {
//! let mut panel = TimelinePanel::new(InspectorConfig::load_or_default());
//! let mut progress = ProgressIndicator::new();
//! panel.load_from_file(Path::new("TimelineRawData.json"), &mut progress)?;
//!
//! panel.request_window_times(0.0, 100.0);
//! println!("{}", panel.details().content());
//!
//! panel.perform_search("layout", true, false)?;
//! println!("{} matches", panel.search_match_count());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod panel;
pub mod session;
pub mod types;

pub use analysis::{aggregation, search};

// Re-export commonly used types
pub use analysis::{AggregatedStats, RangeAggregator, SearchEngine};
pub use config::InspectorConfig;
pub use error::{Result, TimelineError};
pub use model::{ModelEvent, RecordId, TimelineModel};
pub use panel::{DetailsContent, DetailsTab, DetailsView, TimelinePanel, TimelineSelection};
pub use session::{Progress, ProgressIndicator, RecordingOptions, SessionController};
pub use types::{Category, Millis, Record, RecordData, RecordType};
