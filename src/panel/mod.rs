//! Timeline panel
//!
//! [`TimelinePanel`] is the application context that ties the model, the
//! session controller, the selection and the search together. It is the
//! only owner of the current selection and search state; everything else
//! reads snapshots through accessors.
//!
//! # Event flow
//!
//! Every panel operation that mutates the model drains the model's event
//! channel before returning. Hosts that mutate the model directly through
//! [`TimelinePanel::model_mut`] call [`TimelinePanel::process_model_events`]
//! themselves.

pub mod details;
pub mod selection;

pub use details::{
    DetailsContent, DetailsTab, DetailsView, EventDetails, FrameDetails, NetworkRequestDetails,
    TimelineDetailsView,
};
pub use selection::{SelectionType, TimelineSelection};

use crossbeam_channel::Receiver;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::analysis::{plain_text_search_regex, RangeAggregator, SearchEngine};
use crate::config::InspectorConfig;
use crate::error::Result;
use crate::model::{trace, FrameId, LoadedTrace, ModelEvent, RecordId, TimelineModel};
use crate::session::{PendingStop, Progress, SessionController};
use crate::types::{Category, Millis, RecordType};

/// A milestone shown above the overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub time: Millis,
    pub record_type: RecordType,
}

/// Timeline panel state
pub struct TimelinePanel<D: DetailsView = TimelineDetailsView> {
    model: TimelineModel,
    model_events: Receiver<ModelEvent>,
    session: SessionController,
    details: D,
    aggregator: RangeAggregator,
    search: SearchEngine,
    /// Search result currently highlighted in the views
    highlighted_record: Option<RecordId>,
    selection: Option<TimelineSelection>,
    window_start_time: Millis,
    window_end_time: Millis,
    markers: Vec<Marker>,
    config: InspectorConfig,
}

impl TimelinePanel<TimelineDetailsView> {
    /// Create a panel with the in-memory details view
    pub fn new(config: InspectorConfig) -> Self {
        Self::with_details_view(config, TimelineDetailsView::new())
    }
}

impl<D: DetailsView> TimelinePanel<D> {
    /// Create a panel rendering into `details`
    pub fn with_details_view(config: InspectorConfig, details: D) -> Self {
        let mut model = TimelineModel::new();
        let model_events = model.subscribe();
        let mut session = SessionController::new(config.recording);
        session.set_record_after_load(config.record_after_load());

        let mut panel = Self {
            model,
            model_events,
            session,
            details,
            aggregator: RangeAggregator::new(),
            search: SearchEngine::new(),
            highlighted_record: None,
            selection: None,
            window_start_time: 0.0,
            window_end_time: f64::INFINITY,
            markers: Vec::new(),
            config,
        };
        panel.request_window_times(0.0, f64::INFINITY);
        panel
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn model(&self) -> &TimelineModel {
        &self.model
    }

    /// Mutable model access for live ingestion
    pub fn model_mut(&mut self) -> &mut TimelineModel {
        &mut self.model
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn details(&self) -> &D {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut D {
        &mut self.details
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn selection(&self) -> Option<&TimelineSelection> {
        self.selection.as_ref()
    }

    pub fn window_start_time(&self) -> Millis {
        self.window_start_time
    }

    pub fn window_end_time(&self) -> Millis {
        self.window_end_time
    }

    /// Milestones from the last finished recording
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    // ========================================================================
    // Model events
    // ========================================================================

    /// Handle queued model notifications in delivery order
    ///
    /// Returns the number of events handled.
    pub fn process_model_events(&mut self) -> usize {
        let events: Vec<ModelEvent> = self.model_events.try_iter().collect();
        for event in &events {
            self.session.handle_model_event(event);
            match event {
                ModelEvent::RecordsCleared => self.on_records_cleared(),
                ModelEvent::RecordingStopped => self.on_recording_stopped(),
                ModelEvent::RecordFilterChanged => self.on_record_filter_changed(),
                ModelEvent::RecordingStarted { .. }
                | ModelEvent::BufferUsage(_)
                | ModelEvent::RetrieveEventsProgress(_) => {}
            }
        }
        events.len()
    }

    fn on_records_cleared(&mut self) {
        self.request_window_times(0.0, f64::INFINITY);
        self.selection = None;
        self.markers.clear();
        self.aggregator.clear();
        self.search.invalidate();
        self.highlighted_record = None;
        self.update_selection_details();
    }

    fn on_recording_stopped(&mut self) {
        self.request_window_times(
            self.model.minimum_record_time(),
            self.model.maximum_record_time(),
        );
        self.refresh_views();
        self.set_markers();
        self.update_search_highlight(false, true, false);
    }

    fn on_record_filter_changed(&mut self) {
        self.search.invalidate();
        self.refresh_views();
        self.update_search_highlight(false, false, false);
    }

    fn refresh_views(&mut self) {
        self.update_selection_details();
    }

    fn set_markers(&mut self) {
        self.markers = self
            .model
            .event_divider_records()
            .filter(|r| !matches!(r.record_type, RecordType::TimeStamp | RecordType::ConsoleTime))
            .map(|r| Marker {
                time: r.start_time,
                record_type: r.record_type.clone(),
            })
            .collect();
        self.markers.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.markers.dedup_by(|a, b| a.time == b.time);
    }

    // ========================================================================
    // Window
    // ========================================================================

    /// Move the visible window
    ///
    /// The window is clamped to the recorded time span; with no records it
    /// is taken as given.
    pub fn request_window_times(&mut self, start: Millis, end: Millis) {
        let (start, end) = if self.model.is_empty() {
            (start, end)
        } else {
            let min = self.model.minimum_record_time();
            let max = self.model.maximum_record_time();
            let start = start.clamp(min, max);
            (start, end.clamp(start, max))
        };
        self.window_start_time = start;
        self.window_end_time = end;
        self.on_window_changed();
    }

    /// Re-select the window when the selection is absent or a range
    pub fn on_window_changed(&mut self) {
        tracing::debug!(
            "Window changed to [{:.3}, {:.3}]",
            self.window_start_time,
            self.window_end_time
        );
        let reselect = self.selection.as_ref().map_or(true, TimelineSelection::is_range);
        if reselect {
            self.select(None, None);
        }
    }

    /// Shift the window by the smallest amount that shows `[start, end]`
    pub fn reveal_time_range(&mut self, start: Millis, end: Millis) {
        let shift = if self.window_end_time < end {
            end - self.window_end_time
        } else if self.window_start_time > start {
            start - self.window_start_time
        } else {
            0.0
        };
        if shift != 0.0 {
            self.request_window_times(self.window_start_time + shift, self.window_end_time + shift);
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Replace the selection; `None` selects the current window
    pub fn select(&mut self, selection: Option<TimelineSelection>, preferred_tab: Option<DetailsTab>) {
        self.selection = selection;
        if let Some(tab) = preferred_tab {
            self.details.set_preferred_tab(tab);
        }
        self.update_selection_details();
    }

    /// Forward content to the details view
    pub fn show_in_details(&mut self, content: DetailsContent) {
        self.details.set_content(content);
    }

    fn update_selection_details(&mut self) {
        let (window_start, window_end) = (self.window_start_time, self.window_end_time);
        let selection = self
            .selection
            .get_or_insert_with(|| TimelineSelection::from_range(window_start, window_end))
            .clone();

        match &selection {
            TimelineSelection::Record { record, .. } => self.show_record_details(*record),
            TimelineSelection::TraceEvent { event, .. } => {
                let details = self.model.trace_event(*event).map(|e| {
                    let record_type = RecordType::from_name(&e.name);
                    let total = e.dur.map(|d| d / 1000.0);
                    let paints = is_paint(&record_type);
                    let content = EventDetails {
                        title: record_type.title().to_string(),
                        category: record_type.category(),
                        start_offset: e.start_time() - self.model.minimum_record_time(),
                        total_time: total,
                        self_time: None,
                        args: e.args.clone(),
                    };
                    (content, paints)
                });
                match details {
                    Some((content, paints)) => self.show_event_details(content, paints),
                    None => {
                        tracing::warn!("Selected trace event {} no longer exists", event);
                        self.show_in_details(DetailsContent::Empty);
                    }
                }
            }
            TimelineSelection::Frame { frame, .. } => self.show_frame_details(*frame),
            TimelineSelection::NetworkRequest { request: id, .. } => {
                if let Some(request) = self.model.network_request(*id) {
                    let content = NetworkRequestDetails {
                        url: request.url.clone(),
                        method: request.method.clone(),
                        mime_type: request.mime_type.clone(),
                        start_offset: request.start_time - self.model.minimum_record_time(),
                        duration: request.duration(),
                    };
                    self.show_in_details(DetailsContent::NetworkRequest(content));
                } else {
                    tracing::warn!("Selected network request {} no longer exists", id);
                    self.show_in_details(DetailsContent::Empty);
                }
            }
            TimelineSelection::Range {
                start_time,
                end_time,
            } => self.update_selected_range_stats(*start_time, *end_time),
        }

        self.details.update_contents(&selection);
    }

    fn show_record_details(&mut self, id: RecordId) {
        let Some(record) = self.model.record(id) else {
            tracing::warn!("Selected record {} no longer exists", id);
            self.show_in_details(DetailsContent::Empty);
            return;
        };
        let children_time: Millis = self
            .model
            .children(id)
            .filter_map(|child| child.duration())
            .sum();
        let content = EventDetails {
            title: record.title().to_string(),
            category: record.category(),
            start_offset: record.start_time - self.model.minimum_record_time(),
            total_time: record.duration(),
            self_time: record.duration().map(|total| (total - children_time).max(0.0)),
            args: record.args.clone(),
        };
        let paints = is_paint(&record.record_type);
        self.show_event_details(content, paints);
    }

    fn show_event_details(&mut self, content: EventDetails, paints: bool) {
        self.show_in_details(DetailsContent::Event(content));
        if paints && !self.details.has_tab(DetailsTab::PaintProfiler) {
            self.details.append_tab(DetailsTab::PaintProfiler);
        }
    }

    fn show_frame_details(&mut self, id: FrameId) {
        let Some(frame) = self.model.frame(id) else {
            tracing::warn!("Selected frame {} no longer exists", id);
            self.show_in_details(DetailsContent::Empty);
            return;
        };
        let tolerance = self.config.film_strip_tolerance_ms;
        let screenshot = self
            .model
            .screenshot_at_or_after(frame.screenshot_time())
            .filter(|shot| shot.timestamp - frame.end_time <= tolerance)
            .cloned();
        let content = FrameDetails {
            start_offset: frame.start_time - self.model.minimum_record_time(),
            duration: frame.duration(),
            idle: frame.idle,
            paint_count: frame.paint_count,
            screenshot,
        };
        let has_layer_tree = frame.has_layer_tree;

        self.show_in_details(DetailsContent::Frame(content));
        if has_layer_tree && !self.details.has_tab(DetailsTab::LayerViewer) {
            self.details.append_tab(DetailsTab::LayerViewer);
        }
    }

    fn update_selected_range_stats(&mut self, start: Millis, end: Millis) {
        if !end.is_finite() {
            self.show_in_details(DetailsContent::Empty);
            return;
        }
        let Some(stats) = self.aggregator.aggregate_range(&self.model, start, end) else {
            return;
        };
        let min = self.model.minimum_record_time();
        self.show_in_details(DetailsContent::RangeSummary {
            start_offset: start - min,
            end_offset: end - min,
            stats,
        });
    }

    /// Frame the selection belongs to, if any
    fn frame_for_selection(&self) -> Option<FrameId> {
        match self.selection.as_ref()? {
            TimelineSelection::Frame { frame, .. } => Some(*frame),
            TimelineSelection::Record { end_time, .. }
            | TimelineSelection::TraceEvent { end_time, .. } => {
                self.model.filtered_frames(*end_time, *end_time).next()
            }
            TimelineSelection::Range { .. } | TimelineSelection::NetworkRequest { .. } => None,
        }
    }

    /// Select the frame `offset` frames away from the current one
    ///
    /// The index is clamped to the frame list. Returns false when the
    /// selection is not associated with a frame.
    pub fn jump_to_frame(&mut self, offset: isize) -> bool {
        let Some(current) = self.frame_for_selection() else {
            return false;
        };
        let count = self.model.frame_count();
        let Some(position) = self.model.frame_position(current) else {
            return false;
        };
        let target = (position as isize + offset).clamp(0, count as isize - 1) as usize;
        let Some(id) = self.model.frame_at_position(target) else {
            return false;
        };
        let Some(frame) = self.model.frame(id).cloned() else {
            return false;
        };
        self.reveal_time_range(frame.start_time, frame.end_time);
        self.select(Some(TimelineSelection::from_frame(id, &frame)), None);
        true
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Search visible records in the window for `query`
    pub fn perform_search(&mut self, query: &str, should_jump: bool, jump_backwards: bool) -> Result<()> {
        self.search.set_query(query)?;
        self.update_search_highlight(true, should_jump, jump_backwards);
        Ok(())
    }

    pub fn jump_to_next_search_result(&mut self) {
        if let Some(id) = self.search.jump_to_next() {
            self.highlight_search_result(Some(id), true);
        }
    }

    pub fn jump_to_previous_search_result(&mut self) {
        if let Some(id) = self.search.jump_to_previous() {
            self.highlight_search_result(Some(id), true);
        }
    }

    /// Drop the query, its results and the highlight
    pub fn search_canceled(&mut self) {
        self.highlighted_record = None;
        self.search.cancel();
    }

    pub fn search_match_count(&self) -> usize {
        self.search.match_count()
    }

    pub fn current_search_index(&self) -> Option<usize> {
        self.search.current_index()
    }

    pub fn search_results(&self) -> &[RecordId] {
        self.search.results()
    }

    /// Record currently highlighted as the search result
    pub fn highlighted_search_result(&self) -> Option<RecordId> {
        self.highlighted_record
    }

    fn update_search_highlight(&mut self, reveal: bool, should_jump: bool, jump_backwards: bool) {
        if self.model.is_text_filter_active() || !self.search.is_active() {
            self.highlighted_record = None;
            return;
        }
        if self.search.needs_update() {
            self.search.update_results(
                &self.model,
                self.window_start_time,
                self.window_end_time,
                should_jump,
                jump_backwards,
            );
        }
        self.highlight_search_result(self.search.current(), reveal);
    }

    fn highlight_search_result(&mut self, id: Option<RecordId>, reveal: bool) {
        self.highlighted_record = id;
        if !reveal {
            return;
        }
        let span = id
            .and_then(|id| self.model.record(id))
            .map(|r| (r.start_time, r.end_time.unwrap_or(r.start_time)));
        if let Some((start, end)) = span {
            self.reveal_time_range(start, end);
        }
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Narrow visible records to those matching `query`; empty clears it
    ///
    /// Any running search is cancelled.
    pub fn set_text_filter(&mut self, query: &str) -> Result<()> {
        self.search_canceled();
        let regex = if query.is_empty() {
            None
        } else {
            Some(plain_text_search_regex(query)?)
        };
        self.model.set_text_filter(regex);
        self.process_model_events();
        Ok(())
    }

    /// Hide records shorter than `minimum` milliseconds; 0 disables
    pub fn set_minimum_duration(&mut self, minimum: Millis) {
        self.model.set_minimum_record_duration(minimum);
        self.process_model_events();
    }

    /// Apply one of the configured duration filter presets
    pub fn set_minimum_duration_preset(&mut self, minimum: Millis) -> Result<()> {
        self.config.check_duration_preset(minimum)?;
        self.set_minimum_duration(minimum);
        Ok(())
    }

    pub fn set_category_hidden(&mut self, category: Category, hidden: bool) {
        self.model.set_category_hidden(category, hidden);
        self.process_model_events();
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn start_recording(&mut self) {
        self.session.start_recording(&mut self.model, true);
        self.process_model_events();
    }

    pub fn stop_recording(&mut self) {
        self.session.stop_recording(&mut self.model);
        self.process_model_events();
    }

    /// Returns false if the toggle is currently disabled
    pub fn toggle_recording(&mut self) -> bool {
        let toggled = self.session.toggle_recording(&mut self.model);
        self.process_model_events();
        toggled
    }

    /// Start an automatic recording for a page reload
    pub fn will_reload_page(&mut self) -> bool {
        let started = self.session.will_reload_page(&mut self.model);
        self.process_model_events();
        started
    }

    pub fn load_event_fired(&self) -> Option<PendingStop> {
        self.session.load_event_fired()
    }

    /// Run a stop scheduled by [`TimelinePanel::load_event_fired`]
    pub fn stop_if_generation(&mut self, generation: u64) -> bool {
        let stopped = self.session.stop_if_generation(&mut self.model, generation);
        self.process_model_events();
        stopped
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Load a trace file, replacing the current records
    ///
    /// Returns false if the load was cancelled; the model is then left as
    /// it was.
    pub fn load_from_file(&mut self, path: &Path, progress: &mut dyn Progress) -> Result<bool> {
        self.load_with(progress, |progress| trace::load_from_file(path, progress))
    }

    /// Load a trace from any reader
    pub fn load_from_reader<R: Read>(&mut self, reader: R, progress: &mut dyn Progress) -> Result<bool> {
        self.load_with(progress, |progress| trace::parse_trace(reader, progress))
    }

    fn load_with<F>(&mut self, progress: &mut dyn Progress, parse: F) -> Result<bool>
    where
        F: FnOnce(&mut dyn Progress) -> Result<Option<LoadedTrace>>,
    {
        self.session.prepare_to_load(&mut self.model)?;
        self.process_model_events();

        let loaded = match parse(progress) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("Trace loading failed: {}", e);
                self.session.finish_loading();
                return Err(e);
            }
        };
        let Some(loaded) = loaded else {
            self.session.finish_loading();
            return Ok(false);
        };

        self.model.start_loading();
        self.model.add_trace(loaded);
        self.model.stop_recording();
        self.process_model_events();
        self.session.finish_loading();
        Ok(true)
    }

    /// Save the raw events into `dir` under a timestamped name
    pub fn save_to_file(&self, dir: &Path) -> Result<PathBuf> {
        self.session.check_can_save()?;
        trace::save_trace(dir, self.model.trace_events())
    }

    /// Save into the configured directory
    pub fn save_to_default_location(&self) -> Result<PathBuf> {
        self.save_to_file(&self.config.save_directory())
    }
}

fn is_paint(record_type: &RecordType) -> bool {
    matches!(record_type, RecordType::Paint | RecordType::RasterTask)
}
