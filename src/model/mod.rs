//! Record and event model
//!
//! [`TimelineModel`] owns everything a recording produced: the record tree
//! (an arena indexed by [`RecordId`]), frames, film-strip screenshots,
//! network requests and the raw trace events they were built from.
//!
//! Observers register with [`TimelineModel::subscribe`] and receive
//! [`ModelEvent`]s over crossbeam channels, in registration order. The
//! model never calls back into observers, so there is no re-entrancy.

pub mod filter;
pub mod id;
pub mod trace;

pub use filter::{CategoryFilter, DurationFilter, FilterKind, TextFilter, TimelineFilter};
pub use id::{EventId, FrameId, RecordId, RequestId};
pub use trace::{LoadedTrace, PendingRecord, TraceEvent};

use crossbeam_channel::{unbounded, Receiver, Sender};
use regex::Regex;
use std::ops::ControlFlow;

use crate::types::{
    Category, Millis, NetworkRequest, Record, RecordData, Screenshot, TimelineFrame,
};

/// Change notifications emitted by the model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Capture started; `from_file` is set when a trace is being loaded
    RecordingStarted { from_file: bool },
    /// Capture (or loading) finished
    RecordingStopped,
    /// All records were dropped
    RecordsCleared,
    /// A filter changed and visibility must be recomputed
    RecordFilterChanged,
    /// Trace buffer fill level, `0.0..=1.0`
    BufferUsage(f64),
    /// Event retrieval progress after stop, `0.0..=1.0`
    RetrieveEventsProgress(f64),
}

/// In-memory timeline model
pub struct TimelineModel {
    records: Vec<Record>,
    /// Top-level records sorted by start time
    main_thread_tasks: Vec<RecordId>,
    filters: Vec<TimelineFilter>,
    /// Frames in arrival order; a [`FrameId`] indexes this list
    frames: Vec<TimelineFrame>,
    /// Frame ids sorted by start time
    frame_order: Vec<FrameId>,
    screenshots: Vec<Screenshot>,
    network_requests: Vec<NetworkRequest>,
    trace_events: Vec<TraceEvent>,
    /// `(minimum, maximum)` record time, unset while empty
    bounds: Option<(Millis, Millis)>,
    recording: bool,
    loading_from_file: bool,
    generation: u64,
    subscribers: Vec<Sender<ModelEvent>>,
}

impl Default for TimelineModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineModel {
    /// Create an empty model with the default filter set
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            main_thread_tasks: Vec::new(),
            filters: vec![
                TimelineFilter::Static,
                TimelineFilter::Category(CategoryFilter::new()),
                TimelineFilter::Duration(DurationFilter::new()),
                TimelineFilter::Text(TextFilter::new()),
            ],
            frames: Vec::new(),
            frame_order: Vec::new(),
            screenshots: Vec::new(),
            network_requests: Vec::new(),
            trace_events: Vec::new(),
            bounds: None,
            recording: false,
            loading_from_file: false,
            generation: 0,
            subscribers: Vec::new(),
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register an observer
    ///
    /// Events are delivered to observers in the order they subscribed.
    pub fn subscribe(&mut self) -> Receiver<ModelEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: ModelEvent) {
        tracing::debug!("Model event: {:?}", event);
        // Observers that dropped their receiver are forgotten.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Append a record under `parent`, or as a main-thread task
    ///
    /// Siblings stay sorted by start time; equal starts keep insertion order.
    pub fn append_record(&mut self, parent: Option<RecordId>, data: RecordData) -> RecordId {
        let id = RecordId::from_index(self.records.len());
        let parent = parent.filter(|p| {
            let known = p.index() < self.records.len();
            if !known {
                tracing::warn!("Unknown parent {} for new record, adding as task", p);
            }
            known
        });

        let start = data.start_time;
        let end = data.end_time.unwrap_or(start);
        self.bounds = Some(match self.bounds {
            Some((min, max)) => (min.min(start), max.max(end)),
            None => (start, end),
        });

        self.records.push(Record {
            id,
            record_type: data.record_type,
            start_time: data.start_time,
            end_time: data.end_time,
            args: data.args,
            parent,
            children: Vec::new(),
            event: data.event,
        });

        match parent {
            Some(p) => {
                let siblings = &self.records[p.index()].children;
                let at = siblings.partition_point(|c| self.records[c.index()].start_time <= start);
                self.records[p.index()].children.insert(at, id);
            }
            None => {
                let at = self
                    .main_thread_tasks
                    .partition_point(|t| self.records[t.index()].start_time <= start);
                self.main_thread_tasks.insert(at, id);
            }
        }
        id
    }

    /// Look up a record
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.index())
    }

    /// All records in creation order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top-level records sorted by start time
    pub fn main_thread_tasks(&self) -> &[RecordId] {
        &self.main_thread_tasks
    }

    /// Children of a record, sorted by start time
    pub fn children(&self, id: RecordId) -> impl Iterator<Item = &Record> + '_ {
        self.record(id)
            .map(|r| r.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |child| self.record(*child))
    }

    /// Smallest start time of any record, 0 when empty
    pub fn minimum_record_time(&self) -> Millis {
        self.bounds.map_or(0.0, |(min, _)| min)
    }

    /// Largest end time of any record, 0 when empty
    pub fn maximum_record_time(&self) -> Millis {
        self.bounds.map_or(0.0, |(_, max)| max)
    }

    /// Counter bumped whenever the record set is replaced
    ///
    /// Record ids from an older generation must not be used.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records that mark page milestones (load, DOMContentLoaded, ...)
    pub fn event_divider_records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records
            .iter()
            .filter(|r| r.record_type.is_event_divider())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Whether every filter accepts the record
    pub fn is_visible(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.accept(record))
    }

    /// Visit every record in pre-order
    pub fn for_all_records<F>(&self, mut callback: F)
    where
        F: FnMut(&Record, usize) -> ControlFlow<()>,
    {
        for &task in &self.main_thread_tasks {
            if self.visit(task, 0, false, &mut callback).is_break() {
                return;
            }
        }
    }

    /// Visit visible records in pre-order
    ///
    /// Children of a hidden record are still visited, at the hidden
    /// record's depth.
    pub fn for_all_filtered_records<F>(&self, mut callback: F)
    where
        F: FnMut(&Record, usize) -> ControlFlow<()>,
    {
        for &task in &self.main_thread_tasks {
            if self.visit(task, 0, true, &mut callback).is_break() {
                return;
            }
        }
    }

    fn visit<F>(&self, id: RecordId, depth: usize, filtered: bool, callback: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&Record, usize) -> ControlFlow<()>,
    {
        let Some(record) = self.record(id) else {
            return ControlFlow::Continue(());
        };
        let mut child_depth = depth;
        if !filtered || self.is_visible(record) {
            callback(record, depth)?;
            child_depth = depth + 1;
        }
        for &child in &record.children {
            self.visit(child, child_depth, filtered, callback)?;
        }
        ControlFlow::Continue(())
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Append a filter to the chain
    pub fn add_filter(&mut self, filter: TimelineFilter) {
        self.filters.push(filter);
        self.emit(ModelEvent::RecordFilterChanged);
    }

    pub fn filters(&self) -> &[TimelineFilter] {
        &self.filters
    }

    fn filter_mut(&mut self, kind: FilterKind) -> Option<&mut TimelineFilter> {
        self.filters.iter_mut().find(|f| f.kind() == kind)
    }

    /// Show or hide a category
    pub fn set_category_hidden(&mut self, category: Category, hidden: bool) {
        let changed = match self.filter_mut(FilterKind::Category) {
            Some(TimelineFilter::Category(filter)) => filter.set_hidden(category, hidden),
            _ => false,
        };
        if changed {
            tracing::debug!("Category {} hidden: {}", category, hidden);
            self.emit(ModelEvent::RecordFilterChanged);
        }
    }

    pub fn is_category_hidden(&self, category: Category) -> bool {
        self.filters.iter().any(|f| match f {
            TimelineFilter::Category(filter) => filter.is_hidden(category),
            _ => false,
        })
    }

    /// Set the minimum record duration in milliseconds; 0 disables the filter
    pub fn set_minimum_record_duration(&mut self, minimum: Millis) {
        if let Some(TimelineFilter::Duration(filter)) = self.filter_mut(FilterKind::Duration) {
            filter.set_minimum_record_duration(minimum);
        }
        self.emit(ModelEvent::RecordFilterChanged);
    }

    pub fn minimum_record_duration(&self) -> Millis {
        self.filters
            .iter()
            .find_map(|f| match f {
                TimelineFilter::Duration(filter) => Some(filter.minimum_record_duration()),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    /// Replace the text filter regex; `None` clears it
    pub fn set_text_filter(&mut self, regex: Option<Regex>) {
        if let Some(TimelineFilter::Text(filter)) = self.filter_mut(FilterKind::Text) {
            filter.set_regex(regex);
        }
        self.emit(ModelEvent::RecordFilterChanged);
    }

    /// Whether a non-empty text filter narrows the view
    pub fn is_text_filter_active(&self) -> bool {
        self.filters.iter().any(|f| match f {
            TimelineFilter::Text(filter) => !filter.is_empty(),
            _ => false,
        })
    }

    // ========================================================================
    // Frames, screenshots, requests, events
    // ========================================================================

    /// Frames in the order they were added
    ///
    /// Use [`Self::ordered_frames`] for timeline order.
    pub fn frames(&self) -> &[TimelineFrame] {
        &self.frames
    }

    pub fn frame(&self, id: FrameId) -> Option<&TimelineFrame> {
        self.frames.get(id.index())
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frames sorted by start time
    pub fn ordered_frames(&self) -> impl Iterator<Item = (FrameId, &TimelineFrame)> + '_ {
        self.frame_order
            .iter()
            .filter_map(move |&id| self.frame(id).map(|frame| (id, frame)))
    }

    /// Position of `id` in start-time order
    pub fn frame_position(&self, id: FrameId) -> Option<usize> {
        self.frame_order.iter().position(|&f| f == id)
    }

    /// Frame at `position` in start-time order
    pub fn frame_at_position(&self, position: usize) -> Option<FrameId> {
        self.frame_order.get(position).copied()
    }

    /// Frames that end after `start` and begin no later than `end`
    ///
    /// For a point query (`start == end`) this yields the frame containing
    /// that instant, preferring the later frame on a shared boundary.
    pub fn filtered_frames(&self, start: Millis, end: Millis) -> impl Iterator<Item = FrameId> + '_ {
        self.ordered_frames()
            .filter(move |(_, f)| f.end_time > start && f.start_time <= end)
            .map(|(id, _)| id)
    }

    /// Append a frame
    ///
    /// Ids handed out earlier keep pointing at their frame when a frame
    /// arrives out of order; only the start-time index is reshuffled.
    pub fn add_frame(&mut self, frame: TimelineFrame) -> FrameId {
        let id = FrameId::from_index(self.frames.len());
        let at = self
            .frame_order
            .partition_point(|&f| self.frames[f.index()].start_time <= frame.start_time);
        self.frames.push(frame);
        self.frame_order.insert(at, id);
        id
    }

    pub fn screenshots(&self) -> &[Screenshot] {
        &self.screenshots
    }

    /// First screenshot taken at or after `time`
    pub fn screenshot_at_or_after(&self, time: Millis) -> Option<&Screenshot> {
        let at = self.screenshots.partition_point(|s| s.timestamp < time);
        self.screenshots.get(at)
    }

    pub fn add_screenshot(&mut self, screenshot: Screenshot) {
        let at = self
            .screenshots
            .partition_point(|s| s.timestamp <= screenshot.timestamp);
        self.screenshots.insert(at, screenshot);
    }

    pub fn network_requests(&self) -> &[NetworkRequest] {
        &self.network_requests
    }

    pub fn network_request(&self, id: RequestId) -> Option<&NetworkRequest> {
        self.network_requests.get(id.index())
    }

    pub fn add_network_request(&mut self, request: NetworkRequest) -> RequestId {
        self.network_requests.push(request);
        RequestId::from_index(self.network_requests.len() - 1)
    }

    /// Raw events retained for saving
    pub fn trace_events(&self) -> &[TraceEvent] {
        &self.trace_events
    }

    pub fn trace_event(&self, id: EventId) -> Option<&TraceEvent> {
        self.trace_events.get(id.index())
    }

    pub fn add_trace_event(&mut self, event: TraceEvent) -> EventId {
        self.trace_events.push(event);
        EventId::from_index(self.trace_events.len() - 1)
    }

    // ========================================================================
    // Recording lifecycle
    // ========================================================================

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_loading_from_file(&self) -> bool {
        self.loading_from_file
    }

    /// Drop all records and notify observers
    pub fn reset(&mut self) {
        self.records.clear();
        self.main_thread_tasks.clear();
        self.frames.clear();
        self.frame_order.clear();
        self.screenshots.clear();
        self.network_requests.clear();
        self.trace_events.clear();
        self.bounds = None;
        self.generation += 1;
        self.emit(ModelEvent::RecordsCleared);
    }

    /// Begin a live capture
    pub fn start_recording(&mut self) {
        self.reset();
        self.recording = true;
        self.loading_from_file = false;
        tracing::info!("Recording started");
        self.emit(ModelEvent::RecordingStarted { from_file: false });
    }

    /// Begin loading a trace file
    pub fn start_loading(&mut self) {
        self.reset();
        self.recording = true;
        self.loading_from_file = true;
        tracing::info!("Loading trace from file");
        self.emit(ModelEvent::RecordingStarted { from_file: true });
    }

    /// Finish a capture or load
    pub fn stop_recording(&mut self) {
        if !self.recording {
            tracing::debug!("stop_recording called while idle");
            return;
        }
        self.recording = false;
        self.loading_from_file = false;
        tracing::info!("Recording stopped with {} records", self.records.len());
        self.emit(ModelEvent::RecordingStopped);
    }

    pub fn report_buffer_usage(&mut self, usage: f64) {
        self.emit(ModelEvent::BufferUsage(usage));
    }

    pub fn report_retrieve_progress(&mut self, progress: f64) {
        self.emit(ModelEvent::RetrieveEventsProgress(progress));
    }

    /// Append everything reconstructed from a trace
    pub fn add_trace(&mut self, trace: LoadedTrace) {
        let mut ids: Vec<RecordId> = Vec::with_capacity(trace.records.len());
        for pending in trace.records {
            let parent = pending.parent.and_then(|i| ids.get(i).copied());
            ids.push(self.append_record(parent, pending.data));
        }
        for frame in trace.frames {
            self.add_frame(frame);
        }
        for screenshot in trace.screenshots {
            self.add_screenshot(screenshot);
        }
        self.network_requests.extend(trace.network_requests);
        self.trace_events.extend(trace.events);
        self.generation += 1;
        tracing::debug!(
            "Model now holds {} records in {} tasks",
            self.records.len(),
            self.main_thread_tasks.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordType;

    fn span(record_type: RecordType, start: f64, end: f64) -> RecordData {
        RecordData::new(record_type, start, Some(end))
    }

    #[test]
    fn test_append_keeps_siblings_sorted() {
        let mut model = TimelineModel::new();
        let late = model.append_record(None, span(RecordType::Program, 50.0, 60.0));
        let early = model.append_record(None, span(RecordType::Program, 0.0, 10.0));
        assert_eq!(model.main_thread_tasks(), &[early, late]);

        let b = model.append_record(Some(early), span(RecordType::Layout, 5.0, 6.0));
        let a = model.append_record(Some(early), span(RecordType::FunctionCall, 1.0, 2.0));
        let children: Vec<_> = model.children(early).map(|r| r.id).collect();
        assert_eq!(children, vec![a, b]);
        assert_eq!(model.record(a).unwrap().parent, Some(early));
    }

    #[test]
    fn test_record_time_bounds() {
        let mut model = TimelineModel::new();
        assert_eq!(model.minimum_record_time(), 0.0);
        assert_eq!(model.maximum_record_time(), 0.0);

        model.append_record(None, span(RecordType::Program, 10.0, 20.0));
        model.append_record(None, RecordData::new(RecordType::Program, 30.0, None));
        assert_eq!(model.minimum_record_time(), 10.0);
        assert_eq!(model.maximum_record_time(), 30.0);
    }

    #[test]
    fn test_filtered_traversal_flattens_hidden_records() {
        let mut model = TimelineModel::new();
        let root = model.append_record(None, span(RecordType::Program, 0.0, 100.0));
        let dispatch = model.append_record(Some(root), span(RecordType::EventDispatch, 10.0, 50.0));
        model.append_record(Some(dispatch), span(RecordType::FunctionCall, 10.0, 40.0));
        model.append_record(Some(root), span(RecordType::EventDispatch, 60.0, 70.0));

        let mut visited = Vec::new();
        model.for_all_filtered_records(|record, depth| {
            visited.push((record.record_type.clone(), depth));
            ControlFlow::Continue(())
        });
        // The empty dispatch is hidden by the static filter.
        assert_eq!(
            visited,
            vec![
                (RecordType::Program, 0),
                (RecordType::EventDispatch, 1),
                (RecordType::FunctionCall, 2),
            ]
        );

        model.set_category_hidden(Category::Other, true);
        let mut visited = Vec::new();
        model.for_all_filtered_records(|record, depth| {
            visited.push((record.record_type.clone(), depth));
            ControlFlow::Continue(())
        });
        assert_eq!(
            visited,
            vec![(RecordType::EventDispatch, 0), (RecordType::FunctionCall, 1)]
        );
    }

    #[test]
    fn test_traversal_stops_on_break() {
        let mut model = TimelineModel::new();
        for i in 0..10 {
            model.append_record(None, span(RecordType::Program, i as f64, i as f64 + 0.5));
        }
        let mut count = 0;
        model.for_all_records(|_, _| {
            count += 1;
            if count == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_events_delivered_in_subscription_order() {
        let mut model = TimelineModel::new();
        let first = model.subscribe();
        let second = model.subscribe();

        model.start_recording();
        model.stop_recording();

        let expected = vec![
            ModelEvent::RecordsCleared,
            ModelEvent::RecordingStarted { from_file: false },
            ModelEvent::RecordingStopped,
        ];
        assert_eq!(first.try_iter().collect::<Vec<_>>(), expected);
        assert_eq!(second.try_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut model = TimelineModel::new();
        let rx = model.subscribe();
        drop(rx);
        model.reset();
        assert!(model.subscribers.is_empty());
    }

    #[test]
    fn test_category_toggle_only_notifies_on_change() {
        let mut model = TimelineModel::new();
        let rx = model.subscribe();
        model.set_category_hidden(Category::Scripting, true);
        model.set_category_hidden(Category::Scripting, true);
        assert_eq!(rx.try_iter().count(), 1);
        assert!(model.is_category_hidden(Category::Scripting));
    }

    #[test]
    fn test_reset_bumps_generation() {
        let mut model = TimelineModel::new();
        model.append_record(None, span(RecordType::Program, 0.0, 1.0));
        let generation = model.generation();
        model.reset();
        assert!(model.is_empty());
        assert!(model.generation() > generation);
        assert!(model.main_thread_tasks().is_empty());
    }

    #[test]
    fn test_frame_ids_survive_out_of_order_frames() {
        let frame = |start: f64, end: f64| TimelineFrame {
            start_time: start,
            end_time: end,
            idle: false,
            has_layer_tree: false,
            paint_count: 0,
        };
        let mut model = TimelineModel::new();
        let late = model.add_frame(frame(32.0, 48.0));
        let early = model.add_frame(frame(0.0, 16.0));
        let middle = model.add_frame(frame(16.0, 32.0));

        assert_eq!(model.frame(late).unwrap().start_time, 32.0);
        assert_eq!(model.frame(early).unwrap().start_time, 0.0);
        let order: Vec<_> = model.ordered_frames().map(|(id, _)| id).collect();
        assert_eq!(order, vec![early, middle, late]);
        assert_eq!(model.frame_position(late), Some(2));
        assert_eq!(model.frame_at_position(0), Some(early));
        assert_eq!(model.filtered_frames(20.0, 40.0).collect::<Vec<_>>(), vec![middle, late]);
        // A shared boundary resolves to the later frame.
        assert_eq!(model.filtered_frames(32.0, 32.0).next(), Some(late));
    }

    #[test]
    fn test_screenshot_lower_bound() {
        let mut model = TimelineModel::new();
        model.add_screenshot(Screenshot { timestamp: 20.0, image_data: "b".into() });
        model.add_screenshot(Screenshot { timestamp: 10.0, image_data: "a".into() });
        assert_eq!(model.screenshot_at_or_after(10.0).unwrap().image_data, "a");
        assert_eq!(model.screenshot_at_or_after(10.5).unwrap().image_data, "b");
        assert!(model.screenshot_at_or_after(21.0).is_none());
    }

    #[test]
    fn test_add_trace_links_parents() {
        let trace = LoadedTrace {
            records: vec![
                PendingRecord { parent: None, data: span(RecordType::Program, 0.0, 10.0) },
                PendingRecord { parent: Some(0), data: span(RecordType::Layout, 1.0, 2.0) },
            ],
            ..Default::default()
        };
        let mut model = TimelineModel::new();
        model.add_trace(trace);
        assert_eq!(model.main_thread_tasks().len(), 1);
        assert_eq!(model.children(model.main_thread_tasks()[0]).count(), 1);
    }
}
