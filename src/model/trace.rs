//! Trace file loading and saving
//!
//! Traces use the JSON trace-event format: either `{"traceEvents": [...]}`
//! or a bare array of events. Timestamps in the file are microseconds and
//! are converted to milliseconds when records are built.
//!
//! # Reconstruction
//!
//! - **Records**: duration events (`X`, `B`/`E`) and instants (`I`, `i`, `R`)
//!   of the main thread, nested by containment
//! - **Frames**: intervals between consecutive `BeginFrame` events
//! - **Screenshots**: `Screenshot` events carrying `args.snapshot`
//! - **Network requests**: `ResourceSendRequest` / `ResourceReceiveResponse` /
//!   `ResourceFinish` joined on `args.data.requestId`
//!
//! Loading checks the [`Progress`] handle for cancellation between phases
//! and returns `Ok(None)` if it was cancelled.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt, TimelineError};
use crate::model::id::EventId;
use crate::session::progress::Progress;
use crate::types::{Millis, NetworkRequest, RecordData, RecordType, Screenshot, TimelineFrame};

/// Thread name that identifies the renderer main thread
pub const MAIN_THREAD_NAME: &str = "CrRendererMain";

/// Prefix of files written by [`save_trace`]
pub const SAVE_FILE_PREFIX: &str = "TimelineRawData-";

/// A raw trace event as stored in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cat: String,
    pub ph: String,
    /// Microseconds
    #[serde(default)]
    pub ts: f64,
    /// Microseconds, complete events only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: u64,
    #[serde(default)]
    pub tid: u64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl TraceEvent {
    /// Start in milliseconds
    pub fn start_time(&self) -> Millis {
        self.ts / 1000.0
    }

    /// End in milliseconds for complete events
    pub fn end_time(&self) -> Option<Millis> {
        self.dur.map(|dur| (self.ts + dur) / 1000.0)
    }

    /// `(pid, tid)` pair
    pub fn thread(&self) -> (u64, u64) {
        (self.pid, self.tid)
    }

    /// Field of the conventional `args.data` object
    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.args.get("data").and_then(|data| data.get(key))
    }

    fn data_string(&self, key: &str) -> Option<String> {
        self.data_field(key).and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceFile {
    Object {
        #[serde(rename = "traceEvents")]
        trace_events: Vec<TraceEvent>,
    },
    Array(Vec<TraceEvent>),
}

#[derive(Serialize)]
struct TraceFileRef<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: &'a [TraceEvent],
}

/// A record waiting to be appended to the model
///
/// Records are ordered so that a parent always precedes its children;
/// `parent` indexes into the same list.
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub parent: Option<usize>,
    pub data: RecordData,
}

/// Everything reconstructed from a trace file
#[derive(Debug, Default)]
pub struct LoadedTrace {
    pub events: Vec<TraceEvent>,
    pub records: Vec<PendingRecord>,
    pub frames: Vec<TimelineFrame>,
    pub screenshots: Vec<Screenshot>,
    pub network_requests: Vec<NetworkRequest>,
    pub main_thread: Option<(u64, u64)>,
}

/// Load a trace from a file
pub fn load_from_file(path: &Path, progress: &mut dyn Progress) -> Result<Option<LoadedTrace>> {
    let file = File::open(path).with_context(|| format!("Failed to open trace {:?}", path))?;
    parse_trace(BufReader::new(file), progress)
        .with_context(|| format!("Failed to load trace {:?}", path))
}

/// Parse a trace from any reader
pub fn parse_trace<R: Read>(reader: R, progress: &mut dyn Progress) -> Result<Option<LoadedTrace>> {
    progress.set_title("Loading trace");
    progress.set_total_work(4);
    progress.set_worked(0);

    let events = match serde_json::from_reader(reader)? {
        TraceFile::Object { trace_events } => trace_events,
        TraceFile::Array(events) => events,
    };
    progress.set_worked(1);
    if progress.is_canceled() {
        tracing::info!("Trace loading cancelled after parsing");
        return Ok(None);
    }

    let main_thread = find_main_thread(&events);
    let records = match main_thread {
        Some(thread) => nest_records(collect_spans(&events, thread)?),
        None => Vec::new(),
    };
    progress.set_worked(2);
    if progress.is_canceled() {
        tracing::info!("Trace loading cancelled after building records");
        return Ok(None);
    }

    let frames = build_frames(&events);
    let screenshots = build_screenshots(&events);
    progress.set_worked(3);
    if progress.is_canceled() {
        tracing::info!("Trace loading cancelled after building frames");
        return Ok(None);
    }

    let network_requests = build_network_requests(&events);
    progress.set_worked(4);
    progress.done();

    tracing::info!(
        "Loaded trace: {} events, {} records, {} frames, {} requests",
        events.len(),
        records.len(),
        frames.len(),
        network_requests.len()
    );

    Ok(Some(LoadedTrace {
        events,
        records,
        frames,
        screenshots,
        network_requests,
        main_thread,
    }))
}

/// Pick the renderer main thread, falling back to the busiest thread
fn find_main_thread(events: &[TraceEvent]) -> Option<(u64, u64)> {
    let named = events.iter().find(|e| {
        e.ph == "M"
            && e.name == "thread_name"
            && e.args.get("name").and_then(Value::as_str) == Some(MAIN_THREAD_NAME)
    });
    if let Some(event) = named {
        return Some(event.thread());
    }

    let mut counts: HashMap<(u64, u64), usize> = HashMap::new();
    for event in events.iter().filter(|e| is_span_phase(&e.ph)) {
        *counts.entry(event.thread()).or_default() += 1;
    }
    // Ties resolve to the lowest (pid, tid) so the choice is stable.
    counts
        .into_iter()
        .max_by(|(a_thread, a), (b_thread, b)| a.cmp(b).then_with(|| b_thread.cmp(a_thread)))
        .map(|(thread, _)| thread)
}

fn is_span_phase(ph: &str) -> bool {
    matches!(ph, "X" | "B" | "E" | "I" | "i" | "R")
}

fn collect_spans(events: &[TraceEvent], thread: (u64, u64)) -> Result<Vec<RecordData>> {
    let mut order: Vec<usize> = (0..events.len())
        .filter(|&i| events[i].thread() == thread && is_span_phase(&events[i].ph))
        .collect();
    order.sort_by(|&a, &b| events[a].ts.total_cmp(&events[b].ts));

    let mut spans = Vec::with_capacity(order.len());
    let mut open: Vec<(usize, Map<String, Value>)> = Vec::new();

    for index in order {
        let event = &events[index];
        let id = EventId::from_index(index);
        match event.ph.as_str() {
            "X" => {
                let end = event.end_time().unwrap_or_else(|| event.start_time());
                spans.push(
                    RecordData::new(RecordType::from_name(&event.name), event.start_time(), Some(end))
                        .with_args(event.args.clone())
                        .with_event(id),
                );
            }
            "B" => open.push((index, event.args.clone())),
            "E" => {
                let Some((begin_index, mut args)) = open.pop() else {
                    tracing::warn!("Unmatched end event '{}' at {}", event.name, event.ts);
                    continue;
                };
                let begin = &events[begin_index];
                if event.ts < begin.ts {
                    return Err(end_before_begin(begin, event));
                }
                args.extend(event.args.clone());
                spans.push(
                    RecordData::new(
                        RecordType::from_name(&begin.name),
                        begin.start_time(),
                        Some(event.start_time()),
                    )
                    .with_args(args)
                    .with_event(EventId::from_index(begin_index)),
                );
            }
            _ => {
                spans.push(
                    RecordData::new(
                        RecordType::from_name(&event.name),
                        event.start_time(),
                        Some(event.start_time()),
                    )
                    .with_args(event.args.clone())
                    .with_event(id),
                );
            }
        }
    }

    // Begins without an end are still running when the trace was taken.
    for (begin_index, args) in open {
        let begin = &events[begin_index];
        spans.push(
            RecordData::new(RecordType::from_name(&begin.name), begin.start_time(), None)
                .with_args(args)
                .with_event(EventId::from_index(begin_index)),
        );
    }

    Ok(spans)
}

fn end_before_begin(begin: &TraceEvent, end: &TraceEvent) -> TimelineError {
    TimelineError::TraceFormat(format!(
        "end of '{}' at {} precedes its begin at {}",
        begin.name, end.ts, begin.ts
    ))
}

fn contains(parent: &RecordData, child: &RecordData) -> bool {
    if child.start_time < parent.start_time {
        return false;
    }
    match (parent.end_time, child.end_time) {
        (None, _) => true,
        (Some(parent_end), Some(child_end)) => child_end <= parent_end,
        (Some(parent_end), None) => child.start_time < parent_end,
    }
}

/// Nest spans by containment
///
/// Spans are sorted by start time, longer spans first on ties, so a parent
/// is always emitted before its children. A span that starts inside an open
/// span but outlives it is cut at that span's end and nested under it, which
/// keeps siblings disjoint.
fn nest_records(mut spans: Vec<RecordData>) -> Vec<PendingRecord> {
    let end_key = |span: &RecordData| span.end_time.unwrap_or(f64::INFINITY);
    spans.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then_with(|| end_key(b).total_cmp(&end_key(a)))
    });

    let mut records: Vec<PendingRecord> = Vec::with_capacity(spans.len());
    let mut stack: Vec<usize> = Vec::new();
    let mut clipped = 0usize;
    for mut span in spans {
        while let Some(&top) = stack.last() {
            let parent = &records[top].data;
            if let (Some(parent_end), Some(end)) = (parent.end_time, span.end_time) {
                if span.start_time < parent_end && end > parent_end {
                    tracing::debug!(
                        "Clipping {} [{}, {}] to enclosing span end {}",
                        span.record_type.name(),
                        span.start_time,
                        end,
                        parent_end
                    );
                    span.end_time = Some(parent_end);
                    clipped += 1;
                }
            }
            if contains(&records[top].data, &span) {
                break;
            }
            stack.pop();
        }
        records.push(PendingRecord {
            parent: stack.last().copied(),
            data: span,
        });
        stack.push(records.len() - 1);
    }
    if clipped > 0 {
        tracing::warn!("Clipped {} partially overlapping spans", clipped);
    }
    records
}

fn sorted_times(events: &[TraceEvent], names: &[&str]) -> Vec<Millis> {
    let mut times: Vec<Millis> = events
        .iter()
        .filter(|e| names.contains(&e.name.as_str()))
        .map(TraceEvent::start_time)
        .collect();
    times.sort_by(f64::total_cmp);
    times
}

fn count_in(times: &[Millis], start: Millis, end: Millis) -> usize {
    let from = times.partition_point(|&t| t < start);
    let to = times.partition_point(|&t| t < end);
    to - from
}

fn build_frames(events: &[TraceEvent]) -> Vec<TimelineFrame> {
    let mut begins = sorted_times(events, &["BeginFrame"]);
    begins.dedup();
    let draws = sorted_times(events, &["DrawFrame"]);
    let snapshots = sorted_times(events, &["LayerTreeHostImplSnapshot", "captureLayerTree"]);
    let paints = sorted_times(events, &["Paint"]);

    begins
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            TimelineFrame {
                start_time: start,
                end_time: end,
                idle: count_in(&draws, start, end) == 0,
                has_layer_tree: count_in(&snapshots, start, end) > 0,
                paint_count: count_in(&paints, start, end),
            }
        })
        .collect()
}

fn build_screenshots(events: &[TraceEvent]) -> Vec<Screenshot> {
    let mut screenshots: Vec<Screenshot> = events
        .iter()
        .filter(|e| e.name == "Screenshot")
        .filter_map(|e| {
            let image = e.args.get("snapshot").and_then(Value::as_str)?;
            Some(Screenshot {
                timestamp: e.start_time(),
                image_data: image.to_string(),
            })
        })
        .collect();
    screenshots.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    screenshots
}

fn build_network_requests(events: &[TraceEvent]) -> Vec<NetworkRequest> {
    let mut order: Vec<&TraceEvent> = events
        .iter()
        .filter(|e| e.name.starts_with("Resource"))
        .collect();
    order.sort_by(|a, b| a.ts.total_cmp(&b.ts));

    let mut requests: Vec<NetworkRequest> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for event in order {
        let Some(request_id) = event.data_string("requestId") else {
            continue;
        };
        match event.name.as_str() {
            "ResourceSendRequest" => {
                by_id.insert(request_id.clone(), requests.len());
                requests.push(NetworkRequest {
                    request_id,
                    url: event.data_string("url").unwrap_or_default(),
                    method: event.data_string("requestMethod"),
                    mime_type: None,
                    start_time: event.start_time(),
                    end_time: None,
                });
            }
            "ResourceReceiveResponse" => {
                if let Some(&index) = by_id.get(&request_id) {
                    requests[index].mime_type = event.data_string("mimeType");
                }
            }
            "ResourceFinish" => {
                if let Some(&index) = by_id.get(&request_id) {
                    requests[index].end_time = Some(event.start_time());
                }
            }
            _ => {}
        }
    }
    requests
}

/// File name for a saved trace
pub fn trace_file_name(now: DateTime<Local>) -> String {
    format!("{}{}.json", SAVE_FILE_PREFIX, now.format("%Y%m%dT%H%M%S"))
}

/// Write events in the `{"traceEvents": [...]}` layout
pub fn write_trace<W: Write>(writer: W, events: &[TraceEvent]) -> Result<()> {
    serde_json::to_writer(writer, &TraceFileRef { trace_events: events })?;
    Ok(())
}

/// Save events into `dir` under a timestamped name
pub fn save_trace(dir: &Path, events: &[TraceEvent]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {:?}", dir))?;
    let path = dir.join(trace_file_name(Local::now()));
    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_trace(&mut writer, events)?;
    writer.flush().context("Failed to flush trace file")?;
    tracing::info!("Saved {} trace events to {:?}", events.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::progress::ProgressIndicator;
    use chrono::TimeZone;

    fn parse(json: &str) -> LoadedTrace {
        let mut progress = ProgressIndicator::new();
        parse_trace(json.as_bytes(), &mut progress)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_parse_bare_array_and_nesting() {
        let trace = parse(
            r#"[
                {"name":"Program","ph":"X","ts":0,"dur":100000,"pid":1,"tid":1},
                {"name":"FunctionCall","ph":"X","ts":10000,"dur":30000,"pid":1,"tid":1},
                {"name":"Layout","ph":"X","ts":50000,"dur":5000,"pid":1,"tid":1}
            ]"#,
        );
        assert_eq!(trace.records.len(), 3);
        assert_eq!(trace.records[0].parent, None);
        assert_eq!(trace.records[1].parent, Some(0));
        assert_eq!(trace.records[2].parent, Some(0));
        assert_eq!(trace.records[1].data.start_time, 10.0);
        assert_eq!(trace.records[1].data.end_time, Some(40.0));
    }

    #[test]
    fn test_begin_end_pairs_and_unfinished() {
        let trace = parse(
            r#"{"traceEvents":[
                {"name":"Program","ph":"B","ts":0,"pid":1,"tid":1},
                {"name":"Program","ph":"E","ts":20000,"pid":1,"tid":1},
                {"name":"Program","ph":"B","ts":30000,"pid":1,"tid":1}
            ]}"#,
        );
        assert_eq!(trace.records.len(), 2);
        assert_eq!(trace.records[0].data.end_time, Some(20.0));
        assert_eq!(trace.records[1].data.end_time, None);
        assert_eq!(trace.records[1].parent, None);
    }

    #[test]
    fn test_main_thread_by_name() {
        let trace = parse(
            r#"[
                {"name":"thread_name","ph":"M","pid":1,"tid":7,"args":{"name":"CrRendererMain"}},
                {"name":"Program","ph":"X","ts":0,"dur":10,"pid":1,"tid":1},
                {"name":"Program","ph":"X","ts":20,"dur":10,"pid":1,"tid":1},
                {"name":"Layout","ph":"X","ts":0,"dur":10,"pid":1,"tid":7}
            ]"#,
        );
        assert_eq!(trace.main_thread, Some((1, 7)));
        assert_eq!(trace.records.len(), 1);
        assert_eq!(trace.records[0].data.record_type, RecordType::Layout);
    }

    #[test]
    fn test_frames_and_screenshots() {
        let trace = parse(
            r#"[
                {"name":"BeginFrame","ph":"I","ts":0,"pid":1,"tid":2},
                {"name":"DrawFrame","ph":"I","ts":8000,"pid":1,"tid":2},
                {"name":"BeginFrame","ph":"I","ts":16000,"pid":1,"tid":2},
                {"name":"BeginFrame","ph":"I","ts":32000,"pid":1,"tid":2},
                {"name":"Screenshot","ph":"O","ts":17000,"pid":1,"tid":3,"args":{"snapshot":"AAAA"}}
            ]"#,
        );
        assert_eq!(trace.frames.len(), 2);
        assert!(!trace.frames[0].idle);
        assert!(trace.frames[1].idle);
        assert_eq!(trace.frames[1].start_time, 16.0);
        assert_eq!(trace.screenshots.len(), 1);
        assert_eq!(trace.screenshots[0].timestamp, 17.0);
    }

    #[test]
    fn test_layer_tree_markers() {
        let trace = parse(
            r#"[
                {"name":"BeginFrame","ph":"I","ts":0,"pid":1,"tid":2},
                {"name":"captureLayerTree","ph":"I","ts":4000,"pid":1,"tid":2},
                {"name":"BeginFrame","ph":"I","ts":16000,"pid":1,"tid":2},
                {"name":"LayerTreeHostImplSnapshot","ph":"O","ts":20000,"pid":1,"tid":2},
                {"name":"BeginFrame","ph":"I","ts":32000,"pid":1,"tid":2},
                {"name":"BeginFrame","ph":"I","ts":48000,"pid":1,"tid":2}
            ]"#,
        );
        let layer_trees: Vec<bool> = trace.frames.iter().map(|f| f.has_layer_tree).collect();
        assert_eq!(layer_trees, vec![true, true, false]);
    }

    #[test]
    fn test_partial_overlap_is_clipped_into_enclosing_span() {
        let trace = parse(
            r#"[
                {"name":"Program","ph":"X","ts":0,"dur":10000,"pid":1,"tid":1},
                {"name":"Program","ph":"X","ts":5000,"dur":15000,"pid":1,"tid":1},
                {"name":"FunctionCall","ph":"X","ts":7000,"dur":1000,"pid":1,"tid":1},
                {"name":"Program","ph":"X","ts":30000,"dur":10000,"pid":1,"tid":1}
            ]"#,
        );
        let shape: Vec<_> = trace
            .records
            .iter()
            .map(|r| (r.parent, r.data.start_time, r.data.end_time))
            .collect();
        assert_eq!(
            shape,
            vec![
                (None, 0.0, Some(10.0)),
                (Some(0), 5.0, Some(10.0)),
                (Some(1), 7.0, Some(8.0)),
                (None, 30.0, Some(40.0)),
            ]
        );
    }

    #[test]
    fn test_network_requests() {
        let trace = parse(
            r#"[
                {"name":"ResourceSendRequest","ph":"I","ts":1000,"pid":1,"tid":1,
                 "args":{"data":{"requestId":"42","url":"https://example.com/app.js","requestMethod":"GET"}}},
                {"name":"ResourceReceiveResponse","ph":"I","ts":5000,"pid":1,"tid":1,
                 "args":{"data":{"requestId":"42","mimeType":"text/javascript"}}},
                {"name":"ResourceFinish","ph":"I","ts":9000,"pid":1,"tid":1,
                 "args":{"data":{"requestId":"42"}}}
            ]"#,
        );
        assert_eq!(trace.network_requests.len(), 1);
        let request = &trace.network_requests[0];
        assert_eq!(request.url, "https://example.com/app.js");
        assert_eq!(request.mime_type.as_deref(), Some("text/javascript"));
        assert_eq!(request.duration(), Some(8.0));
    }

    #[test]
    fn test_cancelled_load_returns_none() {
        let mut progress = ProgressIndicator::new();
        progress.cancellation_flag().cancel();
        let result = parse_trace(r#"[]"#.as_bytes(), &mut progress).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_trace_is_error() {
        let mut progress = ProgressIndicator::new();
        assert!(parse_trace("{not json".as_bytes(), &mut progress).is_err());
    }

    #[test]
    fn test_trace_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(trace_file_name(now), "TimelineRawData-20240305T140709.json");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let trace = parse(r#"[{"name":"Program","ph":"X","ts":0,"dur":1000,"pid":1,"tid":1}]"#);
        let path = save_trace(dir.path(), &trace.events).unwrap();
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(SAVE_FILE_PREFIX)));

        let mut progress = ProgressIndicator::new();
        let reloaded = load_from_file(&path, &mut progress).unwrap().unwrap();
        assert_eq!(reloaded.events, trace.events);
    }
}
