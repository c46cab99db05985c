//! Timeline selection
//!
//! Exactly one selection is active at a time. Every kind carries the time
//! span it covers; all but [`TimelineSelection::Range`] also point at the
//! object they were built from.

use serde::Serialize;

use crate::model::{EventId, FrameId, RecordId, RequestId, TraceEvent};
use crate::types::{Millis, NetworkRequest, Record, TimelineFrame};

/// Discriminant of a [`TimelineSelection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionType {
    Record,
    Frame,
    NetworkRequest,
    TraceEvent,
    Range,
}

/// What the details pane is showing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineSelection {
    Record {
        record: RecordId,
        start_time: Millis,
        end_time: Millis,
    },
    Frame {
        frame: FrameId,
        start_time: Millis,
        end_time: Millis,
    },
    NetworkRequest {
        request: RequestId,
        start_time: Millis,
        end_time: Millis,
    },
    TraceEvent {
        event: EventId,
        start_time: Millis,
        end_time: Millis,
    },
    Range {
        start_time: Millis,
        end_time: Millis,
    },
}

impl TimelineSelection {
    /// Select a record; an unfinished record covers only its start
    pub fn from_record(record: &Record) -> Self {
        TimelineSelection::Record {
            record: record.id,
            start_time: record.start_time,
            end_time: record.end_time.unwrap_or(record.start_time),
        }
    }

    pub fn from_frame(id: FrameId, frame: &TimelineFrame) -> Self {
        TimelineSelection::Frame {
            frame: id,
            start_time: frame.start_time,
            end_time: frame.end_time,
        }
    }

    /// Select a request; an unfinished request covers only its start
    pub fn from_network_request(id: RequestId, request: &NetworkRequest) -> Self {
        TimelineSelection::NetworkRequest {
            request: id,
            start_time: request.start_time,
            end_time: request.end_time.unwrap_or(request.start_time),
        }
    }

    /// Select a raw event; instant events get a 1 ms span
    pub fn from_trace_event(id: EventId, event: &TraceEvent) -> Self {
        let start_time = event.start_time();
        TimelineSelection::TraceEvent {
            event: id,
            start_time,
            end_time: event.end_time().unwrap_or(start_time + 1.0),
        }
    }

    pub fn from_range(start_time: Millis, end_time: Millis) -> Self {
        TimelineSelection::Range {
            start_time,
            end_time,
        }
    }

    pub fn selection_type(&self) -> SelectionType {
        match self {
            TimelineSelection::Record { .. } => SelectionType::Record,
            TimelineSelection::Frame { .. } => SelectionType::Frame,
            TimelineSelection::NetworkRequest { .. } => SelectionType::NetworkRequest,
            TimelineSelection::TraceEvent { .. } => SelectionType::TraceEvent,
            TimelineSelection::Range { .. } => SelectionType::Range,
        }
    }

    pub fn start_time(&self) -> Millis {
        match *self {
            TimelineSelection::Record { start_time, .. }
            | TimelineSelection::Frame { start_time, .. }
            | TimelineSelection::NetworkRequest { start_time, .. }
            | TimelineSelection::TraceEvent { start_time, .. }
            | TimelineSelection::Range { start_time, .. } => start_time,
        }
    }

    pub fn end_time(&self) -> Millis {
        match *self {
            TimelineSelection::Record { end_time, .. }
            | TimelineSelection::Frame { end_time, .. }
            | TimelineSelection::NetworkRequest { end_time, .. }
            | TimelineSelection::TraceEvent { end_time, .. }
            | TimelineSelection::Range { end_time, .. } => end_time,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, TimelineSelection::Range { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn event(ts: f64, dur: Option<f64>) -> TraceEvent {
        TraceEvent {
            name: "Layout".to_string(),
            cat: String::new(),
            ph: if dur.is_some() { "X" } else { "I" }.to_string(),
            ts,
            dur,
            pid: 1,
            tid: 1,
            args: Map::new(),
        }
    }

    #[test]
    fn test_trace_event_instant_gets_one_millisecond() {
        let selection = TimelineSelection::from_trace_event(EventId(3), &event(5000.0, None));
        assert_eq!(selection.start_time(), 5.0);
        assert_eq!(selection.end_time(), 6.0);
        assert_eq!(selection.selection_type(), SelectionType::TraceEvent);

        let selection = TimelineSelection::from_trace_event(EventId(3), &event(5000.0, Some(2500.0)));
        assert_eq!(selection.end_time(), 7.5);
    }

    #[test]
    fn test_unfinished_request_ends_at_start() {
        let request = NetworkRequest {
            request_id: "1".to_string(),
            url: "https://example.com".to_string(),
            method: None,
            mime_type: None,
            start_time: 12.0,
            end_time: None,
        };
        let selection = TimelineSelection::from_network_request(RequestId(0), &request);
        assert_eq!(selection.end_time(), 12.0);
    }

    #[test]
    fn test_range_has_no_object() {
        let selection = TimelineSelection::from_range(0.0, 100.0);
        assert!(selection.is_range());
        assert_eq!(
            serde_json::to_value(&selection).unwrap(),
            serde_json::json!({"type": "range", "start_time": 0.0, "end_time": 100.0})
        );
    }
}
