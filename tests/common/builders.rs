//! Test data builders for creating trace files

use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

const PID: u64 = 1;

/// Builder for trace files in the `{"traceEvents": [...]}` layout
///
/// Times are given in milliseconds and stored as microseconds.
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    events: Vec<Value>,
}

fn micros(ms: f64) -> f64 {
    ms * 1000.0
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_name(mut self, pid: u64, tid: u64, name: &str) -> Self {
        self.events.push(json!({
            "name": "thread_name",
            "ph": "M",
            "pid": pid,
            "tid": tid,
            "args": { "name": name },
        }));
        self
    }

    pub fn complete(mut self, tid: u64, name: &str, start_ms: f64, dur_ms: f64) -> Self {
        self.events.push(json!({
            "name": name,
            "cat": "devtools.timeline",
            "ph": "X",
            "ts": micros(start_ms),
            "dur": micros(dur_ms),
            "pid": PID,
            "tid": tid,
        }));
        self
    }

    pub fn complete_with_data(
        mut self,
        tid: u64,
        name: &str,
        start_ms: f64,
        dur_ms: f64,
        key: &str,
        value: &str,
    ) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), json!(value));
        self.events.push(json!({
            "name": name,
            "cat": "devtools.timeline",
            "ph": "X",
            "ts": micros(start_ms),
            "dur": micros(dur_ms),
            "pid": PID,
            "tid": tid,
            "args": { "data": data },
        }));
        self
    }

    pub fn begin(mut self, tid: u64, name: &str, ts_ms: f64) -> Self {
        self.events.push(json!({
            "name": name,
            "ph": "B",
            "ts": micros(ts_ms),
            "pid": PID,
            "tid": tid,
        }));
        self
    }

    pub fn end(mut self, tid: u64, name: &str, ts_ms: f64) -> Self {
        self.events.push(json!({
            "name": name,
            "ph": "E",
            "ts": micros(ts_ms),
            "pid": PID,
            "tid": tid,
        }));
        self
    }

    pub fn instant(mut self, tid: u64, name: &str, ts_ms: f64) -> Self {
        self.events.push(json!({
            "name": name,
            "ph": "I",
            "ts": micros(ts_ms),
            "pid": PID,
            "tid": tid,
        }));
        self
    }

    pub fn resource(
        mut self,
        tid: u64,
        name: &str,
        ts_ms: f64,
        request_id: &str,
        fields: &[(&str, &str)],
    ) -> Self {
        let mut data = Map::new();
        data.insert("requestId".to_string(), json!(request_id));
        for (key, value) in fields {
            data.insert(key.to_string(), json!(value));
        }
        self.events.push(json!({
            "name": name,
            "ph": "I",
            "ts": micros(ts_ms),
            "pid": PID,
            "tid": tid,
            "args": { "data": data },
        }));
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn to_json(&self) -> String {
        json!({ "traceEvents": self.events }).to_string()
    }

    /// Write the trace to `dir/name`
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_json()).expect("write trace fixture");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_builder_uses_microseconds() {
        let trace = TraceBuilder::new().complete(1, "Layout", 2.5, 1.0);
        let value: Value = serde_json::from_str(&trace.to_json()).unwrap();
        assert_eq!(value["traceEvents"][0]["ts"], json!(2500.0));
        assert_eq!(value["traceEvents"][0]["dur"], json!(1000.0));
    }
}
