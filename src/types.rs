//! Core data types for the timeline inspector
//!
//! This module contains the fundamental data structures used throughout
//! the crate for representing recorded activity.
//!
//! # Main Types
//!
//! - [`Category`] - Classification bucket used for attributing time
//! - [`RecordType`] - Type tag of a record, mapped to a title and category
//! - [`Record`] - A timed, tree-structured unit of recorded activity
//! - [`TimelineFrame`] - A rendering frame on the compositor timeline
//! - [`Screenshot`] - A film-strip capture at a timestamp
//! - [`NetworkRequest`] - A resource load reconstructed from trace events
//!
//! # Time
//!
//! All times are milliseconds stored as `f64`, matching the resolution of
//! the trace format after conversion from microseconds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::id::{EventId, RecordId};

/// Milliseconds since the trace clock origin
pub type Millis = f64;

/// Category a record's time is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Loading,
    Scripting,
    Rendering,
    Painting,
    Gpu,
    Other,
    Idle,
}

impl Category {
    /// Get all categories in display order
    pub fn all() -> &'static [Category] {
        &[
            Category::Loading,
            Category::Scripting,
            Category::Rendering,
            Category::Painting,
            Category::Gpu,
            Category::Other,
            Category::Idle,
        ]
    }

    /// Stable lowercase name used as the aggregation key
    pub fn name(&self) -> &'static str {
        match self {
            Category::Loading => "loading",
            Category::Scripting => "scripting",
            Category::Rendering => "rendering",
            Category::Painting => "painting",
            Category::Gpu => "gpu",
            Category::Other => "other",
            Category::Idle => "idle",
        }
    }

    /// Get display name for this category
    pub fn title(&self) -> &'static str {
        match self {
            Category::Loading => "Loading",
            Category::Scripting => "Scripting",
            Category::Rendering => "Rendering",
            Category::Painting => "Painting",
            Category::Gpu => "GPU",
            Category::Other => "Other",
            Category::Idle => "Idle",
        }
    }

    /// Fill color as an RGB hex string
    pub fn color(&self) -> &'static str {
        match self {
            Category::Loading => "#6fa8dc",
            Category::Scripting => "#ffd966",
            Category::Rendering => "#8e7cc3",
            Category::Painting => "#93c47d",
            Category::Gpu => "#38761d",
            Category::Other => "#bfbfbf",
            Category::Idle => "#ffffff",
        }
    }

    /// Whether the category gets a checkbox in the filter bar
    pub fn visible(&self) -> bool {
        !matches!(self, Category::Gpu)
    }

    /// Look a category up by its lowercase name
    pub fn from_name(name: &str) -> Option<Category> {
        Category::all().iter().copied().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Type tag of a record
///
/// Known types carry a fixed title and category. Anything else is kept
/// verbatim in [`RecordType::Other`] and attributed to [`Category::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    Program,
    Task,
    EventDispatch,
    GpuTask,
    Animation,
    RequestMainThreadFrame,
    BeginFrame,
    BeginMainThreadFrame,
    DrawFrame,
    ScheduleStyleRecalculation,
    RecalculateStyles,
    UpdateLayoutTree,
    InvalidateLayout,
    Layout,
    UpdateLayerTree,
    PaintSetup,
    Paint,
    PaintImage,
    RasterTask,
    CompositeLayers,
    DecodeImage,
    ResizeImage,
    ParseHtml,
    ParseAuthorStyleSheet,
    ResourceSendRequest,
    ResourceReceiveResponse,
    ResourceReceivedData,
    ResourceFinish,
    TimerInstall,
    TimerRemove,
    TimerFire,
    XhrReadyStateChange,
    XhrLoad,
    EvaluateScript,
    FunctionCall,
    GcEvent,
    MajorGc,
    MinorGc,
    JsFrame,
    RequestAnimationFrame,
    FireAnimationFrame,
    MarkLoad,
    MarkDomContent,
    MarkFirstPaint,
    TimeStamp,
    ConsoleTime,
    Screenshot,
    Other(String),
}

impl RecordType {
    /// Trace event name for this type
    pub fn name(&self) -> &str {
        match self {
            RecordType::Program => "Program",
            RecordType::Task => "Task",
            RecordType::EventDispatch => "EventDispatch",
            RecordType::GpuTask => "GPUTask",
            RecordType::Animation => "Animation",
            RecordType::RequestMainThreadFrame => "RequestMainThreadFrame",
            RecordType::BeginFrame => "BeginFrame",
            RecordType::BeginMainThreadFrame => "BeginMainThreadFrame",
            RecordType::DrawFrame => "DrawFrame",
            RecordType::ScheduleStyleRecalculation => "ScheduleStyleRecalculation",
            RecordType::RecalculateStyles => "RecalculateStyles",
            RecordType::UpdateLayoutTree => "UpdateLayoutTree",
            RecordType::InvalidateLayout => "InvalidateLayout",
            RecordType::Layout => "Layout",
            RecordType::UpdateLayerTree => "UpdateLayerTree",
            RecordType::PaintSetup => "PaintSetup",
            RecordType::Paint => "Paint",
            RecordType::PaintImage => "PaintImage",
            RecordType::RasterTask => "RasterTask",
            RecordType::CompositeLayers => "CompositeLayers",
            RecordType::DecodeImage => "Decode Image",
            RecordType::ResizeImage => "Resize Image",
            RecordType::ParseHtml => "ParseHTML",
            RecordType::ParseAuthorStyleSheet => "ParseAuthorStyleSheet",
            RecordType::ResourceSendRequest => "ResourceSendRequest",
            RecordType::ResourceReceiveResponse => "ResourceReceiveResponse",
            RecordType::ResourceReceivedData => "ResourceReceivedData",
            RecordType::ResourceFinish => "ResourceFinish",
            RecordType::TimerInstall => "TimerInstall",
            RecordType::TimerRemove => "TimerRemove",
            RecordType::TimerFire => "TimerFire",
            RecordType::XhrReadyStateChange => "XHRReadyStateChange",
            RecordType::XhrLoad => "XHRLoad",
            RecordType::EvaluateScript => "EvaluateScript",
            RecordType::FunctionCall => "FunctionCall",
            RecordType::GcEvent => "GCEvent",
            RecordType::MajorGc => "MajorGC",
            RecordType::MinorGc => "MinorGC",
            RecordType::JsFrame => "JSFrame",
            RecordType::RequestAnimationFrame => "RequestAnimationFrame",
            RecordType::FireAnimationFrame => "FireAnimationFrame",
            RecordType::MarkLoad => "MarkLoad",
            RecordType::MarkDomContent => "MarkDOMContent",
            RecordType::MarkFirstPaint => "MarkFirstPaint",
            RecordType::TimeStamp => "TimeStamp",
            RecordType::ConsoleTime => "ConsoleTime",
            RecordType::Screenshot => "Screenshot",
            RecordType::Other(name) => name,
        }
    }

    /// Human readable title shown in details and matched by search
    pub fn title(&self) -> &str {
        match self {
            RecordType::Program | RecordType::Task => "Task",
            RecordType::EventDispatch => "Event",
            RecordType::GpuTask => "GPU",
            RecordType::Animation => "Animation",
            RecordType::RequestMainThreadFrame => "Request Main Thread Frame",
            RecordType::BeginFrame => "Frame Start",
            RecordType::BeginMainThreadFrame => "Frame Start (main thread)",
            RecordType::DrawFrame => "Draw Frame",
            RecordType::ScheduleStyleRecalculation => "Schedule Style Recalculation",
            RecordType::RecalculateStyles | RecordType::UpdateLayoutTree => "Recalculate Style",
            RecordType::InvalidateLayout => "Invalidate Layout",
            RecordType::Layout => "Layout",
            RecordType::UpdateLayerTree => "Update Layer Tree",
            RecordType::PaintSetup => "Paint Setup",
            RecordType::Paint => "Paint",
            RecordType::PaintImage => "Paint Image",
            RecordType::RasterTask => "Rasterize Paint",
            RecordType::CompositeLayers => "Composite Layers",
            RecordType::DecodeImage => "Image Decode",
            RecordType::ResizeImage => "Image Resize",
            RecordType::ParseHtml => "Parse HTML",
            RecordType::ParseAuthorStyleSheet => "Parse Stylesheet",
            RecordType::ResourceSendRequest => "Send Request",
            RecordType::ResourceReceiveResponse => "Receive Response",
            RecordType::ResourceReceivedData => "Receive Data",
            RecordType::ResourceFinish => "Finish Loading",
            RecordType::TimerInstall => "Install Timer",
            RecordType::TimerRemove => "Remove Timer",
            RecordType::TimerFire => "Timer Fired",
            RecordType::XhrReadyStateChange => "XHR Ready State Change",
            RecordType::XhrLoad => "XHR Load",
            RecordType::EvaluateScript => "Evaluate Script",
            RecordType::FunctionCall => "Function Call",
            RecordType::GcEvent => "GC Event",
            RecordType::MajorGc => "Major GC",
            RecordType::MinorGc => "Minor GC",
            RecordType::JsFrame => "JS Frame",
            RecordType::RequestAnimationFrame => "Request Animation Frame",
            RecordType::FireAnimationFrame => "Animation Frame Fired",
            RecordType::MarkLoad => "Load event",
            RecordType::MarkDomContent => "DOMContentLoaded event",
            RecordType::MarkFirstPaint => "First paint",
            RecordType::TimeStamp => "Timestamp",
            RecordType::ConsoleTime => "Console Time",
            RecordType::Screenshot => "Screenshot",
            RecordType::Other(name) => name,
        }
    }

    /// Category this type's time is attributed to
    pub fn category(&self) -> Category {
        match self {
            RecordType::ParseHtml
            | RecordType::ParseAuthorStyleSheet
            | RecordType::ResourceSendRequest
            | RecordType::ResourceReceiveResponse
            | RecordType::ResourceReceivedData
            | RecordType::ResourceFinish => Category::Loading,

            RecordType::EventDispatch
            | RecordType::TimerInstall
            | RecordType::TimerRemove
            | RecordType::TimerFire
            | RecordType::XhrReadyStateChange
            | RecordType::XhrLoad
            | RecordType::EvaluateScript
            | RecordType::FunctionCall
            | RecordType::GcEvent
            | RecordType::MajorGc
            | RecordType::MinorGc
            | RecordType::JsFrame
            | RecordType::RequestAnimationFrame
            | RecordType::FireAnimationFrame
            | RecordType::MarkLoad
            | RecordType::MarkDomContent
            | RecordType::TimeStamp
            | RecordType::ConsoleTime => Category::Scripting,

            RecordType::Animation
            | RecordType::RequestMainThreadFrame
            | RecordType::BeginFrame
            | RecordType::BeginMainThreadFrame
            | RecordType::DrawFrame
            | RecordType::ScheduleStyleRecalculation
            | RecordType::RecalculateStyles
            | RecordType::UpdateLayoutTree
            | RecordType::InvalidateLayout
            | RecordType::Layout
            | RecordType::UpdateLayerTree => Category::Rendering,

            RecordType::PaintSetup
            | RecordType::Paint
            | RecordType::PaintImage
            | RecordType::RasterTask
            | RecordType::CompositeLayers
            | RecordType::DecodeImage
            | RecordType::ResizeImage
            | RecordType::MarkFirstPaint
            | RecordType::Screenshot => Category::Painting,

            RecordType::GpuTask => Category::Gpu,

            RecordType::Program | RecordType::Task | RecordType::Other(_) => Category::Other,
        }
    }

    /// Parse a trace event name
    pub fn from_name(name: &str) -> RecordType {
        match name {
            "Program" => RecordType::Program,
            "Task" => RecordType::Task,
            "EventDispatch" => RecordType::EventDispatch,
            "GPUTask" => RecordType::GpuTask,
            "Animation" => RecordType::Animation,
            "RequestMainThreadFrame" => RecordType::RequestMainThreadFrame,
            "BeginFrame" => RecordType::BeginFrame,
            "BeginMainThreadFrame" => RecordType::BeginMainThreadFrame,
            "DrawFrame" => RecordType::DrawFrame,
            "ScheduleStyleRecalculation" => RecordType::ScheduleStyleRecalculation,
            "RecalculateStyles" => RecordType::RecalculateStyles,
            "UpdateLayoutTree" => RecordType::UpdateLayoutTree,
            "InvalidateLayout" => RecordType::InvalidateLayout,
            "Layout" => RecordType::Layout,
            "UpdateLayerTree" => RecordType::UpdateLayerTree,
            "PaintSetup" => RecordType::PaintSetup,
            "Paint" => RecordType::Paint,
            "PaintImage" => RecordType::PaintImage,
            "RasterTask" => RecordType::RasterTask,
            "CompositeLayers" => RecordType::CompositeLayers,
            "Decode Image" => RecordType::DecodeImage,
            "Resize Image" => RecordType::ResizeImage,
            "ParseHTML" => RecordType::ParseHtml,
            "ParseAuthorStyleSheet" => RecordType::ParseAuthorStyleSheet,
            "ResourceSendRequest" => RecordType::ResourceSendRequest,
            "ResourceReceiveResponse" => RecordType::ResourceReceiveResponse,
            "ResourceReceivedData" => RecordType::ResourceReceivedData,
            "ResourceFinish" => RecordType::ResourceFinish,
            "TimerInstall" => RecordType::TimerInstall,
            "TimerRemove" => RecordType::TimerRemove,
            "TimerFire" => RecordType::TimerFire,
            "XHRReadyStateChange" => RecordType::XhrReadyStateChange,
            "XHRLoad" => RecordType::XhrLoad,
            "EvaluateScript" => RecordType::EvaluateScript,
            "FunctionCall" => RecordType::FunctionCall,
            "GCEvent" => RecordType::GcEvent,
            "MajorGC" => RecordType::MajorGc,
            "MinorGC" => RecordType::MinorGc,
            "JSFrame" => RecordType::JsFrame,
            "RequestAnimationFrame" => RecordType::RequestAnimationFrame,
            "FireAnimationFrame" => RecordType::FireAnimationFrame,
            "MarkLoad" => RecordType::MarkLoad,
            "MarkDOMContent" => RecordType::MarkDomContent,
            "MarkFirstPaint" => RecordType::MarkFirstPaint,
            "TimeStamp" => RecordType::TimeStamp,
            "ConsoleTime" => RecordType::ConsoleTime,
            "Screenshot" => RecordType::Screenshot,
            other => RecordType::Other(other.to_string()),
        }
    }

    /// Whether records of this type are shown as dividers in the overview
    pub fn is_event_divider(&self) -> bool {
        matches!(
            self,
            RecordType::MarkLoad
                | RecordType::MarkDomContent
                | RecordType::MarkFirstPaint
                | RecordType::TimeStamp
                | RecordType::ConsoleTime
        )
    }
}

impl From<String> for RecordType {
    fn from(name: String) -> Self {
        RecordType::from_name(&name)
    }
}

impl From<RecordType> for String {
    fn from(record_type: RecordType) -> Self {
        record_type.name().to_string()
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Data needed to append a record to the model
#[derive(Debug, Clone)]
pub struct RecordData {
    pub record_type: RecordType,
    pub start_time: Millis,
    /// `None` while the activity has not finished
    pub end_time: Option<Millis>,
    pub args: Map<String, Value>,
    /// Trace event this record was built from, if any
    pub event: Option<EventId>,
}

impl RecordData {
    /// Create record data without arguments
    pub fn new(record_type: RecordType, start_time: Millis, end_time: Option<Millis>) -> Self {
        Self {
            record_type,
            start_time,
            end_time,
            args: Map::new(),
            event: None,
        }
    }

    /// Add a single argument
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Replace all arguments
    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    /// Link the record to its source trace event
    pub fn with_event(mut self, event: EventId) -> Self {
        self.event = Some(event);
        self
    }
}

/// A timed, tree-structured unit of recorded activity
///
/// Records live in the model's arena. `children` are owned by the parent in
/// the sense that they are only reachable through it and are dropped with
/// the model generation.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub record_type: RecordType,
    pub start_time: Millis,
    pub end_time: Option<Millis>,
    pub args: Map<String, Value>,
    pub parent: Option<RecordId>,
    pub children: Vec<RecordId>,
    #[serde(skip)]
    pub event: Option<EventId>,
}

impl Record {
    /// Category derived from the record type
    pub fn category(&self) -> Category {
        self.record_type.category()
    }

    /// Display title
    pub fn title(&self) -> &str {
        self.record_type.title()
    }

    /// Duration, or `None` if the record has not finished
    pub fn duration(&self) -> Option<Millis> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Whether the record has an end time
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Whether a finished record overlaps the closed window `[start, end]`
    ///
    /// Unfinished records never overlap anything.
    pub fn overlaps(&self, start: Millis, end: Millis) -> bool {
        match self.end_time {
            Some(record_end) => record_end >= start && self.start_time <= end,
            None => false,
        }
    }

    /// Portion of the record inside `[start, end]`
    pub fn clipped_duration(&self, start: Millis, end: Millis) -> Millis {
        match self.end_time {
            Some(record_end) => record_end.min(end) - self.start_time.max(start),
            None => 0.0,
        }
    }

    /// Text that search and the text filter match against
    ///
    /// Tokens are the title, the raw type name when it differs, and every
    /// scalar argument value (one level into nested objects), joined by `|`.
    pub fn content_string(&self) -> String {
        let mut tokens = vec![self.title().to_string()];
        if self.record_type.name() != self.title() {
            tokens.push(self.record_type.name().to_string());
        }
        for value in self.args.values() {
            match value {
                Value::Object(fields) => tokens.extend(fields.values().filter_map(scalar_token)),
                other => tokens.extend(scalar_token(other)),
            }
        }
        tokens.join("|")
    }
}

fn scalar_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A rendering frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineFrame {
    pub start_time: Millis,
    pub end_time: Millis,
    /// No frame was drawn within this interval
    pub idle: bool,
    /// A layer tree snapshot was captured for this frame
    pub has_layer_tree: bool,
    /// Number of paint events inside the frame
    pub paint_count: usize,
}

impl TimelineFrame {
    /// Frame duration
    pub fn duration(&self) -> Millis {
        self.end_time - self.start_time
    }

    /// Time at which the screen state for this frame is sampled
    ///
    /// Idle frames are sampled at their start, others at their end.
    pub fn screenshot_time(&self) -> Millis {
        if self.idle {
            self.start_time
        } else {
            self.end_time
        }
    }
}

/// A film-strip screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub timestamp: Millis,
    /// Base64 encoded image as found in the trace
    pub image_data: String,
}

/// A network request reconstructed from resource events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub request_id: String,
    pub url: String,
    pub method: Option<String>,
    pub mime_type: Option<String>,
    pub start_time: Millis,
    pub end_time: Option<Millis>,
}

impl NetworkRequest {
    /// Duration if the request finished
    pub fn duration(&self) -> Option<Millis> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// Format a millisecond value for display
pub fn format_millis(ms: Millis) -> String {
    if ms == 0.0 {
        return "0".to_string();
    }
    if !ms.is_finite() {
        return "-".to_string();
    }

    let abs = ms.abs();
    if abs < 1.0 {
        format!("{:.0} \u{3bc}s", ms * 1000.0)
    } else if abs < 1000.0 {
        format!("{:.1} ms", ms)
    } else if abs < 60_000.0 {
        format!("{:.2} s", ms / 1000.0)
    } else {
        format!("{:.1} min", ms / 60_000.0)
    }
}
