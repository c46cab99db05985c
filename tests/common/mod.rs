//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::io::Cursor;

use timeline_inspector::{InspectorConfig, ProgressIndicator, TimelinePanel};

use builders::TraceBuilder;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// A small page load: two main-thread tasks, three frames and one request
///
/// Times in ms on the main thread:
/// - Program [1, 101] with FunctionCall "handleClick" [11, 41], Layout
///   [50, 60], Paint [70, 75] and a MarkLoad instant at 90
/// - Program [120, 140] with FunctionCall "tick" [125, 130]
///
/// Frames start at 1, 17, 33 and 49; only the second one is idle.
pub fn sample_trace() -> TraceBuilder {
    TraceBuilder::new()
        .thread_name(1, 1, "CrRendererMain")
        .thread_name(1, 2, "Compositor")
        .complete(1, "Program", 1.0, 100.0)
        .complete_with_data(1, "FunctionCall", 11.0, 30.0, "functionName", "handleClick")
        .complete(1, "Layout", 50.0, 10.0)
        .complete(1, "Paint", 70.0, 5.0)
        .instant(1, "MarkLoad", 90.0)
        .complete(1, "Program", 120.0, 20.0)
        .complete_with_data(1, "FunctionCall", 125.0, 5.0, "functionName", "tick")
        .instant(2, "BeginFrame", 1.0)
        .instant(2, "DrawFrame", 10.0)
        .instant(2, "BeginFrame", 17.0)
        .instant(2, "BeginFrame", 33.0)
        .instant(2, "DrawFrame", 40.0)
        .instant(2, "LayerTreeHostImplSnapshot", 41.0)
        .instant(2, "BeginFrame", 49.0)
        .resource(2, "ResourceSendRequest", 2.0, "1", &[("url", "https://example.com/app.js"), ("requestMethod", "GET")])
        .resource(2, "ResourceReceiveResponse", 5.0, "1", &[("mimeType", "text/javascript")])
        .resource(2, "ResourceFinish", 8.0, "1", &[])
}

/// Panel with `trace` loaded
pub fn loaded_panel(trace: &TraceBuilder) -> TimelinePanel {
    let mut panel = TimelinePanel::new(InspectorConfig::default());
    let mut progress = ProgressIndicator::new();
    let loaded = panel
        .load_from_reader(Cursor::new(trace.to_json()), &mut progress)
        .expect("sample trace loads");
    assert!(loaded);
    panel
}
