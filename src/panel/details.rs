//! Details surface
//!
//! [`DetailsView`] is the seam between the panel and whatever renders the
//! selection details. [`TimelineDetailsView`] is the in-memory
//! implementation used by the CLI and by tests; it keeps exactly what a
//! rendered pane would show.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::analysis::AggregatedStats;
use crate::types::{format_millis, Category, Millis, Screenshot};

use super::selection::TimelineSelection;

/// Tabs of the details pane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetailsTab {
    Details,
    BottomUpTree,
    PaintProfiler,
    LayerViewer,
}

impl DetailsTab {
    /// Get display name
    pub fn title(&self) -> &'static str {
        match self {
            DetailsTab::Details => "Summary",
            DetailsTab::BottomUpTree => "Aggregated Details",
            DetailsTab::PaintProfiler => "Paint Profiler",
            DetailsTab::LayerViewer => "Layers",
        }
    }

    /// Static tabs survive content replacement
    pub fn is_static(&self) -> bool {
        matches!(self, DetailsTab::Details | DetailsTab::BottomUpTree)
    }
}

/// Details of a record or raw trace event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDetails {
    pub title: String,
    pub category: Category,
    /// Start relative to the first record
    pub start_offset: Millis,
    pub total_time: Option<Millis>,
    /// Total time minus time spent in children
    pub self_time: Option<Millis>,
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDetails {
    pub start_offset: Millis,
    pub duration: Millis,
    pub idle: bool,
    pub paint_count: usize,
    /// Film-strip capture closest to the frame
    pub screenshot: Option<Screenshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkRequestDetails {
    pub url: String,
    pub method: Option<String>,
    pub mime_type: Option<String>,
    pub start_offset: Millis,
    pub duration: Option<Millis>,
}

/// Content of the Details tab
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetailsContent {
    Empty,
    /// Aggregated time over a range
    RangeSummary {
        start_offset: Millis,
        end_offset: Millis,
        stats: AggregatedStats,
    },
    Event(EventDetails),
    Frame(FrameDetails),
    NetworkRequest(NetworkRequestDetails),
    Text { text: String },
}

impl fmt::Display for DetailsContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailsContent::Empty => write!(f, "(nothing selected)"),
            DetailsContent::RangeSummary {
                start_offset,
                end_offset,
                stats,
            } => {
                writeln!(
                    f,
                    "Range: {} \u{2013} {}",
                    format_millis(*start_offset),
                    format_millis(*end_offset)
                )?;
                writeln!(f, "Aggregated Time:")?;
                for (category, time) in stats.iter() {
                    writeln!(f, "  {:<12} {:>12}", category.title(), format_millis(time))?;
                }
                Ok(())
            }
            DetailsContent::Event(details) => {
                writeln!(f, "{} ({})", details.title, details.category.title())?;
                writeln!(f, "  Start:      {}", format_millis(details.start_offset))?;
                if let Some(total) = details.total_time {
                    writeln!(f, "  Total time: {}", format_millis(total))?;
                }
                if let Some(own) = details.self_time {
                    writeln!(f, "  Self time:  {}", format_millis(own))?;
                }
                for (name, value) in &details.args {
                    writeln!(f, "  {}: {}", name, value)?;
                }
                Ok(())
            }
            DetailsContent::Frame(details) => {
                writeln!(
                    f,
                    "Frame at {} ({}{})",
                    format_millis(details.start_offset),
                    format_millis(details.duration),
                    if details.idle { ", idle" } else { "" }
                )?;
                writeln!(f, "  Paints:     {}", details.paint_count)?;
                match &details.screenshot {
                    Some(shot) => writeln!(f, "  Screenshot: {} bytes", shot.image_data.len()),
                    None => writeln!(f, "  Screenshot: none"),
                }
            }
            DetailsContent::NetworkRequest(details) => {
                writeln!(f, "{}", details.url)?;
                if let Some(method) = &details.method {
                    writeln!(f, "  Method:    {}", method)?;
                }
                if let Some(mime) = &details.mime_type {
                    writeln!(f, "  MIME type: {}", mime)?;
                }
                writeln!(f, "  Start:     {}", format_millis(details.start_offset))?;
                match details.duration {
                    Some(duration) => writeln!(f, "  Duration:  {}", format_millis(duration)),
                    None => writeln!(f, "  Duration:  (pending)"),
                }
            }
            DetailsContent::Text { text } => write!(f, "{}", text),
        }
    }
}

/// Surface that displays selection details
#[cfg_attr(test, mockall::automock)]
pub trait DetailsView {
    /// Replace the Details content and close every non-static tab
    fn set_content(&mut self, content: DetailsContent);

    /// Tell tab views which selection is current
    fn update_contents(&mut self, selection: &TimelineSelection);

    /// Add a tab; it becomes selected unless the preferred tab is showing
    fn append_tab(&mut self, tab: DetailsTab);

    fn has_tab(&self, tab: DetailsTab) -> bool;

    /// Tab to keep showing across selections
    fn set_preferred_tab(&mut self, tab: DetailsTab);
}

/// In-memory details pane
#[derive(Debug, Clone)]
pub struct TimelineDetailsView {
    tabs: Vec<DetailsTab>,
    selected_tab: DetailsTab,
    preferred_tab: DetailsTab,
    content: DetailsContent,
    selection: Option<TimelineSelection>,
}

impl Default for TimelineDetailsView {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineDetailsView {
    pub fn new() -> Self {
        Self {
            tabs: vec![DetailsTab::Details, DetailsTab::BottomUpTree],
            selected_tab: DetailsTab::Details,
            preferred_tab: DetailsTab::Details,
            content: DetailsContent::Empty,
            selection: None,
        }
    }

    pub fn content(&self) -> &DetailsContent {
        &self.content
    }

    pub fn tabs(&self) -> &[DetailsTab] {
        &self.tabs
    }

    pub fn selected_tab(&self) -> DetailsTab {
        self.selected_tab
    }

    pub fn preferred_tab(&self) -> DetailsTab {
        self.preferred_tab
    }

    /// Selection last passed to [`DetailsView::update_contents`]
    pub fn selection(&self) -> Option<&TimelineSelection> {
        self.selection.as_ref()
    }

    /// Select a tab as the user would, making it the preferred tab
    pub fn select_tab(&mut self, tab: DetailsTab) -> bool {
        if !self.tabs.contains(&tab) {
            return false;
        }
        self.selected_tab = tab;
        self.preferred_tab = tab;
        true
    }
}

impl DetailsView for TimelineDetailsView {
    fn set_content(&mut self, content: DetailsContent) {
        self.tabs.retain(DetailsTab::is_static);
        if !self.tabs.contains(&self.selected_tab) {
            self.selected_tab = DetailsTab::Details;
        }
        self.content = content;
    }

    fn update_contents(&mut self, selection: &TimelineSelection) {
        self.selection = Some(selection.clone());
    }

    fn append_tab(&mut self, tab: DetailsTab) {
        if !self.tabs.contains(&tab) {
            self.tabs.push(tab);
        }
        if self.preferred_tab != self.selected_tab {
            self.selected_tab = tab;
        }
    }

    fn has_tab(&self, tab: DetailsTab) -> bool {
        self.tabs.contains(&tab)
    }

    fn set_preferred_tab(&mut self, tab: DetailsTab) {
        self.preferred_tab = tab;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_content_closes_dynamic_tabs() {
        let mut view = TimelineDetailsView::new();
        view.append_tab(DetailsTab::PaintProfiler);
        view.append_tab(DetailsTab::LayerViewer);
        assert_eq!(view.tabs().len(), 4);

        view.set_content(DetailsContent::Text { text: "hello".to_string() });
        assert_eq!(view.tabs(), &[DetailsTab::Details, DetailsTab::BottomUpTree]);
        assert_eq!(view.content(), &DetailsContent::Text { text: "hello".to_string() });
    }

    #[test]
    fn test_append_tab_respects_preferred_tab() {
        let mut view = TimelineDetailsView::new();
        view.append_tab(DetailsTab::PaintProfiler);
        assert_eq!(view.selected_tab(), DetailsTab::Details);

        view.set_preferred_tab(DetailsTab::PaintProfiler);
        view.append_tab(DetailsTab::LayerViewer);
        assert_eq!(view.selected_tab(), DetailsTab::LayerViewer);
    }

    #[test]
    fn test_selected_dynamic_tab_falls_back_on_set_content() {
        let mut view = TimelineDetailsView::new();
        view.append_tab(DetailsTab::PaintProfiler);
        assert!(view.select_tab(DetailsTab::PaintProfiler));
        view.set_content(DetailsContent::Empty);
        assert_eq!(view.selected_tab(), DetailsTab::Details);
        assert_eq!(view.preferred_tab(), DetailsTab::PaintProfiler);
    }

    #[test]
    fn test_range_summary_display() {
        let mut stats = AggregatedStats::new();
        stats.add(Category::Scripting, 30.0);
        stats.add(Category::Idle, 70.0);
        let content = DetailsContent::RangeSummary {
            start_offset: 0.0,
            end_offset: 100.0,
            stats,
        };
        let text = content.to_string();
        assert!(text.starts_with("Range: 0 \u{2013} 100.0 ms"));
        assert!(text.contains("Scripting"));
        assert!(text.contains("70.0 ms"));
    }
}
