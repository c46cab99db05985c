//! Record filters.
//!
//! The model keeps an ordered list of [`TimelineFilter`]s; a record is
//! visible iff every filter accepts it. Each kind is a tagged variant with
//! its own small state struct, so the model can reach in and reconfigure a
//! specific kind without downcasting.

use regex::Regex;
use std::collections::BTreeSet;

use crate::types::{Category, Record, RecordType};

/// Discriminant used to look a filter up in the model's list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Category,
    Duration,
    Text,
    Static,
}

/// Hides records whose category is unchecked.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    hidden: BTreeSet<Category>,
}

impl CategoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show or hide a category. Returns true if the state changed.
    pub fn set_hidden(&mut self, category: Category, hidden: bool) -> bool {
        if hidden {
            self.hidden.insert(category)
        } else {
            self.hidden.remove(&category)
        }
    }

    pub fn is_hidden(&self, category: Category) -> bool {
        self.hidden.contains(&category)
    }

    fn accept(&self, record: &Record) -> bool {
        !self.hidden.contains(&record.category())
    }
}

/// Hides records shorter than a minimum duration ("is long" filter).
#[derive(Debug, Clone, Default)]
pub struct DurationFilter {
    minimum_record_duration: f64,
}

impl DurationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold in milliseconds. Zero disables the filter.
    pub fn set_minimum_record_duration(&mut self, value: f64) {
        self.minimum_record_duration = value.max(0.0);
    }

    pub fn minimum_record_duration(&self) -> f64 {
        self.minimum_record_duration
    }

    fn accept(&self, record: &Record) -> bool {
        if self.minimum_record_duration == 0.0 {
            return true;
        }
        record
            .duration()
            .is_some_and(|duration| duration >= self.minimum_record_duration)
    }
}

/// Keeps only records whose content matches a regex.
#[derive(Debug, Clone, Default)]
pub struct TextFilter {
    regex: Option<Regex>,
}

impl TextFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    pub fn set_regex(&mut self, regex: Option<Regex>) {
        self.regex = regex;
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    fn accept(&self, record: &Record) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(&record.content_string()),
            None => true,
        }
    }
}

/// A record filter
#[derive(Debug, Clone)]
pub enum TimelineFilter {
    Category(CategoryFilter),
    Duration(DurationFilter),
    Text(TextFilter),
    /// Structural rules that never change at runtime
    Static,
}

impl TimelineFilter {
    pub fn kind(&self) -> FilterKind {
        match self {
            TimelineFilter::Category(_) => FilterKind::Category,
            TimelineFilter::Duration(_) => FilterKind::Duration,
            TimelineFilter::Text(_) => FilterKind::Text,
            TimelineFilter::Static => FilterKind::Static,
        }
    }

    /// Whether the record passes this filter
    pub fn accept(&self, record: &Record) -> bool {
        match self {
            TimelineFilter::Category(filter) => filter.accept(record),
            TimelineFilter::Duration(filter) => filter.accept(record),
            TimelineFilter::Text(filter) => filter.accept(record),
            TimelineFilter::Static => accept_static(record),
        }
    }
}

// Empty event dispatches are noise; JS sample frames are only shown in the
// flame chart.
fn accept_static(record: &Record) -> bool {
    match record.record_type {
        RecordType::EventDispatch => !record.children.is_empty(),
        RecordType::JsFrame => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::id::RecordId;
    use serde_json::Map;

    fn record(record_type: RecordType, start: f64, end: Option<f64>) -> Record {
        Record {
            id: RecordId(0),
            record_type,
            start_time: start,
            end_time: end,
            args: Map::new(),
            parent: None,
            children: Vec::new(),
            event: None,
        }
    }

    #[test]
    fn test_category_filter() {
        let mut filter = CategoryFilter::new();
        let layout = record(RecordType::Layout, 0.0, Some(1.0));
        assert!(filter.accept(&layout));

        assert!(filter.set_hidden(Category::Rendering, true));
        assert!(!filter.set_hidden(Category::Rendering, true));
        assert!(!filter.accept(&layout));

        filter.set_hidden(Category::Rendering, false);
        assert!(filter.accept(&layout));
    }

    #[test]
    fn test_duration_filter() {
        let mut filter = DurationFilter::new();
        let short = record(RecordType::Layout, 0.0, Some(0.5));
        let unfinished = record(RecordType::Layout, 0.0, None);
        assert!(filter.accept(&short));
        assert!(filter.accept(&unfinished));

        filter.set_minimum_record_duration(1.0);
        assert!(!filter.accept(&short));
        assert!(!filter.accept(&unfinished));
        assert!(filter.accept(&record(RecordType::Layout, 0.0, Some(1.0))));
    }

    #[test]
    fn test_text_filter() {
        let mut filter = TextFilter::new();
        assert!(filter.is_empty());
        let call = record(RecordType::FunctionCall, 0.0, Some(1.0));
        assert!(filter.accept(&call));

        filter.set_regex(Some(Regex::new("(?i)function").unwrap()));
        assert!(!filter.is_empty());
        assert!(filter.accept(&call));
        assert!(!filter.accept(&record(RecordType::Layout, 0.0, Some(1.0))));
    }

    #[test]
    fn test_static_filter() {
        let filter = TimelineFilter::Static;
        let mut dispatch = record(RecordType::EventDispatch, 0.0, Some(1.0));
        assert!(!filter.accept(&dispatch));
        dispatch.children.push(RecordId(1));
        assert!(filter.accept(&dispatch));
        assert!(!filter.accept(&record(RecordType::JsFrame, 0.0, Some(1.0))));
        assert!(filter.accept(&record(RecordType::Paint, 0.0, Some(1.0))));
    }

    #[test]
    fn test_filter_kind() {
        assert_eq!(
            TimelineFilter::Duration(DurationFilter::new()).kind(),
            FilterKind::Duration
        );
        assert_eq!(TimelineFilter::Static.kind(), FilterKind::Static);
    }
}
