//! Record search
//!
//! Queries are matched literally and case-insensitively against each
//! record's content string. Results are collected in model traversal order
//! (pre-order over filtered records) and navigated with wrap-around.

use regex::{Regex, RegexBuilder};
use std::ops::ControlFlow;

use crate::error::{Result, TimelineError};
use crate::model::{RecordId, TimelineModel};
use crate::types::Millis;

/// Build a case-insensitive regex that matches `query` literally
pub fn plain_text_search_regex(query: &str) -> Result<Regex> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .map_err(|e| TimelineError::from_regex_error(query, e))
}

/// Search state: active regex, results and the current result
#[derive(Debug, Default)]
pub struct SearchEngine {
    regex: Option<Regex>,
    /// `None` until the next scan
    results: Option<Vec<RecordId>>,
    current: Option<RecordId>,
    generation: u64,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the query and drop stale results
    ///
    /// The current result is kept so a re-scan can retain it.
    pub fn set_query(&mut self, query: &str) -> Result<()> {
        self.regex = Some(plain_text_search_regex(query)?);
        self.results = None;
        Ok(())
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.regex.is_some()
    }

    /// Whether results must be recomputed before use
    pub fn needs_update(&self) -> bool {
        self.regex.is_some() && self.results.is_none()
    }

    /// Force a re-scan on the next update
    pub fn invalidate(&mut self) {
        self.results = None;
    }

    /// Drop regex, results and the current result
    pub fn cancel(&mut self) {
        self.regex = None;
        self.results = None;
        self.current = None;
    }

    /// Scan the model for matches inside `[window_start, window_end]`
    ///
    /// A current result that is still among the matches stays current.
    /// Otherwise, when `should_jump` is set, the first match (the last with
    /// `jump_backwards`) becomes current.
    pub fn update_results(
        &mut self,
        model: &TimelineModel,
        window_start: Millis,
        window_end: Millis,
        should_jump: bool,
        jump_backwards: bool,
    ) -> Option<RecordId> {
        let regex = self.regex.clone()?;

        if self.generation != model.generation() {
            self.current = None;
            self.generation = model.generation();
        }

        let mut matches = Vec::new();
        model.for_all_filtered_records(|record, _| {
            let ends_before = record.end_time.is_some_and(|end| end < window_start);
            if ends_before || record.start_time > window_end {
                return ControlFlow::Continue(());
            }
            if regex.is_match(&record.content_string()) {
                matches.push(record.id);
            }
            ControlFlow::Continue(())
        });
        tracing::debug!("Search for '{}' found {} matches", regex.as_str(), matches.len());

        if matches.is_empty() {
            self.current = None;
        } else {
            let retained = self.current.filter(|id| matches.contains(id));
            self.current = match retained {
                Some(id) => Some(id),
                None if should_jump && jump_backwards => matches.last().copied(),
                None if should_jump => matches.first().copied(),
                None => None,
            };
        }
        self.results = Some(matches);
        self.current
    }

    /// Move to the next match, wrapping to the first
    pub fn jump_to_next(&mut self) -> Option<RecordId> {
        let count = self.match_count();
        if count == 0 {
            return None;
        }
        let index = self.current_index().map_or(-1, |i| i as isize);
        self.select_index(index + 1)
    }

    /// Move to the previous match, wrapping to the last
    pub fn jump_to_previous(&mut self) -> Option<RecordId> {
        let count = self.match_count();
        if count == 0 {
            return None;
        }
        let index = self.current_index().map_or(0, |i| i as isize);
        self.select_index(index - 1)
    }

    fn select_index(&mut self, index: isize) -> Option<RecordId> {
        let results = self.results.as_deref()?;
        let wrapped = index.rem_euclid(results.len() as isize) as usize;
        self.current = results.get(wrapped).copied();
        self.current
    }

    pub fn match_count(&self) -> usize {
        self.results.as_ref().map_or(0, Vec::len)
    }

    /// Position of the current result among the matches
    pub fn current_index(&self) -> Option<usize> {
        let current = self.current?;
        self.results.as_ref()?.iter().position(|&id| id == current)
    }

    pub fn current(&self) -> Option<RecordId> {
        self.current
    }

    pub fn results(&self) -> &[RecordId] {
        self.results.as_deref().unwrap_or_default()
    }
}
