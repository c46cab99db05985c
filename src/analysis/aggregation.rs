//! Category time aggregation
//!
//! Attributes the time of a record tree to categories within a closed
//! window `[start, end]`. A record's own category receives only the part of
//! its clipped duration that is not already covered by its children, so
//! summing the result never double counts nested work.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::model::{RecordId, TimelineModel};
use crate::types::{Category, Millis};

/// Category to attributed time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregatedStats(BTreeMap<Category, Millis>);

impl AggregatedStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add time to a category
    pub fn add(&mut self, category: Category, time: Millis) {
        *self.0.entry(category).or_insert(0.0) += time;
    }

    /// Add every bucket of `other`
    pub fn merge(&mut self, other: &AggregatedStats) {
        for (&category, &time) in &other.0 {
            self.add(category, time);
        }
    }

    /// Time attributed to a category, 0 when absent
    pub fn get(&self, category: Category) -> Millis {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    /// Sum of all buckets
    pub fn total(&self) -> Millis {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, Millis)> + '_ {
        self.0.iter().map(|(&category, &time)| (category, time))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Aggregate one record subtree into `stats`
///
/// Records without an end time are skipped together with their
/// descendants, as are records entirely outside the window.
pub fn collect_aggregated_stats_for_record(
    model: &TimelineModel,
    id: RecordId,
    start: Millis,
    end: Millis,
    stats: &mut AggregatedStats,
) {
    let Some(record) = model.record(id) else {
        return;
    };
    if !record.overlaps(start, end) {
        return;
    }

    let mut children_time = 0.0;
    for child in model.children(id) {
        if !child.overlaps(start, end) {
            continue;
        }
        children_time += child.clipped_duration(start, end);
        collect_aggregated_stats_for_record(model, child.id, start, end, stats);
    }
    stats.add(record.category(), record.clipped_duration(start, end) - children_time);
}

/// Range statistics over main-thread tasks with a per-task cache
///
/// Tasks lying strictly inside a queried window have their full stats
/// memoized by record id. The cache is dropped whenever the model's
/// generation changes.
#[derive(Debug, Default)]
pub struct RangeAggregator {
    cache: HashMap<RecordId, AggregatedStats>,
    generation: Option<u64>,
}

impl RangeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate the window `[start, end]`, including an idle bucket
    ///
    /// Returns `None` for a negative window start.
    pub fn aggregate_range(
        &mut self,
        model: &TimelineModel,
        start: Millis,
        end: Millis,
    ) -> Option<AggregatedStats> {
        if start < 0.0 {
            return None;
        }
        if self.generation != Some(model.generation()) {
            self.cache.clear();
            self.generation = Some(model.generation());
        }

        let tasks = model.main_thread_tasks();
        let ends_after_start = |id: &RecordId| {
            model
                .record(*id)
                .is_some_and(|r| r.end_time.map_or(true, |task_end| start < task_end))
        };
        // Tasks are sorted by start, and nested tasks cannot exist at the top
        // level, so their end times are sorted too. An unfinished task ends
        // after everything.
        let first = tasks.partition_point(|id| !ends_after_start(id));

        let mut stats = AggregatedStats::new();
        for &id in &tasks[first..] {
            let Some(task) = model.record(id) else {
                continue;
            };
            if task.start_time > end {
                break;
            }
            let inside = task.start_time > start && task.end_time.is_some_and(|e| e < end);
            if inside {
                let task_stats = self.cache.entry(id).or_insert_with(|| {
                    let mut task_stats = AggregatedStats::new();
                    collect_aggregated_stats_for_record(model, id, start, end, &mut task_stats);
                    task_stats
                });
                stats.merge(task_stats);
                continue;
            }
            collect_aggregated_stats_for_record(model, id, start, end, &mut stats);
        }

        let attributed = stats.total();
        stats.add(Category::Idle, (end - start - attributed).max(0.0));
        tracing::debug!(
            "Aggregated range [{:.3}, {:.3}]: {:.3} ms attributed",
            start,
            end,
            attributed
        );
        Some(stats)
    }

    /// Number of memoized tasks
    pub fn cached_tasks(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.generation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordData, RecordType};

    const EPSILON: f64 = 1e-9;

    /// Root [0, 100] of category other with a scripting child [10, 40]
    fn worked_example() -> (TimelineModel, RecordId) {
        let mut model = TimelineModel::new();
        let root = model.append_record(
            None,
            RecordData::new(RecordType::Program, 0.0, Some(100.0)),
        );
        model.append_record(
            Some(root),
            RecordData::new(RecordType::FunctionCall, 10.0, Some(40.0)),
        );
        (model, root)
    }

    #[test]
    fn test_worked_example_full_window() {
        let (model, root) = worked_example();
        let mut stats = AggregatedStats::new();
        collect_aggregated_stats_for_record(&model, root, 0.0, 100.0, &mut stats);
        assert_eq!(stats.get(Category::Other), 70.0);
        assert_eq!(stats.get(Category::Scripting), 30.0);
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_worked_example_clipped_window() {
        let (model, _) = worked_example();
        let mut aggregator = RangeAggregator::new();
        let stats = aggregator.aggregate_range(&model, 20.0, 50.0).unwrap();
        assert_eq!(stats.get(Category::Other), 10.0);
        assert_eq!(stats.get(Category::Scripting), 20.0);
        assert_eq!(stats.get(Category::Idle), 0.0);
        assert!(stats.contains(Category::Idle));
    }

    #[test]
    fn test_unfinished_records_are_excluded_with_descendants() {
        let mut model = TimelineModel::new();
        let open = model.append_record(None, RecordData::new(RecordType::Program, 0.0, None));
        model.append_record(
            Some(open),
            RecordData::new(RecordType::FunctionCall, 1.0, Some(5.0)),
        );
        let mut stats = AggregatedStats::new();
        collect_aggregated_stats_for_record(&model, open, 0.0, 10.0, &mut stats);
        assert!(stats.is_empty());

        let stats = RangeAggregator::new().aggregate_range(&model, 0.0, 10.0).unwrap();
        assert_eq!(stats.get(Category::Idle), 10.0);
        assert_eq!(stats.get(Category::Scripting), 0.0);
    }

    #[test]
    fn test_negative_start_yields_nothing() {
        let (model, _) = worked_example();
        assert!(RangeAggregator::new().aggregate_range(&model, -1.0, 50.0).is_none());
    }

    #[test]
    fn test_tasks_inside_window_are_cached() {
        let mut model = TimelineModel::new();
        model.append_record(None, RecordData::new(RecordType::Program, 10.0, Some(20.0)));
        model.append_record(None, RecordData::new(RecordType::Program, 30.0, Some(40.0)));
        model.append_record(None, RecordData::new(RecordType::Program, 90.0, Some(120.0)));

        let mut aggregator = RangeAggregator::new();
        let first = aggregator.aggregate_range(&model, 0.0, 100.0).unwrap();
        assert_eq!(aggregator.cached_tasks(), 2);
        assert!((first.get(Category::Other) - 30.0).abs() < EPSILON);
        assert!((first.get(Category::Idle) - 70.0).abs() < EPSILON);

        let second = aggregator.aggregate_range(&model, 0.0, 100.0).unwrap();
        assert_eq!(first, second);

        model.reset();
        let empty = aggregator.aggregate_range(&model, 0.0, 100.0).unwrap();
        assert_eq!(aggregator.cached_tasks(), 0);
        assert_eq!(empty.get(Category::Idle), 100.0);
    }

    #[test]
    fn test_tasks_after_window_are_ignored() {
        let mut model = TimelineModel::new();
        model.append_record(None, RecordData::new(RecordType::Program, 0.0, Some(5.0)));
        model.append_record(None, RecordData::new(RecordType::Layout, 50.0, Some(60.0)));
        let stats = RangeAggregator::new().aggregate_range(&model, 10.0, 40.0).unwrap();
        assert_eq!(stats.get(Category::Rendering), 0.0);
        assert_eq!(stats.get(Category::Other), 0.0);
        assert_eq!(stats.get(Category::Idle), 30.0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_stats_with_idle_cover_window(
            gaps in prop::collection::vec((0.0f64..10.0, 0.1f64..10.0), 1..30),
            window in (0.0f64..50.0, 1.0f64..200.0),
        ) {
            let mut model = TimelineModel::new();
            let mut cursor = 0.0;
            for (gap, len) in gaps {
                let start = cursor + gap;
                let task = model.append_record(
                    None,
                    RecordData::new(RecordType::Program, start, Some(start + len)),
                );
                model.append_record(
                    Some(task),
                    RecordData::new(RecordType::Layout, start, Some(start + len / 2.0)),
                );
                cursor = start + len;
            }

            let (start, length) = window;
            let end = start + length;
            let stats = RangeAggregator::new().aggregate_range(&model, start, end).unwrap();

            // Property: non-overlapping tasks plus idle account for the whole window
            prop_assert!((stats.total() - length).abs() < 1e-6);
            for (_, time) in stats.iter() {
                prop_assert!(time >= -1e-9);
            }
        }
    }
}
