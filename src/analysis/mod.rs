//! Analysis over the timeline model
//!
//! - [`aggregation`]: category time attribution for a record tree and for
//!   a window over all main-thread tasks
//! - [`search`]: literal, case-insensitive search with wrap-around
//!   navigation

pub mod aggregation;
pub mod search;

pub use aggregation::{collect_aggregated_stats_for_record, AggregatedStats, RangeAggregator};
pub use search::{plain_text_search_regex, SearchEngine};
