//! Headless command line front end
//!
//! Each subcommand loads a trace into a [`TimelinePanel`], drives it the way
//! the interactive panel would and renders the result as a table or JSON.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::InspectorConfig;
use crate::error::{Result, TimelineError};
use crate::panel::{DetailsContent, TimelinePanel};
use crate::session::ProgressIndicator;
use crate::types::{format_millis, Category, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "timeline-inspector")]
#[command(about = "Inspect recorded performance timelines", long_about = None)]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Config file path
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "path")]
    pub log_file: Option<PathBuf>,

    /// Show debug logs
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Aggregated time per category over a window
    Stats {
        /// Trace file to load
        trace: PathBuf,
        /// Window start in ms relative to the first record
        #[arg(long)]
        start: Option<Millis>,
        /// Window end in ms relative to the first record
        #[arg(long)]
        end: Option<Millis>,
    },
    /// Records matching a plain-text query
    Search {
        trace: PathBuf,
        query: String,
        /// Hide records shorter than this many ms; must be a configured preset
        #[arg(long, value_name = "ms")]
        min_duration: Option<Millis>,
    },
    /// Rendering frames
    Frames { trace: PathBuf },
}

impl Commands {
    pub fn trace(&self) -> &Path {
        match self {
            Commands::Stats { trace, .. }
            | Commands::Search { trace, .. }
            | Commands::Frames { trace } => trace,
        }
    }
}

/// Load `path` into a fresh panel
pub fn load_panel(path: &Path, config: InspectorConfig) -> Result<TimelinePanel> {
    let mut panel = TimelinePanel::new(config);
    let mut progress = ProgressIndicator::new();
    if !panel.load_from_file(path, &mut progress)? {
        return Err(TimelineError::Io(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            format!("Loading {:?} was cancelled", path),
        )));
    }
    tracing::info!(
        "Loaded {} records and {} frames from {:?}",
        panel.model().record_count(),
        panel.model().frame_count(),
        path
    );
    Ok(panel)
}

/// Execute a subcommand and return its rendered output
pub fn run(command: &Commands, format: OutputFormat, config: InspectorConfig) -> Result<String> {
    let mut panel = load_panel(command.trace(), config)?;
    match command {
        Commands::Stats { start, end, .. } => {
            if start.is_some() || end.is_some() {
                let origin = panel.model().minimum_record_time();
                let start = origin + start.unwrap_or(0.0);
                let end = end.map_or(panel.model().maximum_record_time(), |end| origin + end);
                panel.request_window_times(start, end);
            }
            render_stats(&panel, format)
        }
        Commands::Search {
            query,
            min_duration,
            ..
        } => {
            if let Some(minimum) = min_duration {
                panel.set_minimum_duration_preset(*minimum)?;
            }
            panel.perform_search(query, true, false)?;
            render_search(&panel, format)
        }
        Commands::Frames { .. } => render_frames(&panel, format),
    }
}

// ==================== Rendering ====================

#[derive(Serialize)]
struct StatsOutput<'a> {
    start: Millis,
    end: Millis,
    stats: Vec<CategoryTime<'a>>,
}

#[derive(Serialize)]
struct CategoryTime<'a> {
    category: &'a str,
    time: Millis,
}

/// Render the range summary currently shown in the details pane
pub fn render_stats(panel: &TimelinePanel, format: OutputFormat) -> Result<String> {
    let DetailsContent::RangeSummary {
        start_offset,
        end_offset,
        stats,
    } = panel.details().content()
    else {
        return Ok(match format {
            OutputFormat::Table => "No records in range\n".to_string(),
            OutputFormat::Json => "null\n".to_string(),
        });
    };

    match format {
        OutputFormat::Json => {
            let output = StatsOutput {
                start: *start_offset,
                end: *end_offset,
                stats: stats
                    .iter()
                    .map(|(category, time)| CategoryTime {
                        category: category.name(),
                        time,
                    })
                    .collect(),
            };
            Ok(serde_json::to_string_pretty(&output)? + "\n")
        }
        OutputFormat::Table => {
            let total = stats.total();
            let mut out = String::new();
            let _ = writeln!(
                out,
                "Range {} \u{2013} {}",
                format_millis(*start_offset),
                format_millis(*end_offset)
            );
            let _ = writeln!(out, "{:<12} {:>12} {:>7}", "CATEGORY", "TIME", "SHARE");
            for category in Category::all() {
                if !stats.contains(*category) {
                    continue;
                }
                let time = stats.get(*category);
                let share = if total > 0.0 { time / total * 100.0 } else { 0.0 };
                let _ = writeln!(
                    out,
                    "{:<12} {:>12} {:>6.1}%",
                    category.title(),
                    format_millis(time),
                    share
                );
            }
            let _ = writeln!(out, "{:<12} {:>12}", "Total", format_millis(total));
            Ok(out)
        }
    }
}

#[derive(Serialize)]
struct SearchMatch<'a> {
    index: usize,
    title: &'a str,
    start: Millis,
    duration: Option<Millis>,
    current: bool,
}

/// Render every search match, marking the current one
pub fn render_search(panel: &TimelinePanel, format: OutputFormat) -> Result<String> {
    let origin = panel.model().minimum_record_time();
    let current = panel.highlighted_search_result();
    let matches: Vec<SearchMatch<'_>> = panel
        .search_results()
        .iter()
        .enumerate()
        .filter_map(|(index, id)| {
            panel.model().record(*id).map(|record| SearchMatch {
                index,
                title: record.title(),
                start: record.start_time - origin,
                duration: record.duration(),
                current: current == Some(*id),
            })
        })
        .collect();

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&matches)? + "\n"),
        OutputFormat::Table => {
            let mut out = String::new();
            let _ = writeln!(out, "{} match(es)", matches.len());
            for m in &matches {
                let _ = writeln!(
                    out,
                    "{} {:>4}  {:>12} {:>12}  {}",
                    if m.current { '*' } else { ' ' },
                    m.index + 1,
                    format_millis(m.start),
                    m.duration.map_or_else(|| "-".to_string(), format_millis),
                    m.title
                );
            }
            Ok(out)
        }
    }
}

#[derive(Serialize)]
struct FrameRow {
    index: usize,
    start: Millis,
    duration: Millis,
    idle: bool,
    paint_count: usize,
}

pub fn render_frames(panel: &TimelinePanel, format: OutputFormat) -> Result<String> {
    let origin = panel.model().minimum_record_time();
    let rows: Vec<FrameRow> = panel
        .model()
        .ordered_frames()
        .enumerate()
        .map(|(index, (_, frame))| FrameRow {
            index,
            start: frame.start_time - origin,
            duration: frame.duration(),
            idle: frame.idle,
            paint_count: frame.paint_count,
        })
        .collect();

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&rows)? + "\n"),
        OutputFormat::Table => {
            let mut out = String::new();
            let _ = writeln!(out, "{:>5} {:>12} {:>12} {:>6}", "#", "START", "DURATION", "PAINTS");
            for row in &rows {
                let _ = writeln!(
                    out,
                    "{:>5} {:>12} {:>12} {:>6}{}",
                    row.index,
                    format_millis(row.start),
                    format_millis(row.duration),
                    row.paint_count,
                    if row.idle { "  idle" } else { "" }
                );
            }
            Ok(out)
        }
    }
}
