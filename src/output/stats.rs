//! Task outcome statistics
//!
//! The orchestrator records the terminal state of every task here; the
//! binary prints the breakdown at higher verbosity.

use crate::state::TaskState;
use std::collections::HashMap;
use std::io::{self, Write};

/// Counts of tasks by terminal state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of tasks that reached a terminal state
    pub total_tasks: u64,

    /// Count of tasks by terminal state
    pub tasks_by_state: HashMap<TaskState, u64>,

    /// Tasks created from discovered references
    pub discovered_tasks: u64,
}

impl CrawlStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished task; non-terminal states are ignored
    pub fn record(&mut self, state: TaskState) {
        if !state.is_terminal() {
            return;
        }
        self.total_tasks += 1;
        *self.tasks_by_state.entry(state).or_insert(0) += 1;
    }

    pub fn count(&self, state: TaskState) -> u64 {
        self.tasks_by_state.get(&state).copied().unwrap_or(0)
    }

    pub fn completed(&self) -> u64 {
        self.tasks_by_state
            .iter()
            .filter(|(state, _)| state.is_success())
            .map(|(_, count)| count)
            .sum()
    }

    /// Failures of every class
    pub fn failed(&self) -> u64 {
        self.tasks_by_state
            .iter()
            .filter(|(state, _)| matches!(state, TaskState::Failed(_)))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn cancelled(&self) -> u64 {
        self.count(TaskState::Cancelled)
    }

    /// Share of tasks that completed, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        (self.completed() as f64 / self.total_tasks as f64) * 100.0
    }
}

/// Writes statistics in a formatted manner
pub fn write_statistics<W: Write + ?Sized>(out: &mut W, stats: &CrawlStatistics) -> io::Result<()> {
    writeln!(out, "=== Crawl Statistics ===")?;
    writeln!(out, "  Tasks finished: {}", stats.total_tasks)?;
    writeln!(out, "  Discovered tasks: {}", stats.discovered_tasks)?;

    // Sort states by count (descending), then by name for stable output
    let mut state_counts: Vec<_> = stats.tasks_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

    for (state, count) in state_counts {
        writeln!(out, "  {}: {}", state, count)?;
    }

    writeln!(
        out,
        "Success Rate: {:.1}% ({} / {} tasks completed)",
        stats.success_rate(),
        stats.completed(),
        stats.total_tasks
    )
}

/// Prints statistics to stderr, keeping stdout for the report
pub fn print_statistics(stats: &CrawlStatistics) -> io::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_statistics(&mut out, stats)
}
