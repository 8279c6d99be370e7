use hostgate_lib::queue::QueueStatsMap;
use std::fmt::{self, Display, Write};

use super::color::{DIM, color};

/// Per-queue statistics as a table, busiest queue first
struct CompactQueueStats<'a> {
    stats: &'a QueueStatsMap,
    color: bool,
}

impl Display for CompactQueueStats<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Queue statistics")?;

        let separator = "─".repeat(60);
        if self.color {
            color!(f, DIM, "{}", separator)?;
            writeln!(f)?;
        } else {
            writeln!(f, "{separator}")?;
        }

        let sorted = self.stats.sorted();
        let key_width = sorted
            .iter()
            .map(|(key, _)| key.len())
            .max()
            .unwrap_or(0)
            .max(8);

        let mut rows = String::new();
        for (key, stats) in &sorted {
            writeln!(
                rows,
                "{key:<key_width$} │ {:>18} │ {:>6} admitted",
                stats.policy.to_string(),
                stats.admitted,
            )?;
        }
        write!(f, "{}", rows.trim_end())
    }
}

/// Render queue statistics for the compact output
pub(crate) fn compact(stats: &QueueStatsMap, color: bool) -> String {
    CompactQueueStats { stats, color }.to_string()
}
