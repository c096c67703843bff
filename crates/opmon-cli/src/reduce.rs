//! `reduce` command: cleaning and top-K selection only, no oracles.

use std::path::Path;

use opmon_analysis::{ContentFilter, Reduced, StreamReducer};
use opmon_core::ReducerConfig;

use crate::input::open_items;

/// Render a reducer pass as a plain-text table.
pub(crate) fn render_reduced(reduced: &Reduced) -> String {
    let mut out = format!(
        "seen {} item(s), kept {}, rejected {}\n",
        reduced.stats.seen,
        reduced.items.len(),
        reduced.stats.rejected_total()
    );
    for (reason, count) in &reduced.stats.rejected {
        out.push_str(&format!("  rejected {reason}: {count}\n"));
    }
    for (rank, item) in reduced.items.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<8} {:<24} {}\n",
            rank + 1,
            item.platform.as_str(),
            item.source_id,
            item.engagement_score()
        ));
    }
    out
}

/// Run the reducer over an input file and print what it kept.
///
/// # Errors
///
/// Returns an error if the input file cannot be read or any record fails to
/// parse.
pub(crate) fn run_reduce(input: &Path, top_k: usize, language: &str) -> anyhow::Result<()> {
    let config = ReducerConfig {
        capacity: top_k,
        ..ReducerConfig::default()
    };
    let filter = ContentFilter::new(&config, language);
    let mut reducer = StreamReducer::new(&filter, config.capacity);
    for item in open_items(input)? {
        reducer.push(item?);
    }
    let reduced = reducer.finish();
    print!("{}", render_reduced(&reduced));
    Ok(())
}
