//! Progress bar and the end-of-run summary table.

use exemplar_core::{CacheStats, CellReport, ExperimentGridResult, Summary};

pub fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message("embedding queries...");
    pb
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

/// One line of the summary table.
pub fn format_row(cell: &CellReport) -> String {
    format!(
        "    {:>5}  {:>9}  {:<9}  {:>8}  {:>8}  {:>8}  {:>6}",
        cell.shot_count,
        cell.threshold,
        cell.status.as_str(),
        pct(cell.metrics.accuracy),
        pct(cell.metrics.known_accuracy),
        pct(cell.metrics.unknown_rate),
        cell.metrics.failed,
    )
}

/// Print the per-cell table and output locations to stderr.
pub fn print_summary(
    result: &ExperimentGridResult,
    summary: &Summary,
    cache: &CacheStats,
    elapsed: std::time::Duration,
) {
    eprintln!();
    eprintln!("  ==================================================================");
    eprintln!("    {} / {}", result.category, result.model);
    eprintln!("  ==================================================================");
    eprintln!(
        "    {:>5}  {:>9}  {:<9}  {:>8}  {:>8}  {:>8}  {:>6}",
        "shot", "threshold", "status", "accuracy", "known", "unknown", "failed"
    );
    eprintln!("  ------------------------------------------------------------------");
    for cell in &result.cells {
        eprintln!("{}", format_row(cell));
    }
    eprintln!("  ------------------------------------------------------------------");
    eprintln!("    Queries:      {:>8}", result.query_count);
    eprintln!(
        "    Cells:        {:>8} of {}",
        result.completed_cells(),
        result.cells.len()
    );
    eprintln!(
        "    Embeddings:   {:>8} computed, {} reused",
        cache.computed, cache.hits
    );
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Summary:      {}", summary.csv_path.display());
    if let Some(json) = &summary.json_path {
        eprintln!("    Detail:       {}", json.display());
    }
    eprintln!("  ==================================================================");
}
