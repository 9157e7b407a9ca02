//! The `exemplar run` command.

mod setup;
mod summary;
pub mod types;

pub use types::Quality;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use exemplar_core::{CancellationFlag, CategoryLayout, ExperimentContext, GridState};

use setup::{apply_quality, load_config, load_engine};
use summary::{create_progress_bar, print_summary};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Category directory holding 2.support-set/ and 6.preprocessed/
    #[arg(required = true)]
    pub category: PathBuf,

    /// Shot counts, comma-separated (overrides [experiment] shot_counts)
    #[arg(long, value_delimiter = ',')]
    pub shots: Option<Vec<usize>>,

    /// Rejection thresholds, comma-separated (overrides [experiment] thresholds)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub thresholds: Option<Vec<f32>>,

    /// Seed for support set sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Report every unknown_* ground truth as a single "unknown" bucket
    #[arg(long, conflicts_with = "no_group_unknown")]
    pub group_unknown: bool,

    /// Report unknown_* ground truth subtypes separately
    #[arg(long)]
    pub no_group_unknown: bool,

    /// Number of parallel embedding workers
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Quality preset: fast (224 model) or high (384 model)
    #[arg(long, value_enum, default_value = "fast")]
    pub quality: Quality,

    /// Copy query images into vis/<predicted_class>/ per cell
    #[arg(long)]
    pub visualize: bool,

    /// Results folder name under 7.results/ (defaults to the model name)
    #[arg(long)]
    pub model_label: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Execute the run command.
pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    if !args.category.is_dir() {
        anyhow::bail!(
            "Category directory does not exist: {:?}\n\n  Hint: Check the path and try again.",
            args.category
        );
    }

    let mut config = load_config(&args)?;
    apply_quality(&mut config, args.quality);
    let engine = load_engine(&config)?;
    let context = ExperimentContext::initialize(config, Arc::new(engine))?;

    let shots = context.config().experiment.shot_counts.clone();
    let thresholds = context.config().experiment.thresholds.clone();

    let cancel = CancellationFlag::new();
    let listener = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; stopping after the current cell");
                cancel.cancel();
            }
        })
    };

    let progress = create_progress_bar((shots.len() * thresholds.len()) as u64);
    let pb = progress.clone();
    let mut grid = context
        .grid(CategoryLayout::new(&args.category))
        .with_cancellation(cancel)
        .on_cell(move |cell| {
            pb.inc(1);
            pb.set_message(format!(
                "shot={} threshold={} {}",
                cell.shot_count, cell.threshold, cell.status
            ));
        });

    let corpus = grid.query_corpus()?;
    if corpus.is_empty() {
        tracing::warn!("No query images found under {:?}", grid.layout().query_root());
    }

    let start = std::time::Instant::now();
    let outcome = grid.run(&shots, &thresholds, &corpus).await;
    progress.finish_and_clear();
    listener.abort();
    let result = outcome?;

    let summary = grid.aggregator().finalize(&result)?;
    let stats = context.dispose();
    print_summary(&result, &summary, &stats, start.elapsed());

    if result.state == GridState::Cancelled {
        eprintln!(
            "\n  Cancelled: {} of {} cell(s) completed. Completed cells are on disk.",
            result.completed_cells(),
            result.cells.len()
        );
    }
    Ok(())
}
