//! Batch command - extract from many statement files in one run.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, warn};

use stex_core::{ExtractionOutcome, InMemorySecurities};

use super::extract::{format_outcomes, OutputFormat};
use crate::rules;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input statement text files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory; without it, results go to stdout per file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Skip unreadable files instead of aborting
    #[arg(long)]
    continue_on_error: bool,
}

pub async fn run(args: BatchArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let router = rules::bundled();
    // One resolver for the whole batch, so the same instrument appearing
    // in several statements resolves to a single security.
    let mut securities = InMemorySecurities::new();

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let mut transactions = 0usize;
    let mut rejections = 0usize;
    let mut unreadable = 0usize;

    for path in &args.inputs {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if args.continue_on_error => {
                warn!("Skipping {}: {}", path.display(), e);
                unreadable += 1;
                continue;
            }
            Err(e) => anyhow::bail!("Failed to read {}: {}", path.display(), e),
        };

        let outcomes = router.extract_text(&text, &mut securities);
        transactions += outcomes.iter().filter(|o| o.is_transaction()).count();
        rejections += outcomes
            .iter()
            .filter(|o| matches!(o, ExtractionOutcome::Rejected(_)))
            .count();

        let output = format_outcomes(&outcomes, args.format)?;
        if let Some(ref output_dir) = args.output_dir {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("statement");
            let extension = match args.format {
                OutputFormat::Json => "json",
                OutputFormat::Text => "txt",
            };
            let target = output_dir.join(format!("{name}.{extension}"));
            fs::write(&target, &output)?;
            debug!("Wrote {}", target.display());
        } else {
            println!("{}", style(path.display().to_string()).bold());
            println!("{}", output);
        }
    }

    println!(
        "{} {} files, {} transactions, {} rejections, {} unreadable",
        style("✓").green(),
        args.inputs.len(),
        transactions,
        rejections,
        unreadable
    );
    debug!("Batch took {:?}", start.elapsed());

    Ok(())
}
