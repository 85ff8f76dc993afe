//! Extract command - run the bundled rule sets against one statement file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use stex_core::{
    AccountEntryKind, ExtractionOutcome, InMemorySecurities, TradeKind, TransactionItem,
};

use crate::rules;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input statement text file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Exit non-zero if any block run was rejected
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Extracting from {}", args.input.display());

    let text = fs::read_to_string(&args.input)?;
    let router = rules::bundled();
    let mut securities = InMemorySecurities::new();
    let outcomes = router.extract_text(&text, &mut securities);

    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, ExtractionOutcome::Rejected(_)))
        .count();

    let output = format_outcomes(&outcomes, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Extraction took {:?}", start.elapsed());

    if args.strict && rejected > 0 {
        anyhow::bail!("{} block run(s) rejected", rejected);
    }

    Ok(())
}

pub fn format_outcomes(
    outcomes: &[ExtractionOutcome],
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outcomes)?),
        OutputFormat::Text => format_text(outcomes),
    }
}

fn format_text(outcomes: &[ExtractionOutcome]) -> anyhow::Result<String> {
    use std::fmt::Write as _;

    let mut out = String::new();
    if outcomes.is_empty() {
        out.push_str("No rule set matched the document.\n");
        return Ok(out);
    }

    for outcome in outcomes {
        match outcome {
            ExtractionOutcome::Transaction { rule_set, item } => {
                let date = item
                    .date()
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let money = item
                    .money()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|_| "-".to_string());
                writeln!(
                    out,
                    "{} {}  {:<9} {}  {}  [{}]",
                    style("✓").green(),
                    date,
                    kind_label(item),
                    money,
                    security_name(item).unwrap_or("-"),
                    rule_set
                )?;
            }
            ExtractionOutcome::NonImportable { rule_set, reason } => {
                writeln!(out, "{} {} [{}]", style("·").dim(), reason, rule_set)?;
            }
            ExtractionOutcome::Rejected(rejection) => {
                writeln!(out, "{} {}", style("✗").red(), rejection)?;
            }
        }
    }

    Ok(out)
}

fn kind_label(item: &TransactionItem) -> &'static str {
    match item {
        TransactionItem::Transfer(t) => match t.kind {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
        },
        TransactionItem::Account(t) => match t.kind {
            AccountEntryKind::Dividend => "dividend",
            AccountEntryKind::Interest => "interest",
            AccountEntryKind::Taxes => "taxes",
            AccountEntryKind::TaxRefund => "tax refund",
            AccountEntryKind::Fees => "fees",
        },
    }
}

fn security_name(item: &TransactionItem) -> Option<&str> {
    let security = match item {
        TransactionItem::Transfer(t) => t.security.as_ref(),
        TransactionItem::Account(t) => t.security.as_ref(),
    };
    security.map(|s| s.name.as_str())
}
