use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use payloadiff::presentation::cli_summary::{
    print_comparison, print_history, print_outcome, print_perf_summary,
};
use payloadiff::presentation::writers::{all_writers, write_to_file, writer_for};
use payloadiff::{AppConfig, ComparisonReport, CustomerId, LogLevel, Operator, UiDecision};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "payloadiff",
    about = "Payloadiff: reconcile customer JSON payloads against their templates."
)]
struct Cli {
    /// Defaults to <config dir>/payloadiff/config.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Operator name recorded with every session (default: $USER).
    #[arg(long, global = true)]
    operator: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diff a customer's payload against its template.
    Compare {
        customer: String,
        /// Write the report: "json", "md" or "all".
        #[arg(short, long)]
        format: Option<String>,
        #[arg(long)]
        timings: bool,
    },
    /// Apply decisions read from a JSON file (a list of {path, action, value?}).
    Apply {
        customer: String,
        decisions: PathBuf,
        /// Reconcile and report without submitting.
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Overwrite a customer's saved payload with a JSON document, bypassing decisions.
    Save {
        customer: String,
        payload: PathBuf,
        #[arg(short, long)]
        format: Option<String>,
    },
    /// List a customer's saved change sets.
    History {
        customer: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    payloadiff::init_tracing(if cli.verbose {
        LogLevel::Debug
    } else if cli.quiet {
        LogLevel::Error
    } else {
        LogLevel::Info
    });

    let config_path = match cli.config {
        Some(p) => p,
        None => AppConfig::default_path().context("No config directory on this platform; pass --config")?,
    };
    let cfg = AppConfig::load(&config_path)?;

    let operator = Operator::new(
        cli.operator
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "operator".to_string()),
    );

    match cli.command {
        Command::Compare {
            customer,
            format,
            timings,
        } => {
            let report = payloadiff::run_compare(&cfg, &operator, CustomerId(customer)).await?;
            print_report(&report, cfg.compare.filter);
            if timings {
                if let Some(perf) = &report.perf {
                    print_perf_summary(perf);
                }
            }
            write_report(&report, format.as_deref(), &cfg)?;
        }
        Command::Apply {
            customer,
            decisions,
            dry_run,
            format,
        } => {
            let raw = std::fs::read_to_string(&decisions)
                .with_context(|| format!("Failed to read decisions file: {}", decisions.display()))?;
            let decisions: Vec<UiDecision> =
                serde_json::from_str(&raw).with_context(|| "Failed to parse decisions JSON")?;

            let report =
                payloadiff::run_apply(&cfg, &operator, CustomerId(customer), decisions, dry_run).await?;
            let rejected = report.outcome.as_ref().map(print_outcome).unwrap_or(false);
            if dry_run {
                println!("Dry run: nothing was submitted.");
            } else if let Some(receipt) = &report.receipt {
                println!("Change set {} ({:?})", receipt.change_set_id, receipt.status);
            }
            print_report(&report, cfg.compare.filter);
            write_report(&report, format.as_deref(), &cfg)?;
            if rejected {
                std::process::exit(2);
            }
        }
        Command::Save {
            customer,
            payload,
            format,
        } => {
            let raw = std::fs::read_to_string(&payload)
                .with_context(|| format!("Failed to read payload file: {}", payload.display()))?;
            let payload: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| "Failed to parse payload JSON")?;

            let report =
                payloadiff::run_save_payload(&cfg, &operator, CustomerId(customer), payload).await?;
            println!("Payload saved.");
            print_report(&report, cfg.compare.filter);
            write_report(&report, format.as_deref(), &cfg)?;
        }
        Command::History {
            customer,
            page,
            page_size,
        } => {
            let list = payloadiff::run_history(&cfg, &operator, &CustomerId(customer), page, page_size)
                .await?;
            print_history(&list);
        }
    }

    Ok(())
}

fn print_report(report: &ComparisonReport, filter: payloadiff::VisibilityFilter) {
    let c = &report.comparison;
    let visible: Vec<_> = c
        .diffs
        .iter()
        .filter(|d| filter == payloadiff::VisibilityFilter::IncludeContainers || !d.is_container())
        .collect();
    let pending: payloadiff::PendingDecisions = report.pending.iter().cloned().collect();
    print_comparison(c, &visible, &report.counts, Some(&pending));
}

fn write_report(report: &ComparisonReport, format: Option<&str>, cfg: &AppConfig) -> Result<()> {
    let Some(format) = format else {
        return Ok(());
    };
    let writers = match format {
        "all" => all_writers(),
        fmt => vec![writer_for(fmt).ok_or_else(|| anyhow::anyhow!("Unknown format: {}", fmt))?],
    };
    for writer in writers {
        let path = write_to_file(&*writer, report, &cfg.output.dir)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}
