//! `privacy-scope` — score how sites and companies track users and handle
//! personal data, from public tracker telemetry, a policy rubric catalog and
//! a terms-of-service review catalog.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and initialise logging.
//! 2. Load and validate config ([`config::load_config`]).
//! 3. Build one HTTP [`source::Fetcher`] whose calls all race a Ctrl-C
//!    [`source::CancelSignal`].
//! 4. Run the requested path:
//!    - `site` / `domains`: fetch telemetry and run the [`pipeline`].
//!    - `lookup` / `shell`: load the policy catalog ([`snapshot`]), resolve
//!      the query in both catalogs ([`resolve`]) and combine ([`composite`]).
//!    - `catalog`: enumerate the review catalog and merge in the policy catalog.
//! 5. Render the requested report ([`report`]).
//! 6. Exit `1` when a requested site is unknown or the run was cancelled.

mod cli;
mod composite;
mod config;
mod models;
mod pipeline;
mod report;
mod resolve;
mod snapshot;
mod source;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ReportFormat};
use composite::{lookup, LookupReport};
use config::{load_config, Config};
use resolve::normalize_query;
use resolve::review::{enumerate_reviewed, master_site_list};
use snapshot::ReferenceData;
use source::review::ReviewClient;
use source::{CancelSignal, Fetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd, cli.config.as_deref())?;

    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received; cancelling in-flight requests");
                cancel.cancel();
            }
        });
    }

    let fetcher = Fetcher::new(&config.sources, cancel.clone())?;

    match &cli.command {
        Command::Lookup { query, compare } => run_lookup(&cli, &config, &fetcher, query, compare.as_deref()).await?,
        Command::Site { domain } => run_site(&cli, &config, &fetcher, domain).await?,
        Command::Domains => run_domains(&cli, &config, &fetcher).await?,
        Command::Catalog => run_catalog(&cli, &config, &fetcher).await?,
        Command::Shell => run_shell(&cli, &config, &fetcher).await?,
    }

    if cancel.is_cancelled() {
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` shows debug logs and `-q` only errors.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "privacy_scope=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: &str, quiet: bool) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(pb))
}

fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

async fn load_reference(config: &Config, fetcher: &Fetcher, quiet: bool) -> Result<ReferenceData> {
    let pb = spinner("Loading policy catalog…", quiet)?;
    let reference = ReferenceData::load(fetcher, &config.sources).await;
    finish(pb);
    let reference = reference?;
    if reference.catalog().is_empty() {
        tracing::warn!("policy catalog is empty; rubric lookups will find nothing");
    }
    if reference.skipped_records() > 0 && !quiet {
        eprintln!(
            "  {} {} malformed policy records skipped",
            "⚠".yellow(),
            reference.skipped_records()
        );
    }
    Ok(reference)
}

fn print_lookups(cli: &Cli, reports: &[LookupReport]) -> Result<()> {
    match cli.report {
        ReportFormat::Json => println!("{}", report::json::lookups(reports)?),
        ReportFormat::Terminal => match reports {
            [left, right] => report::terminal::render_compare(left, right, cli.quiet),
            _ => {
                for r in reports {
                    report::terminal::render_lookup(r, cli.verbose, cli.quiet);
                }
            }
        },
    }
    Ok(())
}

async fn run_lookup(cli: &Cli, config: &Config, fetcher: &Fetcher, query: &str, compare: Option<&str>) -> Result<()> {
    let reference = load_reference(config, fetcher, cli.quiet).await?;
    let reviews = ReviewClient::new(fetcher.clone(), &config.sources);

    let pb = spinner("Resolving…", cli.quiet)?;
    let reports = match compare {
        Some(other) => {
            let (left, right) = futures::future::join(
                lookup(query, &reference, &reviews, fetcher, config),
                lookup(other, &reference, &reviews, fetcher, config),
            )
            .await;
            vec![left, right]
        }
        None => vec![lookup(query, &reference, &reviews, fetcher, config).await],
    };
    finish(pb);

    print_lookups(cli, &reports)
}

async fn run_site(cli: &Cli, config: &Config, fetcher: &Fetcher, domain: &str) -> Result<()> {
    let pb = spinner("Fetching tracker telemetry…", cli.quiet)?;
    let run = pipeline::run(fetcher, config).await;
    finish(pb);
    let run = run?;

    let domain = normalize_query(domain).to_lowercase();
    let Some(metrics) = run.index.metrics(&domain) else {
        eprintln!("No telemetry for {domain}");
        std::process::exit(1);
    };
    let categories = run.index.category_breakdown(&domain);
    let trackers = run.index.trackers_for(&domain);

    match cli.report {
        ReportFormat::Json => println!("{}", report::json::site(metrics, &categories, &trackers, &run.stats)?),
        ReportFormat::Terminal => {
            report::terminal::render_site(metrics, &categories, &trackers, &run.stats, cli.verbose, cli.quiet)
        }
    }
    Ok(())
}

async fn run_domains(cli: &Cli, config: &Config, fetcher: &Fetcher) -> Result<()> {
    let pb = spinner("Fetching tracker telemetry…", cli.quiet)?;
    let run = pipeline::run(fetcher, config).await;
    finish(pb);
    let run = run?;

    let domains = run.index.domains();
    match cli.report {
        ReportFormat::Json => println!("{}", report::json::names(&domains)?),
        ReportFormat::Terminal => report::terminal::render_names("Domains by popularity", &domains, cli.quiet),
    }
    Ok(())
}

async fn run_catalog(cli: &Cli, config: &Config, fetcher: &Fetcher) -> Result<()> {
    let reviews = ReviewClient::new(fetcher.clone(), &config.sources);

    let pb = if cli.quiet {
        None
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] page {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let reviewed = enumerate_reviewed(&reviews, &config.enumeration, fetcher.cancel_signal(), |current, end| {
        if let Some(pb) = &pb {
            pb.set_length(u64::from(end));
            pb.set_position(u64::from(current));
        }
    })
    .await;
    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }
    let reviewed = reviewed?;

    let reference = load_reference(config, fetcher, cli.quiet).await?;
    let names = master_site_list(reviewed, reference.catalog().records());

    match cli.report {
        ReportFormat::Json => println!("{}", report::json::names(&names)?),
        ReportFormat::Terminal => report::terminal::render_names("Companies covered", &names, cli.quiet),
    }
    Ok(())
}

async fn run_shell(cli: &Cli, config: &Config, fetcher: &Fetcher) -> Result<()> {
    let mut reference = load_reference(config, fetcher, cli.quiet).await?;
    let reviews = ReviewClient::new(fetcher.clone(), &config.sources);
    let max_age = Duration::from_secs(config.snapshot.max_age_secs);
    let cancel = fetcher.cancel_signal();

    if !cli.quiet {
        eprintln!("  {} one query per line, Ctrl-D to quit", "→".cyan());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancel.cancelled() => break,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        if reference.is_stale(max_age) {
            match reference.reload(fetcher, &config.sources).await {
                Ok(fresh) => reference = fresh,
                Err(err) => tracing::warn!(error = %err, "catalog reload failed; keeping previous snapshot"),
            }
        }

        let report = lookup(&line, &reference, &reviews, fetcher, config).await;
        print_lookups(cli, std::slice::from_ref(&report))?;
    }
    Ok(())
}
