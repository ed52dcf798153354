use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use glucose_sync::{
    AppConfig, Backfiller, NightscoutClient, SystemClock, entry, merge, ordering, trend,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "glucose-sync")]
#[command(about = "Nightscout gap detection, backfill and trend checking")]
struct Args {
    /// Verbose output (trace logging, trend mismatches)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare computed trends with the directions recorded in an entries file
    Trend {
        file: PathBuf,
    },
    /// Merge two entries files chronologically and print the result
    Merge {
        first: PathBuf,
        second: PathBuf,
    },
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that talk to the configured sites.
#[derive(Subcommand, Debug)]
enum RemoteCommand {
    /// Print the target site's recent entries
    Entries {
        /// Hours to look back (defaults to sync.lookback_hours)
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Print gaps in the target site's recent readings
    Gaps {
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Fill gaps on the target site with readings from the source site
    Backfill {
        #[arg(long)]
        hours: Option<i64>,
        /// Log what would be uploaded instead of uploading it
        #[arg(long)]
        no_upload: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let directive = if args.verbose {
        "glucose_sync=trace"
    } else {
        "glucose_sync=debug"
    };
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy(directive);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    match args.command {
        Command::Trend { file } => check_trends(&file, args.verbose),
        Command::Merge { first, second } => merge_files(&first, &second),
        Command::Remote(command) => {
            let config = AppConfig::load().context("Failed to load configuration")?;
            let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
            rt.block_on(run_remote(command, config))
        }
    }
}

fn check_trends(file: &std::path::Path, verbose: bool) -> Result<()> {
    let entries = ordering::sort_descending(&entry::read_entries(file)?);
    let report = trend::evaluate(&entries);

    if verbose {
        for m in &report.mismatches {
            println!(
                "{} {:>3} computed {:<13} recorded {}",
                m.entry.date_string,
                m.entry.sgv.unwrap_or_default(),
                m.computed,
                m.recorded
            );
        }
    }
    println!(
        "{} / {} wrong ({}% correct)",
        report.wrong,
        report.total,
        report.percent_correct()
    );
    Ok(())
}

fn merge_files(first: &std::path::Path, second: &std::path::Path) -> Result<()> {
    let u = ordering::sort_ascending(&entry::read_entries(first)?);
    let v = ordering::sort_ascending(&entry::read_entries(second)?);
    let merged = merge::merge_entries(&u, &v);
    tracing::info!(count = merged.len(), "entries merged");
    entry::write_entries(io::stdout().lock(), &merged)
}

async fn run_remote(command: RemoteCommand, mut config: AppConfig) -> Result<()> {
    if let RemoteCommand::Backfill { no_upload: true, .. } = command {
        config.sync.no_upload = true;
    }

    let target = NightscoutClient::new(
        config.site_url()?,
        &config.nightscout.api_secret,
        &config.network,
    )
    .context("Failed to create Nightscout client")?
    .with_no_upload(config.sync.no_upload);
    tracing::info!(site = %target.site(), "Nightscout client initialized");

    match command {
        RemoteCommand::Entries { hours } => {
            let now = Utc::now();
            let since = config.sync.window_start(now, hours)?;
            let fetched = target
                .entries_since(since, 2 * (now - since).num_minutes().max(1))
                .await?;
            let entries = ordering::sort_descending(&fetched);
            entry::write_entries(io::stdout().lock(), &entries)
        }
        RemoteCommand::Gaps { hours } => {
            let since = config.sync.window_start(Utc::now(), hours)?;
            let backfiller = backfiller(&config, target)?;
            let gaps = backfiller.find_gaps(since).await?;
            for gap in &gaps {
                println!("{} ({} minutes)", gap, gap.duration().num_minutes());
            }
            println!("{} gaps", gaps.len());
            Ok(())
        }
        RemoteCommand::Backfill { hours, .. } => {
            let since = config.sync.window_start(Utc::now(), hours)?;
            let backfiller = backfiller(&config, target)?;
            let summary = backfiller.run(since).await?;
            println!(
                "{} gaps, {} entries recovered, {} uploaded",
                summary.gaps.len(),
                summary.recovered,
                summary.uploaded
            );
            Ok(())
        }
    }
}

fn backfiller(config: &AppConfig, target: NightscoutClient) -> Result<Backfiller<SystemClock>> {
    let source = NightscoutClient::new(
        &config.source.url,
        &config.source.api_secret,
        &config.network,
    )
    .context("Failed to create source client")?;

    Ok(Backfiller::new(
        target,
        source,
        config.sync.clone(),
        config.nightscout.device.clone(),
        SystemClock,
    ))
}
