use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::filter::MessageFilter;
use crate::process::{harvest_site, HarvestSettings};
use crate::request::FetchSettings;
use crate::stats::{clean, load_dispatches, region_table, summarize, RegionTable};
use crate::{info_time, Result, DEFAULT_BASE_URL, DEFAULT_MAX_PAGE, DEFAULT_PAGE_SIZE};

#[derive(Debug, Parser)]
#[command(name = "p2000")]
#[command(about = "Harvest P2000 data continuously to a TSV file.", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Used when no subcommand is given.
    #[command(flatten)]
    pub harvest: HarvestArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scrape the listing into a TSV file (default).
    Harvest(HarvestArgs),
    /// Report on a harvested TSV file.
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct HarvestArgs {
    /// Maximum number of pages to scrape.
    #[arg(long, alias = "maxPage", default_value_t = DEFAULT_MAX_PAGE, value_parser = parse_positive)]
    pub max_page: usize,

    /// Output file name [default: p2000_<YYYY-MM-DD-HH:MM>.tsv]
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Rows requested per page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_positive)]
    pub page_size: usize,

    /// Pause between pages, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub page_delay_ms: u64,

    /// Pause after a failed page, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub error_delay_ms: u64,

    /// Network timeout of a single page request, in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl HarvestArgs {
    pub fn settings(&self) -> HarvestSettings {
        HarvestSettings {
            max_page: self.max_page,
            page_delay: Duration::from_millis(self.page_delay_ms),
            error_delay: Duration::from_millis(self.error_delay_ms),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            base_url: self.base_url.clone(),
            page_size: self.page_size,
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(default_output_path)
    }
}

#[derive(Debug, Clone, Args)]
pub struct StatsArgs {
    /// Harvested TSV file.
    pub file: PathBuf,

    /// Keep "TESTOPROEP MOB" and messages containing the word "test".
    #[arg(long)]
    pub keep_tests: bool,

    /// How many of the most frequent values to list per column.
    #[arg(long, default_value_t = 20)]
    pub top: usize,
}

/// `p2000_<date>-<time>.tsv` in the working directory, stamped with local time.
pub fn default_output_path() -> PathBuf {
    PathBuf::from(format!("p2000_{}.tsv", Local::now().format("%Y-%m-%d-%H:%M")))
}

fn parse_positive(s: &str) -> core::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Harvest(args)) => harvest(args).await,
        Some(Commands::Stats(args)) => stats(args).await,
        None => harvest(cli.harvest).await,
    }
}

async fn harvest(args: HarvestArgs) -> Result<()> {
    let stop = CancellationToken::new();
    spawn_interrupt_handler(stop.clone());

    let report = harvest_site(
        args.settings(),
        &args.fetch_settings(),
        args.output_path(),
        stop,
    )
    .await?;
    info!(
        stop_reason = ?report.stop_reason,
        total_records = report.total_records,
        page = report.current_page,
        "Harvest finished"
    );
    Ok(())
}

/// The first Ctrl+C only cancels `stop`, so the loop can finish the page it is on.
/// A second one exits right away; every completed page is already on disk by then.
fn spawn_interrupt_handler(stop: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info_time!("Ctrl+C detected! Finishing current page and saving data...");
        stop.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            info_time!("Second Ctrl+C, quitting without waiting for the current page.");
            std::process::exit(130);
        }
    });
}

async fn stats(args: StatsArgs) -> Result<()> {
    let dispatches = load_dispatches(&args.file).await?;
    let filter = if args.keep_tests {
        MessageFilter::default()
    } else {
        MessageFilter::test_calls()?
    };

    let summary = summarize(&dispatches, &filter, args.top);
    println!("{summary}");

    let cleaned = clean(&dispatches, &filter);
    let table = region_table(cleaned.iter().copied());
    println!("Stats based on {} cleaned records.\n", cleaned.len());
    println!("{}", RegionTable(&table));
    Ok(())
}
