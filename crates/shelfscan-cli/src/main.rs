mod batch;
mod inspect;
mod saved;
mod setup;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use shelfscan_core::LocationSpec;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shelfscan")]
#[command(about = "Scrape storefront listings, OCR nutrition labels and build a combined report")]
struct Cli {
    /// Delivery location: a preset (delhi, mumbai, bangalore, gurugram) or a
    /// JSON object with lat, lon and locality
    #[arg(long, global = true)]
    location: Option<LocationSpec>,

    /// Directory for combined reports (defaults to `SHELFSCAN_OUTPUT_DIR`)
    #[arg(long, short = 'o', global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape a listing, OCR every product and write a combined report
    Batch {
        /// Listing URL or local snapshot path (defaults to `SHELFSCAN_LISTING_URL`)
        #[arg(long)]
        list_url: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Process product URLs from a file (one per line), skipping the listing
    Urls {
        urls_file: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the product entries found on a listing page
    Listing {
        #[arg(long)]
        list_url: Option<String>,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print what a product detail page yields
    Product {
        /// Product URL or local snapshot path
        url: String,
    },
    /// Run OCR on one image file or URL
    Ocr {
        image: String,
        /// Print the raw text annotations as JSON
        #[arg(long)]
        json: bool,
        /// Also print the nutrition fields extracted from the text
        #[arg(long)]
        nutrition: bool,
        #[arg(long)]
        ocr_creds: Option<PathBuf>,
    },
    /// Re-run OCR and upload for products from saved combined reports
    UploadSaved {
        /// Directory holding `combined_report_*.json` files (defaults to the output dir)
        #[arg(long, short = 'i')]
        input_dir: Option<PathBuf>,
        /// Specific report file; may be repeated
        #[arg(long = "input-file", short = 'f')]
        input_files: Vec<PathBuf>,
        /// Re-run OCR even for products that already have OCR text
        #[arg(long)]
        force_ocr: bool,
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Options shared by the commands that run the pipeline.
#[derive(Debug, Clone, Default, Args)]
struct RunArgs {
    /// Process only the first N products
    #[arg(long)]
    max_products: Option<usize>,
    /// Extract everything but skip uploads
    #[arg(long)]
    dry_run: bool,
    /// Listing fetch timeout in seconds
    #[arg(long)]
    listing_timeout: Option<u64>,
    /// Detail page fetch timeout in seconds
    #[arg(long)]
    product_timeout: Option<u64>,
    /// Products processed concurrently; output keeps listing order
    #[arg(long)]
    concurrency: Option<usize>,
    /// OCR credentials file (defaults to `SHELFSCAN_OCR_CREDENTIALS`)
    #[arg(long)]
    ocr_creds: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = shelfscan_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("shelfscan: no command given; run `shelfscan --help` for usage");
        return Ok(());
    };

    let explicit_location = cli.location.is_some();
    let location = cli
        .location
        .or_else(|| config.location.clone())
        .unwrap_or_default()
        .resolve();
    let output_dir = cli.output_dir.unwrap_or_else(|| config.output_dir.clone());

    match command {
        Commands::Batch { list_url, run } => {
            let target = list_url.unwrap_or_else(|| config.listing_url.clone());
            batch::run_batch(&config, &location, &output_dir, &target, &run, cancel_on_ctrl_c())
                .await
        }
        Commands::Urls { urls_file, run } => {
            batch::run_urls(&config, &location, &output_dir, &urls_file, &run, cancel_on_ctrl_c())
                .await
        }
        Commands::Listing { list_url, json } => {
            let target = list_url.unwrap_or_else(|| config.listing_url.clone());
            inspect::run_listing(&config, &location, &target, json).await
        }
        Commands::Product { url } => inspect::run_product(&config, &location, &url).await,
        Commands::Ocr {
            image,
            json,
            nutrition,
            ocr_creds,
        } => inspect::run_ocr(&config, &image, ocr_creds.as_deref(), json, nutrition).await,
        Commands::UploadSaved {
            input_dir,
            input_files,
            force_ocr,
            run,
        } => {
            let input_dir = input_dir.unwrap_or_else(|| output_dir.clone());
            saved::run_upload_saved(
                &config,
                explicit_location.then_some(&location),
                &saved::SavedInputs {
                    input_dir,
                    input_files,
                    force_ocr,
                },
                &output_dir,
                &run,
                cancel_on_ctrl_c(),
            )
            .await
        }
    }
}

/// Exit status for a run aborted by a second interrupt.
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Signal handling could not be installed or stopped after the first
    /// interrupt; the run carries on.
    Unavailable,
    /// Interrupted twice; the process should stop now.
    Forced,
}

/// A flag raised on the first Ctrl-C. The pipeline finishes the product in
/// flight, skips the rest and still writes its report. A second Ctrl-C exits
/// immediately without a report.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, &handler_flag).await == Interrupt::Forced {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
    flag
}

async fn watch_interrupts<F, Fut>(mut next_interrupt: F, flag: &AtomicBool) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return Interrupt::Unavailable;
    }
    tracing::warn!(
        "interrupt received, finishing current product and writing report (Ctrl-C again to quit)"
    );
    flag.store(true, Ordering::SeqCst);

    if next_interrupt().await.is_err() {
        return Interrupt::Unavailable;
    }
    tracing::error!("second interrupt received, exiting without a report");
    Interrupt::Forced
}
