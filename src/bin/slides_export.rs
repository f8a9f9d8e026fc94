//! CLI binary for slides-export.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `convert` runs one conversion in-process and prints the JSON response.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use slides_export::{
    serve, ConversionType, Converter, ErrorResponse, FetchProgressCallback, LocalDirPublisher,
    ProgressCallback, QualityTier, ServiceConfig,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live bar over the slide fetches. Images settle out of order, so the bar
/// only counts; failures are printed above it as they happen.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Resolving");
        bar.set_message("reading slide list…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl FetchProgressCallback for CliProgressCallback {
    fn on_fetch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Fetching");
        self.bar.set_message("");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Fetching {total} slide images…"))
        ));
    }

    fn on_image_complete(&self, index: usize, _total: usize, bytes: u64) {
        self.bar
            .set_message(format!("slide {} ({} KB)", index + 1, bytes / 1024));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(error)
        ));
        self.bar.inc(1);
    }

    fn on_fetch_complete(&self, total: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} slides fetched, exporting…",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides fetched; nothing will be exported",
                red("✘"),
                succeeded,
                total
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default port (9002)
  slides-export serve

  # Serve, storing artifacts in a local directory instead of FTP
  slides-export serve --bind 127.0.0.1:8080 --publish-dir ./published

  # One-off conversion to PDF, published over FTP
  slides-export convert https://www.slideshare.net/someone/my-deck/123456

  # SD image archive stored locally
  slides-export convert --type images_zip --quality sd --publish-dir ./out <URL>

ENVIRONMENT VARIABLES:
  BASE_URL      Public base URL prepended to published paths
  FTP_HOST      FTP server host
  FTP_USER      FTP user name
  FTP_PASS      FTP password
  FTP_PORT      FTP port (default 21)
  BIND_ADDR     Listen address for `serve` (default 0.0.0.0:9002)
  REMOTE_ROOT   Root directory on the store (default SS_DL)
  WORK_DIR      Directory for temporary files (default: system temp)

  A `.env` file in the working directory is loaded first.
"#;

/// Export hosted slide shows as PDF, PPTX or image archives.
#[derive(Parser, Debug)]
#[command(
    name = "slides-export",
    version,
    about = "Export hosted slide shows as PDF, PPTX or image archives",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SLIDES_EXPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SLIDES_EXPORT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service until Ctrl+C.
    Serve(ServeArgs),
    /// Convert one presentation and print the JSON response.
    Convert(ConvertArgs),
}

/// Options shared by both subcommands.
#[derive(Args, Debug)]
struct StoreArgs {
    /// Store artifacts under this directory instead of uploading over FTP.
    #[arg(long)]
    publish_dir: Option<PathBuf>,

    /// Public base URL for download links (overrides BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Directory for temporary files (overrides WORK_DIR).
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Bound the whole publish call, in seconds. Unbounded when absent.
    #[arg(long, env = "PUBLISH_TIMEOUT")]
    publish_timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address (overrides BIND_ADDR).
    #[arg(long)]
    bind: Option<SocketAddr>,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Presentation page URL.
    url: String,

    /// Output type: pdf, pptx, images_zip.
    #[arg(short = 't', long = "type", default_value = "pdf")]
    conversion_type: ConversionType,

    /// Slide quality: hd (2048 px) or sd (638 px).
    #[arg(long, default_value = "hd")]
    quality: QualityTier,

    /// Disable progress bar.
    #[arg(long, env = "SLIDES_EXPORT_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    store: StoreArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs on `convert`.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ServiceConfig::from_env().context("Invalid environment configuration")?;

    match cli.command {
        Command::Serve(args) => {
            if let Some(bind) = args.bind {
                config.bind_addr = bind;
            }
            apply_store_args(&mut config, &args.store);
            let addr = config.bind_addr;
            let converter = build_converter(config, &args.store, None)?;
            serve(converter, addr, shutdown_signal())
                .await
                .with_context(|| format!("HTTP service on {addr} failed"))?;
        }
        Command::Convert(args) => {
            apply_store_args(&mut config, &args.store);
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new())
            } else {
                None
            };
            let converter = build_converter(config, &args.store, progress)?;

            match converter
                .convert(&args.url, args.conversion_type, args.quality)
                .await
            {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                Err(e) => {
                    println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
                    return Err(anyhow::Error::new(e).context(format!(
                        "Conversion of {} failed",
                        args.url
                    )));
                }
            }
        }
    }

    Ok(())
}

fn apply_store_args(config: &mut ServiceConfig, store: &StoreArgs) {
    if let Some(base_url) = &store.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(dir) = &store.work_dir {
        config.work_dir = Some(dir.clone());
    }
    if store.publish_timeout.is_some() {
        config.publish_timeout_secs = store.publish_timeout;
    }
}

fn build_converter(
    config: ServiceConfig,
    store: &StoreArgs,
    progress: Option<ProgressCallback>,
) -> Result<Converter> {
    let config = Arc::new(config);
    let converter = match &store.publish_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create publish directory {}", dir.display()))?;
            info!("Publishing to local directory {}", dir.display());
            Converter::new(config, Arc::new(LocalDirPublisher::new(dir)))
        }
        None => Converter::with_ftp(config),
    }
    .context("Failed to initialise converter")?;

    Ok(match progress {
        Some(cb) => converter.with_progress(cb),
        None => converter,
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
