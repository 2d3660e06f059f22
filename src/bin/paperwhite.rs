//! CLI binary for paperwhite.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes the whitened document.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paperwhite::pipeline::source::{PageSource, PdfiumSource};
use paperwhite::pipeline::{binarize, input, source};
use paperwhite::{
    convert, inspect, ConversionConfig, ConversionProgressCallback, PageLayout, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Pages always complete in order (the pipeline is
/// strictly sequential), so the bar position is simply the last finished page.
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_conversion_start` (called before any pages are processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Whitening");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        // Switch from spinner-only style to full progress bar now that we
        // know the actual page count.
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Whitening {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, encoded_bytes: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:>7.1} KB", encoded_bytes as f64 / 1024.0)),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, output_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages whitened onto {} output page(s)",
            green("✔"),
            bold(&total_pages.to_string()),
            bold(&output_pages.to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whiten a scan (writes scan-white.pdf next to the input)
  paperwhite scan.pdf

  # Choose the output path
  paperwhite scan.pdf -o clean.pdf

  # Pack four pages per A4 sheet for printing
  paperwhite --layout 4up lecture-notes.pdf

  # Faint pencil disappearing? Raise the threshold
  paperwhite --threshold 200 homework.pdf

  # Dark blotches surviving? Lower it
  paperwhite --threshold 120 old-book.pdf

  # Tune the threshold on one page before converting 300
  paperwhite --preview-page 3 --threshold 180 thesis.pdf

  # Inspect PDF metadata (no conversion)
  paperwhite --inspect-only scan.pdf

  # Machine-readable run report on stdout
  paperwhite --json scan.pdf > report.json

THRESHOLD GUIDE:
  120   keep only dark ink; kills shadows but may thin faint strokes
  160   default: yellowed paper and photo shadows go white
  200   keep pencil and light print; needs a clean background
  The rule is strict: luminance above the threshold turns white,
  everything else turns black. There is no adaptive mode; when output
  looks wrong, change the threshold and preview again.

ENVIRONMENT VARIABLES:
  PAPERWHITE_OUTPUT       Default output path
  PAPERWHITE_LAYOUT       single | 4up
  PAPERWHITE_SCALE        Raster scale factor (0.1-8.0)
  PAPERWHITE_THRESHOLD    Luminance cutoff (0-255)
  PAPERWHITE_PASSWORD     PDF user password
  PDFIUM_LIB_PATH         Directory containing the pdfium library
  RUST_LOG                Log filter (tracing syntax), overrides -v/-q

SETUP:
  paperwhite renders pages through pdfium, loaded at runtime. Download a
  release from https://github.com/bblanchon/pdfium-binaries, then either
    export PDFIUM_LIB_PATH=/path/to/extracted/lib
  or drop libpdfium.so / libpdfium.dylib / pdfium.dll into the working
  directory. The system library path is searched last.
"#;

/// Force PDF page backgrounds to pure white.
#[derive(Parser, Debug)]
#[command(
    name = "paperwhite",
    version,
    about = "Force PDF page backgrounds to pure white",
    long_about = "Whiten scanned or photographed PDFs by thresholding every pixel to pure black \
or pure white. Yellowed paper, shadows, and sensor noise disappear; text and line art survive. \
Optionally packs four pages per A4 sheet for toner-friendly printing.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the whitened PDF here [default: <input stem>-white.pdf].
    #[arg(short, long, env = "PAPERWHITE_OUTPUT")]
    output: Option<PathBuf>,

    /// Output layout: single (one page per page) or 4up (four per A4 sheet).
    #[arg(long, env = "PAPERWHITE_LAYOUT", default_value = "single")]
    layout: String,

    /// Raster scale factor (0.1-8.0). Higher keeps finer detail, costs memory.
    #[arg(long, env = "PAPERWHITE_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Luminance cutoff (0-255): above turns white, rest turns black.
    #[arg(short, long, env = "PAPERWHITE_THRESHOLD", default_value_t = 160)]
    threshold: u8,

    /// Cap on the longest rendered edge in pixels.
    #[arg(long, env = "PAPERWHITE_MAX_RASTER_PIXELS", default_value_t = 6000)]
    max_raster_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPERWHITE_PASSWORD")]
    password: Option<String>,

    /// Whiten a single page (1-indexed) and write it as a PNG, no PDF output.
    #[arg(long, value_name = "PAGE")]
    preview_page: Option<usize>,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print a JSON run report (stats, pages, metadata) to stdout.
    #[arg(long, env = "PAPERWHITE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPERWHITE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPERWHITE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPERWHITE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let layout = parse_layout(&cli.layout)?;
    let progress_cb: Option<ProgressCallback> = if show_progress && cli.preview_page.is_none() {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .scale_factor(cli.scale)
        .threshold(cli.threshold)
        .layout(layout)
        .max_raster_pixels(cli.max_raster_pixels);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Preview mode: one page, PNG out, no PDF ──────────────────────────
    if let Some(page_num) = cli.preview_page {
        let preview_path = preview_page(&cli, &config, page_num).await?;
        if !cli.quiet {
            eprintln!(
                "{} preview of page {} written to {}",
                green("✔"),
                page_num,
                bold(&preview_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let Some(output) = convert(&cli.input, &config)
        .await
        .context("Conversion failed")?
    else {
        if cli.json {
            println!("{}", serde_json::json!({ "output": null, "pages": 0 }));
        } else if !cli.quiet {
            eprintln!("{} document has no pages; nothing to write", cyan("◆"));
        }
        return Ok(());
    };

    // Atomic write: temp file in the target directory, then rename.
    let tmp_path = output_path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, &output_path)
        .await
        .with_context(|| format!("Failed to move output to {}", output_path.display()))?;

    if cli.json {
        let report = serde_json::json!({
            "output": output_path,
            "stats": output.stats,
            "pages": output.pages,
            "metadata": output.metadata,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        // Summary line (the callback already printed the per-page log).
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            output.stats.total_pages,
            output.stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {}  {}",
            dim(&format!("{:.1} KB output", output.stats.output_bytes as f64 / 1024.0)),
            dim(&format!("layout: {}", config.layout)),
        );
    }

    Ok(())
}

/// Whiten a single page and save it as a PNG next to the input.
///
/// Exists so a threshold can be tuned in seconds on one page instead of
/// minutes on the whole document.
async fn preview_page(cli: &Cli, config: &ConversionConfig, page_num: usize) -> Result<PathBuf> {
    anyhow::ensure!(page_num >= 1, "Pages are 1-indexed, got {page_num}");

    let stem = file_stem_or(&cli.input, "page");
    let preview_path = cli
        .input
        .with_file_name(format!("{stem}-preview-p{page_num}.png"));

    let input = cli.input.clone();
    let target = preview_path.clone();
    let scale = config.scale_factor;
    let threshold = config.threshold;
    let max_pixels = config.max_raster_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let resolved = input::resolve_path(&input)?;
        let pdfium = source::bind_pdfium()?;
        let document = source::open_document(&pdfium, resolved.path(), password.as_deref())?;
        let mut pages = PdfiumSource::new(document, scale, max_pixels);

        let total = pages.page_count();
        anyhow::ensure!(
            page_num <= total,
            "Page {page_num} out of range: the document has {total} page(s)"
        );

        let raster = pages.rasterize(page_num - 1)?;
        let binary = binarize::binarize(raster, threshold);
        binary
            .save(&target)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    })
    .await
    .context("Preview task panicked")??;

    Ok(preview_path)
}

/// `scan.pdf` → `scan-white.pdf`, in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = file_stem_or(input, "output");
    input.with_file_name(format!("{stem}-white.pdf"))
}

fn file_stem_or(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// Parse `--layout` into `PageLayout`.
fn parse_layout(s: &str) -> Result<PageLayout> {
    match s.to_lowercase().as_str() {
        "single" | "1up" => Ok(PageLayout::Single),
        "4up" | "fourup" | "grid" => Ok(PageLayout::FourUp),
        other => anyhow::bail!("Unknown layout '{}': expected 'single' or '4up'", other),
    }
}
