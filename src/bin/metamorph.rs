//! CLI binary for metamorpher.
//!
//! A thin shim over the library crate that maps CLI flags to `MorphConfig`,
//! drives one `Session` per invocation and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use metamorpher::delivery::{self, DEFAULT_ZIP_NAME};
use metamorpher::engine::{archive, pdf};
use metamorpher::{
    formats, intake, run_batch, BatchProgressCallback, BatchSummary, ConversionError,
    ConversionTask, DocumentOptions, Engines, MorphConfig, Orientation, PageSize,
    Session, SourceFile, TaskStatus,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten `s` to at most `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

fn human_bytes(n: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per task.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the task currently converting.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading engines…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} file(s)…"))
        ));
    }

    fn on_task_start(&self, _position: usize, _total: usize, name: &str) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(truncate(name, 40));
    }

    fn on_task_complete(&self, position: usize, total: usize, output_name: &str, bytes: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            position,
            total,
            output_name,
            dim(&human_bytes(bytes)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_task_error(&self, position: usize, total: usize, name: &str, error: &ConversionError) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            position,
            total,
            name,
            red(&truncate(&error.to_string(), 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();
        let attempted = summary.attempted();
        if summary.failed == 0 {
            eprintln!(
                "{} {} file(s) converted successfully",
                green("✔"),
                bold(&summary.succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) converted  ({} failed)",
                if summary.failed == attempted {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&summary.succeeded.to_string()),
                attempted,
                red(&summary.failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert an image
  metamorph convert photo.png --to webp

  # Mixed queue: one target per file
  metamorph convert notes.md invoice.pdf clip.mov \
      --map notes.md=html --map invoice.pdf=jpg --map clip.mov=mp4 -o out/

  # Everything into one archive
  metamorph convert a.png b.png --to jpg --zip -o out/

  # What can this file become?
  metamorph targets report.docx song.flac

  # Photos into a PDF, one per page
  metamorph images-to-pdf scan1.jpg scan2.jpg -o scans.pdf --page-size letter

  # Unpack a pages archive
  metamorph extract invoice_pages.zip -o pages/

CONVERSIONS:
  pdf            → png, jpg, jpeg   (multi-page PDFs produce NAME_pages.zip)
  md, markdown   → pdf, html
  html, htm      → pdf
  txt            → pdf
  docx           → pdf, html, md
  video          → video, audio, still image (frame at 1s)
  audio          → audio
  image          → image
  anything       → 3gp              (20 fps, 352x288, AAC mono 8 kHz)

ENVIRONMENT VARIABLES:
  METAMORPH_FFMPEG        Path to the ffmpeg binary
  PDFIUM_LIB_PATH         Directory (or file) holding libpdfium
  RUST_LOG                Override log filter (e.g. metamorpher=debug)
"#;

/// Convert images, audio, video, PDFs and documents between formats.
#[derive(Parser, Debug)]
#[command(
    name = "metamorph",
    version,
    about = "Convert images, audio, video, PDFs and documents between formats",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "METAMORPH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "METAMORPH_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "METAMORPH_NO_PROGRESS")]
    no_progress: bool,

    /// ffmpeg binary used for image, audio and video conversions.
    #[arg(long, global = true, env = "METAMORPH_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Directory (or file) holding the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert files or URLs and save the results.
    Convert(ConvertArgs),

    /// List the output formats each input can be converted to.
    Targets {
        /// Local file paths or HTTP/HTTPS URLs.
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Combine images into a PDF, one image per page.
    ImagesToPdf(ImagesToPdfArgs),

    /// Unpack a zip archive.
    Extract {
        /// Archive to unpack.
        zip: PathBuf,

        /// Destination directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Target extension for every input (e.g. webp, mp3, pdf).
    #[arg(long, env = "METAMORPH_TO")]
    to: Option<String>,

    /// Per-file target, overriding --to. Repeatable.
    #[arg(long = "map", value_name = "NAME=EXT")]
    map: Vec<String>,

    /// Directory the results are written to.
    #[arg(short, long, env = "METAMORPH_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// Write one converted-files.zip instead of individual files.
    #[arg(long)]
    zip: bool,

    /// Print a JSON report of every task to stdout.
    #[arg(long)]
    json: bool,

    /// Delay between saved files in milliseconds.
    #[arg(long, env = "METAMORPH_STAGGER_MS", default_value_t = 800)]
    stagger_ms: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "METAMORPH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF page scale when rasterising (0.5–8).
    #[arg(long, env = "METAMORPH_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Longest side in pixels of a rasterised PDF page.
    #[arg(long, env = "METAMORPH_MAX_PIXELS", default_value_t = 5000)]
    max_pixels: u32,

    /// JPEG quality for rasterised PDF pages (1–100).
    #[arg(long, env = "METAMORPH_JPEG_QUALITY", default_value_t = 95)]
    jpeg_quality: u8,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Page size for generated PDFs: a4, letter, legal.
    #[arg(long, env = "METAMORPH_PAGE_SIZE", default_value = "a4")]
    page_size: String,

    /// Page orientation for generated PDFs: portrait, landscape.
    #[arg(long, env = "METAMORPH_ORIENTATION", default_value = "portrait")]
    orientation: String,

    /// Body font size in points for generated PDFs.
    #[arg(long, env = "METAMORPH_FONT_SIZE", default_value_t = 12.0)]
    font_size: f32,

    /// Page margin in millimetres for generated PDFs.
    #[arg(long, env = "METAMORPH_MARGIN", default_value_t = 20.0)]
    margin: f32,
}

#[derive(Args, Debug)]
struct ImagesToPdfArgs {
    /// Images, in page order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output PDF path.
    #[arg(short, long)]
    output: PathBuf,

    /// a4, letter, legal.
    #[arg(long, default_value = "a4")]
    page_size: String,

    /// portrait, landscape.
    #[arg(long, default_value = "portrait")]
    orientation: String,

    /// Margin around each image in millimetres.
    #[arg(long, default_value_t = 10.0)]
    margin: f32,

    /// Embed each image as JPEG at this quality (1-100) instead of lossless RGB.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,
}

/// JSON report printed by `convert --json`.
#[derive(Serialize)]
struct Report<'a> {
    summary: &'a BatchSummary,
    tasks: &'a [ConversionTask],
    saved: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let json = matches!(&cli.command, Command::Convert(a) if a.json);
    let show_progress = !cli.quiet && !cli.no_progress && !json;
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

    match &cli.command {
        Command::Convert(args) => run_convert(&cli, args, show_progress).await,
        Command::Targets { inputs } => run_targets(inputs).await,
        Command::ImagesToPdf(args) => run_images_to_pdf(&cli, args).await,
        Command::Extract { zip, output } => run_extract(&cli, zip, output).await,
    }
}

async fn run_convert(cli: &Cli, args: &ConvertArgs, show_progress: bool) -> Result<()> {
    let mut config = build_config(cli, args)?;
    let mapping = parse_map(&args.map)?;

    // ── Intake ───────────────────────────────────────────────────────────
    let mut sources = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let source = intake::resolve_input(input, config.download_timeout_secs)
            .await
            .with_context(|| format!("Failed to read '{input}'"))?;
        sources.push(source);
    }

    let mut session = Session::new();
    let ids = session.intake(sources).context("Files rejected")?;

    for (id, input) in ids.iter().zip(&args.inputs) {
        let Some(task) = session.task(*id) else {
            continue;
        };
        let target = mapping
            .get(&task.name)
            .or_else(|| mapping.get(input.as_str()))
            .or(args.to.as_ref())
            .cloned();
        if let Some(target) = target {
            session
                .set_target(*id, &target)
                .context("Invalid target format")?;
        }
    }

    // ── Convert ──────────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    if let Some(cb) = &progress {
        config.progress_callback = Some(cb.clone() as Arc<dyn BatchProgressCallback>);
    }

    let engines = Engines::load(&config).await;
    let summary = match run_batch(&mut session, &engines, &config).await {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(cb) = &progress {
                cb.bar.finish_and_clear();
            }
            return Err(e).context("Conversion could not start");
        }
    };

    if !show_progress && !cli.quiet && !args.json {
        for task in session.tasks() {
            match (&task.status, &task.result, &task.error) {
                (TaskStatus::Converted, Some(file), _) => eprintln!(
                    "  {} {}  →  {}  {}",
                    green("✓"),
                    task.name,
                    file.output_name,
                    dim(&human_bytes(file.size()))
                ),
                (_, _, Some(e)) => {
                    eprintln!("  {} {}  {}", red("✗"), task.name, red(&e.to_string()))
                }
                _ => {}
            }
        }
    }

    // ── Deliver ──────────────────────────────────────────────────────────
    let saved = if summary.succeeded == 0 {
        Vec::new()
    } else if args.zip {
        vec![delivery::save_all_as_zip(&session, &args.output, DEFAULT_ZIP_NAME)
            .await
            .context("Failed to save results")?]
    } else {
        let stagger = Duration::from_millis(config.download_stagger_ms);
        delivery::save_all(&session, &args.output, stagger)
            .await
            .context("Failed to save results")?
    };

    if args.json {
        let report = Report {
            summary: &summary,
            tasks: session.tasks(),
            saved,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet && !saved.is_empty() {
        eprintln!(
            "{}  {} file(s)  {}ms  →  {}",
            if summary.failed == 0 { green("✔") } else { cyan("⚠") },
            saved.len(),
            summary.duration_ms,
            bold(&args.output.display().to_string()),
        );
    }

    if summary.succeeded == 0 && summary.failed > 0 {
        bail!("All {} conversion(s) failed", summary.failed);
    }
    Ok(())
}

async fn run_targets(inputs: &[String]) -> Result<()> {
    for input in inputs {
        let source = if intake::is_url(input) {
            intake::resolve_input(input, 30)
                .await
                .with_context(|| format!("Failed to read '{input}'"))?
        } else {
            let name = Path::new(input)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.clone());
            SourceFile::new(name, Vec::new())
        };

        match intake::admit(&source) {
            Ok(category) => {
                let choices = formats::targets_for(category, source.extension());
                println!(
                    "{}  {}  {}",
                    bold(&source.name),
                    dim(&category.to_string()),
                    choices.join(" ")
                );
            }
            Err(e) => println!("{}  {}", bold(&source.name), red(&e.to_string())),
        }
    }
    Ok(())
}

async fn run_images_to_pdf(cli: &Cli, args: &ImagesToPdfArgs) -> Result<()> {
    let page_size: PageSize = args.page_size.parse()?;
    let orientation: Orientation = args.orientation.parse()?;

    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        images.push(bytes);
    }

    let count = images.len();
    let (margin, quality) = (args.margin, args.quality);
    let bytes = tokio::task::spawn_blocking(move || {
        pdf::images_to_pdf(&images, page_size, orientation, margin, quality)
    })
    .await
    .context("PDF task panicked")?
    .context("Failed to build PDF")?;

    let path = delivery::write_atomic(&args.output, &bytes).await?;
    if !cli.quiet {
        eprintln!(
            "{} {} image(s)  →  {}",
            green("✔"),
            count,
            bold(&path.display().to_string())
        );
    }
    Ok(())
}

async fn run_extract(cli: &Cli, zip: &Path, output: &Path) -> Result<()> {
    let bytes = tokio::fs::read(zip)
        .await
        .with_context(|| format!("Failed to read {}", zip.display()))?;
    let entries = archive::unpack(&bytes).context("Failed to read archive")?;

    for (name, payload) in &entries {
        delivery::write_atomic(&output.join(name), payload).await?;
        if !cli.quiet {
            eprintln!("  {} {}", green("✓"), name);
        }
    }
    if !cli.quiet {
        eprintln!(
            "{} {} file(s)  →  {}",
            green("✔"),
            entries.len(),
            bold(&output.display().to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `MorphConfig`.
fn build_config(cli: &Cli, args: &ConvertArgs) -> Result<MorphConfig> {
    let document = DocumentOptions {
        page_size: args.layout.page_size.parse()?,
        orientation: args.layout.orientation.parse()?,
        font_size: args.layout.font_size,
        margin_mm: args.layout.margin,
    };

    let mut builder = MorphConfig::builder()
        .pdf_render_scale(args.render_scale)
        .max_rendered_pixels(args.max_pixels)
        .jpeg_quality(args.jpeg_quality)
        .document(document)
        .ffmpeg_path(&cli.ffmpeg)
        .download_stagger_ms(args.stagger_ms)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }

    builder.build().context("Invalid configuration")
}

/// Parse repeated `--map NAME=EXT` pairs.
fn parse_map(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let Some((name, ext)) = pair.rsplit_once('=') else {
            bail!("Invalid --map '{pair}': expected NAME=EXT");
        };
        let (name, ext) = (name.trim(), ext.trim());
        if name.is_empty() || ext.is_empty() {
            bail!("Invalid --map '{pair}': expected NAME=EXT");
        }
        map.insert(name.to_string(), ext.to_string());
    }
    Ok(map)
}
