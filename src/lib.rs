//! # metamorpher
//!
//! Convert images, audio, video, PDFs and documents between formats, one
//! queue at a time.
//!
//! ## Why this crate?
//!
//! Format conversion is mostly routing: the byte-level work belongs to
//! established engines (ffmpeg, pdfium, a Markdown renderer, a PDF writer).
//! What is left is deciding which engine to call for a given
//! `(source, target)` pair, running a queue of files through it without one
//! bad file sinking the rest, and delivering the results. That is what this
//! crate does.
//!
//! ## Flow
//!
//! ```text
//! files / URLs
//!  │
//!  ├─ 1. Intake    read sources, apply the allow-list      (intake)
//!  ├─ 2. Queue     one Pending task per file, pick targets  (session)
//!  ├─ 3. Dispatch  (source ext, target ext) → one rule       (dispatch)
//!  ├─ 4. Batch     sequential loop, per-task status         (batch)
//!  └─ 5. Deliver   atomic writes, staggered or zipped       (delivery)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metamorpher::{delivery, intake, run_batch, Engines, MorphConfig, Session};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MorphConfig::default();
//!     let engines = Engines::load(&config).await;
//!
//!     let mut session = Session::new();
//!     let source = intake::resolve_input("photo.png", config.download_timeout_secs).await?;
//!     let ids = session.intake(vec![source])?;
//!     session.set_target(ids[0], "webp")?;
//!
//!     let summary = run_batch(&mut session, &engines, &config).await?;
//!     eprintln!("{} converted, {} failed", summary.succeeded, summary.failed);
//!
//!     delivery::save_all(&session, Path::new("out"), std::time::Duration::ZERO).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `metamorph` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External programs
//!
//! Media conversions shell out to `ffmpeg`; PDF rasterisation loads the
//! pdfium shared library. Both are located at runtime, and a missing engine
//! only affects the conversions that need it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod filename;
pub mod formats;
pub mod intake;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, BatchSummary};
pub use config::{DocumentOptions, MorphConfig, MorphConfigBuilder, Orientation, PageSize};
pub use dispatch::{convert, DispatchRule};
pub use engine::{Engines, FfmpegTranscoder, PdfRasterizer, PdfiumRasterizer, Transcoder};
pub use error::{ConversionError, MorphError};
pub use formats::MediaCategory;
pub use intake::SourceFile;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{ConversionTask, ConvertedFile, Phase, Session, TaskId, TaskStatus};
