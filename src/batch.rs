//! The batch conversion loop.
//!
//! ## Guarantees
//!
//! - Tasks convert strictly one at a time, in queue order. Engines are never
//!   called concurrently.
//! - A failing task is recorded as Failed and the loop moves on; nothing a
//!   single engine call does can abort the run.
//! - A refused run changes nothing: the guards all run before the first
//!   status update.
//! - When [`run_batch`] returns `Ok`, every task it touched is Converted or
//!   Failed.

use crate::config::MorphConfig;
use crate::dispatch::{self, DispatchRule};
use crate::engine::Engines;
use crate::error::{ConversionError, MorphError};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::session::{Phase, Session, TaskStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome counts for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks already Converted before the run; they are left untouched.
    pub skipped: usize,
    pub duration_ms: u64,
}

impl BatchSummary {
    /// Tasks the run attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Convert every eligible task in `session`, in queue order.
///
/// # Errors
///
/// The run is refused, with the session unchanged, when:
/// - another run is in flight ([`MorphError::BatchInProgress`])
/// - the queue is empty ([`MorphError::QueueEmpty`])
/// - any task has no target format ([`MorphError::QueueNotReady`])
/// - an eligible task needs the transcoder and none is loaded
///   ([`MorphError::EngineNotReady`])
///
/// Per-task failures are not errors here; they are stored on the task and
/// counted in the returned [`BatchSummary`].
pub async fn run_batch(
    session: &mut Session,
    engines: &Engines,
    config: &MorphConfig,
) -> Result<BatchSummary, MorphError> {
    if session.phase() == Phase::Converting {
        return Err(MorphError::BatchInProgress);
    }
    if session.is_empty() {
        return Err(MorphError::QueueEmpty);
    }
    let unset = session.unset_targets();
    if !unset.is_empty() {
        return Err(MorphError::QueueNotReady { unset });
    }

    let eligible: Vec<usize> = session
        .tasks()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_eligible())
        .map(|(i, _)| i)
        .collect();

    if !engines.has_transcoder() {
        let needs_transcoder = eligible.iter().any(|&i| {
            let task = &session.tasks()[i];
            task.target_extension
                .as_deref()
                .is_some_and(|t| DispatchRule::select(&task.source_extension, t).needs_transcoder())
        });
        if needs_transcoder {
            return Err(MorphError::EngineNotReady);
        }
    }

    let total_start = Instant::now();
    let cb: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    let total = eligible.len();
    let mut summary = BatchSummary {
        skipped: session.len() - total,
        ..BatchSummary::default()
    };

    for &i in &eligible {
        let task = &mut session.tasks_mut()[i];
        task.status = TaskStatus::Converting;
        task.result = None;
        task.error = None;
    }
    session.set_phase(Phase::Converting);

    info!("Starting batch: {} task(s), {} skipped", total, summary.skipped);
    cb.on_batch_start(total);

    for (n, &i) in eligible.iter().enumerate() {
        let position = n + 1;
        let task_start = Instant::now();

        let outcome = match session.task_and_source(i) {
            Some((task, source)) => {
                cb.on_task_start(position, total, &task.name);
                dispatch::convert(task, source, engines, config).await
            }
            None => Err(ConversionError::MissingSource),
        };

        let task = &mut session.tasks_mut()[i];
        match outcome {
            Ok(file) => {
                debug!(
                    "Task {}/{} {} → {} ({} bytes, {}ms)",
                    position,
                    total,
                    task.name,
                    file.output_name,
                    file.size(),
                    task_start.elapsed().as_millis()
                );
                cb.on_task_complete(position, total, &file.output_name, file.size());
                task.status = TaskStatus::Converted;
                task.result = Some(file);
                summary.succeeded += 1;
            }
            Err(e) => {
                warn!("Task {}/{} {} failed: {}", position, total, task.name, e);
                cb.on_task_error(position, total, &task.name, &e);
                task.status = TaskStatus::Failed;
                task.error = Some(e);
                summary.failed += 1;
            }
        }
    }

    session.set_phase(Phase::Done);
    summary.duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {} converted, {} failed in {}ms",
        summary.succeeded, summary.failed, summary.duration_ms
    );
    cb.on_batch_complete(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::SourceFile;

    fn document_session(names: &[&str]) -> Session {
        let mut s = Session::new();
        let files = names
            .iter()
            .map(|n| SourceFile::new(*n, b"# hi".to_vec()))
            .collect();
        s.intake(files).unwrap();
        s
    }

    fn no_media_engines() -> Engines {
        use crate::engine::PdfiumRasterizer;
        Engines::new(None, Arc::new(PdfiumRasterizer::default()))
    }

    #[tokio::test]
    async fn empty_queue_is_refused() {
        let mut s = Session::new();
        let err = run_batch(&mut s, &no_media_engines(), &MorphConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MorphError::QueueEmpty));
    }

    #[tokio::test]
    async fn in_flight_run_is_refused() {
        let mut s = document_session(&["a.md"]);
        let id = s.tasks()[0].id;
        s.set_target(id, "html").unwrap();
        s.set_phase(Phase::Converting);

        let err = run_batch(&mut s, &no_media_engines(), &MorphConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MorphError::BatchInProgress));
        assert_eq!(s.tasks()[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn missing_transcoder_is_refused_before_any_change() {
        let mut s = Session::new();
        let ids = s
            .intake(vec![
                SourceFile::new("a.md", b"# a".to_vec()),
                SourceFile::new("b.png", b"png".to_vec()),
            ])
            .unwrap();
        s.set_target(ids[0], "html").unwrap();
        s.set_target(ids[1], "webp").unwrap();

        let err = run_batch(&mut s, &no_media_engines(), &MorphConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MorphError::EngineNotReady));
        assert!(s.tasks().iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn document_only_batch_runs_without_transcoder() {
        let mut s = document_session(&["a.md", "b.md"]);
        let ids: Vec<_> = s.tasks().iter().map(|t| t.id).collect();
        for id in ids {
            s.set_target(id, "html").unwrap();
        }

        let summary = run_batch(&mut s, &no_media_engines(), &MorphConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.attempted(), 2);
        assert_eq!(s.phase(), Phase::Done);
        assert_eq!(s.converted().count(), 2);
    }

    #[tokio::test]
    async fn rerun_skips_converted_tasks() {
        let mut s = document_session(&["a.md"]);
        let id = s.tasks()[0].id;
        s.set_target(id, "html").unwrap();
        let engines = no_media_engines();
        let config = MorphConfig::default();

        run_batch(&mut s, &engines, &config).await.unwrap();
        let again = run_batch(&mut s, &engines, &config).await.unwrap();
        assert_eq!(again.attempted(), 0);
        assert_eq!(again.skipped, 1);
        assert_eq!(s.tasks()[0].status, TaskStatus::Converted);
    }
}
