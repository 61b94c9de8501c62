//! The conversion queue and its controller state.
//!
//! A [`Session`] owns everything that changes while a user works: the
//! ordered task list, the source payloads and the batch [`Phase`]. It is
//! passed by `&mut` to [`crate::batch::run_batch`], which is the only code
//! that moves tasks through Converting into Converted or Failed.
//!
//! Queue order is insertion order, which is also conversion order and
//! display order.

use crate::error::{ConversionError, MorphError};
use crate::filename;
use crate::formats::{self, MediaCategory};
use crate::intake::{self, SourceFile};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Stable identifier of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Converting,
    Converted,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Converting => "converting",
            TaskStatus::Converted => "converted",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A finished conversion: payload plus the name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedFile {
    pub output_name: String,
    pub media_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ConvertedFile {
    pub fn new(output_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let output_name = output_name.into();
        let media_type = formats::media_type_for(filename::extension(&output_name));
        Self {
            output_name,
            media_type,
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// One entry in the working queue.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionTask {
    pub id: TaskId,
    pub name: String,
    pub size: usize,
    pub media_type: String,
    pub category: MediaCategory,
    /// Derived from the name at intake; never changes afterwards.
    pub source_extension: String,
    /// `None` means "not ready".
    pub target_extension: Option<String>,
    pub status: TaskStatus,
    /// Present only when `status` is Converted.
    pub result: Option<ConvertedFile>,
    /// Present only when `status` is Failed.
    pub error: Option<ConversionError>,
}

impl ConversionTask {
    /// Target formats this task may pick.
    pub fn choices(&self) -> Vec<&'static str> {
        formats::targets_for(self.category, &self.source_extension)
    }

    /// Ready for the next batch run.
    pub fn is_eligible(&self) -> bool {
        self.target_extension.is_some()
            && matches!(self.status, TaskStatus::Pending | TaskStatus::Failed)
    }
}

/// Batch lifecycle of the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No batch has run since the last intake or reset.
    #[default]
    Idle,
    /// A batch run is in flight.
    Converting,
    /// The last batch run finished.
    Done,
}

/// Controller state for one conversion session.
#[derive(Debug, Default)]
pub struct Session {
    tasks: Vec<ConversionTask>,
    sources: HashMap<TaskId, SourceFile>,
    next_id: u64,
    phase: Phase,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue with one Pending task per file.
    ///
    /// Every file is checked against the allow-list first; if any is
    /// rejected nothing changes.
    pub fn intake(&mut self, files: Vec<SourceFile>) -> Result<Vec<TaskId>, MorphError> {
        self.ensure_idle()?;

        let categories = files
            .iter()
            .map(intake::admit)
            .collect::<Result<Vec<_>, _>>()?;

        self.tasks.clear();
        self.sources.clear();
        self.phase = Phase::Idle;

        let mut ids = Vec::with_capacity(files.len());
        for (file, category) in files.into_iter().zip(categories) {
            let id = TaskId(self.next_id);
            self.next_id += 1;

            debug!("Queued {} as {} (task {})", file.name, category, id);
            self.tasks.push(ConversionTask {
                id,
                name: file.name.clone(),
                size: file.size(),
                media_type: file.media_type.clone(),
                category,
                source_extension: file.extension().to_string(),
                target_extension: None,
                status: TaskStatus::Pending,
                result: None,
                error: None,
            });
            self.sources.insert(id, file);
            ids.push(id);
        }

        info!("Intake: {} file(s) queued", ids.len());
        Ok(ids)
    }

    /// Choose the output format of a Pending task.
    pub fn set_target(&mut self, id: TaskId, target: &str) -> Result<(), MorphError> {
        self.ensure_idle()?;
        let task = self.task_mut(id)?;

        if task.status != TaskStatus::Pending {
            return Err(MorphError::TaskLocked {
                name: task.name.clone(),
                status: task.status.to_string(),
            });
        }

        let target = target.trim().trim_start_matches('.').to_ascii_lowercase();
        let choices = task.choices();
        if !choices.contains(&target.as_str()) {
            return Err(MorphError::UnsupportedTarget {
                name: task.name.clone(),
                target,
                choices: choices.iter().map(|c| c.to_string()).collect(),
            });
        }

        debug!("Task {} ({}) → {}", id, task.name, target);
        task.target_extension = Some(target);
        Ok(())
    }

    /// Drop a task from the queue. Converted tasks can only be downloaded
    /// or cleared by [`Session::reset`].
    pub fn remove(&mut self, id: TaskId) -> Result<SourceFile, MorphError> {
        self.ensure_idle()?;
        let index = self.index_of(id)?;

        let task = &self.tasks[index];
        if task.status == TaskStatus::Converted {
            return Err(MorphError::TaskLocked {
                name: task.name.clone(),
                status: task.status.to_string(),
            });
        }

        let task = self.tasks.remove(index);
        let source = self
            .sources
            .remove(&id)
            .ok_or_else(|| MorphError::Internal(format!("task {id} has no source payload")))?;

        if self.tasks.is_empty() {
            self.phase = Phase::Idle;
        }
        debug!("Removed task {} ({})", id, task.name);
        Ok(source)
    }

    /// Clear the whole queue.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.sources.clear();
        self.phase = Phase::Idle;
        debug!("Session reset");
    }

    /// Every task has a target and the queue is not empty.
    pub fn is_ready(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.target_extension.is_some())
    }

    /// Names of tasks still waiting for a target.
    pub fn unset_targets(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.target_extension.is_none())
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tasks(&self) -> &[ConversionTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&ConversionTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn source(&self, id: TaskId) -> Option<&SourceFile> {
        self.sources.get(&id)
    }

    /// Tasks the next batch run will convert, in queue order.
    pub fn eligible(&self) -> impl Iterator<Item = &ConversionTask> {
        self.tasks.iter().filter(|t| t.is_eligible())
    }

    /// Tasks that finished with a payload, in queue order.
    pub fn converted(&self) -> impl Iterator<Item = &ConversionTask> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Converted && t.result.is_some())
    }

    // ── Batch-loop access ────────────────────────────────────────────────

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [ConversionTask] {
        &mut self.tasks
    }

    pub(crate) fn task_and_source(&self, index: usize) -> Option<(&ConversionTask, &SourceFile)> {
        let task = self.tasks.get(index)?;
        let source = self.sources.get(&task.id)?;
        Some((task, source))
    }

    fn ensure_idle(&self) -> Result<(), MorphError> {
        if self.phase == Phase::Converting {
            return Err(MorphError::BatchInProgress);
        }
        Ok(())
    }

    fn index_of(&self, id: TaskId) -> Result<usize, MorphError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(MorphError::UnknownTask { id: id.0 })
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut ConversionTask, MorphError> {
        let index = self.index_of(id)?;
        Ok(&mut self.tasks[index])
    }
}
