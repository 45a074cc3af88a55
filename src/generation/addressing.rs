//! Step addressing: how an image's position in the output stream maps to its task and step.
//!
//! Two regimes exist and are picked once per run. `StreamPosition` derives everything from the
//! image ordinal and the task boundary set; `ExplicitStep` hands naming to a caller that drives
//! stepping itself, one invocation per control-loop tick.

use crate::error::RunError;
use serde::{Deserialize, Serialize};

/// Global image ordinals at which a new task starts. Always contains 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct TaskBoundaries {
    starts: Vec<usize>,
}

impl TaskBoundaries {
    pub fn new(starts: impl IntoIterator<Item = usize>) -> Self {
        let mut starts: Vec<usize> = std::iter::once(0).chain(starts).collect();
        starts.sort_unstable();
        starts.dedup();
        Self { starts }
    }

    /// One task spanning the whole stream.
    pub fn single_task() -> Self {
        Self::new(std::iter::empty())
    }

    /// Parse a comma separated list such as `0,3,7`.
    pub fn parse(list: &str) -> Result<Self, RunError> {
        Ok(Self::new(Self::parse_starts(list)?))
    }

    /// The starts named in `list`, as written. An empty list stays empty.
    pub fn parse_starts(list: &str) -> Result<Vec<usize>, RunError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>().map_err(|e| {
                    RunError::Config(format!("Invalid task boundary '{}': {}", s, e))
                })
            })
            .collect()
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.starts.binary_search(&ordinal).is_ok()
    }

    /// Index of the task holding `ordinal` and the ordinal that opened it.
    pub fn task_of(&self, ordinal: usize) -> (usize, usize) {
        let opened = self.starts.partition_point(|&start| start <= ordinal);
        // starts[0] == 0, so at least one start precedes any ordinal
        (opened - 1, self.starts[opened - 1])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.starts
    }
}

impl Default for TaskBoundaries {
    fn default() -> Self {
        Self::single_task()
    }
}

impl From<Vec<usize>> for TaskBoundaries {
    fn from(starts: Vec<usize>) -> Self {
        Self::new(starts)
    }
}

impl From<TaskBoundaries> for Vec<usize> {
    fn from(boundaries: TaskBoundaries) -> Self {
        boundaries.starts
    }
}

/// Where a single image lands, computed without running anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePosition {
    /// Position in the flattened output stream of the run
    pub ordinal: usize,
    pub task_index: usize,
    /// Per-task running counter
    pub step_index: usize,
    /// Index used in `step_<k>` file names
    pub file_index: usize,
    pub is_task_start: bool,
    pub is_task_end: bool,
}

/// Addressing regime, selected once at run start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// Caller-supplied step index. Step 0 opens a new task for every image; a later step names
    /// the single image of the run inside `task_0`.
    ExplicitStep(usize),
    /// Tasks open at the boundary ordinals; steps count up within each task.
    StreamPosition(TaskBoundaries),
}

impl Addressing {
    /// Pick the regime from the task starts and step index the caller supplied.
    ///
    /// `starts` is taken as given, before 0 is added. A nonzero step index next to a non-empty
    /// start list is contradictory. Step 0 wins over any start list, since it already opens a
    /// task for every image.
    pub fn resolve(
        starts: Option<Vec<usize>>,
        step_index: Option<usize>,
    ) -> Result<Self, RunError> {
        match (starts, step_index) {
            (Some(starts), Some(step)) if step > 0 && !starts.is_empty() => {
                Err(RunError::Config(format!(
                    "Explicit step index {} cannot be combined with task boundaries {:?}",
                    step, starts
                )))
            }
            (_, Some(step)) => Ok(Addressing::ExplicitStep(step)),
            (starts, None) => Ok(Addressing::StreamPosition(TaskBoundaries::new(
                starts.unwrap_or_default(),
            ))),
        }
    }

    /// Position of image `ordinal` in a run producing `total` images.
    pub fn position(&self, ordinal: usize, total: usize) -> ImagePosition {
        match self {
            Addressing::ExplicitStep(0) => ImagePosition {
                ordinal,
                task_index: ordinal,
                step_index: 0,
                file_index: 0,
                is_task_start: true,
                is_task_end: true,
            },
            Addressing::ExplicitStep(step) => ImagePosition {
                ordinal,
                task_index: 0,
                step_index: 0,
                file_index: *step,
                is_task_start: true,
                is_task_end: true,
            },
            Addressing::StreamPosition(boundaries) => {
                let (task_index, opened_at) = boundaries.task_of(ordinal);
                let step_index = ordinal - opened_at;
                ImagePosition {
                    ordinal,
                    task_index,
                    step_index,
                    file_index: step_index,
                    is_task_start: step_index == 0,
                    is_task_end: boundaries.contains(ordinal + 1) || ordinal + 1 == total,
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Addressing::ExplicitStep(step) => format!("explicit step {}", step),
            Addressing::StreamPosition(boundaries) => {
                format!("stream position, task starts {:?}", boundaries.as_slice())
            }
        }
    }
}
