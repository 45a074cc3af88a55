use crate::config::RunConfig;
use crate::error::RunError;
use crate::generation::addressing::{Addressing, ImagePosition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happens when one image cannot be decoded, watermarked or encoded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Log, leave the image out, keep numbering the following images as planned.
    #[default]
    Skip,
    /// Stop the run at the first failed image.
    Abort,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanOptions {
    pub write_captions: bool,
    pub save_task_grid: bool,
}

impl PlanOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            write_captions: config.writes_captions(),
            save_task_grid: config.save_task_grid,
        }
    }
}

/// One planned image write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteInstruction {
    pub iteration: usize,
    pub batch: usize,
    /// Index inside the batch
    pub slot: usize,
    #[serde(flatten)]
    pub position: ImagePosition,
    pub write_caption: bool,
    /// Last image of a task with at least two images while grids are enabled
    pub grid_candidate: bool,
}

/// Every write of a run, derived from the addressing and the stream shape alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationPlan {
    pub addressing: Addressing,
    pub total_images: usize,
    pub total_tasks: usize,
    pub instructions: Vec<WriteInstruction>,
}

impl OrchestrationPlan {
    pub fn build(
        addressing: &Addressing,
        batch_lens: &[usize],
        n_iter: usize,
        options: PlanOptions,
    ) -> Result<Self, RunError> {
        let total_images = batch_lens.iter().sum::<usize>() * n_iter;
        if let Addressing::ExplicitStep(step) = addressing {
            if *step > 0 && total_images > 1 {
                return Err(RunError::Config(format!(
                    "Explicit step {} names a single image, but the run produces {}",
                    step, total_images
                )));
            }
        }

        let mut instructions = Vec::with_capacity(total_images);
        let mut ordinal = 0;
        for iteration in 0..n_iter {
            for (batch, &len) in batch_lens.iter().enumerate() {
                for slot in 0..len {
                    let position = addressing.position(ordinal, total_images);
                    instructions.push(WriteInstruction {
                        iteration,
                        batch,
                        slot,
                        position,
                        write_caption: options.write_captions,
                        grid_candidate: options.save_task_grid
                            && position.is_task_end
                            && position.step_index >= 1,
                    });
                    ordinal += 1;
                }
            }
        }

        let total_tasks = instructions
            .iter()
            .filter(|i| i.position.is_task_start)
            .count();
        let plan = Self {
            addressing: addressing.clone(),
            total_images,
            total_tasks,
            instructions,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the invariants the executor relies on.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.instructions.len() != self.total_images {
            return Err(RunError::Contract(format!(
                "Plan total_images mismatch: expected {}, got {}",
                self.instructions.len(),
                self.total_images
            )));
        }
        if let Some(first) = self.instructions.first() {
            if !first.position.is_task_start {
                return Err(RunError::Contract(
                    "First image of a run must open a task".to_string(),
                ));
            }
        }
        for (expected, instruction) in self.instructions.iter().enumerate() {
            let position = &instruction.position;
            if position.ordinal != expected {
                return Err(RunError::Contract(format!(
                    "Plan ordinal gap: expected {}, got {}",
                    expected, position.ordinal
                )));
            }
            if position.is_task_start != (position.step_index == 0) {
                return Err(RunError::Contract(format!(
                    "Image {} opens a task at step {}",
                    position.ordinal, position.step_index
                )));
            }
        }
        Ok(())
    }

    pub fn instructions(&self) -> &[WriteInstruction] {
        &self.instructions
    }

    pub fn grid_count(&self) -> usize {
        self.instructions.iter().filter(|i| i.grid_candidate).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFailureDetail {
    pub ordinal: usize,
    pub task_index: usize,
    pub message: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub task_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Images processed, written or skipped
    pub sample_count: usize,
    pub tasks_opened: usize,
    pub images_written: usize,
    pub captions_written: usize,
    pub grids_written: usize,
    pub failures: Vec<ImageFailureDetail>,
}

impl RunSummary {
    pub fn new(task_root: PathBuf) -> Self {
        Self {
            task_root,
            started_at: Utc::now(),
            finished_at: None,
            sample_count: 0,
            tasks_opened: 0,
            images_written: 0,
            captions_written: 0,
            grids_written: 0,
            failures: Vec::new(),
        }
    }

    pub fn images_skipped(&self) -> usize {
        self.failures.len()
    }
}
