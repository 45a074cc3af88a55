//! Run orchestrator: walks the prompt stream through the collaborators and carries out the
//! orchestration plan, one image at a time.
//! Owns task directories, the open-task frame buffer and grid flushing; sampling, decoding and
//! watermarking stay behind their traits.

use crate::config::RunConfig;
use crate::error::{ImageWriteError, RunError};
use crate::generation::addressing::Addressing;
use crate::generation::layout::OutputLayout;
use crate::generation::plan::{
    ImageFailureDetail, ImageFailurePolicy, OrchestrationPlan, PlanOptions, RunSummary,
    WriteInstruction,
};
use crate::grid;
use crate::pipeline::{
    ConditioningProvider, Decoder, PromptStream, RawImage, SampleRequest, Sampler, SeedSource,
};
use crate::watermark::WatermarkEncoder;
use chrono::Utc;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Failure while writing one image: either contained to that image or fatal to the run.
enum StepFailure {
    Image(ImageWriteError),
    Run(RunError),
}

impl From<ImageWriteError> for StepFailure {
    fn from(err: ImageWriteError) -> Self {
        StepFailure::Image(err)
    }
}

impl From<crate::error::WatermarkError> for StepFailure {
    fn from(err: crate::error::WatermarkError) -> Self {
        StepFailure::Image(err.into())
    }
}

impl From<RunError> for StepFailure {
    fn from(err: RunError) -> Self {
        StepFailure::Run(err)
    }
}

/// The task currently receiving images.
struct OpenTask {
    index: usize,
    dir: PathBuf,
    /// Decoded, pre-watermark frames tagged with their step index
    frames: Vec<(usize, RgbImage)>,
}

/// Bookkeeping for one invocation. Discarded when the run returns.
struct RunState {
    sample_count: usize,
    all_step_count: usize,
    step_count: usize,
    task: Option<OpenTask>,
}

impl RunState {
    fn new() -> Self {
        Self {
            sample_count: 0,
            all_step_count: 0,
            step_count: 0,
            task: None,
        }
    }

    fn open_task(&mut self, index: usize, dir: PathBuf) {
        self.step_count = 0;
        self.task = Some(OpenTask {
            index,
            dir,
            frames: Vec::new(),
        });
    }

    fn advance(&mut self) {
        self.step_count += 1;
        self.all_step_count += 1;
        self.sample_count += 1;
    }
}

/// Drives a generation run against pluggable collaborators.
pub struct RunOrchestrator<'a, P, S, D, W> {
    config: &'a RunConfig,
    layout: OutputLayout,
    conditioning: &'a P,
    sampler: &'a mut S,
    decoder: &'a D,
    watermark: &'a W,
}

impl<'a, P, S, D, W> RunOrchestrator<'a, P, S, D, W>
where
    P: ConditioningProvider,
    S: Sampler<P::Conditioning>,
    D: Decoder<S::Latents>,
    W: WatermarkEncoder,
{
    pub fn new(
        config: &'a RunConfig,
        conditioning: &'a P,
        sampler: &'a mut S,
        decoder: &'a D,
        watermark: &'a W,
    ) -> Self {
        Self {
            config,
            layout: OutputLayout::from_config(config),
            conditioning,
            sampler,
            decoder,
            watermark,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Generate every image of `stream`, `n_iter` times over.
    ///
    /// Configuration problems are reported before anything touches disk. Directory creation
    /// and write failures abort the run; single-image failures follow the configured
    /// [`ImageFailurePolicy`].
    pub fn generate(
        &mut self,
        stream: &PromptStream,
        addressing: &Addressing,
    ) -> Result<RunSummary, RunError> {
        self.config.validate()?;
        if self.sampler.kind() != self.config.sampler {
            return Err(RunError::Config(format!(
                "Configured sampler '{}' does not match the supplied '{}' sampler",
                self.config.sampler,
                self.sampler.kind()
            )));
        }
        let plan = OrchestrationPlan::build(
            addressing,
            &stream.batch_lens(),
            self.config.n_iter,
            PlanOptions::from_config(self.config),
        )?;

        info!(
            addressing = %addressing.describe(),
            sampler = %self.sampler.kind(),
            total_images = plan.total_images,
            total_tasks = plan.total_tasks,
            task_root = %self.layout.task_root().display(),
            "Generation run started"
        );

        let mut state = RunState::new();
        let mut summary = RunSummary::new(self.layout.task_root().to_path_buf());
        let mut instructions = plan.instructions().iter();
        let mut batch_number = 0usize;

        for iteration in 0..self.config.n_iter {
            for prompts in stream.batches() {
                if prompts.is_empty() {
                    continue;
                }
                debug!(iteration, batch = batch_number, size = prompts.len(), "Sampling batch");
                let images = self.generate_batch(prompts, batch_number)?;
                batch_number += 1;
                if images.len() != prompts.len() {
                    return Err(RunError::Contract(format!(
                        "Decoder returned {} images for {} prompts",
                        images.len(),
                        prompts.len()
                    )));
                }

                for (raw, prompt) in images.into_iter().zip(prompts) {
                    let instruction = instructions.next().ok_or_else(|| {
                        RunError::Contract("More images produced than planned".to_string())
                    })?;
                    self.process_image(&mut state, &mut summary, instruction, raw, prompt)?;
                }
            }
        }

        summary.sample_count = state.sample_count;
        summary.finished_at = Some(Utc::now());
        info!(
            images_written = summary.images_written,
            images_skipped = summary.images_skipped(),
            grids_written = summary.grids_written,
            "Samples are ready in {}",
            self.layout.task_root().display()
        );
        Ok(summary)
    }

    fn generate_batch(
        &mut self,
        prompts: &[String],
        batch_number: usize,
    ) -> Result<Vec<RawImage>, RunError> {
        let unconditional = if self.config.uses_guidance() {
            Some(self.conditioning.unconditional(prompts.len())?)
        } else {
            None
        };
        let conditioning = self.conditioning.condition(prompts)?;
        let seed = if self.config.fixed_code {
            SeedSource::Fixed {
                seed: self.config.seed,
            }
        } else {
            SeedSource::Stream {
                seed: self.config.seed,
                batch: batch_number,
            }
        };

        let latents = self.sampler.sample(SampleRequest {
            steps: self.config.steps,
            conditioning: &conditioning,
            batch_size: prompts.len(),
            shape: self.config.shape.latent(),
            guidance_scale: self.config.scale,
            unconditional_conditioning: unconditional.as_ref(),
            eta: self.config.ddim_eta,
            seed,
        })?;
        Ok(self.decoder.decode(&latents)?)
    }

    fn process_image(
        &self,
        state: &mut RunState,
        summary: &mut RunSummary,
        instruction: &WriteInstruction,
        raw: RawImage,
        prompt: &str,
    ) -> Result<(), RunError> {
        let position = &instruction.position;

        // the boundary test sees the count from before this image
        if position.is_task_start {
            let dir = self.layout.ensure_task_dir(position.task_index)?;
            info!(task_index = position.task_index, dir = %dir.display(), "Task opened");
            state.open_task(position.task_index, dir);
            summary.tasks_opened += 1;
        }
        debug_assert_eq!(state.all_step_count, position.ordinal);

        let task = state.task.as_mut().ok_or_else(|| {
            RunError::Contract(format!(
                "Image {} produced before any task was opened",
                position.ordinal
            ))
        })?;
        if task.index != position.task_index {
            return Err(RunError::Contract(format!(
                "Image {} planned for task {} but task {} is open",
                position.ordinal, position.task_index, task.index
            )));
        }

        match self.write_image(task, instruction, raw, prompt) {
            Ok(caption_written) => {
                summary.images_written += 1;
                if caption_written {
                    summary.captions_written += 1;
                }
            }
            Err(StepFailure::Run(err)) => return Err(err),
            Err(StepFailure::Image(reason)) => {
                self.handle_image_failure(summary, position.ordinal, task.index, reason)?
            }
        }

        state.advance();

        if instruction.grid_candidate {
            if let Some(task) = state.task.as_ref() {
                match self.flush_grid(task) {
                    Ok(true) => summary.grids_written += 1,
                    Ok(false) => {}
                    Err(StepFailure::Run(err)) => return Err(err),
                    Err(StepFailure::Image(reason)) => {
                        self.handle_image_failure(summary, position.ordinal, task.index, reason)?
                    }
                }
            }
        }
        Ok(())
    }

    /// Write one image and its caption; returns whether a caption was written.
    fn write_image(
        &self,
        task: &mut OpenTask,
        instruction: &WriteInstruction,
        raw: RawImage,
        prompt: &str,
    ) -> Result<bool, StepFailure> {
        let position = &instruction.position;
        let decoded = raw.into_rgb()?;
        let marked = self.watermark.encode(decoded.clone())?;
        let bytes = encode_png(&marked)?;

        let image_path = self.layout.image_path(task.index, position.file_index);
        write_file(&image_path, &bytes)?;
        if instruction.write_caption {
            let caption_path = self.layout.caption_path(task.index, position.file_index);
            write_file(&caption_path, prompt.as_bytes())?;
        }
        debug!(
            ordinal = position.ordinal,
            task_index = task.index,
            file_index = position.file_index,
            path = %image_path.display(),
            "Image written"
        );

        if self.config.save_task_grid {
            task.frames.push((position.step_index, decoded));
        }
        Ok(instruction.write_caption)
    }

    /// Assemble and write the grid for `task`; returns false when there is nothing to show.
    fn flush_grid(&self, task: &OpenTask) -> Result<bool, StepFailure> {
        if task.frames.len() < 2 {
            debug!(
                task_index = task.index,
                frames = task.frames.len(),
                "Task too short for a grid"
            );
            return Ok(false);
        }
        let frames: Vec<&RgbImage> = task
            .frames
            .iter()
            .filter(|(step, _)| !(self.config.exclude_reference_frame_from_grid && *step == 0))
            .map(|(_, frame)| frame)
            .collect();
        if frames.is_empty() {
            return Ok(false);
        }

        let sheet = grid::assemble_row(&frames, self.config.grid_padding)?;
        let marked = self.watermark.encode(sheet)?;
        let bytes = encode_png(&marked)?;
        let grid_path = self.layout.grid_path(task.index);
        write_file(&grid_path, &bytes)?;
        info!(
            task_index = task.index,
            frames = frames.len(),
            dir = %task.dir.display(),
            "Task grid written"
        );
        Ok(true)
    }

    fn handle_image_failure(
        &self,
        summary: &mut RunSummary,
        ordinal: usize,
        task_index: usize,
        reason: ImageWriteError,
    ) -> Result<(), RunError> {
        match self.config.failure_policy {
            ImageFailurePolicy::Abort => Err(RunError::ImageFailed { ordinal, reason }),
            ImageFailurePolicy::Skip => {
                warn!(ordinal, task_index, error = %reason, "Image skipped");
                summary.failures.push(ImageFailureDetail {
                    ordinal,
                    task_index,
                    message: reason.to_string(),
                });
                Ok(())
            }
        }
    }
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ImageWriteError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), RunError> {
    std::fs::write(path, bytes).map_err(|e| RunError::io(path, e))
}
