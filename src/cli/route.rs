//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_config, format_json, format_plan_text, PlanReport};
use crate::config::{ConfigLoader, StepgenConfig};
use crate::error::RunError;
use crate::generation::{Addressing, OrchestrationPlan, OutputLayout, PlanOptions, TaskBoundaries};
use crate::inventory;
use crate::pipeline::PromptStream;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runtime context for CLI execution: the loaded configuration.
pub struct RunContext {
    config: StepgenConfig,
}

impl RunContext {
    /// Load configuration from defaults, the optional file and the environment.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, RunError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self { config })
    }

    pub fn from_config(config: StepgenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StepgenConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, RunError> {
        match command {
            Commands::Plan {
                prompts,
                boundaries,
                step,
                format,
            } => self.handle_plan(prompts, boundaries.as_deref(), *step, format),
            Commands::Inspect { root, format } => self.handle_inspect(root.as_deref(), format),
            Commands::Config => format_config(&self.config),
        }
    }

    fn handle_plan(
        &self,
        prompts: &Path,
        boundaries: Option<&str>,
        step: Option<usize>,
        format: &str,
    ) -> Result<String, RunError> {
        let run = &self.config.run;
        let boundaries = boundaries.map(TaskBoundaries::parse_starts).transpose()?;
        let addressing = Addressing::resolve(boundaries, step)?;
        let stream = PromptStream::read_lines(prompts, run.n_samples)?;
        debug!(prompts = stream.total_prompts(), "Prompt file loaded");

        let plan = OrchestrationPlan::build(
            &addressing,
            &stream.batch_lens(),
            run.n_iter,
            PlanOptions::from_config(run),
        )?;
        info!(
            addressing = %addressing.describe(),
            total_images = plan.total_images,
            total_tasks = plan.total_tasks,
            "Plan built"
        );

        let report = PlanReport::new(&plan, &OutputLayout::from_config(run));
        match format {
            "json" => format_json(&report),
            "text" => Ok(format_plan_text(&report)),
            other => Err(unknown_format(other)),
        }
    }

    fn handle_inspect(&self, root: Option<&Path>, format: &str) -> Result<String, RunError> {
        let layout = OutputLayout::from_config(&self.config.run);
        let task_root = root.unwrap_or_else(|| layout.task_root());
        let tasks = inventory::scan(task_root)?;
        match format {
            "json" => format_json(&tasks),
            "text" => Ok(inventory::format_inventory_text(task_root, &tasks)),
            other => Err(unknown_format(other)),
        }
    }
}

fn unknown_format(format: &str) -> RunError {
    RunError::Config(format!(
        "Invalid output format: {} (must be 'text' or 'json')",
        format
    ))
}
