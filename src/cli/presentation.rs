//! CLI presentation: text and JSON rendering of plans and configuration.

use crate::config::StepgenConfig;
use crate::error::RunError;
use crate::generation::{OrchestrationPlan, OutputLayout};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use std::path::PathBuf;

/// Files one planned image produces.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedFiles {
    pub ordinal: usize,
    pub task_index: usize,
    pub step_index: usize,
    pub image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub task_root: PathBuf,
    pub total_images: usize,
    pub total_tasks: usize,
    pub files: Vec<PlannedFiles>,
}

impl PlanReport {
    pub fn new(plan: &OrchestrationPlan, layout: &OutputLayout) -> Self {
        let files = plan
            .instructions()
            .iter()
            .map(|instruction| {
                let position = &instruction.position;
                PlannedFiles {
                    ordinal: position.ordinal,
                    task_index: position.task_index,
                    step_index: position.step_index,
                    image: layout.image_path(position.task_index, position.file_index),
                    caption: instruction
                        .write_caption
                        .then(|| layout.caption_path(position.task_index, position.file_index)),
                    grid: instruction
                        .grid_candidate
                        .then(|| layout.grid_path(position.task_index)),
                }
            })
            .collect();
        Self {
            task_root: layout.task_root().to_path_buf(),
            total_images: plan.total_images,
            total_tasks: plan.total_tasks,
            files,
        }
    }
}

pub fn format_plan_text(report: &PlanReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Task", "Step", "Image", "Caption", "Grid"]);
    for file in &report.files {
        let relative = |path: &PathBuf| {
            path.strip_prefix(&report.task_root)
                .unwrap_or(path)
                .display()
                .to_string()
        };
        table.add_row(vec![
            file.ordinal.to_string(),
            file.task_index.to_string(),
            file.step_index.to_string(),
            relative(&file.image),
            file.caption.as_ref().map(relative).unwrap_or_else(|| "-".to_string()),
            file.grid.as_ref().map(relative).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    format!(
        "{}\n{} images in {} tasks\n{}",
        report.task_root.display(),
        report.total_images,
        report.total_tasks,
        table
    )
}

pub fn format_json<T: Serialize>(value: &T) -> Result<String, RunError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| RunError::Config(format!("Failed to serialize output: {}", e)))
}

pub fn format_config(config: &StepgenConfig) -> Result<String, RunError> {
    format_json(config)
}
