//! Read-only inventory of an existing output tree.
//!
//! Reports, per `task_<n>` directory under a task root, which step images and captions exist
//! and whether the task grid was written. Useful after an interrupted run: numbering, not file
//! presence, is what callers rely on, so gaps show up here.

use crate::error::RunError;
use crate::generation::layout::{parse_step_file_name, parse_task_dir_name, GRID_FILE_PREFIX};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files found in one task directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInventory {
    pub task_index: usize,
    pub dir: PathBuf,
    /// Step indices with an image, ascending
    pub steps: Vec<usize>,
    /// Step indices with a caption, ascending
    pub captions: Vec<usize>,
    pub has_grid: bool,
}

impl TaskInventory {
    /// Steps missing below the highest written step.
    pub fn gaps(&self) -> Vec<usize> {
        match self.steps.last() {
            Some(&last) => (0..last).filter(|s| self.steps.binary_search(s).is_err()).collect(),
            None => Vec::new(),
        }
    }
}

/// Scan `task_root` two levels deep. A missing root yields an empty inventory.
pub fn scan(task_root: &Path) -> Result<Vec<TaskInventory>, RunError> {
    if !task_root.exists() {
        return Ok(Vec::new());
    }

    let mut tasks: BTreeMap<usize, TaskInventory> = BTreeMap::new();
    let walker = WalkDir::new(task_root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| task_root.to_path_buf());
            RunError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let name = entry.file_name().to_string_lossy();

        if entry.depth() == 1 {
            if entry.file_type().is_dir() {
                if let Some(task_index) = parse_task_dir_name(&name) {
                    tasks.insert(
                        task_index,
                        TaskInventory {
                            task_index,
                            dir: entry.path().to_path_buf(),
                            ..TaskInventory::default()
                        },
                    );
                }
            }
            continue;
        }

        let Some(task_index) = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| parse_task_dir_name(&n.to_string_lossy()))
        else {
            continue;
        };
        let Some(task) = tasks.get_mut(&task_index) else {
            continue;
        };
        if let Some(step) = parse_step_file_name(&name, "png") {
            task.steps.push(step);
        } else if let Some(step) = parse_step_file_name(&name, "txt") {
            task.captions.push(step);
        } else if name.starts_with(GRID_FILE_PREFIX) {
            task.has_grid = true;
        }
    }

    let mut tasks: Vec<TaskInventory> = tasks.into_values().collect();
    for task in &mut tasks {
        task.steps.sort_unstable();
        task.captions.sort_unstable();
    }
    Ok(tasks)
}

/// Render an inventory as a table.
pub fn format_inventory_text(task_root: &Path, tasks: &[TaskInventory]) -> String {
    if tasks.is_empty() {
        return format!("No tasks under {}", task_root.display());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Task", "Images", "Captions", "Grid", "Gaps"]);
    for task in tasks {
        let gaps = task.gaps();
        table.add_row(vec![
            format!("task_{}", task.task_index),
            task.steps.len().to_string(),
            task.captions.len().to_string(),
            if task.has_grid { "yes" } else { "no" }.to_string(),
            if gaps.is_empty() {
                "-".to_string()
            } else {
                format!("{:?}", gaps)
            },
        ]);
    }
    format!("{}\n{}", task_root.display(), table)
}
