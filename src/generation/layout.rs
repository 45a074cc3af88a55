//! Output tree naming:
//! `<outpath>/<data_type>/{bridge|origin}/<task>[_w_task_hint]/task_<n>/{step_<k>.png, step_<k>.txt, task-grid-<n>.png}`

use crate::config::RunConfig;
use crate::error::RunError;
use std::path::{Path, PathBuf};

pub const TASK_HINT_SUFFIX: &str = "_w_task_hint";
pub const TASK_DIR_PREFIX: &str = "task_";
pub const STEP_FILE_PREFIX: &str = "step_";
pub const GRID_FILE_PREFIX: &str = "task-grid-";

/// Resolves every path a run writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    task_root: PathBuf,
}

impl OutputLayout {
    pub fn from_config(config: &RunConfig) -> Self {
        let variant = if config.use_bridge { "bridge" } else { "origin" };
        let task_segment = if config.use_task_hint {
            format!("{}{}", config.task, TASK_HINT_SUFFIX)
        } else {
            config.task.clone()
        };
        Self {
            task_root: config
                .outpath
                .join(&config.data_type)
                .join(variant)
                .join(task_segment),
        }
    }

    /// Directory holding every `task_<n>` directory of this configuration.
    pub fn task_root(&self) -> &Path {
        &self.task_root
    }

    pub fn task_dir(&self, task_index: usize) -> PathBuf {
        self.task_root.join(format!("{}{}", TASK_DIR_PREFIX, task_index))
    }

    pub fn image_path(&self, task_index: usize, file_index: usize) -> PathBuf {
        self.task_dir(task_index)
            .join(format!("{}{}.png", STEP_FILE_PREFIX, file_index))
    }

    pub fn caption_path(&self, task_index: usize, file_index: usize) -> PathBuf {
        self.task_dir(task_index)
            .join(format!("{}{}.txt", STEP_FILE_PREFIX, file_index))
    }

    pub fn grid_path(&self, task_index: usize) -> PathBuf {
        self.task_dir(task_index)
            .join(format!("{}{}.png", GRID_FILE_PREFIX, task_index))
    }

    /// Create the task directory and its parents. Existing directories are fine.
    pub fn ensure_task_dir(&self, task_index: usize) -> Result<PathBuf, RunError> {
        let dir = self.task_dir(task_index);
        std::fs::create_dir_all(&dir).map_err(|e| RunError::io(&dir, e))?;
        Ok(dir)
    }
}

/// Parse the `<n>` out of `task_<n>`.
pub fn parse_task_dir_name(name: &str) -> Option<usize> {
    name.strip_prefix(TASK_DIR_PREFIX)?.parse().ok()
}

/// Parse the `<k>` out of `step_<k>.<ext>`.
pub fn parse_step_file_name(name: &str, extension: &str) -> Option<usize> {
    name.strip_prefix(STEP_FILE_PREFIX)?
        .strip_suffix(extension)?
        .strip_suffix('.')?
        .parse()
        .ok()
}
