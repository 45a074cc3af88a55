//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::RunError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &RunError) -> String {
    match e {
        RunError::Config(_) => format!(
            "{}\nCheck --config, STEPGEN_* variables and command flags.",
            e
        ),
        RunError::Io { .. } => format!("{}\nThe output location must be writable.", e),
        _ => e.to_string(),
    }
}
