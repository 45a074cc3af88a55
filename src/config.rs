//! Configuration System
//!
//! Run configuration for generation runs plus layered loading: built-in defaults, an optional
//! TOML file, then `STEPGEN_*` environment variables. The run configuration is read-only once a
//! run starts; the orchestrator only ever borrows it.

use crate::error::RunError;
use crate::generation::plan::ImageFailurePolicy;
use crate::logging::LoggingConfig;
use crate::pipeline::SamplerKind;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepgenConfig {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Requested output image shape and the latent downsampling factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    /// Latent channels
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// Image height in pixels
    #[serde(default = "default_side")]
    pub height: usize,

    /// Image width in pixels
    #[serde(default = "default_side")]
    pub width: usize,

    /// Downsampling factor between pixel and latent space
    #[serde(default = "default_factor")]
    pub factor: usize,
}

impl ImageShape {
    /// Latent shape handed to the sampler: `[channels, height / factor, width / factor]`.
    pub fn latent(&self) -> [usize; 3] {
        [
            self.channels,
            self.height / self.factor,
            self.width / self.factor,
        ]
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            height: default_side(),
            width: default_side(),
            factor: default_factor(),
        }
    }
}

/// Settings for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Output root
    #[serde(default = "default_outpath")]
    pub outpath: PathBuf,

    /// Dataset kind, first path segment under the output root
    #[serde(default = "default_data_type")]
    pub data_type: String,

    /// Write under `bridge/` instead of `origin/`
    #[serde(default)]
    pub use_bridge: bool,

    /// Task name
    #[serde(default = "default_task")]
    pub task: String,

    /// Append `_w_task_hint` to the task directory
    #[serde(default)]
    pub use_task_hint: bool,

    /// Sample batch size
    #[serde(default = "default_one")]
    pub n_samples: usize,

    /// Outer iterations over the prompt stream
    #[serde(default = "default_one")]
    pub n_iter: usize,

    /// Guidance scale; 1.0 disables the unconditional baseline
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Denoising steps
    #[serde(default = "default_steps")]
    pub steps: usize,

    #[serde(default)]
    pub ddim_eta: f64,

    #[serde(default)]
    pub sampler: SamplerKind,

    /// Reuse one start code for every batch
    #[serde(default)]
    pub fixed_code: bool,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub shape: ImageShape,

    #[serde(default = "default_true")]
    pub save_captions: bool,

    /// Task names that never get caption files (purely visual planning tasks)
    #[serde(default = "default_caption_suppressed_tasks")]
    pub caption_suppressed_tasks: Vec<String>,

    #[serde(default)]
    pub save_task_grid: bool,

    /// Leave the first image of each task (its reference frame) out of the grid
    #[serde(default = "default_true")]
    pub exclude_reference_frame_from_grid: bool,

    #[serde(default = "default_grid_padding")]
    pub grid_padding: u32,

    /// Signature embedded in every written image
    #[serde(default = "default_watermark")]
    pub watermark: String,

    #[serde(default)]
    pub failure_policy: ImageFailurePolicy,
}

fn default_outpath() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_data_type() -> String {
    "default".to_string()
}

fn default_task() -> String {
    "task".to_string()
}

fn default_one() -> usize {
    1
}

fn default_scale() -> f64 {
    9.0
}

fn default_steps() -> usize {
    50
}

fn default_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

fn default_caption_suppressed_tasks() -> Vec<String> {
    vec!["u-plan".to_string(), "m-plan".to_string()]
}

fn default_grid_padding() -> u32 {
    2
}

fn default_watermark() -> String {
    "SDV2".to_string()
}

fn default_channels() -> usize {
    4
}

fn default_side() -> usize {
    512
}

fn default_factor() -> usize {
    8
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            outpath: default_outpath(),
            data_type: default_data_type(),
            use_bridge: false,
            task: default_task(),
            use_task_hint: false,
            n_samples: default_one(),
            n_iter: default_one(),
            scale: default_scale(),
            steps: default_steps(),
            ddim_eta: 0.0,
            sampler: SamplerKind::default(),
            fixed_code: false,
            seed: default_seed(),
            shape: ImageShape::default(),
            save_captions: true,
            caption_suppressed_tasks: default_caption_suppressed_tasks(),
            save_task_grid: false,
            exclude_reference_frame_from_grid: true,
            grid_padding: default_grid_padding(),
            watermark: default_watermark(),
            failure_policy: ImageFailurePolicy::default(),
        }
    }
}

impl RunConfig {
    /// Reject configurations a run cannot start with. Called before any write.
    pub fn validate(&self) -> Result<(), RunError> {
        let mut problems = Vec::new();

        if self.n_samples == 0 {
            problems.push("n_samples must be at least 1".to_string());
        }
        if self.n_iter == 0 {
            problems.push("n_iter must be at least 1".to_string());
        }
        if self.steps == 0 {
            problems.push("steps must be at least 1".to_string());
        }
        if !self.scale.is_finite() {
            problems.push(format!("scale must be finite, got {}", self.scale));
        }
        if self.task.trim().is_empty() {
            problems.push("task cannot be empty".to_string());
        }
        if self.data_type.trim().is_empty() {
            problems.push("data_type cannot be empty".to_string());
        }
        if self.watermark.is_empty() {
            problems.push("watermark cannot be empty".to_string());
        }
        let shape = &self.shape;
        if shape.factor == 0 {
            problems.push("shape.factor must be at least 1".to_string());
        } else if shape.height % shape.factor != 0 || shape.width % shape.factor != 0 {
            problems.push(format!(
                "shape {}x{} is not divisible by factor {}",
                shape.height, shape.width, shape.factor
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RunError::Config(problems.join("; ")))
        }
    }

    /// Whether images of this run get a companion caption file.
    pub fn writes_captions(&self) -> bool {
        self.save_captions && !self.caption_suppressed_tasks.iter().any(|t| t == &self.task)
    }

    /// Whether the sampler needs an unconditional baseline.
    pub fn uses_guidance(&self) -> bool {
        self.scale != 1.0
    }
}

/// Loads [`StepgenConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    pub const ENV_PREFIX: &'static str = "STEPGEN";

    /// Defaults, then the optional file, then environment overrides
    /// (`STEPGEN_RUN__N_SAMPLES=4`, `STEPGEN_LOGGING__LEVEL=debug`).
    pub fn load(config_file: Option<&Path>) -> Result<StepgenConfig, RunError> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(RunError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("run.caption_suppressed_tasks"),
        );

        let config: StepgenConfig = builder.build()?.try_deserialize()?;
        config.run.validate()?;
        Ok(config)
    }

    /// Load from a single file without environment overrides.
    pub fn load_from_file(path: &Path) -> Result<StepgenConfig, RunError> {
        let config: StepgenConfig = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        config.run.validate()?;
        Ok(config)
    }
}
