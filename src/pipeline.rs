//! Generation collaborators: conditioning, sampling and decoding contracts.
//!
//! The orchestrator drives these but never looks inside them. Model loading, the denoising
//! schedule and latent decoding all live behind these traits.

use crate::error::{ImageWriteError, PipelineError, RunError};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sampling algorithm selection. Interchangeable; the orchestrator only forwards the choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Ddim,
    Plms,
    Dpm,
}

impl std::fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SamplerKind::Ddim => "ddim",
            SamplerKind::Plms => "plms",
            SamplerKind::Dpm => "dpm",
        };
        f.write_str(name)
    }
}

/// Where the sampler's starting noise comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedSource {
    /// One start code, drawn from `seed`, shared by every batch of the run.
    Fixed { seed: u64 },
    /// Fresh noise per batch; `batch` is the running batch number across iterations.
    Stream { seed: u64, batch: usize },
}

/// Maps prompts to conditioning.
pub trait ConditioningProvider {
    type Conditioning;

    fn condition(&self, prompts: &[String]) -> Result<Self::Conditioning, PipelineError>;

    /// Conditioning for `batch_size` empty prompts, the guidance baseline.
    fn unconditional(&self, batch_size: usize) -> Result<Self::Conditioning, PipelineError>;
}

/// Everything a sampler receives for one batch.
#[derive(Debug)]
pub struct SampleRequest<'a, C> {
    pub steps: usize,
    pub conditioning: &'a C,
    pub batch_size: usize,
    /// Latent shape `[channels, height / factor, width / factor]`
    pub shape: [usize; 3],
    pub guidance_scale: f64,
    pub unconditional_conditioning: Option<&'a C>,
    pub eta: f64,
    pub seed: SeedSource,
}

/// Iterative denoiser producing a batch of latents.
pub trait Sampler<C> {
    type Latents;

    fn kind(&self) -> SamplerKind;

    fn sample(&mut self, request: SampleRequest<'_, C>) -> Result<Self::Latents, PipelineError>;
}

/// Maps latents back to pixel images, one per batch entry.
pub trait Decoder<L> {
    fn decode(&self, latents: &L) -> Result<Vec<RawImage>, PipelineError>;
}

/// A decoded image in row-major, channel-last byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Convert to an RGB buffer. Single-channel input is expanded to grey RGB.
    pub fn into_rgb(self) -> Result<RgbImage, ImageWriteError> {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.pixels.len() != expected {
            return Err(ImageWriteError::Malformed(format!(
                "expected {} bytes for {}x{}x{}, got {}",
                expected,
                self.width,
                self.height,
                self.channels,
                self.pixels.len()
            )));
        }
        let pixels = match self.channels {
            3 => self.pixels,
            1 => self.pixels.iter().flat_map(|&v| [v, v, v]).collect(),
            other => {
                return Err(ImageWriteError::Malformed(format!(
                    "unsupported channel count {}",
                    other
                )))
            }
        };
        RgbImage::from_raw(self.width, self.height, pixels).ok_or_else(|| {
            ImageWriteError::Malformed("pixel buffer does not match dimensions".to_string())
        })
    }
}

/// Ordered, finite sequence of prompt batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptStream {
    batches: Vec<Vec<String>>,
}

impl PromptStream {
    pub fn new(batches: Vec<Vec<String>>) -> Self {
        Self { batches }
    }

    /// Chunk a flat prompt list into batches of `batch_size`. The last batch may be shorter.
    pub fn from_prompts(prompts: Vec<String>, batch_size: usize) -> Result<Self, RunError> {
        if batch_size == 0 {
            return Err(RunError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        let batches = prompts
            .chunks(batch_size)
            .map(<[String]>::to_vec)
            .collect();
        Ok(Self { batches })
    }

    /// One prompt per non-empty line.
    pub fn read_lines(path: &Path, batch_size: usize) -> Result<Self, RunError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
        let prompts = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::from_prompts(prompts, batch_size)
    }

    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }

    pub fn batch_lens(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }

    pub fn total_prompts(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_prompts() == 0
    }
}
