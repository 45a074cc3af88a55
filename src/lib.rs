//! Stepgen: task-structured text-to-image generation runs
//!
//! Walks a stream of prompts through pluggable conditioning, sampling and decoding
//! collaborators, groups the resulting images into tasks with deterministic step numbering,
//! watermarks every output, and optionally writes a contact-sheet grid per task.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod grid;
pub mod inventory;
pub mod logging;
pub mod pipeline;
pub mod watermark;
