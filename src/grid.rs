//! Contact-sheet assembly for task grids.

use crate::error::ImageWriteError;
use image::{imageops, Rgb, RgbImage};

/// Lay `frames` out left to right with `padding` black pixels around and between cells.
pub fn assemble_row(frames: &[&RgbImage], padding: u32) -> Result<RgbImage, ImageWriteError> {
    let first = frames
        .first()
        .ok_or_else(|| ImageWriteError::Grid("no frames to assemble".to_string()))?;
    let (cell_w, cell_h) = first.dimensions();
    if let Some(odd) = frames.iter().find(|f| f.dimensions() != (cell_w, cell_h)) {
        return Err(ImageWriteError::Grid(format!(
            "frame {}x{} does not match {}x{}",
            odd.width(),
            odd.height(),
            cell_w,
            cell_h
        )));
    }

    let count = frames.len() as u32;
    let width = count * (cell_w + padding) + padding;
    let height = cell_h + 2 * padding;
    let mut grid = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    for (i, frame) in frames.iter().enumerate() {
        let x = i as u32 * (cell_w + padding) + padding;
        imageops::replace(&mut grid, *frame, i64::from(x), i64::from(padding));
    }
    Ok(grid)
}
