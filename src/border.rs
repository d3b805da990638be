use anyhow::{ensure, Result};

use crate::utils::Point;

/// Playing field size in cells. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    width: u32,
    height: u32,
}

impl Border {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        ensure!(width > 0 && height > 0, "grid must be at least 1x1, got {}x{}", width, height);
        ensure!(
            width <= i32::MAX as u32 && height <= i32::MAX as u32,
            "grid {}x{} does not fit i32 coordinates",
            width,
            height
        );
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.height as i32).flat_map(move |y| (0..self.width as i32).map(move |x| Point { x, y }))
    }
}
