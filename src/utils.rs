use serde::{Deserialize, Serialize};

/// Cell coordinates on the grid (not pixels).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Point shifted by (dx, dy).
    pub fn offset(&self, (dx, dy): (i32, i32)) -> Point {
        Point { x: self.x + dx, y: self.y + dy }
    }
}

pub fn has_non_finite(xs: &[f32]) -> bool {
    xs.iter().any(|&v| !v.is_finite())
}

/// Index of the largest element; the first one wins on ties.
pub fn argmax(v: &[f32]) -> usize {
    let mut best_i = 0;
    for i in 1..v.len() {
        if v[i] > v[best_i] {
            best_i = i;
        }
    }
    best_i
}

/// Simple min / max / mean summary of a vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

pub fn vec_stats(xs: &[f32]) -> Stats {
    if xs.is_empty() {
        return Stats { min: 0.0, max: 0.0, mean: 0.0 };
    }
    let mut mn = xs[0];
    let mut mx = xs[0];
    let mut sum = 0.0f32;
    for &v in xs {
        if v < mn { mn = v; }
        if v > mx { mx = v; }
        sum += v;
    }
    Stats { min: mn, max: mx, mean: sum / (xs.len() as f32) }
}

/// Mean of the last `window` values (all of them if there are fewer).
pub fn rolling_mean(xs: &[f32], window: usize) -> f32 {
    let start = xs.len().saturating_sub(window);
    vec_stats(&xs[start..]).mean
}
