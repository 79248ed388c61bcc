//! Grid codec between `\n`-separated row strings and a 2-D cell array.
//!
//! Functions here assume input already passed validation; malformed grids
//! are not rejected, only carried through.

use crate::types::TRANSPARENT;

/// Row-major cell array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    rows: Vec<Vec<char>>,
}

impl Grid {
    /// Builds a grid from owned rows.
    pub fn from_rows(rows: Vec<Vec<char>>) -> Self {
        Self { rows }
    }

    /// Borrowed rows.
    pub fn rows(&self) -> &[Vec<char>] {
        &self.rows
    }

    /// Consumes the grid, returning its rows.
    pub fn into_rows(self) -> Vec<Vec<char>> {
        self.rows
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// True when there are no cells at all.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// Cell at `row`, `col`.
    pub fn cell(&self, row: usize, col: usize) -> Option<char> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }
}

/// Half-open rectangle of rows `top..bottom` and columns `left..right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    /// First kept row.
    pub top: usize,
    /// One past the last kept row.
    pub bottom: usize,
    /// First kept column.
    pub left: usize,
    /// One past the last kept column.
    pub right: usize,
}

impl Bounds {
    /// True when the rectangle holds no cells.
    pub fn is_empty(&self) -> bool {
        self.top >= self.bottom || self.left >= self.right
    }
}

/// Splits `text` into rows. The empty string decodes to a grid with zero rows.
pub fn decode(text: &str) -> Grid {
    if text.is_empty() {
        return Grid::default();
    }
    Grid::from_rows(text.split('\n').map(|row| row.chars().collect()).collect())
}

/// Joins rows with `\n`; inverse of [`decode`].
pub fn encode(grid: &Grid) -> String {
    let mut out = String::with_capacity(grid.height() * (grid.width() + 1));
    for (idx, row) in grid.rows().iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.extend(row.iter());
    }
    out
}

/// Smallest rectangle containing every non-transparent cell.
pub fn opaque_bounds(grid: &Grid) -> Bounds {
    let is_opaque_row = |row: &Vec<char>| row.iter().any(|c| *c != TRANSPARENT);

    let Some(top) = grid.rows().iter().position(is_opaque_row) else {
        return Bounds::default();
    };
    let bottom = grid
        .rows()
        .iter()
        .rposition(is_opaque_row)
        .map_or(top + 1, |last| last + 1);

    let kept = grid.rows().get(top..bottom).unwrap_or_default();
    let left = kept
        .iter()
        .filter_map(|row| row.iter().position(|c| *c != TRANSPARENT))
        .min()
        .unwrap_or(0);
    let right = kept
        .iter()
        .filter_map(|row| row.iter().rposition(|c| *c != TRANSPARENT))
        .max()
        .map_or(left, |last| last + 1);

    Bounds {
        top,
        bottom,
        left,
        right,
    }
}

/// Copies the cells inside `bounds`. Rows shorter than `bounds.right` are
/// cut at their own end.
pub fn crop(grid: &Grid, bounds: Bounds) -> Grid {
    if bounds.is_empty() {
        return Grid::default();
    }
    let rows = grid
        .rows()
        .iter()
        .skip(bounds.top)
        .take(bounds.bottom - bounds.top)
        .map(|row| {
            row.iter()
                .skip(bounds.left)
                .take(bounds.right - bounds.left)
                .copied()
                .collect()
        })
        .collect();
    Grid::from_rows(rows)
}

/// Strips all-transparent rows and columns from every edge.
///
/// Only for human-facing rendering; stored records keep full dimensions.
pub fn trim_transparent_border(grid: &Grid) -> Grid {
    crop(grid, opaque_bounds(grid))
}
