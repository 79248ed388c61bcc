//! Candidate validation in strict and lenient (bulk-import) modes.
//!
//! Checks run in a fixed order and the first failure wins: required fields,
//! `created`, name rules, pixel alphabet and dimensions, then shade alphabet,
//! dimensions and transparency alignment.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::{
    canvas::{Canvas, CanvasCandidate, iso_millis},
    core::grid::{self, Grid},
    types::{MAX_NAME_CHARS, RESERVED_NAMES, Resolution, TRANSPARENT, is_color, is_shade},
};

/// How defects are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Reject every violation.
    #[default]
    Strict,
    /// Repair naming and short-row padding defects; reject everything else.
    ///
    /// Only for historical bulk imports.
    Lenient,
}

/// A violated canvas rule. The message names the rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The candidate could not be read as a field bag at all.
    #[error("malformed canvas: {0}")]
    Malformed(String),
    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// Name is empty after trimming.
    #[error("name must not be empty")]
    EmptyName,
    /// Name exceeds [`MAX_NAME_CHARS`].
    #[error("name must be at most {max} characters, got {actual}")]
    NameTooLong {
        /// Limit in code points.
        max: usize,
        /// Actual length in code points.
        actual: usize,
    },
    /// Name equals a lookup token.
    #[error("name `{0}` is reserved")]
    ReservedName(String),
    /// Name contains control characters.
    #[error("name must not contain control characters")]
    ControlCharacters,
    /// A pixel symbol is outside the color alphabet.
    #[error("image has illegal color {symbol:?} at row {row}, column {col}")]
    IllegalColor {
        /// Offending symbol.
        symbol: char,
        /// Zero-based row.
        row: usize,
        /// Zero-based column.
        col: usize,
    },
    /// Pixel row count does not match the resolution.
    #[error("image must have {expected} rows, got {actual}")]
    RowCount {
        /// Required rows.
        expected: usize,
        /// Rows present.
        actual: usize,
    },
    /// A pixel row has the wrong length.
    #[error("image row {row} must have {expected} cells, got {actual}")]
    RowLength {
        /// Zero-based row.
        row: usize,
        /// Required cells.
        expected: usize,
        /// Cells present.
        actual: usize,
    },
    /// `shaded` is set but no shade was sent.
    #[error("shaded canvas requires a shade")]
    MissingShade,
    /// A shade symbol is outside the shade alphabet.
    #[error("shade has illegal symbol {symbol:?} at row {row}, column {col}")]
    IllegalShade {
        /// Offending symbol.
        symbol: char,
        /// Zero-based row.
        row: usize,
        /// Zero-based column.
        col: usize,
    },
    /// Shade row count does not match the resolution.
    #[error("shade must have {expected} rows, got {actual}")]
    ShadeRowCount {
        /// Required rows.
        expected: usize,
        /// Rows present.
        actual: usize,
    },
    /// A shade row has the wrong length.
    #[error("shade row {row} must have {expected} cells, got {actual}")]
    ShadeRowLength {
        /// Zero-based row.
        row: usize,
        /// Required cells.
        expected: usize,
        /// Cells present.
        actual: usize,
    },
    /// Transparent image and shade cells are not co-located.
    #[error("transparent cells of image and shade must align (row {row}, column {col})")]
    ShadeMisaligned {
        /// Zero-based row.
        row: usize,
        /// Zero-based column.
        col: usize,
    },
}

/// Validates `candidate`, filling defaults and returning a typed [`Canvas`].
///
/// `now` is used when `created` is absent or unparsable.
pub fn validate(
    candidate: CanvasCandidate,
    mode: Mode,
    now: DateTime<Utc>,
) -> Result<Canvas, ValidationError> {
    let name = candidate.name.ok_or(ValidationError::MissingField("name"))?;
    let image = candidate.image.ok_or(ValidationError::MissingField("image"))?;
    let resolution = Resolution::from_hd(candidate.hd.unwrap_or(false));
    let shaded = candidate.shaded.unwrap_or(false);

    let created = parse_created(candidate.created.as_ref(), now);
    let name = check_name(&name, created, mode)?;

    let pixels = check_pixels(&name, &image, resolution, mode)?;

    let shade = if shaded {
        let raw = candidate.shade.ok_or(ValidationError::MissingShade)?;
        let shade = check_shade(&name, &raw, resolution, mode)?;
        check_alignment(&pixels, &shade)?;
        Some(grid::encode(&shade))
    } else {
        None
    };

    Ok(Canvas {
        name,
        created,
        resolution,
        pixels: grid::encode(&pixels),
        shade,
    })
}

/// Reads `created` as RFC 3339 text or epoch milliseconds.
pub fn parse_created(raw: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = match raw {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.unwrap_or(now)
}

fn check_name(raw: &str, created: DateTime<Utc>, mode: Mode) -> Result<String, ValidationError> {
    let mut name = raw.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if RESERVED_NAMES.contains(&name.as_str()) {
        if mode == Mode::Strict {
            return Err(ValidationError::ReservedName(name));
        }
        let renamed = format!("{}-{name}", iso_millis(&created));
        warn!(original = %name, renamed = %renamed, "renamed reserved canvas name");
        name = renamed;
    }

    if name.chars().any(char::is_control) {
        if mode == Mode::Strict {
            return Err(ValidationError::ControlCharacters);
        }
        let renamed = escape_name(&name);
        warn!(original = ?name, renamed = %renamed, "escaped control characters in canvas name");
        name = renamed;
    }

    let len = name.chars().count();
    if len > MAX_NAME_CHARS {
        if mode == Mode::Strict {
            return Err(ValidationError::NameTooLong {
                max: MAX_NAME_CHARS,
                actual: len,
            });
        }
        let renamed: String = format!("{}-{name}", iso_millis(&created))
            .chars()
            .take(MAX_NAME_CHARS)
            .collect();
        warn!(original = %name, renamed = %renamed, "truncated long canvas name");
        name = renamed;
    }

    Ok(name)
}

/// JSON-quoted form of `name`. Control characters JSON leaves raw (DEL and
/// the C1 range) are written as `\uXXXX` too.
fn escape_name(name: &str) -> String {
    let quoted = serde_json::to_string(name).unwrap_or_else(|_| format!("\"{name}\""));
    let mut escaped = String::with_capacity(quoted.len());
    for c in quoted.chars() {
        if c.is_control() {
            let _ = write!(escaped, "\\u{:04x}", u32::from(c));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn check_pixels(
    name: &str,
    image: &str,
    resolution: Resolution,
    mode: Mode,
) -> Result<Grid, ValidationError> {
    let grid = grid::decode(image);
    if let Some((symbol, row, col)) = first_illegal(&grid, is_color) {
        return Err(ValidationError::IllegalColor { symbol, row, col });
    }
    if grid.height() != resolution.rows() {
        return Err(ValidationError::RowCount {
            expected: resolution.rows(),
            actual: grid.height(),
        });
    }
    let fitted = fit_rows(name, "image", grid, resolution, mode);
    fitted.map_err(|(row, actual)| ValidationError::RowLength {
        row,
        expected: resolution.cols(),
        actual,
    })
}

fn check_shade(
    name: &str,
    raw: &str,
    resolution: Resolution,
    mode: Mode,
) -> Result<Grid, ValidationError> {
    let grid = grid::decode(raw);
    if let Some((symbol, row, col)) = first_illegal(&grid, is_shade) {
        return Err(ValidationError::IllegalShade { symbol, row, col });
    }
    if grid.height() != resolution.rows() {
        return Err(ValidationError::ShadeRowCount {
            expected: resolution.rows(),
            actual: grid.height(),
        });
    }
    let fitted = fit_rows(name, "shade", grid, resolution, mode);
    fitted.map_err(|(row, actual)| ValidationError::ShadeRowLength {
        row,
        expected: resolution.cols(),
        actual,
    })
}

fn first_illegal(grid: &Grid, legal: fn(char) -> bool) -> Option<(char, usize, usize)> {
    grid.rows().iter().enumerate().find_map(|(row, cells)| {
        cells
            .iter()
            .enumerate()
            .find(|(_, c)| !legal(**c))
            .map(|(col, c)| (*c, row, col))
    })
}

/// Checks row widths. Lenient Standard grids get short rows padded with
/// [`TRANSPARENT`], one warning per padded row. Errors carry
/// `(row, actual_len)`.
fn fit_rows(
    name: &str,
    layer: &'static str,
    grid: Grid,
    resolution: Resolution,
    mode: Mode,
) -> Result<Grid, (usize, usize)> {
    let cols = resolution.cols();
    let pad = mode == Mode::Lenient && resolution == Resolution::Standard;

    let mut rows = grid.into_rows();
    for (idx, row) in rows.iter_mut().enumerate() {
        let len = row.len();
        if len == cols {
            continue;
        }
        if pad && len < cols {
            row.resize(cols, TRANSPARENT);
            warn!(name = %name, layer, row = idx, original_len = len, "padded short canvas row");
            continue;
        }
        return Err((idx, len));
    }
    Ok(Grid::from_rows(rows))
}

fn check_alignment(pixels: &Grid, shade: &Grid) -> Result<(), ValidationError> {
    for (row, (p_row, s_row)) in pixels.rows().iter().zip(shade.rows()).enumerate() {
        for (col, (p, s)) in p_row.iter().zip(s_row).enumerate() {
            if (*p == TRANSPARENT) != (*s == TRANSPARENT) {
                return Err(ValidationError::ShadeMisaligned { row, col });
            }
        }
    }
    Ok(())
}
