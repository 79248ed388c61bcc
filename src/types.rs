//! Shared primitive types, grid alphabets, and reserved lookup tokens.

use serde::{Deserialize, Serialize};

/// Cell value for an empty pixel, shared by the color and shade alphabets.
pub const TRANSPARENT: char = 't';

/// The 16 color symbols plus [`TRANSPARENT`].
pub const COLOR_ALPHABET: &str = "0123456789abcdeft";

/// The 6 shading intensities plus [`TRANSPARENT`].
pub const SHADE_ALPHABET: &str = "012345t";

/// Lookup token resolving to a uniformly random canvas.
pub const RANDOM_TOKEN: &str = "random";

/// Lookup token resolving to the most recently created canvas.
pub const LATEST_TOKEN: &str = "latest";

/// Names that collide with lookup tokens and can never be stored as-is.
pub const RESERVED_NAMES: [&str; 2] = [RANDOM_TOKEN, LATEST_TOKEN];

/// Maximum canvas name length, in code points.
pub const MAX_NAME_CHARS: usize = 50;

/// Grid size a canvas is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 15 rows by 26 columns.
    Standard,
    /// 22 rows by 36 columns.
    HD,
}

impl Resolution {
    /// Picks the resolution from the wire-level `hd` flag.
    pub fn from_hd(hd: bool) -> Self {
        if hd { Self::HD } else { Self::Standard }
    }

    /// True for [`Resolution::HD`].
    pub fn is_hd(self) -> bool {
        matches!(self, Self::HD)
    }

    /// Required number of rows.
    pub fn rows(self) -> usize {
        match self {
            Self::Standard => 15,
            Self::HD => 22,
        }
    }

    /// Required number of cells per row.
    pub fn cols(self) -> usize {
        match self {
            Self::Standard => 26,
            Self::HD => 36,
        }
    }
}

/// Ordering on creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for this order.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// True when `c` is a legal pixel symbol.
pub fn is_color(c: char) -> bool {
    COLOR_ALPHABET.contains(c)
}

/// True when `c` is a legal shade symbol.
pub fn is_shade(c: char) -> bool {
    SHADE_ALPHABET.contains(c)
}
