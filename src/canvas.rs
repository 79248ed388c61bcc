//! Canvas domain record, untyped candidate, and snapshot wire shape.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{core::validate::ValidationError, types::Resolution};

/// Fully validated, immutable canvas record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "CanvasWire")]
pub struct Canvas {
    /// Unique, case-sensitive display name.
    pub name: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Fixed grid size.
    pub resolution: Resolution,
    /// Row-major pixel rows joined by `\n`.
    pub pixels: String,
    /// Row-major shade rows, present only for shaded canvases.
    pub shade: Option<String>,
}

impl Canvas {
    /// True when a shading overlay is attached.
    pub fn is_shaded(&self) -> bool {
        self.shade.is_some()
    }
}

/// JSON shape shared by collaborators and the snapshot file.
///
/// Field names are a stable contract; snapshot readers depend on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasWire {
    /// Canvas name.
    pub name: String,
    /// Pixel rows.
    pub image: String,
    /// Shade rows or `null`.
    pub shade: Option<String>,
    /// True for HD resolution.
    pub hd: bool,
    /// True when `shade` is meaningful.
    pub shaded: bool,
    /// ISO-8601 creation time with millisecond precision.
    pub created: String,
}

impl From<Canvas> for CanvasWire {
    fn from(canvas: Canvas) -> Self {
        Self {
            hd: canvas.resolution.is_hd(),
            shaded: canvas.is_shaded(),
            created: iso_millis(&canvas.created),
            name: canvas.name,
            image: canvas.pixels,
            shade: canvas.shade,
        }
    }
}

/// Candidate canvas as received from an untrusted collaborator.
///
/// Every field is optional; presence and shape are checked once by
/// [`crate::core::validate::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasCandidate {
    /// Requested name.
    pub name: Option<String>,
    /// Pixel rows.
    pub image: Option<String>,
    /// Shade rows.
    pub shade: Option<String>,
    /// Resolution flag.
    pub hd: Option<bool>,
    /// Shading flag.
    pub shaded: Option<bool>,
    /// RFC 3339 string or epoch milliseconds; anything else falls back to now.
    pub created: Option<serde_json::Value>,
}

impl CanvasCandidate {
    /// Candidate with just the two required fields set.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Parses one candidate object from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

impl From<Canvas> for CanvasCandidate {
    fn from(canvas: Canvas) -> Self {
        let wire = CanvasWire::from(canvas);
        Self {
            name: Some(wire.name),
            image: Some(wire.image),
            shade: wire.shade,
            hd: Some(wire.hd),
            shaded: Some(wire.shaded),
            created: Some(serde_json::Value::String(wire.created)),
        }
    }
}

/// Formats `ts` the way the snapshot file stores it, e.g. `2024-05-01T12:00:00.000Z`.
pub fn iso_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
