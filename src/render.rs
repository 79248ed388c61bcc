//! Seam for the external bitmap renderer.

use std::fmt;

use crate::{
    canvas::Canvas,
    core::grid::{self, Grid},
};

/// Error reported by a [`Renderer`].
#[derive(Debug)]
pub struct RenderError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RenderError {
    /// Error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Turns a validated pixel grid, plus optional shading, into image bytes.
///
/// Grids arrive with their transparent border trimmed. Implementations may
/// block; callers run them off the async executor.
pub trait Renderer: Send + Sync + 'static {
    /// Renders one canvas.
    fn render(&self, pixels: &Grid, shade: Option<&Grid>) -> Result<Vec<u8>, RenderError>;
}

impl<F> Renderer for F
where
    F: Fn(&Grid, Option<&Grid>) -> Result<Vec<u8>, RenderError> + Send + Sync + 'static,
{
    fn render(&self, pixels: &Grid, shade: Option<&Grid>) -> Result<Vec<u8>, RenderError> {
        self(pixels, shade)
    }
}

/// Trims the transparent border shared by pixels and shade, then renders.
pub fn render_canvas(renderer: &dyn Renderer, canvas: &Canvas) -> Result<Vec<u8>, RenderError> {
    let pixels = grid::decode(&canvas.pixels);
    let bounds = grid::opaque_bounds(&pixels);
    let trimmed = grid::crop(&pixels, bounds);
    let shade = canvas
        .shade
        .as_deref()
        .map(|raw| grid::crop(&grid::decode(raw), bounds));
    renderer.render(&trimmed, shade.as_ref())
}
