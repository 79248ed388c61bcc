//! Validated, searchable storage for fixed-grid pixel-art canvases.
//!
//! Candidates are checked by [`core::validate`], persisted in SQLite with an
//! FTS5 name index by [`persist::sqlite::SqliteCanvasStore`], and served
//! through the async [`runtime::handle::CanvasStorage`] facade, which also
//! caches rendered bitmaps and writes periodic JSON snapshots.
//!
//! # Examples
//!
//! Validating a candidate:
//! ```
//! use chrono::Utc;
//! use gridstore::{
//!     canvas::CanvasCandidate,
//!     core::validate::{validate, Mode},
//!     types::Resolution,
//! };
//!
//! let image = vec!["0".repeat(26); 15].join("\n");
//! let canvas = validate(CanvasCandidate::new("A", image.clone()), Mode::Strict, Utc::now())
//!     .expect("valid");
//! assert_eq!(canvas.resolution, Resolution::Standard);
//! assert_eq!(canvas.pixels, image);
//! ```
//!
//! Facade usage with an on-disk store:
//! ```no_run
//! use gridstore::{
//!     canvas::CanvasCandidate,
//!     core::grid::Grid,
//!     render::RenderError,
//!     runtime::{dump::spawn_snapshot_dumps, handle::{CanvasStorage, StorageConfig}},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let renderer = |pixels: &Grid, _shade: Option<&Grid>| -> Result<Vec<u8>, RenderError> {
//!     Ok(vec![0; pixels.height() * pixels.width()])
//! };
//! let storage = CanvasStorage::open(StorageConfig::default(), renderer)
//!     .await
//!     .expect("open store");
//! let _dumps = spawn_snapshot_dumps(storage.clone());
//!
//! let image = vec!["0".repeat(26); 15].join("\n");
//! storage.new_canvas(CanvasCandidate::new("A", image)).await.expect("store");
//! let png = storage.get_image("A").await.expect("render");
//! assert!(!png.is_empty());
//! # }
//! ```
#![warn(missing_docs)]

/// Canvas record, candidate, and wire types.
pub mod canvas;
/// Grid codec, validator, and render cache.
pub mod core;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// External renderer seam.
pub mod render;
/// Async facade, dumps, and events.
pub mod runtime;
/// Shared primitive types and alphabets.
pub mod types;
