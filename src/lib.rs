//! Tile selection and region transfer for a pixel-art canvas.
//!
//! Pointer positions snap to a tile grid ([`grid`]), a [`canvas::SelectionCanvas`]
//! tracks the selection through drag gestures, copies the pixels under it out
//! and composites replacement tiles back in.

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod events;
pub mod grid;
pub mod io;
pub mod ops;
pub mod registry;
pub mod settings;

pub use canvas::{SaveOutcome, SelectionCanvas};
pub use grid::{Point, TileRect, TileSize};
pub use io::{CanvasError, FileStore};
pub use ops::clipboard::TileExchange;
pub use registry::CanvasRegistry;
pub use settings::Settings;
