//! Asset loading for the Mareld engine.
//!
//! Loaders return buffer-ready data (vertex/index vectors, RGBA8 pixels,
//! flat float arrays); nothing in this crate touches the GPU. All loading
//! happens at startup and failures are fatal to initialization.

pub mod image;
pub mod mesh;
pub mod table;

pub use image::{load_rgba8, RgbaImage};
pub use mesh::{MeshData, Vertex};
pub use table::load_float_table;

use thiserror::Error;

/// Asset loading errors.
#[derive(Error, Debug)]
pub enum AssetError {
    /// I/O error.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Image decoding failed.
    #[error("Failed to decode image {path}: {message}")]
    ImageDecode { path: String, message: String },

    /// Malformed mesh file.
    #[error("Malformed OBJ {path}: {message}")]
    MalformedObj { path: String, message: String },

    /// Malformed float table.
    #[error("Malformed float table {path}: {message}")]
    MalformedTable { path: String, message: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, AssetError>;
