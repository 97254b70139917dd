// src/error.rs
//
// Error types for conversion and settings loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a conversion before any output is produced.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// A configured rule carries a color that is not six hex digits.
    #[error("Invalid color code {color:?} for character {character:?} (expected 6 hex digits)")]
    InvalidColorCode { character: String, color: String },
}

/// Errors reading a settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Valid JSON, but not the expected top-level shape.
    #[error("Unexpected layout in {}: expected {expected}", .path.display())]
    Shape {
        path: PathBuf,
        expected: &'static str,
    },
}
