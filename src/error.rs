//! Domain errors for loading and joining dashboard data.
//!
//! Shell code (CLI, HTTP, file I/O) works in `anyhow`; the pure parts of the
//! pipeline return [`DashboardError`] so callers can tell a bad input file from
//! a bad selection.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DashboardError {
    /// A required column is absent, or a value in it cannot be used.
    #[error("Schema error in {source_name}: {message}")]
    Schema {
        /// Which input the problem was found in (e.g. "purchase CSV")
        source_name: String,
        message: String,
    },

    /// Filtering by country left nothing to draw.
    #[error("No regions left after filtering by country '{label}'")]
    EmptyRegionSet { label: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported geometry format: {0}")]
    UnsupportedFormat(String),
}

impl DashboardError {
    pub fn schema(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn missing_column(source_name: impl Into<String>, column: &str) -> Self {
        Self::schema(source_name, format!("required column '{column}' not found"))
    }
}
