// idcard-sheets: error types

use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid layout: {0}")]
    LayoutError(String),
    #[error("Failed to read roster file: {0}")]
    RosterError(String),
    #[error("Failed to load template: {0}")]
    TemplateError(String),
    #[error("Failed to load font: {0}")]
    FontError(String),
    #[error("Failed to allocate sheet canvas: {0}")]
    CanvasError(String),
    #[error("Failed to write output: {0}")]
    ExportError(String),
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors contained to a single card. The card's sheet slot is left blank.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("Failed to acquire photo: {0}")]
    PhotoError(String),
    #[error("Failed to render card: {0}")]
    RenderError(String),
}
