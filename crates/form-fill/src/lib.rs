//! Form Fill - populate PDF form templates from JSON
//!
//! This crate provides:
//! - Field assignment parsing from a flat JSON object
//! - The form filler: copy the template's pages, write field values on the
//!   first page's widgets, save the result
//! - A fill report listing written fields and unmatched keys
//!
//! # Example
//!
//! ```ignore
//! use form_fill::{parse_assignments, FormFiller};
//!
//! let assignments = parse_assignments(r#"{"name": "Jane Doe"}"#)?;
//! let report = FormFiller::default().fill_to_path("form.pdf", &assignments, "out.pdf")?;
//! println!("filled {} fields", report.filled.len());
//! ```

mod filler;
pub mod parser;

pub use filler::{FillOptions, FillReport, FilledDocument, FormFiller};
pub use parser::{parse_assignments, value_to_string, FieldAssignments};

use thiserror::Error;

/// Errors that can occur while filling a form
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unsupported value for field '{field}': expected a string, number or boolean")]
    UnsupportedValue { field: String },

    #[error("{0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write {path}: {message}")]
    Persist { path: String, message: String },
}

/// Result type for form filling
pub type Result<T> = std::result::Result<T, FillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_error_message_passes_through() {
        let err: FillError = pdf_core::PdfError::OpenError("missing header".to_string()).into();
        assert_eq!(err.to_string(), "Failed to open PDF: missing header");
    }
}
