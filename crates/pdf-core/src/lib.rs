//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Copying the pages of a document into a fresh document
//! - Reading AcroForm fields (name, type, value, position)
//! - Writing form field values on the widgets of a page
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::PdfDocument;
//! use std::collections::BTreeMap;
//!
//! let template = PdfDocument::open("template.pdf")?;
//! let mut doc = PdfDocument::from_pages(&template)?;
//!
//! let mut values = BTreeMap::new();
//! values.insert("name".to_string(), "Jane Doe".to_string());
//! doc.update_page_form_field_values(1, &values)?;
//! doc.save("output.pdf")?;
//! ```

mod document;
mod form;
mod pages;
mod text;

pub use document::PdfDocument;
pub use form::{field_flags, FieldKind, FormField};
pub use text::{decode_text_string, encode_text_string};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("Invalid value for field '{field}': {reason}")]
    FieldValue { field: String, reason: String },

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_error_message() {
        let err = PdfError::FieldValue {
            field: "country".to_string(),
            reason: "'Atlantis' is not one of the field's options".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for field 'country': 'Atlantis' is not one of the field's options"
        );
    }

    #[test]
    fn test_invalid_page_message() {
        let err = PdfError::InvalidPage(3, 1);
        assert_eq!(
            err.to_string(),
            "Invalid page number: 3 (document has 1 pages)"
        );
    }
}
