//! Form filling

use crate::{FieldAssignments, FillError, Result};
use pdf_core::PdfDocument;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Page whose widgets receive the field values (1-indexed)
const FORM_PAGE: usize = 1;

/// Options controlling how a form is filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FillOptions {
    /// Value written to the AcroForm's `/NeedAppearances` entry
    ///
    /// Appearance streams are never regenerated; setting this asks viewers
    /// to redraw field appearances from the new values.
    pub need_appearances: bool,
}

/// Summary of a fill operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Number of pages in the output (always equal to the template's)
    pub page_count: usize,
    /// Fully qualified names of the fields that received a value
    pub filled: Vec<String>,
    /// Assignment keys that matched no field on the first page
    pub unmatched: Vec<String>,
}

/// A filled copy of a template, ready to be written out
pub struct FilledDocument {
    document: PdfDocument,
    report: FillReport,
}

impl FilledDocument {
    pub fn document(&self) -> &PdfDocument {
        &self.document
    }

    pub fn report(&self) -> &FillReport {
        &self.report
    }

    pub fn into_report(self) -> FillReport {
        self.report
    }

    /// Serialize the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.document.to_bytes()?)
    }

    /// Write the document to `path`, replacing any existing file
    ///
    /// The document is serialized in memory and written to a temporary file
    /// next to `path`, which is then renamed over it. A failure never leaves
    /// a truncated file at `path`.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_atomically(path.as_ref(), &bytes)
    }
}

/// Fills AcroForm templates
#[derive(Debug, Clone, Default)]
pub struct FormFiller {
    options: FillOptions,
}

impl FormFiller {
    pub fn new(options: FillOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Fill the template at `template_path`
    ///
    /// The template is opened read-only; its pages are copied into a new
    /// document whose first-page fields receive `assignments`.
    pub fn fill<P: AsRef<Path>>(
        &self,
        template_path: P,
        assignments: &FieldAssignments,
    ) -> Result<FilledDocument> {
        let template_path = template_path.as_ref();
        debug!(template = %template_path.display(), "opening template");

        let template = PdfDocument::open(template_path)?;
        self.fill_document(&template, assignments)
    }

    /// Fill a template held in memory
    pub fn fill_bytes(&self, template: &[u8], assignments: &FieldAssignments) -> Result<FilledDocument> {
        let template = PdfDocument::open_from_bytes(template)?;
        self.fill_document(&template, assignments)
    }

    /// Fill an already opened template
    ///
    /// `template` is only read; the returned document is a fresh copy.
    pub fn fill_document(
        &self,
        template: &PdfDocument,
        assignments: &FieldAssignments,
    ) -> Result<FilledDocument> {
        let mut document = PdfDocument::from_pages(template)?;
        let page_count = document.page_count();

        let filled = if page_count == 0 {
            Vec::new()
        } else {
            document.update_page_form_field_values(FORM_PAGE, assignments.as_map())?
        };

        if !document.set_need_appearances(self.options.need_appearances)? {
            debug!("template has no AcroForm, pages copied only");
        }

        let unmatched: Vec<String> = assignments
            .keys()
            .filter(|key| !filled.iter().any(|name| matches_field(name, key)))
            .map(str::to_string)
            .collect();
        for key in &unmatched {
            warn!(field = %key, "no matching form field on the first page");
        }

        info!(
            pages = page_count,
            filled = filled.len(),
            unmatched = unmatched.len(),
            "form filled"
        );

        Ok(FilledDocument {
            document,
            report: FillReport {
                page_count,
                filled,
                unmatched,
            },
        })
    }

    /// Fill the template and write the result to `output_path`
    pub fn fill_to_path<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        template_path: P,
        assignments: &FieldAssignments,
        output_path: Q,
    ) -> Result<FillReport> {
        let mut filled = self.fill(template_path, assignments)?;
        filled.save(output_path)?;
        Ok(filled.into_report())
    }
}

/// Whether an assignment key addresses a field by full or partial name
fn matches_field(qualified_name: &str, key: &str) -> bool {
    qualified_name == key || qualified_name.rsplit('.').next() == Some(key)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;

    let permissions = match std::fs::metadata(path) {
        Ok(existing) => Some(existing.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        file.as_file().set_permissions(permissions)?;
    }
    file.as_file().sync_all()?;

    file.persist(path).map_err(|e| FillError::Persist {
        path: path.display().to_string(),
        message: e.error.to_string(),
    })?;

    debug!(output = %path.display(), bytes = bytes.len(), "document written");
    Ok(())
}

/// Temporary files are created owner-only; new outputs get regular file modes
#[cfg(unix)]
fn default_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<std::fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_field() {
        assert!(matches_field("name", "name"));
        assert!(matches_field("address.city", "address.city"));
        assert!(matches_field("address.city", "city"));
        assert!(!matches_field("address.city", "address"));
        assert!(!matches_field("name", "surname"));
    }

    #[test]
    fn test_fill_options_from_json() {
        let options: FillOptions = serde_json::from_str(r#"{"needAppearances": true}"#).unwrap();
        assert!(options.need_appearances);

        let defaults: FillOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, FillOptions::default());
    }

    #[test]
    fn test_filler_keeps_options() {
        let options = FillOptions {
            need_appearances: true,
        };
        assert_eq!(FormFiller::new(options).options(), &options);
        assert!(!FormFiller::default().options().need_appearances);
    }

    #[test]
    fn test_write_atomically_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        write_atomically(&path, b"new").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_atomically_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.pdf");

        let result = write_atomically(&path, b"data");
        assert!(matches!(result, Err(FillError::Io(_))));
        assert!(!path.exists());
    }
}
