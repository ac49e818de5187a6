//! PDF Document wrapper

use crate::{PdfError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// Page attributes a page may inherit from its ancestors in the page tree
pub(crate) const INHERITABLE_PAGE_KEYS: [&[u8]; 4] =
    [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Maximum depth followed through `/Parent` chains
pub(crate) const MAX_PARENT_DEPTH: usize = 32;

/// PDF Document wrapper providing high-level operations
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    ///
    /// # Arguments
    /// * `path` - Path to the PDF file
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open("template.pdf")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Open a PDF document from bytes
    ///
    /// # Arguments
    /// * `data` - PDF file bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self { inner })
    }

    pub(crate) fn from_inner(inner: Document) -> Self {
        Self { inner }
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Get all page object IDs in order
    pub fn get_page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().values().copied().collect()
    }

    /// Get the object ID of a page (1-indexed)
    pub fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        if page == 0 || page > pages.len() {
            return Err(PdfError::InvalidPage(page, pages.len()));
        }
        pages
            .get(&(page as u32))
            .copied()
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Save the document to a file
    ///
    /// # Arguments
    /// * `path` - Output file path
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.inner
            .save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;

        Ok(buffer)
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get a mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    /// Object ID of the document catalog
    pub(crate) fn catalog_id(&self) -> Result<ObjectId> {
        let root = self
            .inner
            .trailer
            .get(b"Root")
            .map_err(|_| PdfError::ParseError("Document trailer missing Root entry".to_string()))?;
        root.as_reference()
            .map_err(|_| PdfError::ParseError("Root is not a reference".to_string()))
    }

    /// The document catalog dictionary
    pub(crate) fn catalog(&self) -> Result<&Dictionary> {
        let catalog_id = self.catalog_id()?;
        self.inner
            .get_object(catalog_id)?
            .as_dict()
            .map_err(|_| PdfError::ParseError("Catalog is not a dictionary".to_string()))
    }

    /// Follow a reference to the object it points at
    ///
    /// Direct objects are returned unchanged.
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        match obj {
            Object::Reference(id) => Ok(self.inner.get_object(*id)?),
            other => Ok(other),
        }
    }

    /// Look up a dictionary entry, following a reference if needed
    pub(crate) fn resolve_key<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).ok().and_then(|obj| self.resolve(obj).ok())
    }

    /// Get a page attribute, following the parent chain if needed
    ///
    /// Returns the attribute as stored (references are not resolved) so
    /// callers copying it keep the original object sharing.
    pub(crate) fn get_inherited_attribute(
        &self,
        page_id: ObjectId,
        key: &[u8],
    ) -> Result<Option<Object>> {
        let mut current_id = page_id;

        for _ in 0..MAX_PARENT_DEPTH {
            let dict = self
                .inner
                .get_object(current_id)?
                .as_dict()
                .map_err(|_| PdfError::ParseError("Object is not a dictionary".to_string()))?;

            if let Ok(value) = dict.get(key) {
                return Ok(Some(value.clone()));
            }

            // Follow Parent reference
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn nested_page_tree() -> Document {
        let mut doc = Document::with_version("1.5");
        let root_pages_id = doc.new_object_id();
        let mid_pages_id = doc.new_object_id();

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => mid_pages_id,
        });
        doc.objects.insert(
            mid_pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => root_pages_id,
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Rotate" => 90,
            }),
        );
        doc.objects.insert(
            root_pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![mid_pages_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => root_pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_inherited_attributes() {
        let doc = PdfDocument::from_inner(nested_page_tree());
        let page_id = doc.page_id(1).unwrap();

        let rotate = doc.get_inherited_attribute(page_id, b"Rotate").unwrap();
        assert_eq!(rotate.and_then(|o| o.as_i64().ok()), Some(90));

        let media_box = doc.get_inherited_attribute(page_id, b"MediaBox").unwrap();
        assert_eq!(media_box.map(|o| o.as_array().map(|a| a.len()).unwrap_or(0)), Some(4));

        assert!(doc
            .get_inherited_attribute(page_id, b"CropBox")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_page_id_out_of_range() {
        let doc = PdfDocument::from_inner(nested_page_tree());
        assert!(matches!(doc.page_id(0), Err(PdfError::InvalidPage(0, 1))));
        assert!(matches!(doc.page_id(2), Err(PdfError::InvalidPage(2, 1))));
    }
}
