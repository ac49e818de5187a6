//! Page-by-page copy into a fresh document
//!
//! The copy walks the object graph reachable from each page and renumbers
//! every object into the new document. Page tree nodes and the catalog of
//! the source are mapped onto their counterparts in the new document, so
//! back references (`/P` on annotations, `/Parent` chains, destinations)
//! land on the copied pages instead of pulling the old tree along.

use crate::document::{INHERITABLE_PAGE_KEYS, MAX_PARENT_DEPTH};
use crate::{PdfDocument, PdfError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Copies objects from a source document into a target, renumbering them
struct ObjectImporter<'a> {
    source: &'a Document,
    target: &'a mut Document,
    /// Source object ID -> target object ID
    id_map: BTreeMap<ObjectId, ObjectId>,
    /// Source objects whose target ID is allocated but not yet filled
    pending: VecDeque<ObjectId>,
}

impl<'a> ObjectImporter<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: BTreeMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Map a source object onto an existing target ID without copying it
    fn alias(&mut self, old: ObjectId, new: ObjectId) {
        self.id_map.insert(old, new);
    }

    /// Allocate a target ID for a source object the caller fills in itself
    fn reserve(&mut self, old: ObjectId) -> ObjectId {
        if let Some(new) = self.id_map.get(&old) {
            return *new;
        }
        let new = self.target.new_object_id();
        self.id_map.insert(old, new);
        new
    }

    /// Target ID for a source object, scheduling a copy on first sight
    fn import_id(&mut self, old: ObjectId) -> ObjectId {
        if let Some(new) = self.id_map.get(&old) {
            return *new;
        }
        let new = self.target.new_object_id();
        self.id_map.insert(old, new);
        self.pending.push_back(old);
        new
    }

    fn remap(&mut self, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => Object::Reference(self.import_id(*id)),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.remap(o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.remap_dict(dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.remap_dict(&stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn remap_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.remap(value));
        }
        copied
    }

    /// Copy every scheduled object, including the ones discovered on the way
    fn drain(&mut self) -> usize {
        let source = self.source;
        let mut copied = 0;

        while let Some(old) = self.pending.pop_front() {
            let Some(&new) = self.id_map.get(&old) else {
                continue;
            };
            let object = match source.get_object(old) {
                Ok(obj) => self.remap(obj),
                Err(_) => {
                    debug!(object = ?old, "dangling reference replaced with null");
                    Object::Null
                }
            };
            self.target.objects.insert(new, object);
            copied += 1;
        }

        copied
    }
}

impl PdfDocument {
    /// Build a new document holding a copy of every page of `source`
    ///
    /// Pages keep their order, content streams and resources. Inheritable
    /// attributes are resolved onto each copied page. The AcroForm of the
    /// source catalog is carried over and shares the copied widgets, so form
    /// fields stay reachable both from the pages and from the catalog.
    /// `source` is never modified.
    ///
    /// # Example
    /// ```ignore
    /// let template = PdfDocument::open("template.pdf")?;
    /// let copy = PdfDocument::from_pages(&template)?;
    /// assert_eq!(copy.page_count(), template.page_count());
    /// ```
    pub fn from_pages(source: &PdfDocument) -> Result<Self> {
        let src = source.inner();
        let source_pages: Vec<ObjectId> = source.get_page_ids();
        let source_catalog_id = source.catalog_id()?;
        let acro_form = source.catalog()?.get(b"AcroForm").ok().cloned();
        let info = src.trailer.get(b"Info").ok().cloned();

        // Resolve each page dictionary up front, with inherited attributes
        let mut page_dicts = Vec::with_capacity(source_pages.len());
        for &page_id in &source_pages {
            let mut page_dict = src
                .get_object(page_id)?
                .as_dict()
                .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?
                .clone();

            for key in INHERITABLE_PAGE_KEYS {
                if !page_dict.has(key) {
                    if let Some(value) = source.get_inherited_attribute(page_id, key)? {
                        page_dict.set(key.to_vec(), value);
                    }
                }
            }
            page_dict.remove(b"Parent");
            page_dicts.push(page_dict);
        }

        let tree_nodes = page_tree_nodes(src, &source_pages);

        let mut target = Document::with_version(src.version.clone());
        let pages_id = target.new_object_id();
        let catalog_id = target.new_object_id();

        let (new_page_ids, copied_pages, acro_form, info, object_count) = {
            let mut importer = ObjectImporter::new(src, &mut target);
            importer.alias(source_catalog_id, catalog_id);
            for node in tree_nodes {
                importer.alias(node, pages_id);
            }

            let new_page_ids: Vec<ObjectId> = source_pages
                .iter()
                .map(|&old| importer.reserve(old))
                .collect();

            let copied_pages: Vec<Dictionary> = page_dicts
                .iter()
                .map(|dict| importer.remap_dict(dict))
                .collect();

            let acro_form = acro_form.map(|obj| importer.remap(&obj));
            let info = info.map(|obj| importer.remap(&obj));
            let object_count = importer.drain();

            (new_page_ids, copied_pages, acro_form, info, object_count)
        };

        for (new_id, mut page_dict) in new_page_ids.iter().zip(copied_pages) {
            page_dict.set("Parent", Object::Reference(pages_id));
            target.objects.insert(*new_id, Object::Dictionary(page_dict));
        }

        let kids: Vec<Object> = new_page_ids.iter().map(|&id| Object::Reference(id)).collect();
        target.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => new_page_ids.len() as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(acro_form) = acro_form {
            catalog.set("AcroForm", acro_form);
        }
        target
            .objects
            .insert(catalog_id, Object::Dictionary(catalog));

        target.trailer.set("Root", catalog_id);
        if let Some(info) = info {
            target.trailer.set("Info", info);
        }

        debug!(
            pages = new_page_ids.len(),
            objects = object_count,
            "copied pages into new document"
        );

        Ok(PdfDocument::from_inner(target))
    }
}

/// Collect the intermediate `Pages` nodes above the given pages
fn page_tree_nodes(doc: &Document, pages: &[ObjectId]) -> Vec<ObjectId> {
    let mut nodes = Vec::new();

    for &page_id in pages {
        let mut current = page_id;
        for _ in 0..MAX_PARENT_DEPTH {
            let parent = doc
                .get_object(current)
                .ok()
                .and_then(|obj| obj.as_dict().ok())
                .and_then(|dict| dict.get(b"Parent").ok())
                .and_then(|parent| parent.as_reference().ok());

            match parent {
                Some(parent_id) if !nodes.contains(&parent_id) => {
                    nodes.push(parent_id);
                    current = parent_id;
                }
                _ => break,
            }
        }
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_doc() -> PdfDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for label in ["first", "second"] {
            let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", label);
            let contents_id = doc.add_object(lopdf::Stream::new(
                dictionary! {},
                content.into_bytes(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => contents_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! {},
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        PdfDocument::from_inner(doc)
    }

    fn page_content(doc: &PdfDocument, page: usize) -> Vec<u8> {
        let page_id = doc.page_id(page).unwrap();
        let dict = doc.inner().get_dictionary(page_id).unwrap();
        let contents = dict.get(b"Contents").unwrap().as_reference().unwrap();
        match doc.inner().get_object(contents).unwrap() {
            Object::Stream(stream) => stream.content.clone(),
            other => panic!("unexpected contents: {:?}", other),
        }
    }

    #[test]
    fn test_copy_keeps_page_order() {
        let source = two_page_doc();
        let copy = PdfDocument::from_pages(&source).unwrap();

        assert_eq!(copy.page_count(), 2);
        assert!(String::from_utf8_lossy(&page_content(&copy, 1)).contains("(first)"));
        assert!(String::from_utf8_lossy(&page_content(&copy, 2)).contains("(second)"));
        assert_eq!(copy.inner().version, "1.7");
    }

    #[test]
    fn test_copy_resolves_inherited_attributes() {
        let source = two_page_doc();
        let copy = PdfDocument::from_pages(&source).unwrap();

        for page_id in copy.get_page_ids() {
            let dict = copy.inner().get_dictionary(page_id).unwrap();
            assert!(dict.has(b"MediaBox"));
            assert!(dict.has(b"Resources"));
        }
    }

    #[test]
    fn test_copy_does_not_touch_source() {
        let source = two_page_doc();
        let before: Vec<ObjectId> = source.inner().objects.keys().copied().collect();

        let _copy = PdfDocument::from_pages(&source).unwrap();

        let after: Vec<ObjectId> = source.inner().objects.keys().copied().collect();
        assert_eq!(before, after);
        let first = source.page_id(1).unwrap();
        assert!(!source.inner().get_dictionary(first).unwrap().has(b"MediaBox"));
    }
}
