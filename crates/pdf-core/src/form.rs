//! AcroForm fields
//!
//! Reading the interactive form of a document and writing field values on
//! the widgets of a page. Values are written to `/V` (and `/AS` for
//! checkboxes and radio buttons); appearance streams are left untouched, so
//! viewers may need `/NeedAppearances` to redraw text fields.

use crate::document::MAX_PARENT_DEPTH;
use crate::text::{encode_text_string, object_to_text};
use crate::{PdfDocument, PdfError, Result};
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Field flag bits (`/Ff`)
pub mod field_flags {
    pub const READ_ONLY: i64 = 1;
    pub const REQUIRED: i64 = 1 << 1;
    pub const NO_EXPORT: i64 = 1 << 2;
    pub const MULTILINE: i64 = 1 << 12;
    pub const PASSWORD: i64 = 1 << 13;
    pub const NO_TOGGLE_TO_OFF: i64 = 1 << 14;
    pub const RADIO: i64 = 1 << 15;
    pub const PUSHBUTTON: i64 = 1 << 16;
    pub const COMBO: i64 = 1 << 17;
    /// Choice field accepts values outside its option list
    pub const EDIT: i64 = 1 << 18;
    pub const MULTI_SELECT: i64 = 1 << 21;
}

/// Appearance state of an unchecked checkbox or radio button
const OFF_STATE: &str = "Off";

/// Kind of form field, derived from `/FT` and `/Ff`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    PushButton,
    Choice,
    Signature,
    Unknown,
}

impl FieldKind {
    fn from_type(field_type: Option<&[u8]>, flags: i64) -> Self {
        match field_type {
            Some(b"Tx") => FieldKind::Text,
            Some(b"Ch") => FieldKind::Choice,
            Some(b"Sig") => FieldKind::Signature,
            Some(b"Btn") if flags & field_flags::PUSHBUTTON != 0 => FieldKind::PushButton,
            Some(b"Btn") if flags & field_flags::RADIO != 0 => FieldKind::Radio,
            Some(b"Btn") => FieldKind::Checkbox,
            _ => FieldKind::Unknown,
        }
    }
}

/// A terminal form field as found in the document
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    /// Fully qualified name (`parent.child`)
    pub name: String,
    /// Partial name (`/T` of the field itself)
    pub partial_name: String,
    pub kind: FieldKind,
    /// Current value (`/V`), names and strings decoded to text
    pub value: Option<String>,
    /// Default value (`/DV`)
    pub default_value: Option<String>,
    /// Export values of a choice field
    pub options: Vec<String>,
    pub flags: i64,
    /// Page of the first widget (1-indexed)
    pub page: Option<usize>,
    /// Rectangle of the first widget, in PDF user space
    pub rect: Option<[f64; 4]>,
}

/// One entry of a choice field's `/Opt` array
#[derive(Debug, Clone)]
struct ChoiceOption {
    export: String,
    display: String,
}

/// Field attributes resolved through the `/Parent` chain
#[derive(Debug, Clone)]
struct FieldLookup {
    id: ObjectId,
    partial_name: String,
    name: String,
    kind: FieldKind,
    flags: i64,
    value: Option<String>,
    default_value: Option<String>,
    max_len: Option<i64>,
    options: Vec<ChoiceOption>,
    widgets: Vec<ObjectId>,
}

/// A pending write, applied once every assignment has been validated
struct FieldWrite {
    target: ObjectId,
    key: &'static [u8],
    value: Object,
}

impl PdfDocument {
    /// Whether the catalog carries an `/AcroForm` dictionary
    pub fn has_form(&self) -> bool {
        self.acro_form().is_some()
    }

    /// List the terminal fields of the document's AcroForm
    ///
    /// Returns an empty Vec when the document has no AcroForm.
    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        let Some(acro_form) = self.acro_form() else {
            return Ok(Vec::new());
        };

        let roots: Vec<ObjectId> = match self.resolve_key(acro_form, b"Fields") {
            Some(Object::Array(fields)) => fields
                .iter()
                .filter_map(|f| f.as_reference().ok())
                .collect(),
            _ => Vec::new(),
        };

        let mut terminal = Vec::new();
        let mut visited = BTreeSet::new();
        for root in roots {
            self.collect_terminal_fields(root, 0, &mut visited, &mut terminal);
        }

        let widget_pages = self.widget_pages();
        let mut fields = Vec::with_capacity(terminal.len());
        for field_id in terminal {
            let lookup = self.field_lookup(field_id)?;
            let first_widget = lookup.widgets.first().copied();

            fields.push(FormField {
                page: first_widget.and_then(|w| widget_pages.get(&w).copied()),
                rect: first_widget.and_then(|w| self.widget_rect(w)),
                name: lookup.name,
                partial_name: lookup.partial_name,
                kind: lookup.kind,
                value: lookup.value,
                default_value: lookup.default_value,
                options: lookup.options.into_iter().map(|o| o.export).collect(),
                flags: lookup.flags,
            });
        }

        Ok(fields)
    }

    /// Look up a field by its fully qualified or partial name
    pub fn form_field(&self, name: &str) -> Result<Option<FormField>> {
        let fields = self.form_fields()?;
        Ok(fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| fields.iter().find(|f| f.partial_name == name))
            .cloned())
    }

    /// Write field values on the widgets of one page
    ///
    /// Every widget annotation on `page` (1-indexed) is resolved to its
    /// field; when a key of `values` equals the field's fully qualified or
    /// partial name the field's `/V` is overwritten. Keys matching no field
    /// are ignored. Appearance streams are not regenerated.
    ///
    /// All values are validated before anything is written, so an error
    /// leaves the document unchanged.
    ///
    /// # Returns
    /// Fully qualified names of the fields that were written
    pub fn update_page_form_field_values(
        &mut self,
        page: usize,
        values: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        let page_id = self.page_id(page)?;
        let mut writes = Vec::new();
        let mut filled = Vec::new();

        for field_id in self.page_field_ids(page_id) {
            let lookup = self.field_lookup(field_id)?;
            let value = values
                .get(&lookup.name)
                .or_else(|| values.get(&lookup.partial_name));
            let Some(value) = value else {
                continue;
            };

            self.plan_field_write(&lookup, value, &mut writes)?;
            debug!(field = %lookup.name, kind = ?lookup.kind, "field value assigned");
            filled.push(lookup.name);
        }

        for write in writes {
            self.inner_mut()
                .get_object_mut(write.target)?
                .as_dict_mut()
                .map_err(|_| PdfError::ParseError("Field is not a dictionary".to_string()))?
                .set(write.key.to_vec(), write.value);
        }

        Ok(filled)
    }

    /// Set `/NeedAppearances` on the AcroForm
    ///
    /// Returns `false` when the document has no AcroForm.
    pub fn set_need_appearances(&mut self, need_appearances: bool) -> Result<bool> {
        let catalog_id = self.catalog_id()?;
        let acro_form_ref = match self.catalog()?.get(b"AcroForm") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(_)) => None,
            _ => return Ok(false),
        };

        let doc = self.inner_mut();
        let acro_form = match acro_form_ref {
            Some(id) => doc.get_object_mut(id)?,
            None => doc.get_object_mut(catalog_id)?.as_dict_mut()?.get_mut(b"AcroForm")?,
        };
        acro_form
            .as_dict_mut()
            .map_err(|_| PdfError::ParseError("AcroForm is not a dictionary".to_string()))?
            .set("NeedAppearances", need_appearances);

        Ok(true)
    }

    fn acro_form(&self) -> Option<&Dictionary> {
        let catalog = self.catalog().ok()?;
        self.resolve_key(catalog, b"AcroForm")?.as_dict().ok()
    }

    fn collect_terminal_fields(
        &self,
        field_id: ObjectId,
        depth: usize,
        visited: &mut BTreeSet<ObjectId>,
        out: &mut Vec<ObjectId>,
    ) {
        if depth > MAX_PARENT_DEPTH || !visited.insert(field_id) {
            return;
        }
        let Ok(dict) = self.inner().get_dictionary(field_id) else {
            return;
        };

        let child_fields: Vec<ObjectId> = self
            .kid_ids(dict)
            .into_iter()
            .filter(|kid| {
                self.inner()
                    .get_dictionary(*kid)
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            })
            .collect();

        if child_fields.is_empty() {
            out.push(field_id);
        } else {
            for kid in child_fields {
                self.collect_terminal_fields(kid, depth + 1, visited, out);
            }
        }
    }

    fn kid_ids(&self, dict: &Dictionary) -> Vec<ObjectId> {
        match self.resolve_key(dict, b"Kids") {
            Some(Object::Array(kids)) => kids.iter().filter_map(|k| k.as_reference().ok()).collect(),
            _ => Vec::new(),
        }
    }

    /// Fields owning the widget annotations of a page, in annotation order
    fn page_field_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let mut fields = Vec::new();

        for annot_id in self.annotation_ids(page_id) {
            let Ok(annot) = self.inner().get_dictionary(annot_id) else {
                continue;
            };
            let is_widget = matches!(annot.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Widget");
            if !is_widget && !annot.has(b"FT") {
                continue;
            }

            let field_id = if annot.has(b"T") {
                Some(annot_id)
            } else {
                annot.get(b"Parent").ok().and_then(|p| p.as_reference().ok())
            };

            if let Some(field_id) = field_id {
                if !fields.contains(&field_id) {
                    fields.push(field_id);
                }
            }
        }

        fields
    }

    fn annotation_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let Ok(page) = self.inner().get_dictionary(page_id) else {
            return Vec::new();
        };
        match self.resolve_key(page, b"Annots") {
            Some(Object::Array(annots)) => annots
                .iter()
                .filter_map(|a| a.as_reference().ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Widget annotation ID -> page number (1-indexed)
    fn widget_pages(&self) -> BTreeMap<ObjectId, usize> {
        let mut pages = BTreeMap::new();
        for (index, page_id) in self.get_page_ids().into_iter().enumerate() {
            for annot_id in self.annotation_ids(page_id) {
                pages.entry(annot_id).or_insert(index + 1);
            }
        }
        pages
    }

    fn widget_rect(&self, widget_id: ObjectId) -> Option<[f64; 4]> {
        let widget = self.inner().get_dictionary(widget_id).ok()?;
        let Some(Object::Array(rect)) = self.resolve_key(widget, b"Rect") else {
            return None;
        };
        if rect.len() < 4 {
            return None;
        }

        let mut out = [0.0; 4];
        for (slot, obj) in out.iter_mut().zip(rect.iter()) {
            *slot = match obj {
                Object::Integer(v) => *v as f64,
                Object::Real(v) => *v as f64,
                _ => return None,
            };
        }
        Some(out)
    }

    /// Resolve a field's name and inheritable attributes
    fn field_lookup(&self, field_id: ObjectId) -> Result<FieldLookup> {
        let field = self
            .inner()
            .get_dictionary(field_id)
            .map_err(|_| PdfError::ParseError("Field is not a dictionary".to_string()))?;

        let mut names = Vec::new();
        let mut field_type: Option<Vec<u8>> = None;
        let mut flags: Option<i64> = None;
        let mut value: Option<String> = None;
        let mut default_value: Option<String> = None;
        let mut max_len: Option<i64> = None;
        let mut options: Option<Vec<ChoiceOption>> = None;

        let mut current = Some(field_id);
        let mut seen = BTreeSet::new();
        while let Some(id) = current {
            if seen.len() > MAX_PARENT_DEPTH || !seen.insert(id) {
                break;
            }
            let Ok(dict) = self.inner().get_dictionary(id) else {
                break;
            };

            if let Some(name) = self.resolve_key(dict, b"T").and_then(object_to_text) {
                names.push(name);
            }
            if field_type.is_none() {
                if let Some(Object::Name(ft)) = self.resolve_key(dict, b"FT") {
                    field_type = Some(ft.clone());
                }
            }
            if flags.is_none() {
                flags = self.resolve_key(dict, b"Ff").and_then(|f| f.as_i64().ok());
            }
            if value.is_none() {
                value = self.resolve_key(dict, b"V").and_then(|v| self.value_text(v));
            }
            if default_value.is_none() {
                default_value = self.resolve_key(dict, b"DV").and_then(|v| self.value_text(v));
            }
            if max_len.is_none() {
                max_len = self.resolve_key(dict, b"MaxLen").and_then(|m| m.as_i64().ok());
            }
            if options.is_none() {
                options = self.resolve_key(dict, b"Opt").map(|opt| self.choice_options(opt));
            }

            current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
        }

        names.reverse();
        let partial_name = self
            .resolve_key(field, b"T")
            .and_then(object_to_text)
            .unwrap_or_default();
        let flags = flags.unwrap_or(0);

        let kids = self.kid_ids(field);
        let widgets = if kids.is_empty() {
            vec![field_id]
        } else {
            kids.into_iter()
                .filter(|kid| {
                    self.inner()
                        .get_dictionary(*kid)
                        .map(|d| !d.has(b"T"))
                        .unwrap_or(false)
                })
                .collect()
        };

        Ok(FieldLookup {
            id: field_id,
            partial_name,
            name: names.join("."),
            kind: FieldKind::from_type(field_type.as_deref(), flags),
            flags,
            value,
            default_value,
            max_len,
            options: options.unwrap_or_default(),
            widgets,
        })
    }

    fn value_text(&self, value: &Object) -> Option<String> {
        match value {
            Object::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| self.resolve(item).ok().and_then(object_to_text))
                    .collect();
                Some(parts.join(","))
            }
            other => object_to_text(other),
        }
    }

    fn choice_options(&self, opt: &Object) -> Vec<ChoiceOption> {
        let Object::Array(entries) = opt else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| match self.resolve(entry).ok()? {
                Object::Array(pair) if pair.len() >= 2 => {
                    let export = self.resolve(&pair[0]).ok().and_then(object_to_text)?;
                    let display = self.resolve(&pair[1]).ok().and_then(object_to_text)?;
                    Some(ChoiceOption { export, display })
                }
                other => object_to_text(other).map(|text| ChoiceOption {
                    export: text.clone(),
                    display: text,
                }),
            })
            .collect()
    }

    /// On states (`/AP /N` keys other than `Off`) offered by a widget
    fn widget_states(&self, widget_id: ObjectId) -> Vec<String> {
        let Ok(widget) = self.inner().get_dictionary(widget_id) else {
            return Vec::new();
        };
        let Some(Object::Dictionary(ap)) = self.resolve_key(widget, b"AP") else {
            return Vec::new();
        };
        let Some(Object::Dictionary(normal)) = self.resolve_key(ap, b"N") else {
            return Vec::new();
        };

        normal
            .iter()
            .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
            .filter(|state| state != OFF_STATE)
            .collect()
    }

    fn plan_field_write(
        &self,
        lookup: &FieldLookup,
        value: &str,
        writes: &mut Vec<FieldWrite>,
    ) -> Result<()> {
        let reject = |reason: String| PdfError::FieldValue {
            field: lookup.name.clone(),
            reason,
        };

        match lookup.kind {
            FieldKind::Text | FieldKind::Unknown => {
                if let Some(max_len) = lookup.max_len {
                    let len = value.chars().count() as i64;
                    if len > max_len {
                        return Err(reject(format!(
                            "value has {} characters, field allows at most {}",
                            len, max_len
                        )));
                    }
                }
                writes.push(FieldWrite {
                    target: lookup.id,
                    key: b"V",
                    value: encode_text_string(value),
                });
            }
            FieldKind::Choice => {
                let export = if lookup.options.is_empty() {
                    value.to_string()
                } else if let Some(option) = lookup
                    .options
                    .iter()
                    .find(|o| o.export == value || o.display == value)
                {
                    option.export.clone()
                } else if lookup.flags & field_flags::EDIT != 0 {
                    value.to_string()
                } else {
                    return Err(reject(format!(
                        "'{}' is not one of the field's options",
                        value
                    )));
                };
                writes.push(FieldWrite {
                    target: lookup.id,
                    key: b"V",
                    value: encode_text_string(&export),
                });
            }
            FieldKind::Checkbox | FieldKind::Radio => {
                let mut states: Vec<String> = Vec::new();
                for widget in &lookup.widgets {
                    for state in self.widget_states(*widget) {
                        if !states.contains(&state) {
                            states.push(state);
                        }
                    }
                }

                let state = match value.strip_prefix('/').unwrap_or(value) {
                    "" | "false" | OFF_STATE => OFF_STATE.to_string(),
                    "true" => states.first().cloned().unwrap_or_else(|| "Yes".to_string()),
                    other => other.to_string(),
                };
                if state != OFF_STATE && !states.is_empty() && !states.contains(&state) {
                    return Err(reject(format!(
                        "'{}' is not a valid state (expected one of: {}, {})",
                        state,
                        states.join(", "),
                        OFF_STATE
                    )));
                }

                writes.push(FieldWrite {
                    target: lookup.id,
                    key: b"V",
                    value: Object::Name(state.clone().into_bytes()),
                });
                for widget in &lookup.widgets {
                    let widget_states = self.widget_states(*widget);
                    let appearance = if widget_states.is_empty() || widget_states.contains(&state)
                    {
                        state.as_str()
                    } else {
                        OFF_STATE
                    };
                    writes.push(FieldWrite {
                        target: *widget,
                        key: b"AS",
                        value: Object::Name(appearance.as_bytes().to_vec()),
                    });
                }
            }
            FieldKind::PushButton => {
                return Err(reject("push buttons do not hold a value".to_string()));
            }
            FieldKind::Signature => {
                return Err(reject("signature fields cannot be filled".to_string()));
            }
        }

        Ok(())
    }
}
