use lopdf::{Object, ObjectId};
use std::{
    collections::BTreeMap,
    io::{BufWriter, Write as _},
    mem,
    path::Path,
};
use time::OffsetDateTime;

use crate::annotation::LineAnnotation;
use crate::background::BackgroundDocument;
use crate::error::{ContextError, ErrorKind};
use crate::transform::Rectangle;

/// The resource name of the font used for the page numbers.
const FOOTER_FONT_NAME: &str = "FPageNumber";
const FOOTER_FONT_SIZE: i64 = 8;
/// Distance of the page number from the right edge of the page.
const FOOTER_RIGHT_MARGIN: f64 = 20.0;
/// Height of the baseline of the page number above the bottom edge of the page.
const FOOTER_BASELINE: f64 = 4.0;

/// A page of the output document, together with the size its drawings are laid out in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPage {
    /// The identifier of the page dictionary in the output document.
    pub id: ObjectId,
    pub width: f64,
    /// The height the Y axis of the strokes is flipped against.
    pub height: f64,
}

/// This struct represents the output PDF document on a high-level. It is an interface to the underlying
/// `lopdf::Document`, which keeps track of the pages appended so far so that the page tree can be
/// written once, when the document is finalized.
pub struct PdfDocument {
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary, anyway this is why it is exposed to the user.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used to in order to set the PDF `ID` tag.
    pub identifier: String,
    /// The identifier reserved for the root of the page tree.
    pages_id: ObjectId,
    /// The pages of the PDF document, in order.
    pages: Vec<ObjectId>,
    /// The objects already copied from the background document, by their identifier in it.
    copied_objects: BTreeMap<ObjectId, ObjectId>,
    /// The font used for the page numbers, inserted the first time it is needed.
    footer_font_id: Option<ObjectId>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier.
    pub fn new(pdf_document_identifier: String) -> Self {
        let mut inner_document = lopdf::Document::with_version("1.5");
        let pages_id = inner_document.new_object_id();

        PdfDocument {
            inner_document,
            identifier: pdf_document_identifier,
            pages_id,
            pages: Vec::new(),
            copied_objects: BTreeMap::new(),
            footer_font_id: None,
        }
    }

    /// The identifiers of the pages appended so far, in order.
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.pages
    }

    /// Whether the given page is part of the document.
    pub fn has_page(&self, page: &PdfPage) -> bool {
        self.pages.contains(&page.id)
            && self
                .inner_document
                .get_dictionary(page.id)
                .map(|page_dictionary| page_dictionary.has(b"Type"))
                .unwrap_or(false)
    }

    /// Appends an empty page of the given size, in points.
    pub fn new_template_page(&mut self, page_width: f64, page_height: f64) -> PdfPage {
        use lopdf::Object::*;

        let page_dictionary = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Page".into())),
            ("Rotate", Integer(0)),
            (
                "MediaBox",
                rectangle_to_object(&Rectangle::new(0.0, 0.0, page_width, page_height)),
            ),
            ("Resources", Dictionary(lopdf::Dictionary::new())),
        ]);
        let page_id = self.inner_document.add_object(page_dictionary);
        self.pages.push(page_id);

        PdfPage {
            id: page_id,
            width: page_width,
            height: page_height,
        }
    }

    /// Copies a page of the background document, with every object it depends on, at the end of
    /// the document.
    ///
    /// # Arguments
    ///
    /// * `background` - The document the page is copied from.
    /// * `source_page_id` - The identifier of the page in the background document.
    /// * `page_width` - The width the drawings are laid out in.
    /// * `page_height` - The height the drawings are laid out in.
    pub fn add_background_page(
        &mut self,
        background: &BackgroundDocument,
        source_page_id: ObjectId,
        page_width: f64,
        page_height: f64,
    ) -> Result<PdfPage, ContextError> {
        let source_page = background.page_dictionary(source_page_id)?;

        // Register the page before copying its content, so that annotations pointing back to it
        // are linked to the copy. A page already linked from an earlier page takes over the
        // identifier reserved for it.
        let page_id = match self.copied_objects.get(&source_page_id) {
            Some(&page_id) => page_id,
            None => {
                let page_id = self.inner_document.new_object_id();
                self.copied_objects.insert(source_page_id, page_id);
                page_id
            }
        };

        let mut page_dictionary = lopdf::Dictionary::new();
        for (key, value) in source_page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            let value = self.copy_object(background.inner(), value);
            page_dictionary.set(key.clone(), value);
        }

        self.inner_document
            .objects
            .insert(page_id, Object::Dictionary(page_dictionary));
        self.pages.push(page_id);

        Ok(PdfPage {
            id: page_id,
            width: page_width,
            height: page_height,
        })
    }

    /// Retrieve the decoded content of the page, empty if the page has none.
    /// The streams of a page with several content streams are joined on separate lines.
    pub fn page_content(&self, page: &PdfPage) -> Result<Vec<u8>, ContextError> {
        let mut content_fragments = Vec::new();
        for content_id in self.inner_document.get_page_contents(page.id) {
            let content_stream = self
                .inner_document
                .get_object(content_id)
                .and_then(Object::as_stream)
                .map_err(|error| {
                    ContextError::with_error(
                        format!("Failed to read the content stream {:?}", content_id),
                        &error,
                    )
                })?;
            // Streams without a filter are stored as they are
            let content = content_stream
                .decompressed_content()
                .unwrap_or_else(|_| content_stream.content.clone());
            content_fragments.push(content);
        }

        Ok(content_fragments.join(&b'\n'))
    }

    /// Replace the content of the page with the given stream.
    pub fn set_page_content(
        &mut self,
        page: &PdfPage,
        content_stream: lopdf::Stream,
    ) -> Result<(), ContextError> {
        let content_id = self.inner_document.add_object(content_stream);
        self.page_dictionary_mut(page)?
            .set("Contents", Object::Reference(content_id));

        Ok(())
    }

    /// Insert the annotation into the document and append it to the annotations of the page.
    pub fn add_annotation(
        &mut self,
        page: &PdfPage,
        annotation: &LineAnnotation,
    ) -> Result<(), ContextError> {
        let annotation_id = annotation.insert_into_document(&mut self.inner_document)?;

        let page_dictionary = self
            .inner_document
            .get_dictionary(page.id)
            .map_err(|error| {
                ContextError::with_error(format!("Failed to find the page {:?}", page.id), &error)
                    .with_kind(ErrorKind::Fatal)
            })?;
        let mut annotations = match page_dictionary.get(b"Annots") {
            Ok(annotations) => self
                .inner_document
                .dereference(annotations)
                .and_then(|(_, annotations)| annotations.as_array())
                .cloned()
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        annotations.push(Object::Reference(annotation_id));
        self.page_dictionary_mut(page)?
            .set("Annots", Object::Array(annotations));

        Ok(())
    }

    /// Registers the page number font in the resources of the page and returns the operations
    /// writing the number near the bottom-right corner of the page.
    pub fn page_number_operations(
        &mut self,
        page: &PdfPage,
        page_number: usize,
    ) -> Result<Vec<lopdf::content::Operation>, ContextError> {
        use lopdf::content::Operation;
        use lopdf::Object::*;

        let font_id = self.footer_font_id();
        let mut resources = self.page_resources(page)?;
        let mut fonts = match resources.get(b"Font") {
            Ok(fonts) => self
                .inner_document
                .dereference(fonts)
                .and_then(|(_, fonts)| fonts.as_dict())
                .cloned()
                .unwrap_or_default(),
            Err(_) => lopdf::Dictionary::new(),
        };
        fonts.set(FOOTER_FONT_NAME, Reference(font_id));
        resources.set("Font", Dictionary(fonts));
        self.page_dictionary_mut(page)?
            .set("Resources", Dictionary(resources));

        Ok(vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Name(FOOTER_FONT_NAME.into()), Integer(FOOTER_FONT_SIZE)],
            ),
            Operation::new(
                "Td",
                vec![
                    Real((page.width - FOOTER_RIGHT_MARGIN) as f32),
                    Real(FOOTER_BASELINE as f32),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(page_number.to_string())]),
            Operation::new("ET", vec![]),
        ])
    }

    /// Write the page tree, the catalog and the document information, then finalize the document.
    pub fn write_all(&mut self) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        if self.pages.is_empty() {
            log::warn!("The document {:?} has no pages", self.identifier);
        }

        let now = OffsetDateTime::now_utc();
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            (
                "CreationDate",
                String(to_pdf_timestamp_format(&now).into_bytes(), Literal),
            ),
            (
                "ModDate",
                String(to_pdf_timestamp_format(&now).into_bytes(), Literal),
            ),
            ("Producer", String(b"rmpdf".to_vec(), Literal)),
            (
                "Identifier",
                String(self.identifier.clone().into_bytes(), Literal),
            ),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        // Every page gets the new root of the page tree as its parent
        for page_id in self.pages.clone() {
            self.inner_document
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|error| {
                    ContextError::with_error(format!("Failed to find the page {:?}", page_id), &error)
                })?
                .set("Parent", Reference(self.pages_id));
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Pages".into())),
            ("Count", Integer(self.pages.len() as i64)),
            (
                "Kids",
                Array(self.pages.iter().map(|page_id| Reference(*page_id)).collect()),
            ),
        ]);
        self.inner_document
            .objects
            .insert(self.pages_id, Dictionary(pages));

        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Catalog".into())),
            ("PageLayout", Name("OneColumn".into())),
            ("PageMode", Name("UseNone".into())),
            ("Pages", Reference(self.pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Hexadecimal),
                String(self.identifier.clone().into_bytes(), Hexadecimal),
            ]),
        );

        self.optimize();
        // Renumbering moved the pages
        self.pages = self.inner_document.get_pages().into_values().collect();

        Ok(())
    }

    /// Drop the objects no page refers to and compress the streams.
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Save the `PdfDocument` to the file at the given path, overwriting it.
    pub fn save_to_file(&mut self, pdf_path: &Path) -> Result<(), ContextError> {
        let pdf_document_bytes = self.save_to_bytes()?;
        let mut pdf_file = std::fs::File::create(pdf_path).map_err(|error| {
            ContextError::with_error(format!("Failed to create the output file {:?}", pdf_path), &error)
        })?;
        pdf_file.write_all(&pdf_document_bytes).map_err(|error| {
            ContextError::with_error(format!("Failed to save the output file {:?}", pdf_path), &error)
        })?;

        Ok(())
    }

    /// Copies an object of the background document into this one, following its references.
    fn copy_object(&mut self, source: &lopdf::Document, object: &Object) -> Object {
        match object {
            Object::Reference(source_id) => {
                if let Some(copied_id) = self.copied_objects.get(source_id) {
                    return Object::Reference(*copied_id);
                }
                let copied_id = self.inner_document.new_object_id();
                self.copied_objects.insert(*source_id, copied_id);

                let copied_object = match source.get_object(*source_id) {
                    Ok(source_object) if !is_page_tree_node(source_object) => {
                        self.copy_object(source, source_object)
                    }
                    // Other pages are not dragged along, links to them are cut
                    Ok(_) => Object::Null,
                    Err(error) => {
                        log::warn!(
                            "Unable to find the object {:?} of the background document: {}",
                            source_id,
                            error
                        );
                        Object::Null
                    }
                };
                self.inner_document.objects.insert(copied_id, copied_object);

                Object::Reference(copied_id)
            }
            Object::Array(array) => Object::Array(
                array
                    .iter()
                    .map(|element| self.copy_object(source, element))
                    .collect(),
            ),
            Object::Dictionary(dictionary) => {
                Object::Dictionary(self.copy_dictionary(source, dictionary))
            }
            Object::Stream(stream) => {
                let mut copied_stream = stream.clone();
                copied_stream.dict = self.copy_dictionary(source, &stream.dict);
                Object::Stream(copied_stream)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(
        &mut self,
        source: &lopdf::Document,
        dictionary: &lopdf::Dictionary,
    ) -> lopdf::Dictionary {
        let mut copied_dictionary = lopdf::Dictionary::new();
        for (key, value) in dictionary.iter() {
            let value = self.copy_object(source, value);
            copied_dictionary.set(key.clone(), value);
        }
        copied_dictionary
    }

    fn footer_font_id(&mut self) -> ObjectId {
        use lopdf::Object::*;

        if let Some(font_id) = self.footer_font_id {
            return font_id;
        }
        let font_id = self
            .inner_document
            .add_object(lopdf::Dictionary::from_iter(vec![
                ("Type", Name("Font".into())),
                ("Subtype", Name("Type1".into())),
                ("BaseFont", Name("Helvetica".into())),
            ]));
        self.footer_font_id = Some(font_id);
        font_id
    }

    /// Retrieve an owned copy of the resources of the page, resolving a shared dictionary.
    fn page_resources(&self, page: &PdfPage) -> Result<lopdf::Dictionary, ContextError> {
        let page_dictionary = self
            .inner_document
            .get_dictionary(page.id)
            .map_err(|error| ContextError::with_error("Failed to find the page", &error))?;
        let resources = match page_dictionary.get(b"Resources") {
            Ok(resources) => self
                .inner_document
                .dereference(resources)
                .and_then(|(_, resources)| resources.as_dict())
                .cloned()
                .map_err(|error| {
                    ContextError::with_error("Failed to read the page resources", &error)
                })?,
            Err(_) => lopdf::Dictionary::new(),
        };

        Ok(resources)
    }

    // Retrieve the dictionary of the given page.
    fn page_dictionary_mut(
        &mut self,
        page: &PdfPage,
    ) -> Result<&mut lopdf::Dictionary, ContextError> {
        self.inner_document
            .get_object_mut(page.id)
            .and_then(Object::as_dict_mut)
            .map_err(|error| {
                ContextError::with_error(format!("Failed to find the page {:?}", page.id), &error)
                    .with_kind(ErrorKind::Fatal)
            })
    }
}

fn is_page_tree_node(object: &Object) -> bool {
    matches!(object.type_name(), Ok("Page") | Ok("Pages"))
}

pub(crate) fn rectangle_to_object(rectangle: &Rectangle) -> Object {
    Object::Array(
        [rectangle.llx, rectangle.lly, rectangle.urx, rectangle.ury]
            .iter()
            .map(|&coordinate| Object::Real(coordinate as f32))
            .collect(),
    )
}

/// Builds a document identifier out of the current time, 32 hexadecimal characters long.
pub fn generate_identifier() -> String {
    format!("{:032x}", OffsetDateTime::now_utc().unix_timestamp_nanos())
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
