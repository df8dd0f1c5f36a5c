use lopdf::{Object, ObjectId};
use std::{collections::BTreeMap, path::Path};

use crate::error::{ContextError, ErrorKind};
use crate::notebook::{Orientation, DEVICE_HEIGHT, DEVICE_WIDTH};
use crate::pdf::{rectangle_to_object, PdfDocument, PdfPage};
use crate::transform::{adjust_for_overflow, fit_device_to_page, BoxSet, PageScale, Rectangle};

/// The attributes a page may inherit from the nodes of the page tree above it.
const INHERITABLE_ATTRIBUTES: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];
/// Page trees deeper than this are considered malformed.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A PDF document whose pages the strokes are drawn onto.
pub struct BackgroundDocument {
    inner_document: lopdf::Document,
    /// The identifiers of the pages, by their 1-based page number.
    pages: BTreeMap<u32, ObjectId>,
}

impl BackgroundDocument {
    /// Parse the background document from its bytes.
    pub fn load_mem(pdf_bytes: &[u8]) -> Result<Self, ContextError> {
        let inner_document = lopdf::Document::load_mem(pdf_bytes).map_err(|error| {
            ContextError::with_error("Failed to parse the background document", &error)
                .with_kind(ErrorKind::Resolution)
        })?;
        let pages = inner_document.get_pages();
        log::debug!("Loaded a background document with {} pages", pages.len());

        Ok(BackgroundDocument {
            inner_document,
            pages,
        })
    }

    /// Load the background document from the file at the given path.
    pub fn from_path(pdf_path: &Path) -> Result<Self, ContextError> {
        let pdf_bytes = std::fs::read(pdf_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the background document {:?}", pdf_path),
                &error,
            )
            .with_kind(ErrorKind::Resolution)
        })?;

        BackgroundDocument::load_mem(&pdf_bytes)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Retrieve the identifier of the page with the given 1-based number.
    pub fn page(&self, page_number: u32) -> Result<ObjectId, ContextError> {
        self.pages.get(&page_number).copied().ok_or_else(|| {
            ContextError::with_context(format!(
                "The background document has no page {} (it has {} pages)",
                page_number,
                self.pages.len()
            ))
            .with_kind(ErrorKind::Resolution)
        })
    }

    /// Read the boundary boxes of the page, resolving the ones inherited from the page tree.
    pub fn boxes(&self, page_id: ObjectId) -> Result<BoxSet, ContextError> {
        let media = match self.inherited_attribute(page_id, b"MediaBox") {
            Some(media) => self.rectangle(media)?,
            None => {
                return Err(ContextError::with_context(format!(
                    "The background page {:?} has no media box",
                    page_id
                ))
                .with_kind(ErrorKind::Resolution))
            }
        };
        let crop = self
            .inherited_attribute(page_id, b"CropBox")
            .map(|crop| self.rectangle(crop))
            .transpose()?;
        let trim = self
            .page_dictionary_ref(page_id)?
            .get(b"TrimBox")
            .ok()
            .map(|trim| self.rectangle(trim))
            .transpose()?;

        Ok(BoxSet { trim, crop, media })
    }

    /// Replace the boundary boxes of the page. Optional boxes which are absent are removed.
    pub fn set_boxes(&mut self, page_id: ObjectId, boxes: &BoxSet) -> Result<(), ContextError> {
        let page_dictionary = self
            .inner_document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|error| {
                ContextError::with_error(format!("Failed to find the page {:?}", page_id), &error)
                    .with_kind(ErrorKind::Resolution)
            })?;

        page_dictionary.set("MediaBox", rectangle_to_object(&boxes.media));
        for (key, rectangle) in [("TrimBox", boxes.trim), ("CropBox", boxes.crop)] {
            match rectangle {
                Some(rectangle) => page_dictionary.set(key, rectangle_to_object(&rectangle)),
                None => {
                    page_dictionary.remove(key.as_bytes());
                }
            }
        }

        Ok(())
    }

    /// Retrieve a copy of the page dictionary in which the inherited attributes are set explicitly,
    /// so that the page stands on its own once detached from its page tree.
    pub fn page_dictionary(&self, page_id: ObjectId) -> Result<lopdf::Dictionary, ContextError> {
        let mut page_dictionary = self.page_dictionary_ref(page_id)?.clone();
        for key in INHERITABLE_ATTRIBUTES {
            if page_dictionary.has(key.as_bytes()) {
                continue;
            }
            if let Some(value) = self.inherited_attribute(page_id, key.as_bytes()) {
                page_dictionary.set(key, value.clone());
            }
        }

        Ok(page_dictionary)
    }

    pub(crate) fn inner(&self) -> &lopdf::Document {
        &self.inner_document
    }

    fn page_dictionary_ref(&self, page_id: ObjectId) -> Result<&lopdf::Dictionary, ContextError> {
        self.inner_document.get_dictionary(page_id).map_err(|error| {
            ContextError::with_error(format!("Failed to find the page {:?}", page_id), &error)
                .with_kind(ErrorKind::Resolution)
        })
    }

    // Walk up the page tree until a node defines the attribute.
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.inner_document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_PAGE_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.inner_document.get_dictionary(parent_id).ok()?;
        }
        None
    }

    fn rectangle(&self, object: &Object) -> Result<Rectangle, ContextError> {
        let to_resolution_error = |error: lopdf::Error| {
            ContextError::with_error("Malformed page boundary box", &error)
                .with_kind(ErrorKind::Resolution)
        };
        let (_, object) = self
            .inner_document
            .dereference(object)
            .map_err(to_resolution_error)?;
        let coordinates = object
            .as_array()
            .map_err(to_resolution_error)?
            .iter()
            .map(|coordinate| self.number(coordinate))
            .collect::<Result<Vec<f64>, ContextError>>()?;

        match coordinates.as_slice() {
            // Any two opposite corners are allowed
            &[x1, y1, x2, y2] => Ok(Rectangle::new(
                x1.min(x2),
                y1.min(y2),
                x1.max(x2),
                y1.max(y2),
            )),
            _ => Err(ContextError::with_context(format!(
                "A page boundary box has {} coordinates instead of 4",
                coordinates.len()
            ))
            .with_kind(ErrorKind::Resolution)),
        }
    }

    fn number(&self, object: &Object) -> Result<f64, ContextError> {
        match self.inner_document.dereference(object) {
            Ok((_, Object::Integer(value))) => Ok(*value as f64),
            Ok((_, Object::Real(value))) => Ok(f64::from(*value)),
            _ => Err(ContextError::with_context(format!(
                "Expected a number in a page boundary box, found {:?}",
                object
            ))
            .with_kind(ErrorKind::Resolution)),
        }
    }
}

/// An output page together with the transformation its strokes are drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPage {
    pub page: PdfPage,
    pub page_scale: PageScale,
    /// The vertical room added to the page so that the device canvas fits, zero for template pages.
    pub over: f64,
}

/// Appends the page backing the given notebook page to the output document.
///
/// Without a background document a blank page as large as the device is synthesized, and the strokes
/// are kept in device coordinates. Otherwise the page with the same number is copied from the background
/// document and the device canvas is fitted onto its trim box (or its media box when there is none).
/// A page with a trim box is enlarged downwards by half of the overflow.
///
/// # Arguments
///
/// * `output` - The document being assembled.
/// * `background` - The background document, `None` when drawing onto template pages.
/// * `orientation` - The orientation the notebook was written in.
/// * `page_number` - The 1-based number of the page in the background document.
pub fn resolve_page(
    output: &mut PdfDocument,
    background: Option<&mut BackgroundDocument>,
    orientation: Orientation,
    page_number: u32,
) -> Result<ResolvedPage, ContextError> {
    let background = match background {
        Some(background) => background,
        None => {
            let page = output.new_template_page(DEVICE_WIDTH, DEVICE_HEIGHT);
            log::debug!("Created the template page {}", page_number);
            return Ok(ResolvedPage {
                page,
                page_scale: PageScale::identity(),
                over: 0.0,
            });
        }
    };

    let source_page_id = background.page(page_number)?;
    let boxes = background.boxes(source_page_id)?;
    let (crop, cropped) = boxes.crop_rectangle();
    let fit = fit_device_to_page(
        DEVICE_WIDTH,
        DEVICE_HEIGHT,
        &crop,
        orientation == Orientation::Landscape,
    );
    if cropped {
        background.set_boxes(source_page_id, &adjust_for_overflow(boxes, fit.over))?;
    }

    let page = output.add_background_page(
        background,
        source_page_id,
        crop.width(),
        crop.height() + fit.over,
    )?;
    log::debug!(
        "Resolved the background page {} with scale {:.4}, overflow {:.2} and rotation {}",
        page_number,
        fit.scale.scale_x,
        fit.over,
        fit.scale.rotate
    );

    Ok(ResolvedPage {
        page,
        page_scale: fit.scale,
        over: fit.over,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::Object::*;

    /// Builds a background document whose media box is inherited from the root of the page tree.
    pub(crate) fn background_bytes(
        page_count: usize,
        media_box: [i64; 4],
        trim_box: Option<[i64; 4]>,
    ) -> Vec<u8> {
        let mut document = lopdf::Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let content_id = document.add_object(lopdf::Stream::new(
            lopdf::Dictionary::new(),
            b"2 0 0 2 0 0 cm\n0 0 10 10 re f".to_vec(),
        ));

        let kids: Vec<Object> = (0..page_count)
            .map(|_| {
                let mut page = lopdf::Dictionary::from_iter(vec![
                    ("Type", Name("Page".into())),
                    ("Parent", Reference(pages_id)),
                    ("Contents", Reference(content_id)),
                ]);
                if let Some(trim_box) = trim_box {
                    page.set("TrimBox", Array(trim_box.iter().map(|&c| Integer(c)).collect()));
                }
                Reference(document.add_object(page))
            })
            .collect();
        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Pages".into())),
            ("Count", Integer(page_count as i64)),
            ("Kids", Array(kids)),
            ("MediaBox", Array(media_box.iter().map(|&c| Integer(c)).collect())),
            ("Resources", Dictionary(lopdf::Dictionary::new())),
        ]);
        document.objects.insert(pages_id, Dictionary(pages));
        let catalog_id = document.add_object(lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Catalog".into())),
            ("Pages", Reference(pages_id)),
        ]));
        document.trailer.set("Root", Reference(catalog_id));

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).unwrap();
        bytes
    }

    /// Reloads a background document after changing one of its pages.
    fn edit_page(
        bytes: Vec<u8>,
        page_number: u32,
        edit: impl FnOnce(&mut lopdf::Document, ObjectId),
    ) -> Vec<u8> {
        let mut document = lopdf::Document::load_mem(&bytes).unwrap();
        let page_id = document.get_pages()[&page_number];
        edit(&mut document, page_id);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).unwrap();
        bytes
    }

    fn rectangle_numbers(dictionary: &lopdf::Dictionary, key: &[u8]) -> Vec<f64> {
        dictionary
            .get(key)
            .and_then(Object::as_array)
            .unwrap()
            .iter()
            .map(|coordinate| match coordinate {
                Integer(value) => *value as f64,
                Real(value) => f64::from(*value),
                other => panic!("{:?} is not a number", other),
            })
            .collect()
    }

    #[test]
    fn media_box_is_inherited_from_the_page_tree() {
        let background =
            BackgroundDocument::load_mem(&background_bytes(2, [0, 0, 612, 792], None)).unwrap();
        let boxes = background.boxes(background.page(2).unwrap()).unwrap();

        assert_eq!(background.page_count(), 2);
        assert_eq!(boxes.media, Rectangle::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(boxes.trim, None);
        assert_eq!(boxes.crop, None);

        let page_dictionary = background.page_dictionary(background.page(1).unwrap()).unwrap();
        assert!(page_dictionary.has(b"MediaBox"));
        assert!(page_dictionary.has(b"Resources"));
    }

    #[test]
    fn missing_page_is_a_resolution_error() {
        let background =
            BackgroundDocument::load_mem(&background_bytes(1, [0, 0, 612, 792], None)).unwrap();
        let error = background.page(3).unwrap_err();

        assert_eq!(error.kind, ErrorKind::Resolution);
        assert!(!error.is_fatal());
    }

    #[test]
    fn garbage_is_not_a_background_document() {
        let error = BackgroundDocument::load_mem(b"not a pdf").err().unwrap();

        assert_eq!(error.kind, ErrorKind::Resolution);
    }

    #[test]
    fn template_page_keeps_device_coordinates() {
        let mut output = PdfDocument::new("template".into());
        let resolved = resolve_page(&mut output, None, Orientation::Landscape, 1).unwrap();

        assert_eq!(resolved.page_scale, PageScale::identity());
        assert_eq!(resolved.page.width, DEVICE_WIDTH);
        assert_eq!(resolved.page.height, DEVICE_HEIGHT);
        assert_eq!(resolved.over, 0.0);
    }

    #[test]
    fn trimmed_page_is_fitted_to_its_trim_box() {
        let mut background = BackgroundDocument::load_mem(&background_bytes(
            1,
            [0, 0, 612, 792],
            Some([0, 0, 600, 800]),
        ))
        .unwrap();
        let mut output = PdfDocument::new("trimmed".into());
        let resolved =
            resolve_page(&mut output, Some(&mut background), Orientation::Portrait, 1).unwrap();

        assert!(!resolved.page_scale.rotate);
        assert!((resolved.page_scale.scale_x - 600.0 / DEVICE_WIDTH).abs() < 1e-9);
        assert_eq!(resolved.page.width, 600.0);
        assert!((resolved.page.height - (800.0 + resolved.over)).abs() < 1e-9);
        assert!(output.has_page(&resolved.page));

        // The copied page carries the enlarged boxes
        let page_dictionary = output.inner_document.get_dictionary(resolved.page.id).unwrap();
        let media_box = page_dictionary.get(b"MediaBox").and_then(Object::as_array).unwrap();
        assert!(matches!(media_box[0], Real(llx) if llx == 0.0));
        assert!(page_dictionary.has(b"TrimBox"));
        assert!(page_dictionary.has(b"Contents"));
        assert!(!page_dictionary.has(b"Parent"));
    }

    #[test]
    fn untrimmed_page_keeps_its_boxes() {
        let mut background =
            BackgroundDocument::load_mem(&background_bytes(1, [0, 0, 612, 792], None)).unwrap();
        let page_id = background.page(1).unwrap();
        let mut output = PdfDocument::new("untrimmed".into());
        let resolved =
            resolve_page(&mut output, Some(&mut background), Orientation::Portrait, 1).unwrap();

        assert!(resolved.over > 0.0);
        assert_eq!(
            background.boxes(page_id).unwrap().media,
            Rectangle::new(0.0, 0.0, 612.0, 792.0)
        );
    }

    #[test]
    fn set_boxes_removes_absent_boxes() {
        let mut background = BackgroundDocument::load_mem(&background_bytes(
            1,
            [0, 0, 612, 792],
            Some([10, 10, 600, 780]),
        ))
        .unwrap();
        let page_id = background.page(1).unwrap();
        let boxes = BoxSet {
            trim: None,
            crop: Some(Rectangle::new(0.0, 0.0, 300.0, 400.0)),
            media: Rectangle::new(0.0, 0.0, 300.0, 400.0),
        };
        background.set_boxes(page_id, &boxes).unwrap();

        assert_eq!(background.boxes(page_id).unwrap(), boxes);
    }

    #[test]
    fn trimmed_page_with_overflow_is_enlarged_downwards() {
        let bytes = edit_page(
            background_bytes(1, [10, 0, 630, 710], Some([20, 0, 620, 700])),
            1,
            |document, page_id| {
                let crop_box = Array(vec![Integer(15), Integer(0), Integer(625), Integer(705)]);
                document
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .unwrap()
                    .set("CropBox", crop_box);
            },
        );
        let mut background = BackgroundDocument::load_mem(&bytes).unwrap();
        let mut output = PdfDocument::new("overflow".into());
        let resolved =
            resolve_page(&mut output, Some(&mut background), Orientation::Portrait, 1).unwrap();

        let scale = 600.0 / DEVICE_WIDTH;
        let over = (DEVICE_HEIGHT * scale - 700.0) / 2.0 / scale;
        assert!(over > 100.0);
        assert!((resolved.over - over).abs() < 1e-9);
        assert!((resolved.page.height - (700.0 + over)).abs() < 1e-9);
        assert_eq!(resolved.page_scale.shift_x, 0.0);
        assert!((resolved.page_scale.shift_y + over).abs() < 1e-9);

        let page_dictionary = output.inner_document.get_dictionary(resolved.page.id).unwrap();
        let trim_box = rectangle_numbers(page_dictionary, b"TrimBox");
        let crop_box = rectangle_numbers(page_dictionary, b"CropBox");
        let media_box = rectangle_numbers(page_dictionary, b"MediaBox");
        let tolerance = 1e-2;
        assert_eq!(trim_box[0], 20.0);
        assert!((trim_box[1] + over / 2.0).abs() < tolerance);
        assert_eq!(&trim_box[2..], &[620.0, 700.0]);
        // The crop box and the media box now start at the left edge
        assert_eq!(crop_box[0], 0.0);
        assert!((crop_box[1] + over / 2.0).abs() < tolerance);
        assert_eq!(&crop_box[2..], &[625.0, 705.0]);
        assert_eq!(media_box[0], 0.0);
        assert!((media_box[1] + over / 2.0).abs() < tolerance);
        assert_eq!(&media_box[2..], &[630.0, 710.0]);
    }

    #[test]
    fn landscape_notebook_is_rotated_onto_a_wide_page() {
        let mut background =
            BackgroundDocument::load_mem(&background_bytes(1, [0, 10, 700, 610], None)).unwrap();
        let mut output = PdfDocument::new("landscape".into());
        let resolved =
            resolve_page(&mut output, Some(&mut background), Orientation::Landscape, 1).unwrap();

        let scale = 700.0 / DEVICE_HEIGHT;
        let h = 600.0 / DEVICE_WIDTH;
        let over = (DEVICE_HEIGHT * h - 700.0) / 2.0 / h;
        assert!(resolved.page_scale.rotate);
        assert!((resolved.page_scale.scale_x - scale).abs() < 1e-9);
        assert!((resolved.page_scale.scale_y - scale).abs() < 1e-9);
        assert!((resolved.over - over).abs() < 1e-9);
        assert_eq!(resolved.page_scale.shift_x, 10.0);
        assert!((resolved.page_scale.shift_y - (10.0 - over + 700.0)).abs() < 1e-9);
        assert_eq!(resolved.page.width, 700.0);
        assert!((resolved.page.height - (600.0 + over)).abs() < 1e-9);
    }

    #[test]
    fn portrait_page_is_not_rotated_for_a_landscape_notebook() {
        let mut background =
            BackgroundDocument::load_mem(&background_bytes(1, [0, 0, 612, 792], None)).unwrap();
        let mut output = PdfDocument::new("portrait".into());
        let resolved =
            resolve_page(&mut output, Some(&mut background), Orientation::Landscape, 1).unwrap();

        assert!(!resolved.page_scale.rotate);
    }

    #[test]
    fn content_streams_of_a_page_are_joined_on_separate_lines() {
        let bytes = edit_page(
            background_bytes(1, [0, 0, 612, 792], None),
            1,
            |document, page_id| {
                let first = document.add_object(lopdf::Stream::new(
                    lopdf::Dictionary::new(),
                    b"0 0 10 10 re f".to_vec(),
                ));
                let second = document.add_object(lopdf::Stream::new(
                    lopdf::Dictionary::new(),
                    b"q 2 0 0 2 0 0 cm Q".to_vec(),
                ));
                document
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .unwrap()
                    .set("Contents", Array(vec![Reference(first), Reference(second)]));
            },
        );
        let mut background = BackgroundDocument::load_mem(&bytes).unwrap();
        let mut output = PdfDocument::new("streams".into());
        let resolved =
            resolve_page(&mut output, Some(&mut background), Orientation::Portrait, 1).unwrap();

        assert_eq!(
            output.page_content(&resolved.page).unwrap(),
            b"0 0 10 10 re f\nq 2 0 0 2 0 0 cm Q".to_vec()
        );
    }

    #[test]
    fn links_to_a_later_page_point_to_its_copy() {
        let bytes = edit_page(
            background_bytes(2, [0, 0, 612, 792], None),
            1,
            |document, page_id| {
                let target_id = document.get_pages()[&2];
                let link_id = document.add_object(lopdf::Dictionary::from_iter(vec![
                    ("Type", Name("Annot".into())),
                    ("Subtype", Name("Link".into())),
                    ("Rect", Array(vec![Integer(0), Integer(0), Integer(50), Integer(50)])),
                    ("Dest", Array(vec![Reference(target_id), Name("Fit".into())])),
                ]));
                document
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .unwrap()
                    .set("Annots", Array(vec![Reference(link_id)]));
            },
        );
        let mut background = BackgroundDocument::load_mem(&bytes).unwrap();
        let mut output = PdfDocument::new("links".into());
        let first =
            resolve_page(&mut output, Some(&mut background), Orientation::Portrait, 1).unwrap();
        let second =
            resolve_page(&mut output, Some(&mut background), Orientation::Portrait, 2).unwrap();

        let document = &output.inner_document;
        let annotations = document
            .get_dictionary(first.page.id)
            .and_then(|page| page.get(b"Annots"))
            .and_then(Object::as_array)
            .unwrap();
        let link = annotations[0]
            .as_reference()
            .and_then(|link_id| document.get_dictionary(link_id))
            .unwrap();
        let destination = link.get(b"Dest").and_then(Object::as_array).unwrap();
        assert_eq!(destination[0].as_reference().unwrap(), second.page.id);

        let target = document.get_dictionary(second.page.id).unwrap();
        assert_eq!(target.get(b"Type").and_then(Object::as_name).unwrap(), b"Page");
        assert_eq!(output.page_ids(), &[first.page.id, second.page.id]);
    }
}
