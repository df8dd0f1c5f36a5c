use lopdf::content::{Content, Operation};
use lopdf::Object;

use crate::error::ContextError;

/// The definition of a line-style overlay annotation, expressed in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAnnotation {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// The RGB color of the line.
    pub color: [f32; 3],
    pub opacity: f32,
    pub width: f64,
}

impl LineAnnotation {
    /// The rectangle enclosing the line together with its thickness.
    pub fn rectangle(&self) -> [f64; 4] {
        let half_width = self.width / 2.0;
        [
            self.x1.min(self.x2) - half_width,
            self.y1.min(self.y2) - half_width,
            self.x1.max(self.x2) + half_width,
            self.y1.max(self.y2) + half_width,
        ]
    }

    /// Inserts the annotation into the document, together with its appearance stream,
    /// and returns the identifier of the annotation dictionary.
    pub fn insert_into_document(
        &self,
        inner_document: &mut lopdf::Document,
    ) -> Result<lopdf::ObjectId, ContextError> {
        use lopdf::Object::*;

        let rectangle: Vec<Object> = self
            .rectangle()
            .iter()
            .map(|&coordinate| Real(coordinate as f32))
            .collect();
        let color: Vec<Object> = self.color.iter().map(|&component| Real(component)).collect();

        // Viewers which do not regenerate the appearance of line annotations rely on this stream
        let appearance_id = inner_document.add_object(self.appearance_stream(rectangle.clone())?);

        let annotation = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Annot".into())),
            ("Subtype", Name("Line".into())),
            ("Rect", Array(rectangle)),
            (
                "L",
                Array(vec![
                    Real(self.x1 as f32),
                    Real(self.y1 as f32),
                    Real(self.x2 as f32),
                    Real(self.y2 as f32),
                ]),
            ),
            ("C", Array(color)),
            ("CA", Real(self.opacity)),
            (
                "BS",
                Dictionary(lopdf::Dictionary::from_iter(vec![
                    ("W", Real(self.width as f32)),
                    ("S", Name("S".into())),
                ])),
            ),
            // Print the annotation together with the page
            ("F", Integer(4)),
            (
                "AP",
                Dictionary(lopdf::Dictionary::from_iter(vec![(
                    "N",
                    Reference(appearance_id),
                )])),
            ),
        ]);

        Ok(inner_document.add_object(annotation))
    }

    fn appearance_stream(&self, bounding_box: Vec<Object>) -> Result<lopdf::Stream, ContextError> {
        use lopdf::Object::*;

        let [r, g, b] = self.color;
        let content = Content {
            operations: vec![
                Operation::new("gs", vec![Name("GS0".into())]),
                Operation::new("RG", vec![Real(r), Real(g), Real(b)]),
                Operation::new("w", vec![Real(self.width as f32)]),
                Operation::new("m", vec![Real(self.x1 as f32), Real(self.y1 as f32)]),
                Operation::new("l", vec![Real(self.x2 as f32), Real(self.y2 as f32)]),
                Operation::new("S", vec![]),
            ],
        };
        let content = content.encode().map_err(|error| {
            ContextError::with_error("Failed to encode the annotation appearance", &error)
        })?;

        let transparency = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("ExtGState".into())),
            ("CA", Real(self.opacity)),
            ("ca", Real(self.opacity)),
        ]);
        let resources = lopdf::Dictionary::from_iter(vec![(
            "ExtGState",
            Dictionary(lopdf::Dictionary::from_iter(vec![(
                "GS0",
                Dictionary(transparency),
            )])),
        )]);

        Ok(lopdf::Stream::new(
            lopdf::Dictionary::from_iter(vec![
                ("Type", Name("XObject".into())),
                ("Subtype", Name("Form".into())),
                ("BBox", Array(bounding_box)),
                ("Resources", Dictionary(resources)),
            ]),
            content,
        ))
    }
}
