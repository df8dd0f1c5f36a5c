use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ContextError, ErrorKind};

/// Width of the addressable device canvas the strokes are authored in.
pub const DEVICE_WIDTH: f64 = 1404.0;
/// Height of the addressable device canvas the strokes are authored in.
pub const DEVICE_HEIGHT: f64 = 1872.0;

/// A sampled position of the pen in device space.
///
/// The archive may carry further sampling attributes such as speed, direction, width and
/// pressure, these are accepted while deserializing but not used for rendering.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct DevicePoint {
    pub x: f32,
    pub y: f32,
}

impl DevicePoint {
    pub fn new(x: f32, y: f32) -> Self {
        DevicePoint { x, y }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BrushType {
    PaintBrush,
    Pencil,
    BallPoint,
    Marker,
    Fineliner,
    MechanicalPencil,
    Calligraphy,
    Highlighter,
    Eraser,
    EraseArea,
}

impl BrushType {
    /// Erasers leave no mark: the erasure has already been applied when the strokes were parsed.
    pub fn is_eraser(self) -> bool {
        matches!(self, BrushType::Eraser | BrushType::EraseArea)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BrushSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BrushColor {
    Black,
    Grey,
    White,
}

/// A single stroke: the points are drawn in the order they were sampled.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub brush_type: BrushType,
    pub brush_size: BrushSize,
    pub brush_color: BrushColor,
    #[serde(default)]
    pub points: Vec<DevicePoint>,
}

/// The lines of a layer, later layers are drawn on top of the earlier ones.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    #[serde(default)]
    pub lines: Vec<Line>,
}

/// The annotations of a single notebook page. A page whose layers are absent has no content.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageAnnotations {
    #[serde(default)]
    pub layers: Option<Vec<Layer>>,
}

impl PageAnnotations {
    pub fn has_content(&self) -> bool {
        self.layers.is_some()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FileType {
    Notebook,
    Pdf,
    Epub,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// The parsed content of a notebook archive: its metadata, the background PDF (if any)
/// and the annotations of every page.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NotebookArchive {
    pub file_type: FileType,
    #[serde(default)]
    pub orientation: Orientation,
    /// Path of the background PDF, relative to the archive description.
    #[serde(default)]
    pub background_path: Option<PathBuf>,
    /// Raw bytes of the background PDF, empty when the notebook has no background.
    #[serde(skip)]
    pub background: Vec<u8>,
    pub pages: Vec<PageAnnotations>,
}

impl NotebookArchive {
    /// Read and parse the archive description found at the given path, together with its background.
    pub fn from_path(archive_path: &Path) -> Result<NotebookArchive, ContextError> {
        let archive_content = std::fs::read(archive_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the notebook archive {:?}", archive_path),
                &error,
            )
        })?;
        let reader = JsonArchiveReader {
            base_directory: archive_path.parent().map(Path::to_path_buf),
        };

        reader.read(&archive_content)
    }

    pub fn has_background(&self) -> bool {
        !self.background.is_empty()
    }

    /// Reject the archives which cannot be turned into a PDF document.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.file_type == FileType::Epub {
            return Err(ContextError::rejected("only pdf and notebooks supported"));
        }
        if self.pages.is_empty() {
            return Err(ContextError::rejected("the document has no pages"));
        }

        Ok(())
    }
}

/// Turns the bytes of an archive into its parsed content.
pub trait ArchiveReader {
    fn read(&self, bytes: &[u8]) -> Result<NotebookArchive, ContextError>;
}

/// Reads archives described as JSON documents, the background PDF being referenced by path.
#[derive(Debug, Default, Clone)]
pub struct JsonArchiveReader {
    /// The directory relative background paths are resolved against.
    pub base_directory: Option<PathBuf>,
}

impl ArchiveReader for JsonArchiveReader {
    fn read(&self, bytes: &[u8]) -> Result<NotebookArchive, ContextError> {
        let mut archive: NotebookArchive = serde_json::from_slice(bytes).map_err(|error| {
            ContextError::with_error("Unable to parse the notebook archive", &error)
                .with_kind(ErrorKind::InputRejected)
        })?;

        if let Some(background_path) = &archive.background_path {
            let background_path = match &self.base_directory {
                Some(base_directory) if background_path.is_relative() => {
                    base_directory.join(background_path)
                }
                _ => background_path.clone(),
            };
            archive.background = std::fs::read(&background_path).map_err(|error| {
                ContextError::with_error(
                    format!("Unable to read the background document {:?}", background_path),
                    &error,
                )
            })?;
            log::debug!(
                "Loaded the background document {:?} ({} bytes)",
                background_path,
                archive.background.len()
            );
        }

        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVE: &str = r#"{
        "fileType": "notebook",
        "orientation": "landscape",
        "pages": [
            {
                "layers": [
                    {
                        "lines": [
                            {
                                "brushType": "fineliner",
                                "brushSize": "large",
                                "brushColor": "grey",
                                "points": [
                                    { "x": 10.0, "y": 20.0, "speed": 0.1, "pressure": 0.4 },
                                    { "x": 11.5, "y": 22.0 }
                                ]
                            }
                        ]
                    }
                ]
            },
            { "layers": null },
            {}
        ]
    }"#;

    #[test]
    fn parse_archive_description() {
        let archive = JsonArchiveReader::default()
            .read(ARCHIVE.as_bytes())
            .unwrap();

        assert_eq!(archive.file_type, FileType::Notebook);
        assert_eq!(archive.orientation, Orientation::Landscape);
        assert!(!archive.has_background());
        assert_eq!(archive.pages.len(), 3);
        assert!(archive.pages[0].has_content());
        assert!(!archive.pages[1].has_content());
        assert!(!archive.pages[2].has_content());

        let line = &archive.pages[0].layers.as_ref().unwrap()[0].lines[0];
        assert_eq!(line.brush_type, BrushType::Fineliner);
        assert_eq!(line.brush_size, BrushSize::Large);
        assert_eq!(line.brush_color, BrushColor::Grey);
        assert_eq!(line.points, vec![DevicePoint::new(10.0, 20.0), DevicePoint::new(11.5, 22.0)]);
    }

    #[test]
    fn orientation_defaults_to_portrait() {
        let archive = JsonArchiveReader::default()
            .read(br#"{ "fileType": "pdf", "pages": [{}] }"#)
            .unwrap();

        assert_eq!(archive.orientation, Orientation::Portrait);
        assert!(archive.validate().is_ok());
    }

    #[test]
    fn reject_epub_and_empty_archives() {
        let epub = JsonArchiveReader::default()
            .read(br#"{ "fileType": "epub", "pages": [{}] }"#)
            .unwrap();
        let error = epub.validate().unwrap_err();
        assert_eq!(error.kind, ErrorKind::InputRejected);
        assert_eq!(error.to_string(), "only pdf and notebooks supported");

        let empty = JsonArchiveReader::default()
            .read(br#"{ "fileType": "notebook", "pages": [] }"#)
            .unwrap();
        assert_eq!(
            empty.validate().unwrap_err().to_string(),
            "the document has no pages"
        );
    }

    #[test]
    fn malformed_archive_is_rejected() {
        let error = JsonArchiveReader::default()
            .read(br#"{ "fileType": "spreadsheet", "pages": [] }"#)
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InputRejected);
    }

    #[test]
    fn missing_background_is_reported() {
        let reader = JsonArchiveReader {
            base_directory: Some(PathBuf::from("/nonexistent")),
        };
        let error = reader
            .read(br#"{ "fileType": "pdf", "backgroundPath": "background.pdf", "pages": [{}] }"#)
            .unwrap_err();

        assert!(error.context.contains("background.pdf"));
    }

    #[test]
    fn only_erasers_are_erasers() {
        assert!(BrushType::Eraser.is_eraser());
        assert!(BrushType::EraseArea.is_eraser());
        assert!(!BrushType::Highlighter.is_eraser());
        assert!(!BrushType::BallPoint.is_eraser());
    }
}
