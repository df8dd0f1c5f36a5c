//! rmpdf turns the vector strokes of a handwritten notebook into a PDF document, either on blank
//! pages as large as the device canvas or on top of the pages of an existing PDF document.
//!
//! The notebook is read from a JSON description of its archive (see the `notebook` module), the strokes
//! are mapped from device space into the space of every page and drawn as paths, while the highlighter
//! strokes become translucent line annotations. The entry point is the `PdfGenerator` struct.

/// The module where the notebook archive is modelled and loaded.
///
/// # Introduction
///
/// A notebook archive is made of pages, each of them holding layers of lines. A line is a sampled
/// stroke of the pen with a brush type, a size and a color. The coordinates of the points are expressed
/// in the space of the device canvas, which is `DEVICE_WIDTH` by `DEVICE_HEIGHT` units large
/// with the Y axis growing downwards.
///
/// Archives are read through the `ArchiveReader` trait, the default implementation parsing
/// a JSON description which references its background PDF document by path.
pub mod notebook;

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// Every error carries a context, the message of the error it propagates (if any) and an `ErrorKind`,
/// which lets the callers tell apart a rejected archive, a background document which cannot be resolved
/// and the unrecoverable state in which a page that was just resolved is missing.
pub mod error;

/// The geometry which maps the device canvas onto a page.
///
/// The canvas is scaled uniformly so that it covers the page, the length it exceeds the page by
/// along the non-constraining axis being the overflow. Landscape notebooks are rotated onto pages
/// wider than tall.
pub mod transform;

/// Resolution of the page backing every notebook page: a copy of a background page or a blank template page.
pub mod background;

/// Turns the layers of a page into drawing operators and highlighter annotations.
pub mod render;

/// Translucent line annotations, used for the highlighter strokes.
pub mod annotation;

/// Combination of the existing content of a page with the new drawings.
pub mod content;

/// The module where the `PdfDocument` interface for assembling the output document is presented.
///
/// # Introduction
///
/// The main component of this module is the struct `PdfDocument`. Pages are appended to it one at a time,
/// either by copying them from a background document together with the objects they depend on, or by
/// synthesizing blank ones. Their content and annotations can then be changed, and the page tree,
/// the catalog and the document information are written once by `write_all`, right before
/// the document is saved with `save_to_bytes` or `save_to_file`.
pub mod pdf;

/// The options of a conversion, loadable from a JSON configuration file.
pub mod configuration;

/// The module where the conversion of a whole notebook is orchestrated.
///
/// # Introduction
///
/// The `PdfGenerator` walks the pages of the notebook in order. The pages without annotations are skipped
/// unless every page is requested, the others are resolved onto a background or template page, their
/// strokes are rendered and merged into the content of the page, and the page number is drawn if asked.
/// The output document is finalized once every page has been processed.
pub mod generator;
