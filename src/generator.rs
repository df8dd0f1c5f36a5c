use std::path::Path;

use crate::background::{resolve_page, BackgroundDocument};
use crate::configuration::GeneratorOptions;
use crate::content::{content_stream, merge_fragments};
use crate::error::ContextError;
use crate::notebook::NotebookArchive;
use crate::pdf::{generate_identifier, PdfDocument};
use crate::render::{Palette, Renderer};

/// Converts the pages of a notebook archive into a PDF document.
pub struct PdfGenerator {
    archive: NotebookArchive,
    options: GeneratorOptions,
    background: Option<BackgroundDocument>,
    /// Chosen once, when the archive is loaded: strokes drawn over a background PDF are colored.
    palette: Palette,
}

impl PdfGenerator {
    /// Validate the archive and parse its background document, if it has one.
    pub fn new(archive: NotebookArchive, options: GeneratorOptions) -> Result<Self, ContextError> {
        archive.validate()?;

        let background = if archive.has_background() {
            Some(BackgroundDocument::load_mem(&archive.background)?)
        } else {
            None
        };
        let palette = Palette::for_background(archive.has_background());
        log::debug!(
            "Loaded a {:?} archive with {} pages, drawing with the {:?} palette",
            archive.file_type,
            archive.pages.len(),
            palette
        );

        Ok(PdfGenerator {
            archive,
            options,
            background,
            palette,
        })
    }

    pub fn from_path(archive_path: &Path, options: GeneratorOptions) -> Result<Self, ContextError> {
        PdfGenerator::new(NotebookArchive::from_path(archive_path)?, options)
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Build the output document: one page for every notebook page that is emitted, in order.
    pub fn generate(&mut self) -> Result<PdfDocument, ContextError> {
        let mut output = PdfDocument::new(generate_identifier());
        let mut emitted_pages = 0;

        for (index, page_annotations) in self.archive.pages.iter().enumerate() {
            let page_number = index + 1;
            let has_content = page_annotations.has_content();
            if !has_content && !self.options.all_pages {
                log::debug!("Skipping the page {} as it has no annotations", page_number);
                continue;
            }

            let background = if self.options.annotations_only {
                None
            } else {
                self.background.as_mut()
            };
            let resolved = resolve_page(
                &mut output,
                background,
                self.archive.orientation,
                page_number as u32,
            )?;
            // A resolved page is always part of the output, anything else is a broken document
            if !output.has_page(&resolved.page) {
                return Err(ContextError::fatal(format!("The page {} is null", page_number)));
            }
            emitted_pages += 1;

            let mut operations = Vec::new();
            if let Some(layers) = &page_annotations.layers {
                let rendered_page =
                    Renderer::new(resolved.page_scale, resolved.page.height, self.palette)
                        .render(layers);
                for highlight in &rendered_page.highlights {
                    output.add_annotation(&resolved.page, highlight)?;
                }
                operations = rendered_page.operations;
            }
            if self.options.add_page_numbers {
                operations.extend(output.page_number_operations(&resolved.page, emitted_pages)?);
            }

            if operations.is_empty() {
                continue;
            }
            let existing_content = output.page_content(&resolved.page)?;
            let fragments = merge_fragments(existing_content, operations)?;
            output.set_page_content(&resolved.page, content_stream(fragments))?;
            log::debug!("Drew the page {} as the output page {}", page_number, emitted_pages);
        }

        output.write_all()?;
        log::info!(
            "Generated {} pages out of {} notebook pages",
            emitted_pages,
            self.archive.pages.len()
        );

        Ok(output)
    }

    /// Build the output document and save it at the given path.
    pub fn generate_to_file(&mut self, output_path: &Path) -> Result<(), ContextError> {
        let mut output = self.generate()?;
        output.save_to_file(output_path)?;
        log::info!("Saved the PDF document to {:?}", output_path);

        Ok(())
    }
}
