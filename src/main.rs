use clap::Parser;
use rmpdf::{configuration::GeneratorOptions, error::ContextError, generator::PdfGenerator};
use std::path::PathBuf;

/// Render the strokes of a notebook into a PDF document.
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct CliArguments {
    /// The JSON description of the notebook archive.
    #[arg(short = 'n', long = "notebook", value_name = "json_file")]
    notebook_path: PathBuf,
    /// Where the PDF document is saved.
    #[arg(short = 'o', long = "output", value_name = "file_path")]
    output_file_path: PathBuf,
    /// A PDF document to draw onto, replacing the background of the archive.
    #[arg(short = 'b', long = "background", value_name = "pdf_file")]
    background_path: Option<PathBuf>,
    /// A JSON file holding the conversion options.
    #[arg(short = 'c', long = "configuration", value_name = "json_file")]
    configuration_path: Option<PathBuf>,
    /// Draw the page number in the bottom-right corner of every page.
    #[arg(long = "page-numbers")]
    add_page_numbers: bool,
    /// Emit the pages without annotations too.
    #[arg(long = "all-pages")]
    all_pages: bool,
    /// Ignore the background document and draw onto blank pages.
    #[arg(long = "annotations-only")]
    annotations_only: bool,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let arguments = CliArguments::parse();
    log::debug!("{:?}", arguments);

    let mut options = match &arguments.configuration_path {
        Some(configuration_path) => GeneratorOptions::from_path(configuration_path)?,
        None => GeneratorOptions::default(),
    };
    // The flags can only enable the options
    options.add_page_numbers |= arguments.add_page_numbers;
    options.all_pages |= arguments.all_pages;
    options.annotations_only |= arguments.annotations_only;
    log::debug!("{:?}", options);

    let mut archive = rmpdf::notebook::NotebookArchive::from_path(&arguments.notebook_path)?;
    if let Some(background_path) = &arguments.background_path {
        archive.background = std::fs::read(background_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the background document {:?}", background_path),
                &error,
            )
        })?;
    }

    PdfGenerator::new(archive, options)?.generate_to_file(&arguments.output_file_path)
}
