use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// The options of a conversion. Every option is disabled by default.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorOptions {
    /// Draw the 1-based page number in the bottom-right corner of every page.
    pub add_page_numbers: bool,
    /// Emit the pages without strokes too.
    pub all_pages: bool,
    /// Ignore the background document and draw onto blank pages.
    pub annotations_only: bool,
}

impl GeneratorOptions {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!("Failed to read the configuration file {:?}", configuration_file_path),
                    &error,
                )
            })?;
        let options: GeneratorOptions = serde_json::from_str(&configuration_file_contents)
            .map_err(|error| {
                ContextError::with_error("Failed to parse the configuration file", &error)
            })?;

        Ok(options)
    }
}
