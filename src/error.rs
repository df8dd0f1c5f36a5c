// #![deny(clippy::unwrap_used, clippy::expect_used)]

use serde::{Deserialize, Serialize};

/// The broad category of an error, used by callers to decide whether a failed document
/// can simply be reported or whether the conversion reached an inconsistent state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The input archive was rejected: unsupported container type, no pages, malformed data.
    InputRejected,
    /// The background document or one of its pages could not be fetched.
    Resolution,
    /// A page which was just resolved is missing. No further progress is possible.
    Fatal,
    /// Any other failure of the underlying PDF machinery or of the file system.
    Collaborator,
}

/// A struct that represents an error with a context and possibly the propagated source error.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextError {
    pub kind: ErrorKind,
    pub context: String,
    pub source_error: Option<String>,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_error {
            Some(source_error) => write!(
                formatter,
                "{}: {}",
                self.context,
                minimize_first_letter(source_error.to_string()),
            ),
            None => write!(formatter, "{}", self.context),
        }
    }
}

impl std::error::Error for ContextError {}

impl ContextError {
    /// Create a new `ContextError` with the given context.
    pub fn with_context<S: Into<String>>(context: S) -> ContextError {
        ContextError {
            kind: ErrorKind::Collaborator,
            context: context.into(),
            source_error: None,
        }
    }

    /// Create a new `ContextError` with the given context and source error.
    pub fn with_error<S: Into<String>>(context: S, error: &dyn std::error::Error) -> ContextError {
        ContextError {
            kind: ErrorKind::Collaborator,
            context: context.into(),
            source_error: Some(error.to_string()),
        }
    }

    /// Create an error signaling that the input archive cannot be converted.
    pub fn rejected<S: Into<String>>(context: S) -> ContextError {
        ContextError::with_context(context).with_kind(ErrorKind::InputRejected)
    }

    /// Create an unrecoverable error: the conversion of the document must stop here.
    pub fn fatal<S: Into<String>>(context: S) -> ContextError {
        ContextError::with_context(context).with_kind(ErrorKind::Fatal)
    }

    /// Replace the kind of the error, keeping its messages.
    pub fn with_kind(mut self, kind: ErrorKind) -> ContextError {
        self.kind = kind;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Fatal
    }
}

/// Minimizes the first letter of a string, it is used for standardizing the error message.
fn minimize_first_letter(string: String) -> String {
    let mut characters = string.chars();
    match characters.next() {
        None => String::new(),
        Some(character) => character.to_lowercase().chain(characters).collect(),
    }
}
