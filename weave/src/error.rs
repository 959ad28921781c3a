use std::io;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use litorg::corpus::Location;
use litorg::parser::ParseError;
use thiserror::Error;

/// Every way a weave can fail. The first error aborts the run.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("malformed parameter string `{text}`: {reason}")]
    MalformedParameterString {
        text: String,
        reason: String,
        location: Option<Location>,
    },

    #[error("duplicate declaration of {what} `{name}`")]
    DuplicateDeclaration {
        what: &'static str,
        name: String,
        location: Option<Location>,
    },

    #[error("unknown block name `{0}`")]
    UnknownBlockName(String),

    #[error(
        "recursion depth {limit} exceeded while {activity} `{name}` (recursive or cyclic inclusion suspected)"
    )]
    DepthExceeded {
        limit: usize,
        name: String,
        activity: &'static str,
    },

    #[error("conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("nothing requested: expected at least one of :cpp, :noweb or :tangle")]
    EmptyRequest,

    #[error("cannot open `{path}`: {source}")]
    BadFilename { path: PathBuf, source: io::Error },

    #[error("cannot write `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl WeaveError {
    pub fn malformed(text: impl Into<String>, reason: impl ToString) -> Self {
        WeaveError::MalformedParameterString {
            text: text.into(),
            reason: reason.to_string(),
            location: None,
        }
    }

    /// Attach a source location to errors that carry one and lack it.
    pub fn at(mut self, at: Option<Location>) -> Self {
        match &mut self {
            WeaveError::MalformedParameterString { location, .. }
            | WeaveError::DuplicateDeclaration { location, .. } => {
                if location.is_none() {
                    *location = at;
                }
            }
            _ => {}
        }
        self
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            WeaveError::MalformedParameterString { location, .. }
            | WeaveError::DuplicateDeclaration { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// The single machine-recognizable line printed in place of the output.
    /// It is a preprocessor error, so a compiler fed the output stops on it.
    pub fn error_line(&self) -> String {
        let mut message = self.to_string();
        if let Some(location) = self.location() {
            message = format!("{}:{}: {}", location.name, location.line, message);
        }
        format!(
            "#error \"litorg: {}\"",
            message.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        if let WeaveError::Parse(err) = self {
            return err.to_diagnostic();
        }
        let diagnostic = Diagnostic::error().with_message(self.to_string());
        match self.location() {
            Some(location) => diagnostic.with_labels(vec![Label::primary(
                location.file_id,
                location.span.clone(),
            )]),
            None => diagnostic,
        }
    }
}

pub type Result<T> = std::result::Result<T, WeaveError>;
