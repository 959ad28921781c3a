use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

use crate::corpus::Corpus;

/// Parse errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    /// Corpus index of the offending line.
    pub line: usize,
    pub span: Range<usize>,
    pub file_id: usize,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn error(message: impl Into<String>, line: usize, span: Range<usize>, file_id: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            span,
            file_id,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    /// Build an error pointing at corpus line `line`.
    pub fn at_line(corpus: &Corpus, line: usize, message: impl Into<String>) -> Self {
        match corpus.locate(line) {
            Some(location) => {
                let note = format!("in {} at line {}", location.name, location.line);
                ParseError::error(message, line, location.span, location.file_id).with_note(note)
            }
            None => ParseError::error(message, line, 0..0, 0),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(self.severity)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for note in &self.notes {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
