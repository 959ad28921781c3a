use std::ops::Range;

/// One input document contributing lines to a [`Corpus`].
#[derive(Debug, Clone)]
pub struct Source {
    /// Display name (usually the path the document was read from).
    pub name: String,
    /// The raw document text.
    pub text: String,
    /// Corpus index of the document's first line.
    pub first_line: usize,
    /// Number of lines the document contributes.
    pub line_count: usize,
    /// Lines of the file that precede `text`, added to reported line numbers.
    pub line_offset: usize,
}

/// Where a corpus line came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Index of the source document, equal to its codespan file id when the
    /// sources are registered in order.
    pub file_id: usize,
    pub name: String,
    /// 1-based line number within the source document.
    pub line: usize,
    /// Byte span of the line within the source text.
    pub span: Range<usize>,
}

/// The concatenated lines of every input document, in document order.
///
/// All positions handed around by the parser and the weaver are indices into
/// this sequence. A corpus is never mutated once parsing starts.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    lines: Vec<String>,
    sources: Vec<Source>,
}

impl Corpus {
    pub fn new() -> Self {
        Corpus::default()
    }

    /// Build a corpus holding a single document.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut corpus = Corpus::new();
        corpus.push_document(name, text);
        corpus
    }

    /// Append a document and return its file id.
    pub fn push_document(&mut self, name: impl Into<String>, text: impl Into<String>) -> usize {
        self.push_document_at(name, text, 0)
    }

    /// Append a document whose text starts `line_offset` lines into its file,
    /// as in a test file with a header stripped off.
    pub fn push_document_at(
        &mut self,
        name: impl Into<String>,
        text: impl Into<String>,
        line_offset: usize,
    ) -> usize {
        let text = text.into();
        let first_line = self.lines.len();
        self.lines.extend(text.split('\n').map(str::to_string));
        let line_count = self.lines.len() - first_line;
        self.sources.push(Source {
            name: name.into(),
            text,
            first_line,
            line_count,
            line_offset,
        });
        self.sources.len() - 1
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Map a corpus line index back to its document and byte span.
    pub fn locate(&self, index: usize) -> Option<Location> {
        let file_id = self
            .sources
            .iter()
            .position(|s| index >= s.first_line && index < s.first_line + s.line_count)?;
        let source = &self.sources[file_id];
        let local = index - source.first_line;

        let mut start = 0;
        for line in source.text.split('\n').take(local) {
            start += line.len() + 1;
        }
        let end = start + self.lines[index].len();

        Some(Location {
            file_id,
            name: source.name.clone(),
            line: source.line_offset + local + 1,
            span: start..end,
        })
    }
}
