pub mod error;
pub mod org;
pub mod rules;

pub use error::ParseError;

use std::path::Path;

use crate::Document;
use crate::corpus::Corpus;
use crate::element::Element;
use crate::parser::rules::Rule;

/// Everything needed to parse one literate language.
pub struct Language {
    pub identifiers: Vec<&'static str>,
    /// File extensions, without the leading dot.
    pub extensions: Vec<&'static str>,
    /// Tried in order at every position; the first rule that takes lines wins.
    pub rules: Vec<Rule>,
}

impl Language {
    /// Pick the language for a document path. Org is the only language
    /// shipped, and the fallback for unknown extensions.
    pub fn for_path(path: &Path) -> &'static Language {
        let language: &'static Language = &org::ORG;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !language.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            log::debug!("no language registered for {}, using org", path.display());
        }
        language
    }

    pub fn parse(&self, corpus: &Corpus) -> Result<Vec<Element>, ParseError> {
        parse_elements(corpus, self)
    }
}

/// Parser entry point.
pub struct Parser {
    corpus: Corpus,
    language: &'static Language,
}

impl Parser {
    pub fn new(corpus: Corpus) -> Self {
        Parser {
            corpus,
            language: &org::ORG,
        }
    }

    pub fn with_language(mut self, language: &'static Language) -> Self {
        self.language = language;
        self
    }

    /// Parse the whole corpus into a Document.
    pub fn parse(self) -> Result<Document, ParseError> {
        let elements = self.language.parse(&self.corpus)?;
        Ok(Document {
            corpus: self.corpus,
            elements,
        })
    }
}

fn parse_elements(corpus: &Corpus, language: &Language) -> Result<Vec<Element>, ParseError> {
    let lines = corpus.lines();
    let mut elements = Vec::new();
    let mut pos = 0;

    'lines: while pos < lines.len() {
        let rest = &lines[pos..];
        for rule in &language.rules {
            let take = rule.take(rest);
            if take == 0 {
                continue;
            }

            let element = rule.make(&rest[..take]).map_err(|e| {
                ParseError::at_line(corpus, pos, format!("invalid {} line: {}", rule.name, e))
            })?;
            if let Element::Metadata { name, .. } = &element {
                if name.to_ascii_lowercase().starts_with("begin_") {
                    log::warn!(
                        "unterminated block `{}` treated as metadata{}",
                        lines[pos],
                        describe_location(corpus, pos)
                    );
                }
            }

            elements.push(element);
            pos += take;
            continue 'lines;
        }

        return Err(ParseError::at_line(
            corpus,
            pos,
            format!("could not parse line `{}`", lines[pos]),
        ));
    }

    Ok(elements)
}

fn describe_location(corpus: &Corpus, line: usize) -> String {
    corpus
        .locate(line)
        .map(|l| format!(" ({}:{})", l.name, l.line))
        .unwrap_or_default()
}
