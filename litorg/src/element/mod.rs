use std::fmt;

use crate::parameters::Parameters;

/// A typed span of the line corpus.
///
/// Every variant keeps enough of its source text to be fused back into the
/// exact lines it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// `* Title`, `** Title`, ...
    Section { level: usize, title: String },
    /// Content meant for human consumption.
    Prose { lines: Vec<String> },
    /// A `#+name: value` line.
    Metadata {
        name: String,
        raw_value: String,
        raw: String,
    },
    /// `#+begin_<kind>` ... `#+end_<kind>`, other than source blocks.
    GenericBlock {
        kind: String,
        begin: String,
        lines: Vec<String>,
        end: String,
    },
    /// `#+begin_src <language> <parameters>` ... `#+end_src`.
    CodeBlock {
        language: String,
        parameters: Parameters,
        begin: String,
        lines: Vec<String>,
        end: String,
    },
    /// Lines made only of spaces and tabs.
    Whitespace { lines: Vec<String> },
}

impl Element {
    /// Number of corpus lines this element covers.
    pub fn line_count(&self) -> usize {
        match self {
            Element::Section { .. } | Element::Metadata { .. } => 1,
            Element::Prose { lines } | Element::Whitespace { lines } => lines.len(),
            Element::GenericBlock { lines, .. } | Element::CodeBlock { lines, .. } => {
                lines.len() + 2
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Element::Section { .. } => "Section",
            Element::Prose { .. } => "Prose",
            Element::Metadata { .. } => "Metadata",
            Element::GenericBlock { .. } => "GenericBlock",
            Element::CodeBlock { .. } => "CodeBlock",
            Element::Whitespace { .. } => "Whitespace",
        }
    }

    /// Append the exact source lines of this element to `out`.
    pub fn fuse_into(&self, out: &mut Vec<String>) {
        match self {
            Element::Section { level, title } => {
                out.push(format!("{} {}", "*".repeat(*level), title));
            }
            Element::Prose { lines } | Element::Whitespace { lines } => {
                out.extend(lines.iter().cloned());
            }
            Element::Metadata { raw, .. } => out.push(raw.clone()),
            Element::GenericBlock {
                begin, lines, end, ..
            }
            | Element::CodeBlock {
                begin, lines, end, ..
            } => {
                out.push(begin.clone());
                out.extend(lines.iter().cloned());
                out.push(end.clone());
            }
        }
    }

    /// Short debugging representation, one entry per line.
    pub fn repr(&self) -> Vec<String> {
        match self {
            Element::Section { level, title } => {
                vec![format!("level={}, title={}", level, title)]
            }
            Element::Prose { lines } | Element::Whitespace { lines } => lines.clone(),
            Element::Metadata {
                name, raw_value, ..
            } => vec![format!("{}={}", name, raw_value)],
            Element::GenericBlock { kind, lines, .. } => {
                let mut repr = vec![format!("type={}", kind)];
                repr.extend(lines.iter().cloned());
                repr
            }
            Element::CodeBlock {
                language,
                parameters,
                lines,
                ..
            } => {
                let mut repr = vec![
                    format!("lang={}", language),
                    format!("params={}", parameters),
                ];
                repr.extend(lines.iter().cloned());
                repr
            }
        }
    }
}

/// Reconstruct the corpus lines from a parsed element sequence.
pub fn fuse(elements: &[Element]) -> Vec<String> {
    let mut out = Vec::new();
    for element in elements {
        element.fuse_into(&mut out);
    }
    out
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        self.fuse_into(&mut lines);
        for line in lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
