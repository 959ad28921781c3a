pub mod corpus;
pub mod element;
pub mod parameters;
pub mod parser;

use crate::corpus::Corpus;
use crate::element::Element;

/// A parsed set of literate documents.
#[derive(Debug, Clone)]
pub struct Document {
    /// Every input line, in document order.
    pub corpus: Corpus,
    /// Typed elements covering the corpus exactly once.
    pub elements: Vec<Element>,
}
