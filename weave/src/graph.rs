use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::PathBuf;

use litorg::Document;
use litorg::element::Element;
use litorg::parameters::Parameters;

use crate::error::{Result, WeaveError};

/// Reserved block name used by self-inclusion markers. Documents commonly
/// declare a block under this name in each file, so redeclaring it is allowed.
pub const BOOTSTRAP_NAME: &str = "include";

/// Parameter key listing external references (`#include`d headers).
pub const EXTERNAL_KEY: &str = "cpp";
/// Parameter key listing nested block names.
pub const NESTED_KEY: &str = "noweb";
/// Block parameter binding a block under an additional, shared name.
pub const REFERENCE_KEY: &str = "noweb-ref";

/// One body bound to a block name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Corpus line range of the block content, delimiters excluded.
    pub lines: Range<usize>,
    /// False when the owning block disabled marker expansion (`:noweb no`).
    pub expand: bool,
    /// `#+name:` of the block this body came from, if it had one.
    pub owner: Option<String>,
}

/// External and nested references declared for a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub external: Vec<String>,
    pub nested: Vec<String>,
}

impl Dependencies {
    fn from_parameters(params: &Parameters) -> Self {
        let mut deps = Dependencies::default();
        append_unique(&mut deps.external, params.values(EXTERNAL_KEY));
        append_unique(&mut deps.nested, params.values(NESTED_KEY));
        deps
    }

    /// Append `other`'s references, keeping both lists duplicate-free.
    fn extend(&mut self, other: &Dependencies) {
        append_unique(&mut self.external, &other.external);
        append_unique(&mut self.nested, &other.nested);
    }
}

fn append_unique(into: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !into.contains(value) {
            into.push(value.clone());
        }
    }
}

/// A `#+tangle:` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TangleTarget {
    pub name: String,
    pub destination: PathBuf,
}

/// The block tables of a document, built once and read-only afterwards.
#[derive(Debug)]
pub struct Graph<'a> {
    document: &'a Document,
    blocks: HashMap<String, Vec<Body>>,
    dependencies: HashMap<String, Dependencies>,
    /// Aggregate reference name → named blocks contributing to it.
    reffed: HashMap<String, Vec<String>>,
    tangles: Vec<TangleTarget>,
}

impl<'a> Graph<'a> {
    /// Scan the document's elements and build the block tables.
    pub fn build(document: &'a Document) -> Result<Self> {
        let mut builder = GraphBuilder::new(document);
        let mut line = 0;
        let mut pending_name: Option<(String, usize)> = None;

        for element in &document.elements {
            let start = line;
            line += element.line_count();
            // A `#+name:` only binds the element right after it.
            let name = pending_name.take();

            match element {
                Element::Metadata {
                    name: key,
                    raw_value,
                    ..
                } => match key.to_ascii_lowercase().as_str() {
                    "name" => pending_name = Some((raw_value.clone(), start)),
                    "depends" => builder.declare_dependencies(raw_value, start)?,
                    "tangle" => builder.declare_tangle(raw_value, start)?,
                    _ => {}
                },
                Element::CodeBlock {
                    parameters, lines, ..
                } => {
                    let body = Body {
                        lines: start + 1..start + 1 + lines.len(),
                        expand: parameters.values(NESTED_KEY).first().map(String::as_str)
                            != Some("no"),
                        owner: None,
                    };
                    builder.declare_block(name, parameters, body)?;
                }
                _ => {}
            }
        }

        Ok(builder.finish())
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// All bodies bound to `name`, in document order.
    pub fn bodies(&self, name: &str) -> Option<&[Body]> {
        self.blocks.get(name).map(Vec::as_slice)
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&Dependencies> {
        self.dependencies.get(name)
    }

    /// Named blocks contributing to the aggregate `name` (empty if none).
    pub fn contributors(&self, name: &str) -> &[String] {
        self.reffed.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tangles(&self) -> &[TangleTarget] {
        &self.tangles
    }

    /// The corpus lines covered by `range`.
    pub fn lines(&self, range: Range<usize>) -> &'a [String] {
        &self.document.corpus.lines()[range]
    }

    /// Every name with a body, sorted.
    pub fn block_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.blocks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

struct GraphBuilder<'a> {
    document: &'a Document,
    blocks: HashMap<String, Vec<Body>>,
    declared: HashSet<String>,
    dependencies: HashMap<String, Dependencies>,
    reffed: HashMap<String, Vec<String>>,
    tangles: Vec<TangleTarget>,
}

impl<'a> GraphBuilder<'a> {
    fn new(document: &'a Document) -> Self {
        GraphBuilder {
            document,
            blocks: HashMap::new(),
            declared: HashSet::new(),
            dependencies: HashMap::new(),
            reffed: HashMap::new(),
            tangles: Vec::new(),
        }
    }

    fn declare_block(
        &mut self,
        name: Option<(String, usize)>,
        parameters: &Parameters,
        mut body: Body,
    ) -> Result<()> {
        let mut own_name = None;
        if let Some((name, at)) = name {
            if name.is_empty() {
                log::warn!("empty #+name: ignored at corpus line {}", at);
            } else if !self.declared.insert(name.clone()) {
                if name != BOOTSTRAP_NAME {
                    return Err(WeaveError::DuplicateDeclaration {
                        what: "block",
                        name,
                        location: self.document.corpus.locate(at),
                    });
                }
                log::debug!("ignoring redeclaration of `{}`", BOOTSTRAP_NAME);
            } else {
                log::debug!("block `{}` bound to lines {:?}", name, body.lines);
                body.owner = Some(name.clone());
                self.blocks
                    .entry(name.clone())
                    .or_default()
                    .push(body.clone());
                own_name = Some(name);
            }
        }

        for reference in parameters.values(REFERENCE_KEY) {
            log::debug!("block {:?} contributes to `{}`", own_name, reference);
            self.blocks
                .entry(reference.clone())
                .or_default()
                .push(body.clone());
            if let Some(own) = &own_name {
                let contributors = self.reffed.entry(reference.clone()).or_default();
                if own != reference && !contributors.contains(own) {
                    contributors.push(own.clone());
                }
            }
        }

        Ok(())
    }

    /// `#+depends:<name> <parameter-string>`
    fn declare_dependencies(&mut self, value: &str, at: usize) -> Result<()> {
        let document = self.document;
        let location = || document.corpus.locate(at);
        let (name, rest) = split_first_word(value);
        if name.is_empty() {
            return Err(WeaveError::malformed(value, "missing block name").at(location()));
        }
        let params = if rest.is_empty() {
            Parameters::new()
        } else {
            Parameters::parse(rest).map_err(|e| WeaveError::malformed(rest, e).at(location()))?
        };

        if self.dependencies.contains_key(name) {
            return Err(WeaveError::DuplicateDeclaration {
                what: "dependency record",
                name: name.to_string(),
                location: location(),
            });
        }
        let deps = Dependencies::from_parameters(&params);
        log::debug!("dependencies of `{}`: {:?}", name, deps);
        self.dependencies.insert(name.to_string(), deps);
        Ok(())
    }

    /// `#+tangle:<name> <destination-path>`
    fn declare_tangle(&mut self, value: &str, at: usize) -> Result<()> {
        let document = self.document;
        let location = || document.corpus.locate(at);
        let (name, destination) = split_first_word(value);
        if name.is_empty() || destination.is_empty() {
            return Err(
                WeaveError::malformed(value, "expected `<name> <destination>`").at(location()),
            );
        }
        if self.tangles.iter().any(|t| t.name == name) {
            return Err(WeaveError::DuplicateDeclaration {
                what: "tangle target",
                name: name.to_string(),
                location: location(),
            });
        }
        self.tangles.push(TangleTarget {
            name: name.to_string(),
            destination: PathBuf::from(destination),
        });
        Ok(())
    }

    /// Fold each contributor's dependency record into its aggregate's.
    fn finish(mut self) -> Graph<'a> {
        let declared = self.dependencies.clone();
        let mut aggregates: Vec<&String> = self.reffed.keys().collect();
        aggregates.sort_unstable();

        for reference in aggregates {
            let mut merged = declared.get(reference).cloned();
            for contributor in &self.reffed[reference] {
                if let Some(deps) = declared.get(contributor) {
                    merged.get_or_insert_with(Dependencies::default).extend(deps);
                }
            }
            if let Some(merged) = merged {
                self.dependencies.insert(reference.clone(), merged);
            }
        }

        Graph {
            document: self.document,
            blocks: self.blocks,
            dependencies: self.dependencies,
            reffed: self.reffed,
            tangles: self.tangles,
        }
    }
}

fn split_first_word(value: &str) -> (&str, &str) {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (value, ""),
    }
}
