use std::collections::HashSet;

use crate::error::{Result, WeaveError};
use crate::graph::Graph;

/// The dependency closure of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// External references in first-discovery order.
    pub external_refs: Vec<String>,
    /// Block names, every name after all of its nested dependencies.
    pub block_names: Vec<String>,
}

/// Seen-sets for a single resolution call.
#[derive(Debug)]
pub struct Resolution<'g, 'a> {
    graph: &'g Graph<'a>,
    max_depth: usize,
    seen_external: HashSet<String>,
    seen_names: HashSet<String>,
    resolved: Resolved,
}

impl<'g, 'a> Resolution<'g, 'a> {
    pub fn new(graph: &'g Graph<'a>, max_depth: usize) -> Self {
        Resolution {
            graph,
            max_depth,
            seen_external: HashSet::new(),
            seen_names: HashSet::new(),
            resolved: Resolved::default(),
        }
    }

    /// Depth-first, post-order visit of `name` and its nested dependencies.
    pub fn visit(&mut self, name: &str, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(WeaveError::DepthExceeded {
                limit: self.max_depth,
                name: name.to_string(),
                activity: "resolving",
            });
        }
        if !self.seen_names.insert(name.to_string()) {
            return Ok(());
        }

        let graph = self.graph;
        // Contributors are satisfied by their aggregate.
        for contributor in graph.contributors(name) {
            self.seen_names.insert(contributor.clone());
        }

        let deps = graph.dependencies(name);
        if deps.is_none() && !graph.has_block(name) {
            return Err(WeaveError::UnknownBlockName(name.to_string()));
        }
        if let Some(deps) = deps {
            for external in &deps.external {
                self.push_external(external);
            }
            for nested in &deps.nested {
                self.visit(nested, depth + 1)?;
            }
        }

        log::debug!("resolved `{}` at depth {}", name, depth);
        self.resolved.block_names.push(name.to_string());
        Ok(())
    }

    pub fn push_external(&mut self, external: &str) {
        if self.seen_external.insert(external.to_string()) {
            self.resolved.external_refs.push(external.to_string());
        }
    }

    pub fn finish(self) -> Resolved {
        self.resolved
    }
}

/// Resolve `names` and `external_refs` into their ordered, deduplicated closure.
pub fn resolve(
    graph: &Graph<'_>,
    names: &[String],
    external_refs: &[String],
    max_depth: usize,
) -> Result<Resolved> {
    resolve_at(graph, names, external_refs, 0, max_depth)
}

/// Like [`resolve`], starting the depth count at `depth`. Used by nested
/// self-inclusion so its recursion counts against the caller's budget.
pub fn resolve_at(
    graph: &Graph<'_>,
    names: &[String],
    external_refs: &[String],
    depth: usize,
    max_depth: usize,
) -> Result<Resolved> {
    let mut resolution = Resolution::new(graph, max_depth);
    for name in names {
        resolution.visit(name, depth)?;
    }
    for external in external_refs {
        resolution.push_external(external);
    }
    Ok(resolution.finish())
}
