use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use litorg::parameters::Parameters;
use regex::Regex;

use crate::error::{Result, WeaveError};
use crate::graph::{BOOTSTRAP_NAME, EXTERNAL_KEY, Graph, NESTED_KEY};
use crate::resolver::{Resolved, resolve, resolve_at};

/// Recursion ceiling applied to resolution and weaving when nothing else is configured.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// `<<name>>` or `<<include("<flags>")>>`.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"<<(?:{}\("(?P<flags>[^"]*)"\)|(?P<name>[^\s<>()"]+))>>"#,
        regex::escape(BOOTSTRAP_NAME)
    ))
    .expect("marker pattern is valid")
});

#[derive(Debug, Clone)]
pub struct WeaveOptions {
    pub max_depth: usize,
    /// Emit each top-level block as one quoted string literal.
    pub quote: bool,
    /// Inclusion line template; `{}` is replaced by the external reference.
    pub include_format: String,
}

impl Default for WeaveOptions {
    fn default() -> Self {
        WeaveOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            quote: false,
            include_format: "#include <{}>".to_string(),
        }
    }
}

impl WeaveOptions {
    pub fn include_line(&self, reference: &str) -> String {
        self.include_format.replace("{}", reference)
    }
}

/// Text placed around every line emitted for a marker: whatever preceded and
/// followed the marker on its line, accumulated through enclosing markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Affixes {
    prefix: String,
    suffix: String,
}

impl Affixes {
    fn wrap(&self, before: &str, after: &str) -> Affixes {
        Affixes {
            prefix: format!("{}{}", self.prefix, before),
            suffix: format!("{}{}", after, self.suffix),
        }
    }

    fn apply(&self, line: &str) -> String {
        format!("{}{}{}", self.prefix, line, self.suffix)
    }
}

/// Names already woven by one top-level weave or one self-inclusion call.
#[derive(Debug, Default)]
struct Emitted(HashSet<String>);

impl Emitted {
    fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Mark `name` done, along with every contributor if it is an aggregate.
    fn mark(&mut self, graph: &Graph<'_>, name: &str) {
        self.0.insert(name.to_string());
        for contributor in graph.contributors(name) {
            self.0.insert(contributor.clone());
        }
    }
}

/// Expands resolved block names into output lines.
pub struct Weaver<'w, 'a> {
    graph: &'w Graph<'a>,
    options: &'w WeaveOptions,
}

impl<'w, 'a> Weaver<'w, 'a> {
    pub fn new(graph: &'w Graph<'a>, options: &'w WeaveOptions) -> Self {
        Weaver { graph, options }
    }

    /// Inclusion lines for the external references, then every block woven in order.
    pub fn weave_stream(&self, resolved: &Resolved) -> Result<Vec<String>> {
        let mut out: Vec<String> = resolved
            .external_refs
            .iter()
            .map(|r| self.options.include_line(r))
            .collect();

        let mut emitted = Emitted::default();
        for name in &resolved.block_names {
            if emitted.contains(name) {
                log::debug!("`{}` already woven, skipping", name);
                continue;
            }
            let mut lines = Vec::new();
            self.expand_skipping(name, &Affixes::default(), 0, &emitted, &mut lines)?;
            emitted.mark(self.graph, name);

            if self.options.quote && self.graph.has_block(name) {
                out.push(quote(&lines));
            } else {
                out.extend(lines);
            }
        }

        Ok(out)
    }

    /// Weave one tangle target with its own resolution and emitted state.
    pub fn weave_target(&self, name: &str) -> Result<Vec<String>> {
        let resolved = resolve(self.graph, &[name.to_string()], &[], self.options.max_depth)?;
        self.weave_stream(&resolved)
    }

    fn expand(&self, name: &str, affixes: &Affixes, depth: usize, out: &mut Vec<String>) -> Result<()> {
        self.expand_skipping(name, affixes, depth, &Emitted::default(), out)
    }

    /// Expand `name`, leaving out aggregated bodies whose owning block is
    /// already in `done`.
    fn expand_skipping(
        &self,
        name: &str,
        affixes: &Affixes,
        depth: usize,
        done: &Emitted,
        out: &mut Vec<String>,
    ) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(WeaveError::DepthExceeded {
                limit: self.options.max_depth,
                name: name.to_string(),
                activity: "weaving",
            });
        }

        let Some(bodies) = self.graph.bodies(name) else {
            if self.graph.dependencies(name).is_some() {
                // Dependency carrier: contributes references, no text.
                return Ok(());
            }
            return Err(WeaveError::UnknownBlockName(name.to_string()));
        };

        for body in bodies {
            let owner = body.owner.as_deref();
            if let Some(owner) = owner.filter(|o| *o != name && done.contains(o)) {
                log::debug!("body of `{}` already woven, skipping it in `{}`", owner, name);
                continue;
            }
            for raw in self.graph.lines(body.lines.clone()) {
                let line = unescape(raw);
                if body.expand {
                    self.weave_line(&line, affixes, depth, out)?;
                } else {
                    out.push(affixes.apply(&line));
                }
            }
        }

        Ok(())
    }

    /// Weave one body line. The first marker is expanded with the text before
    /// it as prefix; the rest of the line is woven first and its first output
    /// line becomes the suffix, so every marker on the line gets expanded.
    fn weave_line(&self, line: &str, affixes: &Affixes, depth: usize, out: &mut Vec<String>) -> Result<()> {
        let Some(caps) = MARKER_RE.captures(line) else {
            out.push(affixes.apply(line));
            return Ok(());
        };
        let whole = caps.get(0).map_or(0..0, |m| m.range());

        let mut rest = Vec::new();
        self.weave_line(&line[whole.end..], &Affixes::default(), depth, &mut rest)?;
        let mut rest = rest.into_iter();
        let after = rest.next().unwrap_or_default();

        let inner = affixes.wrap(&line[..whole.start], &after);
        if let Some(flags) = caps.name("flags") {
            self.weave_call(flags.as_str(), &inner, depth + 1, out)?;
        } else if let Some(nested) = caps.name("name") {
            self.expand(nested.as_str(), &inner, depth + 1, out)?;
        }
        // Multi-line expansions later on the line continue below.
        out.extend(rest.map(|extra| affixes.apply(&extra)));
        Ok(())
    }

    /// Expand a self-inclusion marker: the flags are resolved as an independent
    /// request, and names pulled in twice by this call are woven once.
    fn weave_call(&self, flags: &str, affixes: &Affixes, depth: usize, out: &mut Vec<String>) -> Result<()> {
        let params = Parameters::parse(flags).map_err(|e| WeaveError::malformed(flags, e))?;
        let resolved = resolve_at(
            self.graph,
            params.values(NESTED_KEY),
            params.values(EXTERNAL_KEY),
            depth,
            self.options.max_depth,
        )?;
        log::debug!("self-inclusion `{}` resolved to {:?}", flags, resolved);

        for external in &resolved.external_refs {
            out.push(affixes.apply(&self.options.include_line(external)));
        }
        let mut emitted = Emitted::default();
        for name in &resolved.block_names {
            if emitted.contains(name) {
                continue;
            }
            self.expand_skipping(name, affixes, depth, &emitted, out)?;
            emitted.mark(self.graph, name);
        }
        Ok(())
    }
}

/// Remove one escaping comma from lines such as `,* heading` or `  ,,#+begin`.
fn unescape(line: &str) -> Cow<'_, str> {
    let indent = line.len() - line.trim_start().len();
    let rest = &line[indent..];
    let unescaped = rest.trim_start_matches(',');
    if unescaped.len() < rest.len() && (unescaped.starts_with('*') || unescaped.starts_with("#+")) {
        Cow::Owned(format!("{}{}", &line[..indent], &rest[1..]))
    } else {
        Cow::Borrowed(line)
    }
}

/// One string literal holding every line, backslashes and double quotes escaped.
fn quote(lines: &[String]) -> String {
    let mut literal = String::from("\"");
    for line in lines {
        literal.push_str(&line.replace('\\', "\\\\").replace('"', "\\\""));
        literal.push_str("\\n");
    }
    literal.push('"');
    literal
}
