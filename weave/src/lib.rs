pub mod error;
pub mod graph;
pub mod request;
pub mod resolver;
pub mod tangle;
pub mod weaver;

pub use error::{Result, WeaveError};
pub use graph::Graph;
pub use request::Request;
pub use resolver::{Resolved, resolve};
pub use tangle::{plan_tangle, tangle};
pub use weaver::{DEFAULT_MAX_DEPTH, WeaveOptions, Weaver};

use std::fs;
use std::path::{Path, PathBuf};

use litorg::Document;
use litorg::corpus::Corpus;

/// What a request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Inclusion lines followed by woven text.
    Stream(Vec<String>),
    /// Paths of the tangled files written.
    Tangled(Vec<PathBuf>),
    /// Destinations and contents a tangle would write, relative to the base directory.
    Planned(Vec<(PathBuf, String)>),
}

/// Whether a tangle request writes its files or only plans them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TangleMode {
    #[default]
    Write,
    Plan,
}

/// Read documents, in order, into one line corpus.
pub fn load_corpus<P: AsRef<Path>>(paths: &[P]) -> Result<Corpus> {
    let mut corpus = Corpus::new();
    for path in paths {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| WeaveError::BadFilename {
            path: path.to_path_buf(),
            source,
        })?;
        let file_id = corpus.push_document(path.display().to_string(), text);
        log::debug!("loaded {} as file {}", path.display(), file_id);
    }
    Ok(corpus)
}

/// Build the block tables for `document` and carry out `request`.
///
/// The request's depth override and quote flag take precedence over `options`.
/// Tangle destinations are resolved against `base_dir`.
pub fn execute(
    document: &Document,
    request: &Request,
    options: &WeaveOptions,
    base_dir: &Path,
) -> Result<Output> {
    execute_with(document, request, options, base_dir, TangleMode::Write)
}

/// [`execute`], with `mode` deciding whether a tangle request touches the filesystem.
pub fn execute_with(
    document: &Document,
    request: &Request,
    options: &WeaveOptions,
    base_dir: &Path,
    mode: TangleMode,
) -> Result<Output> {
    let mut options = options.clone();
    if let Some(depth) = request.depth {
        options.max_depth = depth;
    }
    options.quote |= request.quote;

    let graph = Graph::build(document)?;
    if request.tangle {
        return match mode {
            TangleMode::Write => Ok(Output::Tangled(tangle(&graph, &options, base_dir)?)),
            TangleMode::Plan => Ok(Output::Planned(plan_tangle(&graph, &options)?)),
        };
    }

    let resolved = resolve(
        &graph,
        &request.block_names,
        &request.external_refs,
        options.max_depth,
    )?;
    log::debug!(
        "resolved {} external refs and {} blocks",
        resolved.external_refs.len(),
        resolved.block_names.len()
    );
    let lines = Weaver::new(&graph, &options).weave_stream(&resolved)?;
    Ok(Output::Stream(lines))
}
