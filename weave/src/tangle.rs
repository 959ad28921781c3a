use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, WeaveError};
use crate::graph::Graph;
use crate::weaver::{WeaveOptions, Weaver};

/// Weave every `#+tangle:` target without touching the filesystem.
/// Returns `(destination, contents)` pairs in declaration order.
pub fn plan_tangle(graph: &Graph<'_>, options: &WeaveOptions) -> Result<Vec<(PathBuf, String)>> {
    let weaver = Weaver::new(graph, options);
    let mut planned = Vec::with_capacity(graph.tangles().len());

    for target in graph.tangles() {
        let lines = weaver.weave_target(&target.name)?;
        let mut contents = lines.join("\n");
        contents.push('\n');
        log::debug!(
            "tangle `{}` -> {} ({} lines)",
            target.name,
            target.destination.display(),
            lines.len()
        );
        planned.push((target.destination.clone(), contents));
    }

    Ok(planned)
}

/// Weave and write every tangle target. Relative destinations are resolved
/// against `base_dir`; parent directories are created as needed. Nothing is
/// written unless every target weaves successfully.
pub fn tangle(graph: &Graph<'_>, options: &WeaveOptions, base_dir: &Path) -> Result<Vec<PathBuf>> {
    let planned = plan_tangle(graph, options)?;
    let mut written = Vec::with_capacity(planned.len());

    for (destination, contents) in planned {
        let path = base_dir.join(destination);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| WeaveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, contents).map_err(|source| WeaveError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
