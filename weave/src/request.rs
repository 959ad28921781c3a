use std::path::PathBuf;

use litorg::parameters::Parameters;

use crate::error::{Result, WeaveError};
use crate::graph::{EXTERNAL_KEY, NESTED_KEY};

const QUOTE_KEY: &str = "quote";
const TANGLE_KEY: &str = "tangle";
const MERGE_KEY: &str = "merge";
const DEPTH_KEY: &str = "depth";

/// What one invocation asks for, decoded from a parameter string such as
/// `:cpp iostream :noweb main :depth 64`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub external_refs: Vec<String>,
    pub block_names: Vec<String>,
    pub quote: bool,
    pub tangle: bool,
    /// Extra documents appended to the corpus.
    pub merge: Vec<PathBuf>,
    pub depth: Option<usize>,
}

impl Request {
    pub fn parse(text: &str) -> Result<Request> {
        let params = Parameters::parse(text).map_err(|e| WeaveError::malformed(text, e))?;

        for param in params.iter() {
            let known = [EXTERNAL_KEY, NESTED_KEY, QUOTE_KEY, TANGLE_KEY, MERGE_KEY, DEPTH_KEY];
            if !known.contains(&param.key.as_str()) {
                log::warn!("ignoring unknown request key `:{}`", param.key);
            }
        }

        let depth = match params.get(DEPTH_KEY) {
            None => None,
            Some([value]) => match value.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(WeaveError::malformed(
                        text,
                        format!("`:{}` expects a positive integer, got `{}`", DEPTH_KEY, value),
                    ));
                }
                Ok(depth) => Some(depth),
            },
            Some(_) => {
                return Err(WeaveError::malformed(
                    text,
                    format!("`:{}` expects exactly one value", DEPTH_KEY),
                ));
            }
        };

        let request = Request {
            external_refs: params.values(EXTERNAL_KEY).to_vec(),
            block_names: params.values(NESTED_KEY).to_vec(),
            quote: params.has(QUOTE_KEY),
            tangle: params.has(TANGLE_KEY),
            merge: params.values(MERGE_KEY).iter().map(PathBuf::from).collect(),
            depth,
        };
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<()> {
        let externals = !self.external_refs.is_empty();
        let names = !self.block_names.is_empty();

        if !externals && !names && !self.tangle {
            return Err(WeaveError::EmptyRequest);
        }
        if self.quote && externals {
            return Err(WeaveError::ConflictingFlags(
                ":quote cannot be combined with :cpp".to_string(),
            ));
        }
        if self.tangle && (externals || names) {
            return Err(WeaveError::ConflictingFlags(
                ":tangle cannot be combined with :cpp or :noweb".to_string(),
            ));
        }
        if self.tangle && self.quote {
            return Err(WeaveError::ConflictingFlags(
                ":tangle cannot be combined with :quote".to_string(),
            ));
        }
        Ok(())
    }
}
