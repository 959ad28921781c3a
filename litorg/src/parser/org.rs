use std::sync::LazyLock;

use regex::Regex;

use crate::element::Element;
use crate::parameters::{ParameterError, Parameters};
use crate::parser::Language;
use crate::parser::rules::{Rule, between, first, greedy, trailing};

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*+) (.+)$").expect("section pattern is valid")
});

const BEGIN_SRC: &str = "#+begin_src";
const END_SRC: &str = "#+end_src";
const BEGIN: &str = "#+begin_";
const END: &str = "#+end_";
const PROPERTY: &str = "#+";

/// The Org language: sections, source blocks, generic blocks, `#+` metadata.
pub static ORG: LazyLock<Language> = LazyLock::new(|| Language {
    identifiers: vec!["org"],
    extensions: vec!["org"],
    rules: org_rules(),
});

fn org_rules() -> Vec<Rule> {
    vec![
        // Section, hierarchical delimiter of the document.
        Rule::new("section", first(is_section), make_section),
        // Code, content meant for machine consumption.
        Rule::new(
            "code",
            between(|l| has_prefix(l, BEGIN_SRC), |l| has_prefix(l, END_SRC)),
            make_code,
        ),
        Rule::new("block", Box::new(take_generic_block), make_generic_block),
        Rule::new("metadata", first(is_property), make_metadata),
        Rule::new("whitespace", greedy(is_blank), make_whitespace),
        // Prose keeps interior blank lines but leaves trailing ones to whatever
        // comes next.
        Rule::new(
            "prose",
            trailing(is_blank, |l| !is_section(l) && !is_property(l)),
            make_prose,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn is_section(line: &str) -> bool {
    SECTION_RE.is_match(line)
}

fn is_property(line: &str) -> bool {
    line.starts_with(PROPERTY)
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| matches!(c, ' ' | '\t' | '\r'))
}

/// ASCII case-insensitive prefix test; Org accepts `#+BEGIN_SRC` too.
fn has_prefix(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
}

fn strip_prefix<'a>(line: &'a str, prefix: &str) -> &'a str {
    if has_prefix(line, prefix) {
        &line[prefix.len()..]
    } else {
        line
    }
}

/// Kind of a `#+begin_<kind>` line, lowercased.
fn block_kind(line: &str) -> Option<String> {
    if !has_prefix(line, BEGIN) {
        return None;
    }
    let kind = line[BEGIN.len()..].split_whitespace().next()?;
    Some(kind.to_ascii_lowercase())
}

fn take_generic_block(lines: &[String]) -> usize {
    let Some(kind) = block_kind(&lines[0]) else {
        return 0;
    };
    let end = format!("{}{}", END, kind);
    lines[1..]
        .iter()
        .position(|l| l.trim_end().eq_ignore_ascii_case(&end))
        .map_or(0, |i| i + 2)
}

// ---------------------------------------------------------------------------
// Makers
// ---------------------------------------------------------------------------

fn make_section(lines: &[String]) -> Result<Element, ParameterError> {
    let line = &lines[0];
    let stars = line.len() - line.trim_start_matches('*').len();
    Ok(Element::Section {
        level: stars,
        title: line[stars + 1..].to_string(),
    })
}

fn make_code(lines: &[String]) -> Result<Element, ParameterError> {
    let (language, parameters) = parse_begin_src(&lines[0])?;
    Ok(Element::CodeBlock {
        language,
        parameters,
        begin: lines[0].clone(),
        lines: lines[1..lines.len() - 1].to_vec(),
        end: lines[lines.len() - 1].clone(),
    })
}

fn make_generic_block(lines: &[String]) -> Result<Element, ParameterError> {
    Ok(Element::GenericBlock {
        kind: block_kind(&lines[0]).unwrap_or_default(),
        begin: lines[0].clone(),
        lines: lines[1..lines.len() - 1].to_vec(),
        end: lines[lines.len() - 1].clone(),
    })
}

fn make_metadata(lines: &[String]) -> Result<Element, ParameterError> {
    let line = &lines[0];
    let body = &line[PROPERTY.len()..];
    let (name, raw_value) = match body.split_once(':') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (body.trim(), ""),
    };
    Ok(Element::Metadata {
        name: name.to_string(),
        raw_value: raw_value.to_string(),
        raw: line.clone(),
    })
}

fn make_whitespace(lines: &[String]) -> Result<Element, ParameterError> {
    Ok(Element::Whitespace {
        lines: lines.to_vec(),
    })
}

fn make_prose(lines: &[String]) -> Result<Element, ParameterError> {
    Ok(Element::Prose {
        lines: lines.to_vec(),
    })
}

/// Split a `#+begin_src` line into its language and parameters.
pub fn parse_begin_src(line: &str) -> Result<(String, Parameters), ParameterError> {
    let rest = strip_prefix(line, BEGIN_SRC).trim();
    match rest.find(char::is_whitespace) {
        None => Ok((rest.to_string(), Parameters::new())),
        Some(pos) => {
            let language = rest[..pos].to_string();
            let params = rest[pos..].trim();
            if params.is_empty() {
                Ok((language, Parameters::new()))
            } else {
                Ok((language, Parameters::parse(params)?))
            }
        }
    }
}
