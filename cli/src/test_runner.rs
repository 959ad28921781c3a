use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use litorg::Document;
use litorg::corpus::Corpus;
use weave::{Output, Request, TangleMode, WeaveError};

use crate::config::Config;

const TEST_SUFFIX: &str = ".test.org";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Request parameter string, as passed to `litorg run --request`.
    pub request: String,

    /// Expected woven output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// The error's Display string or its `#error` line must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the document itself is expected not to parse.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected tangle outputs, keyed by destination as declared in the document.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// Split a `.test.org` file into its TOML frontmatter and Org source, along
/// with the number of file lines preceding the source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str, usize), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or("missing opening --- frontmatter delimiter")?;

    let close = body
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let frontmatter = body[..close].trim_end_matches('\r');
    let rest = &body[close + "\n---".len()..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    let line_offset = content[..content.len() - source.len()].matches('\n').count();
    Ok((config, source, line_offset))
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    /// `Err` carries the failure reason.
    pub outcome: Result<(), String>,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map_or("?", |s| s.trim_end_matches(TEST_SUFFIX))
        })
    }
}

fn run_single_test(path: &Path, settings: &Config) -> TestResult {
    let mut description = None;
    let outcome = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read file: {}", e))
        .and_then(|content| {
            let (test, source, line_offset) =
                parse_test_file(&content).map_err(|e| format!("frontmatter error: {}", e))?;
            description = test.description.clone();
            let mut corpus = Corpus::new();
            corpus.push_document_at(path.display().to_string(), source, line_offset);
            check_test(path, &test, corpus, settings)
        });

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

fn check_test(path: &Path, test: &TestConfig, corpus: Corpus, settings: &Config) -> Result<(), String> {
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let parsed = litorg::parser::Parser::new(corpus).parse();
    if test.expect_parse_error {
        return match parsed {
            Err(_) => Ok(()),
            Ok(_) => Err("expected parse error, but parsing succeeded".into()),
        };
    }
    let document = parsed.map_err(|e| format!("unexpected parse error: {}", e))?;

    let result = weave_test(document, &test.request, &base_dir, settings);
    match (&test.expect_error, result) {
        (Some(expected), Err(err)) => {
            let actual = err.to_string();
            let line = err.error_line();
            if actual.contains(expected.as_str()) || line.contains(expected.as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, line
                ))
            }
        }
        (Some(expected), Ok(_)) => Err(format!(
            "expected error containing \"{}\", but weaving succeeded",
            expected
        )),
        (None, Err(err)) => Err(format!("unexpected error: {}", err)),
        (None, Ok(Output::Stream(lines))) => check_output(test, &lines),
        (None, Ok(Output::Planned(planned))) => check_files(test, &planned),
        (None, Ok(Output::Tangled(paths))) => {
            Err(format!("test run wrote files: {:?}", paths))
        }
    }
}

/// Carry out `request` the way `litorg run` does, except that tangle targets
/// are planned rather than written. Merged documents are read relative to
/// the test file.
fn weave_test(
    document: Document,
    request: &str,
    base_dir: &Path,
    settings: &Config,
) -> Result<Output, WeaveError> {
    let request = Request::parse(request)?;

    let document = if request.merge.is_empty() {
        document
    } else {
        let mut corpus = document.corpus;
        for merge in &request.merge {
            let path = base_dir.join(merge);
            let text = std::fs::read_to_string(&path)
                .map_err(|source| WeaveError::BadFilename { path: path.clone(), source })?;
            corpus.push_document(path.display().to_string(), text);
        }
        litorg::parser::Parser::new(corpus).parse()?
    };

    weave::execute_with(
        &document,
        &request,
        &settings.weave_options(),
        base_dir,
        TangleMode::Plan,
    )
}

fn check_output(test: &TestConfig, lines: &[String]) -> Result<(), String> {
    let Some(expected) = &test.expect_output else {
        return Ok(());
    };
    let actual = lines.join("\n");
    if actual.trim() == expected.trim() {
        Ok(())
    } else {
        Err(format!(
            "output mismatch\n  expected:\n{}\n  actual:\n{}",
            indent(expected.trim()),
            indent(actual.trim())
        ))
    }
}

fn check_files(test: &TestConfig, planned: &[(PathBuf, String)]) -> Result<(), String> {
    let actual: BTreeMap<String, &str> = planned
        .iter()
        .map(|(path, text)| (path.display().to_string(), text.as_str()))
        .collect();

    for (destination, expected) in &test.files {
        let Some(text) = actual.get(destination) else {
            return Err(format!("no tangle target writes `{}`", destination));
        };
        if text.trim_end() != expected.trim_end() {
            return Err(format!(
                "tangle mismatch for `{}`\n  expected:\n{}\n  actual:\n{}",
                destination,
                indent(expected.trim_end()),
                indent(text.trim_end())
            ));
        }
    }
    for destination in actual.keys() {
        if !test.files.contains_key(destination) {
            return Err(format!("unexpected tangle target `{}`", destination));
        }
    }
    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Discover `.test.org` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        log::warn!("cannot read test directory {}", dir.display());
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEST_SUFFIX));
        if is_test {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// Terminal styling for the test report.
struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Run all `.test.org` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String], settings: &Config) -> i32 {
    let style = Style { no_color };

    let selected: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        // Single file mode ignores categories.
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
            return 1;
        }
        select_categories(all, categories)
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file, settings);
            match &result.outcome {
                Ok(()) => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                Err(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let Err(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        let failed = failures.len();
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

fn select_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let wanted = request.trim_matches('/');
        let prefix = format!("{}/", wanted);
        let mut found = false;
        for (category, files) in &all {
            if category == wanted || category.starts_with(&prefix) {
                selected.insert(category.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                wanted,
                available.join(", ")
            );
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn frontmatter_split() {
        let (config, source, line_offset) =
            parse_test_file("---\nrequest = \":noweb a\"\n---\n* Heading\n").unwrap();
        assert_eq!(config.request, ":noweb a");
        assert_eq!(source, "* Heading\n");
        assert_eq!(line_offset, 3);
    }

    #[test]
    fn frontmatter_errors() {
        assert!(parse_test_file("* no frontmatter").is_err());
        assert!(parse_test_file("---\nrequest = \":noweb a\"\n").is_err());
        assert!(parse_test_file("---\nbogus = 1\n---\n").is_err());
    }

    #[test]
    fn stream_test_passes() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "greet.test.org",
            "---
description = \"greet\"
request = \":noweb greet\"
expect_output = '''
#include <iostream>
print(\"hi\")
'''
---
#+depends:greet :cpp iostream
#+name: greet
#+begin_src cpp
print(\"hi\")
#+end_src
",
        );
        let result = run_single_test(&path, &Config::default());
        assert_eq!(result.outcome, Ok(()));
        assert_eq!(result.label(), "greet");
    }

    #[test]
    fn output_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "wrong.test.org",
            "---
request = \":noweb a\"
expect_output = \"b\"
---
#+name: a
#+begin_src c
a
#+end_src
",
        );
        let result = run_single_test(&path, &Config::default());
        assert!(result.outcome.as_ref().unwrap_err().contains("output mismatch"));
        assert_eq!(result.label(), "wrong");
    }

    #[test]
    fn expected_error_matches() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "dup.test.org",
            "---
request = \":noweb dup\"
expect_error = \"duplicate declaration of block `dup`\"
---
#+name: dup
#+begin_src c
a
#+end_src
#+name: dup
#+begin_src c
b
#+end_src
",
        );
        assert_eq!(run_single_test(&path, &Config::default()).outcome, Ok(()));
    }

    #[test]
    fn error_locations_use_test_file_lines() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "located.test.org",
            "---
request = \":noweb dup\"
expect_error = \"located.test.org:9: duplicate declaration\"
---
#+name: dup
#+begin_src c
a
#+end_src
#+name: dup
#+begin_src c
b
#+end_src
",
        );
        assert_eq!(run_single_test(&path, &Config::default()).outcome, Ok(()));
    }

    #[test]
    fn expected_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "bad.test.org",
            "---
request = \":noweb a\"
expect_parse_error = true
---
#+begin_src c -n
a
#+end_src
",
        );
        assert_eq!(run_single_test(&path, &Config::default()).outcome, Ok(()));
    }

    #[test]
    fn tangle_files_are_compared() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "tangle/two.test.org",
            "---
request = \":tangle\"

[files]
\"out/a.c\" = \"a();\\n\"
\"out/b.c\" = \"b();\\n\"
---
#+tangle:a out/a.c
#+tangle:b out/b.c
#+name: a
#+begin_src c
a();
#+end_src
#+name: b
#+begin_src c
b();
#+end_src
",
        );
        assert_eq!(run_single_test(&path, &Config::default()).outcome, Ok(()));
        assert!(!dir.path().join("tangle/out").exists());
    }

    #[test]
    fn merged_documents_are_relative_to_the_test() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "lib.org",
            "#+name: helper\n#+begin_src c\nhelp();\n#+end_src\n",
        );
        let path = write(
            dir.path(),
            "merge.test.org",
            "---
request = \":noweb main :merge lib.org\"
expect_output = \"help();\"
---
#+name: main
#+begin_src c
<<helper>>
#+end_src
",
        );
        assert_eq!(run_single_test(&path, &Config::default()).outcome, Ok(()));
    }

    #[test]
    fn categories_follow_subfolders() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "root.test.org", "");
        write(dir.path(), "weave/a.test.org", "");
        write(dir.path(), "weave/nested/b.test.org", "");
        write(dir.path(), "tangle/c.test.org", "");
        write(dir.path(), "tangle/notes.org", "");

        let all = discover_categorized(dir.path());
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["", "tangle", "weave", "weave/nested"]);

        let selected = select_categories(all, &["weave".to_string()]);
        let names: Vec<&str> = selected.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["weave", "weave/nested"]);
    }

    #[test]
    fn repository_fixtures_pass() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests");
        assert_eq!(run_tests(&fixtures, true, &[], &Config::default()), 0);
    }
}
