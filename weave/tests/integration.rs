use std::fs;
use std::path::Path;

use litorg::corpus::Corpus;
use litorg::parser::Parser;
use litorg::Document;
use weave::{Output, Request, TangleMode, WeaveError, WeaveOptions};

fn parse(source: &str) -> Document {
    Parser::new(Corpus::from_text("test.org", source))
        .parse()
        .expect("parse failed")
}

fn try_run(source: &str, request: &str) -> Result<Vec<String>, WeaveError> {
    let document = parse(source);
    let request = Request::parse(request)?;
    match weave::execute(&document, &request, &WeaveOptions::default(), Path::new("."))? {
        Output::Stream(lines) => Ok(lines),
        other => panic!("unexpected tangle output: {:?}", other),
    }
}

fn run(source: &str, request: &str) -> Vec<String> {
    try_run(source, request).expect("weave failed")
}

const GREET: &str = "* Hello
#+depends:greet :cpp iostream
#+name: greet
#+begin_src cpp
print(\"hi\")
#+end_src
";

#[test]
fn greet_scenario() {
    assert_eq!(run(GREET, ":noweb greet"), vec!["#include <iostream>", "print(\"hi\")"]);
}

#[test]
fn external_refs_only() {
    assert_eq!(
        run(GREET, ":cpp cstdio iostream"),
        vec!["#include <cstdio>", "#include <iostream>"]
    );
}

#[test]
fn requested_refs_deduplicate_against_discovered() {
    assert_eq!(
        run(GREET, ":noweb greet :cpp iostream cmath"),
        vec!["#include <iostream>", "#include <cmath>", "print(\"hi\")"]
    );
}

#[test]
fn inner_outer_indentation() {
    let source = "#+name: inner
#+begin_src c
42
#+end_src

Some prose about the outer block.

#+name: outer
#+begin_src c
int answer() {
    return
        <<inner>>;
}
#+end_src";
    assert_eq!(
        run(source, ":noweb inner outer"),
        vec!["42", "int answer() {", "    return", "        42;", "}"]
    );
}

const LIBRARY: &str = "#+depends:app :cpp cstdio :noweb util log
#+depends:util :cpp cstring :noweb log
#+depends:log :cpp cstdio cstdarg
#+name: log
#+begin_src c
void log_line(const char *fmt, ...);
#+end_src
#+name: util
#+begin_src c
char *dup(const char *s);
#+end_src
#+name: app
#+begin_src c
int main(void) { return 0; }
#+end_src";

#[test]
fn dependencies_precede_dependents() {
    let lines = run(LIBRARY, ":noweb app");
    assert_eq!(
        lines,
        vec![
            "#include <cstdio>",
            "#include <cstring>",
            "#include <cstdarg>",
            "void log_line(const char *fmt, ...);",
            "char *dup(const char *s);",
            "int main(void) { return 0; }",
        ]
    );
}

#[test]
fn repeated_requests_emit_once() {
    let once = run(LIBRARY, ":noweb app");
    let repeated = run(LIBRARY, ":noweb app log app util log");
    assert_eq!(once, repeated);
}

#[test]
fn weaving_is_deterministic() {
    let first = run(LIBRARY, ":noweb util app :cpp vector");
    for _ in 0..5 {
        assert_eq!(run(LIBRARY, ":noweb util app :cpp vector"), first);
    }
}

#[test]
fn aggregation_merges_contributor_dependencies() {
    let source = "#+depends:c1 :cpp x
#+depends:c2 :cpp y
#+name: c1
#+begin_src c :noweb-ref R
one();
#+end_src
#+name: c2
#+begin_src c :noweb-ref R
two();
#+end_src";
    assert_eq!(
        run(source, ":noweb R c1"),
        vec!["#include <x>", "#include <y>", "one();", "two();"]
    );
}

#[test]
fn contributor_requested_before_aggregate_appears_once() {
    let source = "#+name: c1
#+begin_src c :noweb-ref R
one();
#+end_src
#+name: c2
#+begin_src c :noweb-ref R
two();
#+end_src";
    assert_eq!(run(source, ":noweb c1 R"), vec!["one();", "two();"]);
    assert_eq!(run(source, ":noweb c2 R c1"), vec!["two();", "one();"]);
}

#[test]
fn self_reference_is_bounded() {
    let source = "#+name: a
#+begin_src c
<<b>>
#+end_src
#+name: b
#+begin_src c
<<a>>
#+end_src";
    let err = try_run(source, ":noweb a :depth 16").unwrap_err();
    assert!(matches!(err, WeaveError::DepthExceeded { limit: 16, .. }));
    assert!(err.error_line().starts_with("#error \"litorg: recursion depth 16"));
}

#[test]
fn cyclic_dependency_records_are_bounded() {
    let mut source = String::new();
    for i in 0..40 {
        source.push_str(&format!("#+depends:n{} :noweb n{}\n", i, i + 1));
    }
    source.push_str("#+depends:n40\n");
    assert!(try_run(&source, ":noweb n0 :depth 64").is_ok());
    assert!(matches!(
        try_run(&source, ":noweb n0 :depth 20"),
        Err(WeaveError::DepthExceeded { .. })
    ));
}

#[test]
fn duplicate_name_reports_location() {
    let source = "#+name: dup
#+begin_src c
a
#+end_src
#+name: dup
#+begin_src c
b
#+end_src";
    let err = try_run(source, ":noweb dup").unwrap_err();
    assert_eq!(
        err.error_line(),
        "#error \"litorg: test.org:5: duplicate declaration of block `dup`\""
    );
}

#[test]
fn unknown_request_name() {
    let err = try_run(GREET, ":noweb farewell").unwrap_err();
    assert!(matches!(err, WeaveError::UnknownBlockName(name) if name == "farewell"));
}

#[test]
fn escaped_directives_are_unescaped_once() {
    let source = "#+name: doc
#+begin_org
,* Heading
,#+begin_src c
,,#+end_src
#+end_org
#+name: text
#+begin_src org
,* Heading
  ,#+begin_src c
,,#+end_src
#+end_src";
    assert_eq!(
        run(source, ":noweb text"),
        vec!["* Heading", "  #+begin_src c", ",#+end_src"]
    );
}

#[test]
fn quote_mode() {
    let source = "#+name: shader
#+begin_src glsl
void main() {
  <<body>>
}
#+end_src
#+name: body
#+begin_src glsl
gl_FragColor = vec4(1.0);
#+end_src";
    assert_eq!(
        run(source, ":noweb shader :quote"),
        vec![r#""void main() {\n  gl_FragColor = vec4(1.0);\n}\n""#]
    );
}

#[test]
fn call_style_inclusion() {
    let source = "#+depends:helpers :cpp string
#+name: helpers
#+begin_src cpp
std::string trim(std::string);
#+end_src
#+name: main
#+begin_src cpp
<<include(\":noweb helpers :cpp vector\")>>
int main() {}
#+end_src";
    assert_eq!(
        run(source, ":noweb main"),
        vec![
            "#include <string>",
            "#include <vector>",
            "std::string trim(std::string);",
            "int main() {}",
        ]
    );
}

#[test]
fn merged_documents_share_tables() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("main.org");
    let lib = dir.path().join("lib.org");
    fs::write(&main, "#+name: main\n#+begin_src c\n<<helper>>\n#+end_src\n").unwrap();
    fs::write(&lib, "#+name: helper\n#+begin_src c\nhelp();\n#+end_src\n").unwrap();

    let request = Request::parse(&format!(":noweb main :merge {}", lib.display())).unwrap();
    let mut paths = vec![main];
    paths.extend(request.merge.iter().cloned());
    let corpus = weave::load_corpus(&paths).unwrap();
    let document = Parser::new(corpus).parse().unwrap();

    let output = weave::execute(&document, &request, &WeaveOptions::default(), dir.path()).unwrap();
    assert_eq!(output, Output::Stream(vec!["help();".to_string()]));
}

#[test]
fn missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = weave::load_corpus(&[dir.path().join("absent.org")]).unwrap_err();
    assert!(matches!(err, WeaveError::BadFilename { .. }));
}

const TANGLED: &str = "#+tangle:main src/main.c
#+tangle:util include/util.h
#+depends:main :cpp stdio.h :noweb util
#+depends:util :cpp stddef.h
#+name: util
#+begin_src c
size_t len(const char *);
#+end_src
#+name: main
#+begin_src c
int main(void) { return (int)len(\"\"); }
#+end_src";

#[test]
fn tangle_writes_each_target() {
    let dir = tempfile::tempdir().unwrap();
    let document = parse(TANGLED);
    let request = Request::parse(":tangle").unwrap();

    let output = weave::execute(&document, &request, &WeaveOptions::default(), dir.path()).unwrap();
    assert_eq!(
        output,
        Output::Tangled(vec![
            dir.path().join("src/main.c"),
            dir.path().join("include/util.h"),
        ])
    );

    let main = fs::read_to_string(dir.path().join("src/main.c")).unwrap();
    assert_eq!(
        main,
        "#include <stdio.h>\n#include <stddef.h>\nsize_t len(const char *);\nint main(void) { return (int)len(\"\"); }\n"
    );
    // Each target is resolved on its own, so `util` appears in both files.
    let util = fs::read_to_string(dir.path().join("include/util.h")).unwrap();
    assert_eq!(util, "#include <stddef.h>\nsize_t len(const char *);\n");
}

#[test]
fn failed_tangle_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = format!("{}\n#+tangle:broken out/broken.c\n", TANGLED);
    let document = parse(&source);
    let request = Request::parse(":tangle").unwrap();

    let err = weave::execute(&document, &request, &WeaveOptions::default(), dir.path()).unwrap_err();
    assert!(matches!(err, WeaveError::UnknownBlockName(name) if name == "broken"));
    assert!(!dir.path().join("src").exists());
}

#[test]
fn plan_tangle_is_pure() {
    let document = parse(TANGLED);
    let graph = weave::Graph::build(&document).unwrap();
    let planned = weave::plan_tangle(&graph, &WeaveOptions::default()).unwrap();
    let destinations: Vec<_> = planned.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(
        destinations,
        vec![Path::new("src/main.c").to_path_buf(), Path::new("include/util.h").to_path_buf()]
    );
}

#[test]
fn planned_tangle_returns_contents_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let document = parse(TANGLED);
    let request = Request::parse(":tangle").unwrap();

    let output = weave::execute_with(
        &document,
        &request,
        &WeaveOptions::default(),
        dir.path(),
        TangleMode::Plan,
    )
    .unwrap();
    let planned = match output {
        Output::Planned(planned) => planned,
        other => panic!("expected a planned tangle, got {:?}", other),
    };
    assert_eq!(planned[1].0, Path::new("include/util.h"));
    assert_eq!(planned[1].1, "#include <stddef.h>\nsize_t len(const char *);\n");
    assert!(!dir.path().join("src").exists());
    assert!(!dir.path().join("include").exists());
}
