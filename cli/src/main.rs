mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use litorg::corpus::Corpus;
use litorg::element::{Element, fuse};
use weave::{Graph, Output, Request, TangleMode, WeaveError, WeaveOptions};

use crate::config::Config;

const SUBCOMMANDS: &[&str] = &["run", "check", "fuse", "test", "help"];
/// Global options that consume the following argument.
const VALUED_OPTIONS: &[&str] = &["--config"];

#[derive(Parser)]
#[command(name = "litorg", version, about = "Literate Org weaver and tangler")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ./litorg.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and weave blocks, or tangle them to files
    Run(RunArgs),

    /// Parse documents and build the block tables without weaving
    Check(CheckArgs),

    /// Parse a document and print it back from its elements
    Fuse(FuseArgs),

    /// Run .test.org test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Org documents, concatenated in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Request parameter string, e.g. ":cpp iostream :noweb main"
    #[arg(short, long, allow_hyphen_values = true)]
    request: String,

    /// Exit with status 1 on error (the #error line is printed either way)
    #[arg(long)]
    fail: bool,

    /// Recursion depth ceiling (overridden by :depth in the request)
    #[arg(long)]
    depth: Option<usize>,

    /// Directory tangle destinations are relative to (defaults to the first file's)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// With :tangle, print each destination instead of writing it
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Org documents, concatenated in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Dump parsed elements
    #[arg(long)]
    ast: bool,

    /// List every block name with its dependencies
    #[arg(long)]
    list_blocks: bool,
}

#[derive(clap::Args)]
struct FuseArgs {
    /// Org document to round-trip
    file: PathBuf,

    /// Print each element's debugging representation instead
    #[arg(long)]
    repr: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.org file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

/// If the first positional argument is not a known subcommand, insert "run"
/// before it so `litorg file.org -r ...` works.
fn inject_run(mut args: Vec<String>) -> Vec<String> {
    let mut pos = 1;
    while pos < args.len() {
        let arg = args[pos].as_str();
        if VALUED_OPTIONS.contains(&arg) {
            pos += 2;
        } else if arg.starts_with('-') {
            pos += 1;
        } else {
            if !SUBCOMMANDS.contains(&arg) {
                args.insert(pos, "run".to_string());
            }
            break;
        }
    }
    args
}

fn main() {
    let cli = Cli::parse_from(inject_run(std::env::args().collect()));
    init_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    let no_color = cli.no_color || !config.color;
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let exit_code = match cli.command {
        Command::Run(run_args) => do_run(run_args, &config, color_choice),
        Command::Check(check_args) => do_check(check_args, color_choice),
        Command::Fuse(fuse_args) => do_fuse(fuse_args, color_choice),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                0
            } else {
                test_runner::run_tests(path, no_color, &test_args.category, &config)
            }
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // RUST_LOG, when set, takes precedence over -v.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn do_run(args: RunArgs, config: &Config, color_choice: ColorChoice) -> i32 {
    let mut options = config.weave_options();
    if let Some(depth) = args.depth {
        options.max_depth = depth;
    }

    let mut files = SimpleFiles::new();
    match run_request(&args, &options, &mut files) {
        Ok(Output::Stream(lines)) => {
            for line in lines {
                println!("{}", line);
            }
            0
        }
        Ok(Output::Tangled(paths)) => {
            log::info!("tangled {} file(s)", paths.len());
            0
        }
        Ok(Output::Planned(planned)) => {
            for (destination, contents) in planned {
                println!("{} ({} lines)", destination.display(), contents.lines().count());
            }
            0
        }
        Err(error) => {
            // The error line replaces the output so a compiler reading it stops there.
            println!("{}", error.error_line());
            emit(&files, &error.to_diagnostic(), color_choice);
            if args.fail || config.fail_on_error { 1 } else { 0 }
        }
    }
}

fn run_request(
    args: &RunArgs,
    options: &WeaveOptions,
    files: &mut SimpleFiles<String, String>,
) -> Result<Output, WeaveError> {
    let request = Request::parse(&args.request)?;

    let mut paths = args.files.clone();
    paths.extend(request.merge.iter().cloned());
    let corpus = load(&paths, files)?;
    let document = litorg::parser::Parser::new(corpus).parse()?;

    let base_dir = match &args.base_dir {
        Some(dir) => dir.clone(),
        None => parent_dir(&args.files[0]),
    };
    let mode = if args.dry_run {
        TangleMode::Plan
    } else {
        TangleMode::Write
    };
    weave::execute_with(&document, &request, options, &base_dir, mode)
}

fn do_check(args: CheckArgs, color_choice: ColorChoice) -> i32 {
    let mut files = SimpleFiles::new();
    let document = match load(&args.files, &mut files)
        .and_then(|corpus| litorg::parser::Parser::new(corpus).parse().map_err(WeaveError::from))
    {
        Ok(document) => document,
        Err(error) => {
            emit(&files, &error.to_diagnostic(), color_choice);
            return 1;
        }
    };
    let graph = match Graph::build(&document) {
        Ok(graph) => graph,
        Err(error) => {
            emit(&files, &error.to_diagnostic(), color_choice);
            return 1;
        }
    };

    if args.ast {
        println!("{:#?}", document.elements);
        return 0;
    }

    if args.list_blocks {
        for name in graph.block_names() {
            let bodies = graph.bodies(name).map_or(0, |b| b.len());
            match graph.dependencies(name) {
                Some(deps) => println!(
                    "{} ({} bodies) cpp=[{}] noweb=[{}]",
                    name,
                    bodies,
                    deps.external.join(" "),
                    deps.nested.join(" ")
                ),
                None => println!("{} ({} bodies)", name, bodies),
            }
        }
        for target in graph.tangles() {
            println!("tangle {} -> {}", target.name, target.destination.display());
        }
        return 0;
    }

    let names: Vec<String> = args.files.iter().map(|f| f.display().to_string()).collect();
    eprintln!("ok: {} parsed successfully", names.join(", "));
    0
}

fn do_fuse(args: FuseArgs, color_choice: ColorChoice) -> i32 {
    let mut files = SimpleFiles::new();
    let result = load(std::slice::from_ref(&args.file), &mut files)
        .and_then(|corpus| litorg::parser::Parser::new(corpus).parse().map_err(WeaveError::from));
    let document = match result {
        Ok(document) => document,
        Err(error) => {
            emit(&files, &error.to_diagnostic(), color_choice);
            return 1;
        }
    };

    if args.repr {
        for element in &document.elements {
            print_repr(element);
        }
    } else {
        println!("{}", fuse(&document.elements).join("\n"));
    }
    0
}

fn print_repr(element: &Element) {
    println!("{}:", element.kind_name());
    for line in element.repr() {
        println!("  {}", line);
    }
}

/// Read `paths` into a corpus, registering every document with `files`
/// so diagnostics can point into it.
fn load(paths: &[PathBuf], files: &mut SimpleFiles<String, String>) -> Result<Corpus, WeaveError> {
    let corpus = weave::load_corpus(paths)?;
    for source in corpus.sources() {
        files.add(source.name.clone(), source.text.clone());
    }
    Ok(corpus)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn emit(files: &SimpleFiles<String, String>, diagnostic: &Diagnostic<usize>, color_choice: ColorChoice) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
}
