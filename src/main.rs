//! pyreview: Test Quality Analyzer CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use pyreview::config::{
    build_ignore_set, is_ignored, load_config, starter_config, RunConfig, CONFIG_FILENAME,
};
use pyreview::reporter::{ConsoleReporter, HtmlReporter, JsonReporter};
use pyreview::{Category, ReviewEngine, ReviewReport, RuntimeCollector};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Directories never searched for tests
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".tox",
    ".nox",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "node_modules",
    "site-packages",
];

/// pyreview: Test Quality Analyzer for Python
#[derive(Parser, Debug)]
#[command(name = "pyreview")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Test files or directories to analyze (default: current directory)
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Terminal)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Fail (exit 1) when the overall score is below this value (0-100)
    #[arg(long)]
    min_score: Option<f64>,

    /// Fail (exit 1) on any error-severity issue
    #[arg(long)]
    strict: bool,

    /// Run only these analyzers (repeatable)
    #[arg(long, value_name = "ANALYZER")]
    only: Vec<String>,

    /// Path to config file (default: search .pyreviewrc.json or pyproject.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with timing samples: [{"test": "<node id>", "duration_ms": 12.5}]
    #[arg(long, value_name = "FILE")]
    timings: Option<PathBuf>,

    /// Quiet mode (score line only)
    #[arg(long, short)]
    quiet: bool,

    /// Verbose output and debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Number of parallel threads (default: number of CPU cores)
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create .pyreviewrc.json with sensible defaults
    Init {
        /// Minimum score threshold (e.g. 70)
        #[arg(long)]
        min_score: Option<u8>,

        /// Directory in which to create config (default: current)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Terminal,
    Json,
    Html,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.no_color {
        colored::control::set_override(false);
    }

    if let Some(Commands::Init { min_score, dir }) = &args.command {
        return run_init(*min_score, dir.as_deref());
    }

    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths.clone()
    };

    if let Some(score) = args.min_score {
        if !(0.0..=100.0).contains(&score) {
            anyhow::bail!("--min-score must be between 0 and 100, got {}", score);
        }
    }
    let only = parse_only(&args.only)?;

    // Resolve work directory for config search
    let first = &paths[0];
    let work_dir = if first.is_file() {
        first.parent().unwrap_or(Path::new("."))
    } else {
        first.as_path()
    };

    // Load config (CLI flags override config file)
    let loaded = load_config(work_dir, args.config.as_deref())?;
    let origin = loaded.origin();
    let config = loaded.config.merge_with_cli(args.min_score, args.strict);
    let (run_config, option_errors) = RunConfig::resolve(&config);
    let run_config = run_config.with_only(only);
    let config_issues = option_errors.iter().map(|e| e.to_issue(&origin)).collect();

    let ignore_set = if run_config.ignore_paths.is_empty() {
        None
    } else {
        Some(build_ignore_set(&run_config.ignore_paths)?)
    };

    let mut test_files = Vec::new();
    for path in &paths {
        test_files.extend(collect_test_files(path, ignore_set.as_ref())?);
    }
    test_files.dedup();
    tracing::debug!(count = test_files.len(), "collected test files");

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let timings = match &args.timings {
        Some(path) => RuntimeCollector::load(path)?,
        None => RuntimeCollector::new(),
    };

    let engine = ReviewEngine::new(run_config)
        .with_config_issues(config_issues)
        .with_timings(timings);
    let report = engine.review(&test_files);

    let output = render(&args, &report);
    match &args.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("{}: Report written to {}", "Info".blue(), path.display());
            }
        }
        None => print!("{}", output),
    }

    if report.verdict.passed {
        Ok(ExitCode::SUCCESS)
    } else {
        if !args.quiet && (args.format != OutputFormat::Terminal || args.output.is_some()) {
            for reason in &report.verdict.reasons {
                eprintln!("{}: {}", "Failed".red().bold(), reason);
            }
        }
        Ok(ExitCode::from(1))
    }
}

fn render(args: &Args, report: &ReviewReport) -> String {
    match args.format {
        OutputFormat::Json => {
            let mut json = JsonReporter::new().pretty().report(report);
            json.push('\n');
            json
        }
        OutputFormat::Html => HtmlReporter::new().report(report),
        OutputFormat::Terminal => {
            let mut reporter = ConsoleReporter::new();
            if args.no_color || args.output.is_some() {
                reporter = reporter.without_colors();
            }
            if args.verbose {
                reporter = reporter.verbose();
            }
            if args.quiet {
                format!("{}\n", reporter.render_quiet(report))
            } else {
                reporter.render(report)
            }
        }
    }
}

fn parse_only(names: &[String]) -> Result<Vec<Category>> {
    names
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            Category::from_name(name).with_context(|| {
                format!(
                    "Unknown analyzer '{}' for --only (expected one of: {})",
                    name,
                    Category::ALL.map(Category::as_str).join(", ")
                )
            })
        })
        .collect()
}

fn run_init(min_score: Option<u8>, dir: Option<&Path>) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let dir = dir.unwrap_or(&cwd);
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() {
        eprintln!(
            "{}: {} already exists; use --dir to write elsewhere or remove it first",
            "Warning".yellow(),
            config_path.display()
        );
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(score) = min_score {
        if score > 100 {
            anyhow::bail!("--min-score must be between 0 and 100, got {}", score);
        }
    }

    let mut json = starter_config(min_score);
    json.push('\n');
    std::fs::write(&config_path, json)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!(
        "{}: Created {} with min_score={}",
        "Done".green().bold(),
        config_path.display(),
        min_score.unwrap_or(70)
    );
    Ok(ExitCode::SUCCESS)
}

fn collect_test_files(path: &Path, ignore_set: Option<&globset::GlobSet>) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if let Some(set) = ignore_set {
            if is_ignored(path, set) {
                return Ok(vec![]);
            }
        }
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let mut files = Vec::new();

    let walker = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e.path()));
    for entry in walker.filter_map(|e| e.ok()) {
        let file_path = entry.path();
        if entry.file_type().is_file() && is_test_file(file_path) {
            if let Some(set) = ignore_set {
                if is_ignored(file_path, set) {
                    continue;
                }
            }
            files.push(file_path.to_path_buf());
        }
    }

    // Sort for consistent output
    files.sort();

    Ok(files)
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SKIPPED_DIRS.contains(&name) || name.ends_with(".egg-info"))
}

/// pytest's default `python_files`: `test_*.py` and `*_test.py`
fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name.strip_suffix(".py") else {
        return false;
    };
    stem.starts_with("test_") || stem.ends_with("_test")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file(Path::new("tests/test_login.py")));
        assert!(is_test_file(Path::new("login_test.py")));
        assert!(!is_test_file(Path::new("conftest.py")));
        assert!(!is_test_file(Path::new("test_login.pyc")));
        assert!(!is_test_file(Path::new("testing.py")));
    }

    #[test]
    fn test_skipped_dirs() {
        assert!(is_skipped_dir(Path::new("project/.venv")));
        assert!(is_skipped_dir(Path::new("project/pkg.egg-info")));
        assert!(!is_skipped_dir(Path::new("project/tests")));
    }

    #[test]
    fn test_parse_only() {
        let parsed = parse_only(&["assertions,naming".to_string(), "smells".to_string()]).unwrap();
        assert_eq!(
            parsed,
            vec![Category::Assertions, Category::Naming, Category::Smells]
        );
        assert!(parse_only(&["widgets".to_string()]).is_err());
    }
}
