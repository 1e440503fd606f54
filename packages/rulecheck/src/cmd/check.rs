//! Check project files against configured rules.
//!
//! This command evaluates files against the loaded rules and reports every
//! fired action, enabling use in CI pipelines or as a standalone linter.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, ValueEnum};
use color_eyre::eyre::{Context, Result};
use color_print::cprintln;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use itertools::Itertools;
use rayon::ThreadPoolBuilder;

use rulecheck::{
    engine::{Engine, FileReport},
    rules::{ActionKind, LoadReport},
};

use super::{Limits, RuleSources, print_load_errors};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Files, directories, or glob patterns to check. If not specified,
    /// checks the working directory.
    #[arg(id = "targets", value_name = "TARGETS")]
    pub targets: Vec<PathBuf>,

    #[command(flatten)]
    pub sources: RuleSources,

    #[command(flatten)]
    pub limits: Limits,

    /// Number of worker threads. Defaults to one per CPU.
    #[arg(short, long, env = "RULECHECK_JOBS")]
    pub jobs: Option<usize>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Exit with status 1 when an action of this kind or stronger fires.
    #[arg(long, value_enum, default_value_t = FailOn::Enforce)]
    pub fail_on: FailOn,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per fired action.
    Text,

    /// Every file report as JSON.
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    Message,
    Suggest,
    Enforce,
}

impl From<FailOn> for ActionKind {
    fn from(value: FailOn) -> Self {
        match value {
            FailOn::Message => ActionKind::Message,
            FailOn::Suggest => ActionKind::Suggest,
            FailOn::Enforce => ActionKind::Enforce,
        }
    }
}

pub fn main(config: Config) -> Result<()> {
    let report = config.sources.load().context("load rules")?;
    print_load_errors(&report);

    if report.rules.is_empty() {
        println!("No rules found.");
        return Ok(());
    }

    let mut files = collect_files(&config.targets)?;
    exclude_rule_sources(&mut files, &report);
    let total_rules = report.rules.len();
    let engine = Engine::new(report.rules).with_options(config.limits.options());

    let max_bytes = config.limits.max_bytes;
    let reports = match config.jobs {
        Some(jobs) => ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("rulecheck-worker-{i}"))
            .build()
            .context("build worker pool")?
            .install(|| engine.evaluate_files(&files, max_bytes)),
        None => engine.evaluate_files(&files, max_bytes),
    };

    match config.format {
        OutputFormat::Text => print_text(&reports, total_rules),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&reports).context("serialize reports")?;
            println!("{json}");
        }
    }

    let strongest = reports
        .iter()
        .flat_map(|report| report.matched())
        .filter_map(|result| result.strongest())
        .max();
    if strongest.is_some_and(|kind| kind >= ActionKind::from(config.fail_on)) {
        process::exit(1);
    }

    Ok(())
}

/// Collect files to check based on provided paths or the working directory.
///
/// The result is sorted and deduplicated so output is deterministic.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if paths.is_empty() {
        walk(Path::new("."), &mut files)?;
    }

    for path in paths {
        let path_str = path.to_string_lossy();

        if path_str.contains('*') || path_str.contains('?') || path_str.contains('[') {
            let pattern = Pattern::new(&path_str)
                .with_context(|| format!("invalid glob pattern: {path_str}"))?;

            let mut candidates = Vec::new();
            walk(Path::new("."), &mut candidates)?;
            files.extend(
                candidates
                    .into_iter()
                    .filter(|candidate| glob_matches(&pattern, candidate)),
            );
        } else if path.is_dir() {
            walk(path, &mut files)?;
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            tracing::warn!(?path, "path does not exist, skipping");
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Glob matching where `*` and `?` never cross a `/`.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn glob_matches(pattern: &Pattern, candidate: &Path) -> bool {
    let candidate = candidate.strip_prefix(".").unwrap_or(candidate);
    pattern.matches_path_with(candidate, GLOB_OPTIONS)
}

/// Drop the rule sources themselves from the files to check.
fn exclude_rule_sources(files: &mut Vec<PathBuf>, report: &LoadReport) {
    let sources = report
        .sources
        .iter()
        .filter_map(|source| fs::canonicalize(&source.name).ok())
        .collect::<HashSet<_>>();

    files.retain(|file| !fs::canonicalize(file).is_ok_and(|file| sources.contains(&file)));
}

/// Walk a directory honoring `.gitignore`, collecting regular files.
///
/// Hidden files are included, but `.git` directories are not.
fn walk(root: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();
    for entry in walker {
        let entry = entry.context("walk directory")?;
        if entry.file_type().is_some_and(|ft| ft.is_file()) {
            files.push(entry.into_path());
        }
    }
    Ok(())
}

/// Print every fired action, then warnings and a summary.
fn print_text(reports: &[FileReport], total_rules: usize) {
    let mut fired = 0;
    let mut enforced = 0;
    let mut files_with_actions = 0;

    for report in reports {
        let mut any = false;
        for result in report.matched() {
            for action in &result.actions {
                println!(
                    "{}:{} [{}] {}: {}",
                    report.path.display(),
                    result.line(),
                    result.rule,
                    action.kind,
                    action.message
                );
                fired += 1;
                any = true;
                if action.kind == ActionKind::Enforce {
                    enforced += 1;
                }
            }
        }
        if any {
            files_with_actions += 1;
        }
    }

    let warnings = reports
        .iter()
        .flat_map(|report| report.warnings().map(move |w| (&report.path, w)))
        .collect_vec();
    for (path, warning) in &warnings {
        eprintln!("{}: warning: {}", path.display(), warning);
    }

    if fired == 0 {
        println!();
        println!(
            "\u{2713} Checked {} {} against {} {}",
            reports.len(),
            plural(reports.len(), "file", "files"),
            total_rules,
            plural(total_rules, "rule", "rules"),
        );
    } else {
        println!();
        println!(
            "\u{2717} {} {} fired ({} enforce) in {} {}",
            fired,
            plural(fired, "action", "actions"),
            enforced,
            files_with_actions,
            plural(files_with_actions, "file", "files"),
        );
        cprintln!(
            "<dim>Checked {} files against {} rules</dim>",
            reports.len(),
            total_rules
        );
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
