//! Rule data types and loading operations.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

pub use error::*;
pub use loader::*;
pub use schema::*;

mod error;
mod loader;
mod schema;

/// Get the project directories for the application.
#[tracing::instrument]
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "rulecheck", "rulecheck")
}

/// The rule sources loaded when none are given explicitly.
///
/// Loading order (all additive, missing sources are skipped):
/// 1. User-level rules from `ProjectDirs::config_dir()/rules.yaml`
/// 2. `.rules` in the working directory, either a file or a directory
/// 3. `.rules.yaml` in the working directory
pub fn default_sources() -> Vec<PathBuf> {
    let mut sources = Vec::new();
    if let Some(dirs) = project_dirs() {
        sources.push(dirs.config_dir().join("rules.yaml"));
    }
    sources.push(PathBuf::from(".rules"));
    sources.push(PathBuf::from(".rules.yaml"));
    sources
}

/// Load rules from the given sources, or from [`default_sources`] if empty.
///
/// Sources are loaded in order into a single rule set; see [`Loader`] for
/// how errors and duplicate names are handled.
#[tracing::instrument]
pub fn load_sources(sources: &[PathBuf]) -> LoadReport {
    let defaults;
    let sources = if sources.is_empty() {
        defaults = default_sources();
        &defaults
    } else {
        sources
    };

    let mut loader = Loader::default();
    for source in sources {
        loader.load_path(source);
    }

    let report = loader.finish();
    tracing::debug!(
        rules = report.rules.len(),
        errors = report.errors.len(),
        "loaded rule sources"
    );
    report
}

/// Load rules from a single file or directory.
pub fn load_from(path: &Path) -> LoadReport {
    let mut loader = Loader::default();
    loader.load_path(path);
    loader.finish()
}
