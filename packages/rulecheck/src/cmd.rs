//! CLI subcommands and the options they share.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use color_eyre::eyre::{Result, bail};
use color_print::ceprintln;

use rulecheck::{
    engine::EvalOptions,
    rules::{self, LoadReport},
};

pub mod check;
pub mod validate;

/// Where rules are loaded from.
#[derive(Args, Clone, Debug)]
pub struct RuleSources {
    /// Rule files or directories to load, in order.
    ///
    /// If not specified, loads the user-level `rules.yaml`, then `.rules`
    /// and `.rules.yaml` in the working directory.
    #[arg(
        id = "rules",
        short = 'r',
        long = "rules",
        env = "RULECHECK_RULES",
        value_delimiter = ','
    )]
    pub paths: Vec<PathBuf>,
}

impl RuleSources {
    /// Load the configured sources. Explicitly named sources must exist.
    pub fn load(&self) -> Result<LoadReport> {
        for path in &self.paths {
            if !path.exists() {
                bail!("rule source does not exist: {path:?}");
            }
        }
        Ok(rules::load_sources(&self.paths))
    }
}

/// Evaluation limits.
#[derive(Args, Clone, Debug)]
pub struct Limits {
    /// Maximum time a single filter may run on a large file, in milliseconds.
    /// A filter that runs longer is treated as not matching. 0 disables the limit.
    #[arg(long, env = "RULECHECK_FILTER_TIMEOUT_MS", default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Maximum number of bytes read from each file; the rest is not evaluated.
    #[arg(long, env = "RULECHECK_MAX_BYTES", default_value_t = 8 * 1024 * 1024)]
    pub max_bytes: u64,
}

impl Limits {
    /// Evaluation options for these limits.
    pub fn options(&self) -> EvalOptions {
        EvalOptions {
            filter_timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
            ..EvalOptions::default()
        }
    }
}

/// Print load errors to stderr. Loading continues past them, so they are
/// reported as warnings.
pub fn print_load_errors(report: &LoadReport) {
    for error in &report.errors {
        ceprintln!("<yellow><bold>warning</bold></yellow>: {}", error);
    }
}
