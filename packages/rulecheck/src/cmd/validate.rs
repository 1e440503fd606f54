//! Validate rule configuration files.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result, bail};

use super::{RuleSources, print_load_errors};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Rule files or directories to validate.
    /// If not specified, validates all discoverable rule sources.
    pub paths: Vec<PathBuf>,
}

pub fn main(config: Config) -> Result<()> {
    let report = RuleSources { paths: config.paths }
        .load()
        .context("load rules")?;

    for (source, rules) in report.rules_by_source() {
        let yaml = serde_yaml::to_string(rules).context("serialize rules")?;
        println!("Rule source: {source}");
        println!("{yaml}");
        println!("------");
        println!();
    }

    print_load_errors(&report);
    if !report.errors.is_empty() {
        bail!(
            "found {} invalid rule {}",
            report.errors.len(),
            if report.errors.len() == 1 { "definition" } else { "definitions" }
        );
    }

    println!(
        "{} {} valid",
        report.rules.len(),
        if report.rules.len() == 1 { "rule" } else { "rules" }
    );
    Ok(())
}
