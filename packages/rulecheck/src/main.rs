//! rulecheck applies `.rules` files to your project.

use color_eyre::{Result, Section};
use tracing::{instrument, level_filters::LevelFilter};

mod cmd;

use clap::{Parser, Subcommand};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// rulecheck applies `.rules` files to your project.
#[derive(Parser)]
#[command(author, version = env!("RULECHECK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check project files against configured rules.
    Check(cmd::check::Config),

    /// Validate rule files and print the rules they define.
    Validate(cmd::validate::Config),

    /// Test a rule against sample input.
    Test(cmd::test::Config),
}

#[instrument]
fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Warnings (timeouts, skipped sources) are shown by default; use
    // `RULECHECK_LOG` directives for more detail.
    //
    // Examples:
    // - `RULECHECK_LOG=trace` to log all messages
    // - `RULECHECK_LOG=debug` to log debug, info, warn, and error messages
    // - `RULECHECK_LOG=rulecheck::engine=debug` to debug evaluation only
    // - `RULECHECK_LOG=error` to log only error messages
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .pretty(),
        )
        .with(
            EnvFilter::builder()
                .with_env_var("RULECHECK_LOG")
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Check(config) => cmd::check::main(config),
        Commands::Validate(config) => cmd::validate::main(config),
        Commands::Test(config) => cmd::test::main(config),
    }
    .suggestion("Run `rulecheck validate` to see how your rule files were loaded.")
}
