//! The `portage` command-line tool.
//!
//! Wires the translator stages together: configuration and rule-table
//! loading, per-file pipelines, and printing results through the shared
//! output layer.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod pipeline;

pub use cli::{Cli, Command};
pub use config::PortageConfig;

use anyhow::Context as _;
use portage_mapping::RuleTable;
use portage_report::{OutputFormat, OutputFormatter};
use std::path::PathBuf;

/// Everything a command needs besides its own arguments.
pub struct Session {
    pub config: PortageConfig,
    pub format: OutputFormat,
    /// `--rules`, else `[translate] rules`.
    pub rules: Option<PathBuf>,
    pub schema_only: bool,
}

impl Session {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("failed to read working directory")?;
        let config = PortageConfig::load(cli.config.as_deref(), &cwd)?;
        let out = &cli.output;
        let format = OutputFormat::from_cli(out.json, out.jsonl, out.pretty, out.compact, &config.output);
        let rules = cli.rules.clone().or_else(|| config.translate.rules.clone());
        Ok(Self {
            config,
            format,
            rules,
            schema_only: out.output_schema,
        })
    }

    /// The configured rule table, or the built-in one.
    pub fn table(&self) -> anyhow::Result<RuleTable> {
        let table = match &self.rules {
            Some(path) => RuleTable::from_path(path)?,
            None => RuleTable::builtin().context("built-in rule table is invalid")?,
        };
        tracing::debug!(origin = table.origin(), "loaded rule table");
        Ok(table)
    }

    /// Print `value` in the session's format.
    pub fn print<T: OutputFormatter>(&self, value: &T) {
        value.print(self.format);
    }
}

/// Run a parsed command line. Returns the process exit code.
pub fn run(cli: Cli) -> anyhow::Result<i32> {
    let session = Session::new(&cli)?;
    if session.schema_only {
        println!("{}", commands::schema(&cli.command));
        return Ok(0);
    }
    commands::dispatch(cli.command, &session)
}
