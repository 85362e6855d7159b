//! Command-line interface definition.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Translate Go packages to Crystal and check the translation against Go tests.
#[derive(Debug, Parser)]
#[command(name = "portage", version, about)]
pub struct Cli {
    /// Rule table replacing the built-in one
    #[arg(long, global = true, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Config file (default: ./portage.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Log decisions to stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Default, Args)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output as JSON Lines
    #[arg(long, global = true)]
    pub jsonl: bool,

    /// Human-friendly output with colors
    #[arg(long, global = true, conflicts_with = "compact")]
    pub pretty: bool,

    /// Plain text output
    #[arg(long, global = true)]
    pub compact: bool,

    /// Print the JSON schema of the command's output and exit
    #[arg(long, global = true)]
    pub output_schema: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a Go file and print its constructs
    Extract {
        file: PathBuf,
    },

    /// Map a Go file through the rule table and print each decision
    Map {
        file: PathBuf,

        /// Record rule ties as findings instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Translate one Go file to Crystal source
    Emit {
        file: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a file's Go tests against its Crystal translation
    Verify(VerifyArgs),

    /// Translate Go files and print the translation report
    Report {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory holding `<name>_test.go` files to verify against
        #[arg(long)]
        tests_dir: Option<PathBuf>,

        /// Fail on rule ties instead of picking the first rule
        #[arg(long)]
        strict: bool,
    },

    /// Translate Go files into a directory of Crystal files
    Translate {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for `.cr` files (default: [translate] out_dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Fail on rule ties instead of picking the first rule
        #[arg(long)]
        strict: bool,

        /// Directory holding `<name>_test.go` files to verify against
        #[arg(long)]
        tests_dir: Option<PathBuf>,
    },

    /// List the rule table
    Rules {
        /// Only validate the table and print rule counts
        #[arg(long)]
        check: bool,
    },
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    pub file: PathBuf,

    /// Go test file whose assertions become test cases
    #[arg(long)]
    pub tests: PathBuf,

    /// Recorded source outputs (JSON object keyed by case id)
    #[arg(long)]
    pub recorded: Option<PathBuf>,

    /// Per-case time limit in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Crystal compiler executable
    #[arg(long)]
    pub crystal: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["portage", "map", "a.go", "--json", "-vv", "--lenient"]);
        assert!(cli.output.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Map { lenient: true, .. }));
    }

    #[test]
    fn test_translate_requires_files() {
        assert!(Cli::try_parse_from(["portage", "translate", "--out-dir", "out"]).is_err());
    }
}
