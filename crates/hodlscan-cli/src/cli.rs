//! CLI argument definitions for hodlscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `extract` | Run the pipeline over local HTML documents |
//! | `sources` | List configured sources |
//! | `probe` | Show what each source's signature finds in a document |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | built-in sources | Source configuration (TOML), also `HODLSCAN_CONFIG` |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings and failed sources as errors |
//! | `--mode` | from config | Run sources in parallel or sequentially |
//! | `--log-json` | `false` | Emit logs on stderr as JSON lines |
//!
//! # Examples
//!
//! ```bash
//! hodlscan extract --doc strategy=pages/strategy.html --doc mara=pages/mara.html --pretty
//! curl -s https://example.com/chart | hodlscan extract --doc treasury-chart=- --raw
//! hodlscan probe --doc mara=pages/mara.html --format table
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use hodlscan_core::{ExecutionMode, SourceName};

/// Extract bitcoin purchase records embedded in web pages.
#[derive(Debug, Parser)]
#[command(
    name = "hodlscan",
    author,
    version,
    about = "Extract bitcoin purchase records embedded in web pages"
)]
pub struct Cli {
    /// Source configuration file. Falls back to the built-in sources.
    #[arg(long, global = true, env = "HODLSCAN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and failed sources as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Override the configured execution mode.
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeArg>,

    /// Write logs to stderr as JSON lines instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object output.
    Json,
    /// Human-readable summary.
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Parallel,
    Sequential,
}

impl From<ModeArg> for ExecutionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Parallel => Self::Parallel,
            ModeArg::Sequential => Self::Sequential,
        }
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract canonical purchase records from local HTML documents.
    ///
    /// # Examples
    ///
    ///   hodlscan extract --doc strategy=strategy.html
    ///   hodlscan extract --doc mara=- --raw < mara.html
    Extract(ExtractArgs),

    /// List configured sources.
    Sources(SourcesArgs),

    /// Report the candidates each source's signature locates, without decoding.
    Probe(ProbeArgs),
}

/// Arguments for the `extract` command.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Document for a source, as NAME=PATH. PATH `-` reads stdin.
    #[arg(
        long = "doc",
        value_name = "NAME=PATH",
        required = true,
        value_parser = parse_doc_arg
    )]
    pub docs: Vec<DocArg>,

    /// Print the bare source-to-records mapping instead of the envelope.
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

/// Arguments for the `sources` command.
#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Include field mappings.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

/// Arguments for the `probe` command.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Document for a source, as NAME=PATH. PATH `-` reads stdin.
    #[arg(
        long = "doc",
        value_name = "NAME=PATH",
        required = true,
        value_parser = parse_doc_arg
    )]
    pub docs: Vec<DocArg>,

    /// Characters of each candidate to show.
    #[arg(long, default_value_t = 120)]
    pub preview_chars: usize,
}

/// A `NAME=PATH` document argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocArg {
    pub name: SourceName,
    pub path: PathBuf,
}

impl DocArg {
    pub fn is_stdin(&self) -> bool {
        self.path == Path::new("-")
    }
}

pub fn parse_doc_arg(value: &str) -> Result<DocArg, String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{value}'"))?;
    if path.trim().is_empty() {
        return Err(format!("missing path in '{value}'"));
    }

    let name = SourceName::parse(name).map_err(|error| error.to_string())?;
    Ok(DocArg {
        name,
        path: PathBuf::from(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_doc_arguments() {
        let doc = parse_doc_arg("Mara=pages/mara.html").expect("valid");
        assert_eq!(doc.name.as_str(), "mara");
        assert_eq!(doc.path, PathBuf::from("pages/mara.html"));
        assert!(!doc.is_stdin());
        assert!(parse_doc_arg("mara=-").expect("valid").is_stdin());
    }

    #[test]
    fn rejects_malformed_doc_arguments() {
        assert!(parse_doc_arg("mara.html").is_err());
        assert!(parse_doc_arg("mara=").is_err());
        assert!(parse_doc_arg("=page.html").is_err());
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hodlscan",
            "extract",
            "--doc",
            "strategy=a.html",
            "--doc",
            "mara=b.html",
            "--format",
            "table",
            "--mode",
            "sequential",
            "--strict",
        ])
        .expect("parses");

        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.mode, Some(ModeArg::Sequential));
        assert!(cli.strict);
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.docs.len(), 2);
        assert!(!args.raw);
    }

    #[test]
    fn extract_requires_a_document() {
        assert!(Cli::try_parse_from(["hodlscan", "extract"]).is_err());
    }
}
