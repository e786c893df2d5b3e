use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands::parse::DEFAULT_IGNORED_HEADING;

#[derive(Parser, Debug)]
#[command(
    name = "public-apis-index",
    version,
    about = "Extract API records from markdown tables and index them for search"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Parse(ParseArgs),
    Index(IndexArgs),
    Search(SearchArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Markdown file path, or `-` for stdin.
    #[arg(short, long)]
    pub input: PathBuf,

    /// JSON output path (defaults to stdout).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON indent; 0 keeps one element per line without leading spaces.
    #[arg(long, default_value_t = 2)]
    pub indent: usize,

    /// Write the whole array on a single line, ignoring --indent.
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Heading labels that never become a category.
    #[arg(long = "ignore-heading", default_value = DEFAULT_IGNORED_HEADING)]
    pub ignored_headings: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RefreshMode {
    Full,
    MissingOrStale,
}

impl RefreshMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::MissingOrStale => "missing-or-stale",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Markdown document to parse and index.
    #[arg(short, long, conflicts_with = "records", required_unless_present = "records")]
    pub input: Option<PathBuf>,

    /// Previously extracted records (JSON array) to index.
    #[arg(long)]
    pub records: Option<PathBuf>,

    #[arg(long, default_value = ".cache/public-apis")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value = crate::semantic::DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, value_enum, default_value_t = RefreshMode::MissingOrStale)]
    pub refresh_mode: RefreshMode,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long = "ignore-heading", default_value = DEFAULT_IGNORED_HEADING)]
    pub ignored_headings: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long, default_value = ".cache/public-apis")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(short, long)]
    pub query: String,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value = crate::semantic::DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/public-apis")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
