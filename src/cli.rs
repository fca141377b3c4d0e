use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::chunker::DEFAULT_MAX_CHUNK_TOKENS;
use crate::config::DEFAULT_WORKERS;
use crate::generate::DEFAULT_MAX_RETRIES;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Also write log lines to a timestamped file in this directory.
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a text article into an `artykul.html` fragment next to it.
    Generate(GenerateArgs),
    /// Show how an input file would be chunked (one JSON line per chunk).
    Chunks(ChunksArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelEngine {
    Groq,
    Command,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Input text file (.txt or .md). Default: the first text file in the
    /// current directory.
    #[arg(long)]
    pub input: Option<String>,

    /// Model backend.
    #[arg(long, value_enum, default_value_t = ModelEngine::Groq)]
    pub engine: ModelEngine,

    /// Program run per prompt when --engine=command (prompt on stdin,
    /// response on stdout).
    #[arg(long)]
    pub command: Option<String>,

    /// Arguments passed to --command (after `--`).
    #[arg(last = true)]
    pub command_args: Vec<String>,

    /// Model name (default: ARTICLE2HTML_MODEL or llama3-70b-8192).
    #[arg(long)]
    pub model: Option<String>,

    /// API base URL (default: ARTICLE2HTML_BASE_URL or Groq's endpoint).
    #[arg(long)]
    pub base_url: Option<String>,

    /// Maximum chunks processed concurrently.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Maximum model attempts per chunk.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: usize,

    /// Base delay for exponential backoff, in seconds.
    #[arg(long, default_value_t = 5.0)]
    pub base_delay_secs: f64,

    /// Per-chunk token ceiling (estimated at four characters per token).
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_TOKENS)]
    pub max_chunk_tokens: usize,

    /// Response cache directory (wiped at startup).
    #[arg(long)]
    pub cache_dir: Option<String>,
}

#[derive(Debug, Args)]
pub struct ChunksArgs {
    /// Input text file (.txt or .md).
    #[arg(long)]
    pub input: String,

    /// Per-chunk token ceiling.
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_TOKENS)]
    pub max_chunk_tokens: usize,
}
