use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::chunker::{Chunker, estimate_tokens};
use crate::cli::{ChunksArgs, GenerateArgs, ModelEngine};
use crate::config::{Config, PipelineConfig, default_cache_dir};
use crate::generate::{DEFAULT_MAX_JITTER, RetryPolicy, TokioSleeper};
use crate::groq::GroqClient;
use crate::loader::{self, ContentLoader};
use crate::model::{CommandModel, LanguageModel};
use crate::pipeline::Pipeline;

pub async fn generate(args: GenerateArgs) -> anyhow::Result<PathBuf> {
    let config = Config::from_env().context("load configuration")?;

    let input = match args.input.as_deref() {
        Some(input) => PathBuf::from(input),
        None => {
            let cwd = std::env::current_dir().context("resolve current directory")?;
            loader::discover_input(&cwd).context("find input file")?
        }
    };
    tracing::info!(path = %input.display(), engine = ?args.engine, "selected input file");

    let model = build_model(&args, &config)?;

    if !args.base_delay_secs.is_finite() || args.base_delay_secs < 0.0 {
        anyhow::bail!("--base-delay-secs must be a non-negative number");
    }
    let pipeline_config = PipelineConfig {
        workers: args.workers,
        max_chunk_tokens: args.max_chunk_tokens,
        max_file_bytes: config.max_file_bytes,
        retry: RetryPolicy {
            max_retries: args.max_retries,
            base_delay: Duration::from_secs_f64(args.base_delay_secs),
            max_jitter: DEFAULT_MAX_JITTER,
        },
        cache_dir: args
            .cache_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir),
    };

    let pipeline = Pipeline::new(&pipeline_config, model, Arc::new(TokioSleeper))?;
    let out = pipeline.process_file(&input).await?;

    println!("{}", out.display());
    Ok(out)
}

fn build_model(args: &GenerateArgs, config: &Config) -> anyhow::Result<Arc<dyn LanguageModel>> {
    match args.engine {
        ModelEngine::Groq => {
            let api_key = config.require_api_key()?.to_owned();
            let base_url = args.base_url.as_deref().unwrap_or(&config.base_url);
            let model = args.model.clone().unwrap_or_else(|| config.model.clone());
            tracing::info!(engine = "groq", model = %model, "model backend");
            Ok(Arc::new(GroqClient::new(base_url, api_key, model)?))
        }
        ModelEngine::Command => {
            let Some(program) = args.command.as_deref() else {
                anyhow::bail!("missing --command (required when --engine=command)");
            };
            tracing::info!(engine = "command", command = program, "model backend");
            Ok(Arc::new(CommandModel::new(
                program,
                args.command_args.clone(),
            )))
        }
    }
}

#[derive(Debug, Serialize)]
struct ChunkSummary {
    index: usize,
    chars: usize,
    estimated_tokens: u64,
}

pub fn chunks(args: ChunksArgs) -> anyhow::Result<()> {
    let config = Config::from_env().context("load configuration")?;
    let input = PathBuf::from(&args.input);

    loader::validate_input_path(&input)?;
    let document = ContentLoader::new(config.max_file_bytes)
        .load(&input)
        .with_context(|| format!("load input: {}", input.display()))?;
    let chunks = Chunker::new(args.max_chunk_tokens).split(&document.text);

    let mut out = std::io::stdout().lock();
    for (index, chunk) in chunks.iter().enumerate() {
        let summary = ChunkSummary {
            index,
            chars: chunk.chars().count(),
            estimated_tokens: estimate_tokens(chunk).ceil() as u64,
        };
        serde_json::to_writer(&mut out, &summary).context("serialize chunk summary")?;
        out.write_all(b"\n").context("write chunk summary newline")?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}
