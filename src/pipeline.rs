use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::cache::ResponseCache;
use crate::chunker::Chunker;
use crate::config::PipelineConfig;
use crate::generate::{GenerateError, Generator, Sleeper};
use crate::loader::{self, ContentLoader};
use crate::model::LanguageModel;
use crate::output;
use crate::prompt::build_chunk_prompt;

/// Loader → chunker → per-chunk cached generation → ordered merge → output.
pub struct Pipeline {
    loader: ContentLoader,
    chunker: Chunker,
    cache: Arc<ResponseCache>,
    generator: Generator,
    workers: usize,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        model: Arc<dyn LanguageModel>,
        sleeper: Arc<dyn Sleeper>,
    ) -> anyhow::Result<Self> {
        let cache = ResponseCache::open(&config.cache_dir).context("open response cache")?;

        Ok(Self {
            loader: ContentLoader::new(config.max_file_bytes),
            chunker: Chunker::new(config.max_chunk_tokens),
            cache: Arc::new(cache),
            generator: Generator::new(model, sleeper, config.retry),
            workers: config.workers.max(1),
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Converts one input file and returns the path of the written HTML.
    /// Nothing is written unless every chunk succeeds.
    pub async fn process_file(&self, input: &Path) -> anyhow::Result<PathBuf> {
        let result = self.process_file_inner(input).await;
        if let Err(err) = &result {
            tracing::error!(path = %input.display(), error = %format!("{err:#}"), "processing failed");
        }
        result
    }

    async fn process_file_inner(&self, input: &Path) -> anyhow::Result<PathBuf> {
        loader::validate_input_path(input)?;
        let document = self
            .loader
            .load(input)
            .with_context(|| format!("load input: {}", input.display()))?;

        tracing::info!(
            path = %input.display(),
            encoding = %document.encoding,
            bytes = document.byte_len,
            "processing file"
        );

        let chunks = self.chunker.split(&document.text);
        drop(document);

        let fragments = self
            .render_chunks(chunks)
            .await
            .with_context(|| format!("generate html for {}", input.display()))?;

        let html = fragments.join("\n");
        let out = output::write(&html, Some(input)).context("write output")?;
        Ok(out)
    }

    /// Renders every chunk with at most `workers` in flight. Results are
    /// slotted by chunk index, so the output order is the input order.
    pub async fn render_chunks(&self, chunks: Vec<String>) -> anyhow::Result<Vec<String>> {
        let total_chunks = chunks.len();
        let concurrency = self.workers.min(total_chunks.max(1));
        tracing::info!(chunks = total_chunks, concurrency, "rendering chunks");

        let mut join_set = tokio::task::JoinSet::new();
        let mut pending = chunks.into_iter().enumerate();
        let mut results: Vec<Option<String>> = vec![None; total_chunks];
        let mut done_chunks = 0usize;
        let started_at = std::time::Instant::now();
        let mut last_progress_log_at = started_at;

        loop {
            while join_set.len() < concurrency {
                let Some((chunk_index, chunk)) = pending.next() else {
                    break;
                };
                let cache = Arc::clone(&self.cache);
                let generator = self.generator.clone();

                join_set.spawn(async move {
                    tracing::debug!(chunk_index, "render chunk");
                    let outcome =
                        render_chunk(cache, &generator, &chunk, chunk_index, total_chunks).await;
                    (chunk_index, outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (chunk_index, outcome) = joined.context("join chunk task")?;

            match outcome {
                Ok(html) => results[chunk_index] = Some(html),
                Err(err) => {
                    tracing::error!(
                        chunk_index,
                        total = total_chunks,
                        kind = err.kind(),
                        error = %err,
                        "chunk failed; aborting document"
                    );
                    join_set.abort_all();
                    return Err(anyhow::Error::new(err).context(format!(
                        "chunk {}/{}",
                        chunk_index + 1,
                        total_chunks
                    )));
                }
            }

            done_chunks += 1;
            if done_chunks == total_chunks
                || last_progress_log_at.elapsed() >= Duration::from_secs(2)
            {
                tracing::info!(
                    done = done_chunks,
                    total = total_chunks,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "rendering progress"
                );
                last_progress_log_at = std::time::Instant::now();
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(idx, item)| item.ok_or_else(|| anyhow::anyhow!("missing result for chunk {idx}")))
            .collect()
    }
}

async fn render_chunk(
    cache: Arc<ResponseCache>,
    generator: &Generator,
    chunk: &str,
    chunk_index: usize,
    total_chunks: usize,
) -> Result<String, GenerateError> {
    let prompt = build_chunk_prompt(chunk, chunk_index, total_chunks);

    // Cache records are plain files; keep their IO off the runtime workers.
    let lookup = {
        let cache = Arc::clone(&cache);
        let prompt = prompt.clone();
        tokio::task::spawn_blocking(move || cache.get(&prompt)).await
    };
    match lookup {
        Ok(Some(cached)) => {
            tracing::info!(
                chunk = chunk_index + 1,
                total = total_chunks,
                "using cached response"
            );
            return Ok(cached);
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(chunk_index, error = %err, "cache lookup task failed"),
    }

    let html = generator.generate(&prompt).await?;

    let stored = {
        let html = html.clone();
        tokio::task::spawn_blocking(move || cache.set(&prompt, &html)).await
    };
    if let Err(err) = stored {
        tracing::warn!(chunk_index, error = %err, "cache store task failed");
    }
    Ok(html)
}
