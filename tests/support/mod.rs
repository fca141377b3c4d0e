#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use article2html::config::PipelineConfig;
use article2html::generate::{RetryPolicy, Sleeper};
use article2html::model::LanguageModel;
use article2html::pipeline::Pipeline;

/// Replies are produced per prompt; the call counter covers every attempt.
pub struct ScriptedModel {
    reply: Box<dyn Fn(&str, usize) -> anyhow::Result<String> + Send + Sync>,
    calls: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(
        reply: impl Fn(&str, usize) -> anyhow::Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Pops one canned reply per call; panics when the script runs out.
    pub fn sequence(replies: Vec<anyhow::Result<String>>) -> Arc<Self> {
        let replies = Mutex::new(VecDeque::from(replies));
        Self::new(move |_, _| {
            replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted model ran out of replies")
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        self.prompts.lock().unwrap().push(prompt.to_owned());
        (self.reply)(prompt, call)
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

pub fn article(title: &str, body: &str) -> String {
    format!("<article><h1>{title}</h1><p>{body}</p></article>")
}

/// Parses the `Part i/n` marker out of a chunk prompt.
pub fn part_of(prompt: &str) -> Option<(usize, usize)> {
    let rest = &prompt[prompt.find("\n\nPart ")? + "\n\nPart ".len()..];
    let marker = rest.split(':').next()?;
    let (index, total) = marker.split_once('/')?;
    Some((index.parse().ok()?, total.parse().ok()?))
}

pub fn write_input(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write input file");
    path
}

pub fn sample_text() -> String {
    "The lighthouse keeper climbed the stairs every evening at dusk.\n\n\
     Below, the harbour settled into a quiet rhythm of ropes and gulls."
        .to_owned()
}

pub fn test_config(cache_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        workers: 3,
        cache_dir: cache_dir.to_owned(),
        retry: RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
            max_jitter: Duration::ZERO,
        },
        ..PipelineConfig::default()
    }
}

pub fn pipeline(
    config: &PipelineConfig,
    model: Arc<ScriptedModel>,
    sleeper: Arc<RecordingSleeper>,
) -> Pipeline {
    Pipeline::new(config, model, sleeper).expect("build pipeline")
}
