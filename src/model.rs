use std::process::Stdio;

use anyhow::Context as _;
use tokio::io::AsyncWriteExt as _;

/// A language model: one prompt in, one response out. Failures carry a
/// human-readable message which is later classified.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Runs an external program per prompt: the prompt goes to stdin and stdout
/// is the response.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait::async_trait]
impl LanguageModel for CommandModel {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        tracing::debug!(command = %self.program, "model command");

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn model command: {}", self.program))?;

        {
            let mut stdin = child.stdin.take().context("open model command stdin")?;
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("write model command stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("wait model command")?;
        let stdout =
            String::from_utf8(output.stdout).context("model command stdout is not valid UTF-8")?;
        if !output.status.success() {
            anyhow::bail!(
                "model command failed: {} ({}): {}",
                self.program,
                output.status,
                stdout.trim()
            );
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_model_pipes_prompt_through_program() -> anyhow::Result<()> {
        let model = CommandModel::new("sh", vec!["-c".to_owned(), "tr a-z A-Z".to_owned()]);
        let out = model.complete("hello").await?;
        assert_eq!(out, "HELLO");
        Ok(())
    }

    #[tokio::test]
    async fn command_model_reports_stdout_on_failure() {
        let model = CommandModel::new(
            "sh",
            vec![
                "-c".to_owned(),
                "cat >/dev/null; echo 'Rate limit exceeded'; exit 3".to_owned(),
            ],
        );
        let err = model.complete("x").await.unwrap_err();
        assert!(format!("{err:#}").contains("Rate limit exceeded"), "{err:#}");
    }
}
