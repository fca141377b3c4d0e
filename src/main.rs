use std::path::Path;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = article2html::cli::Cli::parse();
    article2html::logging::init(cli.log_dir.as_deref().map(Path::new)).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        article2html::cli::Command::Generate(args) => {
            article2html::commands::generate(args)
                .await
                .context("generate")?;
        }
        article2html::cli::Command::Chunks(args) => {
            article2html::commands::chunks(args).context("chunks")?;
        }
    }

    Ok(())
}
