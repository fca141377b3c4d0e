use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub const OUTPUT_BASENAME: &str = "artykul";
pub const MAX_SUFFIX: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error(
        "no available output filename in {} after {} attempts",
        .dir.display(),
        MAX_SUFFIX + 1
    )]
    NoAvailableFilename { dir: PathBuf },
    #[error("resolve current directory")]
    CurrentDir(#[source] std::io::Error),
    #[error("create output dir: {}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write output: {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory the output lands in: next to the input file, or the current
/// directory when there is no input path.
pub fn output_dir(hint: Option<&Path>) -> Result<PathBuf, OutputError> {
    let cwd = || std::env::current_dir().map_err(OutputError::CurrentDir);

    let Some(hint) = hint else {
        return cwd();
    };
    let absolute = if hint.is_absolute() {
        hint.to_owned()
    } else {
        cwd()?.join(hint)
    };
    match absolute.parent() {
        Some(parent) => Ok(parent.to_owned()),
        None => cwd(),
    }
}

fn candidate_name(suffix: usize) -> String {
    if suffix == 0 {
        format!("{OUTPUT_BASENAME}.html")
    } else {
        format!("{OUTPUT_BASENAME}_{suffix}.html")
    }
}

/// Writes `content` to the first free `artykul[_N].html` in the output
/// directory. Existing files are never overwritten.
pub fn write(content: &str, hint: Option<&Path>) -> Result<PathBuf, OutputError> {
    let dir = output_dir(hint)?;
    std::fs::create_dir_all(&dir).map_err(|source| OutputError::CreateDir {
        dir: dir.clone(),
        source,
    })?;

    write_with(&dir, content, |file, bytes| {
        file.write_all(bytes)?;
        file.flush()
    })
}

fn write_with(
    dir: &Path,
    content: &str,
    mut fill: impl FnMut(&mut File, &[u8]) -> std::io::Result<()>,
) -> Result<PathBuf, OutputError> {
    for suffix in 0..=MAX_SUFFIX {
        let path = dir.join(candidate_name(suffix));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(OutputError::Write { path, source }),
        };

        if let Err(source) = fill(&mut file, content.as_bytes()) {
            drop(file);
            // A failed run leaves no output file behind.
            if let Err(err) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %err, "remove partial output failed");
            }
            return Err(OutputError::Write { path, source });
        }

        tracing::info!(path = %path.display(), bytes = content.len(), "wrote article");
        return Ok(path);
    }

    Err(OutputError::NoAvailableFilename {
        dir: dir.to_owned(),
    })
}
