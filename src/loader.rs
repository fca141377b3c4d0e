use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub const MIN_CONTENT_CHARS: usize = 50;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

const UNSAFE_MARKERS: &[&str] = &["<script", "javascript:", "data:"];
const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "md"];

// The WHATWG decoder maps these to C1 controls; the Windows code page leaves
// them unassigned.
const WINDOWS_1250_UNDEFINED: [u8; 5] = [0x81, 0x83, 0x88, 0x90, 0x98];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1250,
    Iso8859_2,
    Ascii,
}

impl SourceEncoding {
    /// Candidates tried in order when decoding a source file.
    pub const CANDIDATES: [SourceEncoding; 4] = [
        SourceEncoding::Utf8,
        SourceEncoding::Windows1250,
        SourceEncoding::Iso8859_2,
        SourceEncoding::Ascii,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Windows1250 => "windows-1250",
            Self::Iso8859_2 => "iso-8859-2",
            Self::Ascii => "ascii",
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|err| err.to_string()),
            Self::Windows1250 => {
                if let Some(offset) = bytes
                    .iter()
                    .position(|b| WINDOWS_1250_UNDEFINED.contains(b))
                {
                    return Err(format!(
                        "byte 0x{:02x} at offset {offset} is undefined in windows-1250",
                        bytes[offset]
                    ));
                }
                decode_legacy(encoding_rs::WINDOWS_1250, bytes)
            }
            Self::Iso8859_2 => decode_legacy(encoding_rs::ISO_8859_2, bytes),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(format!(
                    "byte 0x{:02x} at offset {offset} is not ascii",
                    bytes[offset]
                )),
                None => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            },
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn decode_legacy(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Result<String, String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| format!("malformed {} sequence", encoding.name()))
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("input path is not a file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("unsupported input extension (expected .txt or .md): {}", .0.display())]
    UnsupportedExtension(PathBuf),
    #[error("input file is empty: {}", .0.display())]
    Empty(PathBuf),
    #[error("input file is too large: {} ({size} bytes, max {max} bytes)", .path.display())]
    TooLarge { path: PathBuf, size: u64, max: u64 },
    #[error("could not decode {}: {attempts}", .path.display())]
    DecodeFailure {
        path: PathBuf,
        attempts: DecodeAttempts,
    },
    #[error("input content is too short: {chars} characters (min {min})")]
    TooShort { chars: usize, min: usize },
    #[error("input contains unsafe content: {marker:?}")]
    UnsafeContent { marker: &'static str },
    #[error("read input file: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DecodeAttempts(pub Vec<(SourceEncoding, String)>);

impl fmt::Display for DecodeAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self
            .0
            .iter()
            .map(|(encoding, _)| encoding.label())
            .collect::<Vec<_>>()
            .join(", ");
        let errors = self
            .0
            .iter()
            .map(|(encoding, err)| format!("{encoding}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "tried [{labels}]: {errors}")
    }
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub text: String,
    pub encoding: SourceEncoding,
    pub byte_len: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ContentLoader {
    max_bytes: u64,
}

impl Default for ContentLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl ContentLoader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn load(&self, path: &Path) -> Result<SourceDocument, LoadError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(path.to_owned()));
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        if !metadata.is_file() {
            return Err(LoadError::NotAFile(path.to_owned()));
        }

        let byte_len = metadata.len();
        if byte_len == 0 {
            return Err(LoadError::Empty(path.to_owned()));
        }
        if byte_len > self.max_bytes {
            return Err(LoadError::TooLarge {
                path: path.to_owned(),
                size: byte_len,
                max: self.max_bytes,
            });
        }

        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;

        let (text, encoding) = decode_with_fallback(path, &bytes)?;
        let text = normalize_newlines(&text).trim().to_owned();

        let chars = text.chars().count();
        if chars < MIN_CONTENT_CHARS {
            return Err(LoadError::TooShort {
                chars,
                min: MIN_CONTENT_CHARS,
            });
        }

        if let Some(marker) = find_unsafe_marker(&text) {
            return Err(LoadError::UnsafeContent { marker });
        }

        tracing::debug!(
            path = %path.display(),
            encoding = %encoding,
            bytes = byte_len,
            chars,
            "loaded source document"
        );

        Ok(SourceDocument {
            text,
            encoding,
            byte_len,
        })
    }
}

fn decode_with_fallback(path: &Path, bytes: &[u8]) -> Result<(String, SourceEncoding), LoadError> {
    let mut attempts = DecodeAttempts::default();
    for encoding in SourceEncoding::CANDIDATES {
        match encoding.decode(bytes) {
            Ok(text) => return Ok((text, encoding)),
            Err(err) => attempts.0.push((encoding, err)),
        }
    }
    Err(LoadError::DecodeFailure {
        path: path.to_owned(),
        attempts,
    })
}

/// Folds CRLF and lone CR line endings into LF.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn find_unsafe_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    UNSAFE_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered.contains(marker))
}

/// Checks that `path` names an existing regular file with a supported
/// extension, before any content is read.
pub fn validate_input_path(path: &Path) -> Result<(), LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_owned()));
    }
    if !path.is_file() {
        return Err(LoadError::NotAFile(path.to_owned()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext) => Ok(()),
        _ => Err(LoadError::UnsupportedExtension(path.to_owned())),
    }
}

/// Picks the first text-like file in `dir` (sorted by name), skipping
/// dotfiles and checklists.
pub fn discover_input(dir: &Path) -> anyhow::Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read input dir: {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || name.to_lowercase().contains("checklist") {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if extension
            .as_deref()
            .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext))
        {
            candidates.push(path);
        }
    }

    candidates.sort();
    tracing::info!(candidates = ?candidates, "discovered text files");

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no .txt/.md input found in {}", dir.display()))
}
