pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 6000;

const TOKENS_PER_CHAR: f64 = 0.25;
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Rough token estimate (about four characters per token), applied
/// uniformly regardless of script.
pub fn estimate_tokens(text: &str) -> f64 {
    text.chars().count() as f64 * TOKENS_PER_CHAR
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_tokens: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_TOKENS)
    }
}

impl Chunker {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Splits `content` on blank-line paragraph boundaries, greedily packing
    /// paragraphs into chunks that stay under the token ceiling. A single
    /// paragraph over the ceiling becomes its own chunk.
    pub fn split(&self, content: &str) -> Vec<String> {
        let ceiling = self.max_tokens as f64;
        if estimate_tokens(content) <= ceiling {
            return vec![content.to_owned()];
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0.0;

        for paragraph in content.split(PARAGRAPH_SEPARATOR) {
            let paragraph_tokens = estimate_tokens(paragraph);

            if current_tokens + paragraph_tokens > ceiling && !current.is_empty() {
                chunks.push(current.join(PARAGRAPH_SEPARATOR));
                current.clear();
                current_tokens = 0.0;
            }

            current.push(paragraph);
            current_tokens += paragraph_tokens;
        }

        if !current.is_empty() {
            chunks.push(current.join(PARAGRAPH_SEPARATOR));
        }

        tracing::info!(chunks = chunks.len(), max_tokens = self.max_tokens, "split content");
        chunks
    }
}
