pub const ARTICLE_TEMPLATE: &str = "\
Convert the text below into semantic HTML using exactly this format:

<article>
    <h1>[title derived from the first paragraph]</h1>
    <p>[content]</p>
</article>

Rules:
1. Use exactly the format above; <h2> may be used for subheadings.
2. Do NOT add <html>, <head>, <body> or any other wrapper tags.
3. Do NOT add any text before or after the HTML, and no comments or explanations.
4. Keep the original wording; split the text into paragraphs with <p>.
5. Do NOT use class, id, inline styles or JavaScript.
6. Add illustrations at key places (after the title, next to important
   concepts, at the end of sections) using:
   <figure>
       <img src=\"image_placeholder.jpg\" alt=\"[image prompt]\" loading=\"lazy\">
       <figcaption>[short caption]</figcaption>
   </figure>
7. Every alt attribute MUST be a complete image-generation prompt describing:
   a) the subject: what exactly is shown;
   b) the scene: setting and background, lighting, perspective, notable details;
   c) the style: technique, colour palette, mood.

Text to convert:";

/// Renders the prompt for one chunk. The `Part i/n` marker makes the
/// chunk position part of the prompt, and therefore of its cache key.
pub fn build_chunk_prompt(chunk: &str, index: usize, total: usize) -> String {
    format!(
        "{ARTICLE_TEMPLATE}\n\nPart {part}/{total}:\n\n{chunk}",
        part = index + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_carries_one_based_position() {
        let prompt = build_chunk_prompt("Body text.", 0, 3);
        assert!(prompt.starts_with(ARTICLE_TEMPLATE));
        assert!(prompt.ends_with("\n\nPart 1/3:\n\nBody text."));
    }

    #[test]
    fn same_chunk_at_different_positions_differs() {
        assert_ne!(
            build_chunk_prompt("same", 0, 2),
            build_chunk_prompt("same", 1, 2)
        );
    }
}
