use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use lol_html::html_content::EndTag;
use lol_html::{HtmlRewriter, Settings, element};

pub const REQUIRED_TAGS: [&str; 3] = ["article", "h1", "p"];

/// Markers removed from generated HTML. Plain substring removal, not
/// tag-aware: this is a best-effort mitigation, not a sanitizer.
pub const UNSAFE_PATTERNS: [&str; 9] = [
    "<script",
    "javascript:",
    "data:",
    "onclick=",
    "onload=",
    "onerror=",
    "onmouseover=",
    "onmouseout=",
    "onsubmit=",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required tags: {}", .0.join(", "))]
    MissingRequiredTags(Vec<String>),
    #[error("unbalanced html; unclosed tags: {}", .0.join(", "))]
    Unbalanced(Vec<String>),
    #[error("invalid <img>: {0}")]
    InvalidImage(String),
    #[error("could not parse html: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub balanced: bool,
    pub unclosed: Vec<String>,
    pub missing_required: Vec<String>,
}

impl ValidationReport {
    pub fn has_required_tags(&self) -> bool {
        self.missing_required.is_empty()
    }
}

#[derive(Debug, Default)]
struct ScanState {
    next_id: usize,
    open: Vec<(usize, String)>,
    seen: BTreeSet<String>,
    invalid_image: Option<String>,
}

/// Streams `html` through `lol_html`, tracking which elements were opened
/// and which of them saw their own end tag. Stray end tags fire no handler
/// and are ignored; void and self-closing elements never count as open.
pub fn inspect(html: &str) -> Result<ValidationReport, ValidationError> {
    let state = Rc::new(RefCell::new(ScanState::default()));
    let handler_state = Rc::clone(&state);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", move |el| {
                let name = el.tag_name();
                let mut scan = handler_state.borrow_mut();
                scan.seen.insert(name.clone());

                if name == "img" && scan.invalid_image.is_none() {
                    scan.invalid_image =
                        check_img_attrs(el.get_attribute("src"), el.get_attribute("alt")).err();
                }

                if el.is_self_closing() {
                    return Ok(());
                }
                let Some(handlers) = el.end_tag_handlers() else {
                    return Ok(());
                };

                let id = scan.next_id;
                scan.next_id += 1;
                scan.open.push((id, name.clone()));

                // Only the element's own end tag closes it.
                let end_state = Rc::clone(&handler_state);
                handlers.push(Box::new(move |end: &mut EndTag<'_>| {
                    if end.name() == name {
                        end_state.borrow_mut().open.retain(|(open_id, _)| *open_id != id);
                    }
                    Ok(())
                }) as _);
                Ok(())
            })],
            strict: false,
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|err| ValidationError::Parse(err.to_string()))?;
    rewriter
        .end()
        .map_err(|err| ValidationError::Parse(err.to_string()))?;

    let scan = state.borrow();
    if let Some(reason) = &scan.invalid_image {
        return Err(ValidationError::InvalidImage(reason.clone()));
    }

    let missing_required = REQUIRED_TAGS
        .iter()
        .filter(|tag| !scan.seen.contains(**tag))
        .map(|tag| (*tag).to_owned())
        .collect();

    Ok(ValidationReport {
        balanced: scan.open.is_empty(),
        unclosed: scan.open.iter().map(|(_, name)| name.clone()).collect(),
        missing_required,
    })
}

fn check_img_attrs(src: Option<String>, alt: Option<String>) -> Result<(), String> {
    if src.is_none() {
        return Err("missing src attribute".to_owned());
    }
    match alt {
        None => Err("missing alt attribute".to_owned()),
        Some(alt) if alt.trim().is_empty() => Err("alt attribute is empty".to_owned()),
        Some(_) => Ok(()),
    }
}

/// Removes every case-insensitive occurrence of [`UNSAFE_PATTERNS`],
/// repeating until none is left. Returns the cleaned HTML and the patterns
/// that were removed.
pub fn strip_unsafe(html: &str) -> (String, Vec<&'static str>) {
    let mut current = html.to_owned();
    let mut removed = Vec::new();

    loop {
        let mut changed = false;
        for pattern in UNSAFE_PATTERNS {
            let lowered = current.to_ascii_lowercase();
            if !lowered.contains(pattern) {
                continue;
            }

            let mut out = String::with_capacity(current.len());
            let mut cursor = 0usize;
            for (idx, _) in lowered.match_indices(pattern) {
                out.push_str(&current[cursor..idx]);
                cursor = idx + pattern.len();
            }
            out.push_str(&current[cursor..]);
            current = out;

            changed = true;
            if !removed.contains(&pattern) {
                removed.push(pattern);
            }
        }
        if !changed {
            break;
        }
    }

    (current, removed)
}

/// Checks tag balance, required tags and `<img>` attributes, then strips
/// unsafe markers.
pub fn validate(fragment: &str) -> Result<String, ValidationError> {
    let report = inspect(fragment)?;
    if !report.has_required_tags() {
        return Err(ValidationError::MissingRequiredTags(report.missing_required));
    }
    if !report.balanced {
        return Err(ValidationError::Unbalanced(report.unclosed));
    }

    let (cleaned, removed) = strip_unsafe(fragment);
    for pattern in removed {
        tracing::warn!(pattern, "removed unsafe pattern from generated html");
    }
    Ok(cleaned)
}
