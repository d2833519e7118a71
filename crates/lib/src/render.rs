//! Message body rendering: markdown image references become embedded images,
//! everything else is escaped text.

use regex::Regex;
use std::sync::OnceLock;

/// Placeholder that replaces each image reference in copied text.
pub const IMAGE_PLACEHOLDER: &str = "[Image]";

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").expect("valid image regex"))
}

/// One piece of a rendered message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Image { alt: String, url: String },
}

/// Image sources we embed. Anything else (e.g. `javascript:`) stays literal text.
fn is_embeddable_url(url: &str) -> bool {
    let u = url.trim().to_ascii_lowercase();
    u.starts_with("http://")
        || u.starts_with("https://")
        || u.starts_with("data:image/")
        || (u.starts_with('/') && !u.starts_with("//"))
}

/// Split `text` into literal text and `![alt](url)` image segments, in order.
pub fn segments(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in image_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let url = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if !is_embeddable_url(url) {
            continue;
        }
        if whole.start() > last {
            push_text(&mut out, &text[last..whole.start()]);
        }
        out.push(Segment::Image {
            alt: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            url: url.trim().to_string(),
        });
        last = whole.end();
    }
    if last < text.len() {
        push_text(&mut out, &text[last..]);
    }
    out
}

fn push_text(out: &mut Vec<Segment>, s: &str) {
    if let Some(Segment::Text(prev)) = out.last_mut() {
        prev.push_str(s);
    } else {
        out.push(Segment::Text(s.to_string()));
    }
}

/// HTML for a message body. Text is escaped; images become `<img>` with escaped attributes.
pub fn to_html(text: &str) -> String {
    let mut html = String::new();
    for seg in segments(text) {
        match seg {
            Segment::Text(t) => html.push_str(&escape(&t)),
            Segment::Image { alt, url } => {
                html.push_str(&format!(
                    r#"<img src="{}" alt="{}" class="message-image">"#,
                    htmlescape::encode_attribute(&url),
                    htmlescape::encode_attribute(&alt)
                ));
            }
        }
    }
    html
}

/// Text for the clipboard: every image reference becomes [`IMAGE_PLACEHOLDER`].
pub fn copy_text(text: &str) -> String {
    image_regex()
        .replace_all(text, IMAGE_PLACEHOLDER)
        .into_owned()
}

/// Escape server-supplied text for insertion into markup.
pub fn escape(text: &str) -> String {
    htmlescape::encode_minimal(text)
}
