//! Plain-text chunker variant.
//!
//! Operates on HTML as text: strips tags, decodes a fixed entity set,
//! splits on blank-line boundaries and greedily packs paragraphs up to
//! 500 words per chunk. Chunk ids are `<md5(url)>_<index>`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const WORDS_PER_CHUNK: usize = 500;

/// A chunk produced by the plain-text splitter.
#[derive(Debug, Clone, Serialize)]
pub struct TextChunk {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub relevance: Option<f64>,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("valid space regex"))
}

fn blank_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"))
}

fn para_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{2,}").expect("valid paragraph regex"))
}

fn list_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+[.)]\s|[-*+]\s)").expect("valid list regex"))
}

/// Strip HTML tags, decode common entities, and normalise whitespace while
/// preserving paragraph breaks.
pub fn clean_html(html: &str) -> String {
    let text = tag_re().replace_all(html, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&nbsp;", " ");
    let text = space_re().replace_all(&text, " ");
    let text = blank_re().replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn detect_kind(text: &str) -> &'static str {
    let lines: Vec<&str> = text.trim().lines().collect();

    if lines.len() == 1 && count_words(text) < 15 {
        return "heading";
    }

    let list_lines = lines
        .iter()
        .filter(|line| list_line_re().is_match(line.trim()))
        .count();
    if !lines.is_empty() && list_lines * 2 >= lines.len() {
        return "list";
    }

    "paragraph"
}

/// Clean HTML content and split into chunks with deterministic ids.
pub fn chunk_text(html: &str, url: &str) -> Vec<TextChunk> {
    let text = clean_html(html);
    if text.is_empty() {
        return Vec::new();
    }

    let paragraphs: Vec<&str> = para_re()
        .split(&text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.is_empty() {
        return Vec::new();
    }

    let mut chunk_texts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;

    for para in paragraphs {
        let para_words = count_words(para);
        if current_words > 0 && current_words + para_words > WORDS_PER_CHUNK {
            chunk_texts.push(current);
            current = para.to_string();
            current_words = para_words;
        } else {
            if current.is_empty() {
                current = para.to_string();
            } else {
                current.push_str("\n\n");
                current.push_str(para);
            }
            current_words += para_words;
        }
    }
    if !current.is_empty() {
        chunk_texts.push(current);
    }

    let id_prefix = format!("{:x}", md5::compute(url.as_bytes()));

    chunk_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextChunk {
            id: format!("{id_prefix}_{i}"),
            kind: detect_kind(&text),
            text,
            relevance: None,
        })
        .collect()
}

/// First ~`words` words of the cleaned content, ellipsised when truncated.
pub fn summarise(html: &str, words: usize) -> String {
    let text = clean_html(html);
    let word_list: Vec<&str> = text.split_whitespace().collect();
    if word_list.len() <= words {
        return text;
    }
    format!("{}...", word_list[..words].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_html_strips_tags_and_decodes_entities() {
        let html = "<p>Fish &amp; chips &lt;fresh&gt;</p>";
        assert_eq!(clean_html(html), "Fish & chips <fresh>");
    }

    #[test]
    fn clean_html_preserves_paragraph_breaks() {
        let html = "First paragraph\n\n\n\n\nSecond paragraph";
        assert_eq!(clean_html(html), "First paragraph\n\nSecond paragraph");
    }

    #[test]
    fn chunk_ids_use_md5_prefix() {
        let chunks = chunk_text("<p>Some reasonable content</p>", "https://example.com/post");
        let prefix = format!("{:x}", md5::compute(b"https://example.com/post"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, format!("{prefix}_0"));
    }

    #[test]
    fn packs_paragraphs_up_to_word_limit() {
        // 300-word paragraphs: two fit in a 500-word chunk boundary check,
        // so each lands in its own chunk.
        let para = "word ".repeat(300);
        let html = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_text(&html, "https://example.com/long");
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(count_words(&chunk.text) <= 500);
        }
    }

    #[test]
    fn small_paragraphs_share_a_chunk() {
        let html = "short one\n\nshort two\n\nshort three";
        let chunks = chunk_text(html, "https://example.com/short");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("short one"));
        assert!(chunks[0].text.contains("short three"));
    }

    #[test]
    fn detects_headings_and_lists() {
        assert_eq!(detect_kind("A Short Title"), "heading");
        assert_eq!(detect_kind("- apples\n- pears\n- plums"), "list");
        assert_eq!(detect_kind("1. first\n2. second"), "list");
        assert_eq!(
            detect_kind("This is a regular paragraph of text.\nIt spans two lines."),
            "paragraph"
        );
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", "https://example.com/empty").is_empty());
        assert!(chunk_text("<div></div>", "https://example.com/empty").is_empty());
    }

    #[test]
    fn summarise_truncates_with_ellipsis() {
        let html = "<p>one two three four five six seven eight nine ten</p>";
        assert_eq!(summarise(html, 3), "one two three...");
        assert_eq!(summarise(html, 40), "one two three four five six seven eight nine ten");
    }
}
