//! DOM chunker: turns raw HTML into clean, typed, deduplicated chunks.
//!
//! Noise subtrees (nav, ads, cookie banners, …) are pruned before any text
//! is collected, so boilerplate never leaks into chunk text or summaries.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;

use openfeeder_common::{truncate_chars, Chunk, ChunkKind, MetadataKind, ParsedPage};

use crate::metadata::extract_metadata;

/// Tags removed wholesale before chunk extraction.
const STRIP_TAGS: [&str; 9] = [
    "nav", "header", "footer", "aside", "script", "style", "ins", "iframe", "noscript",
];

/// Container tags whose own text would duplicate their children's chunks.
const CONTAINER_TAGS: [&str; 4] = ["div", "section", "article", "main"];

/// Maximum characters per chunk before sentence-boundary splitting.
const MAX_CHUNK_LEN: usize = 1500;

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(ad\b|ads\b|advert|banner|cookie|sidebar|menu|social|share|comment|popup|modal|newsletter|promo)",
        )
        .expect("valid noise regex")
    })
}

fn selector(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

fn is_stripped(el: ElementRef) -> bool {
    STRIP_TAGS.contains(&el.value().name())
}

fn is_noise(el: ElementRef) -> bool {
    let value = el.value();
    let classes = value.attr("class").unwrap_or("");
    let id = value.attr("id").unwrap_or("");
    let role = value.attr("role").unwrap_or("");
    noise_re().is_match(classes)
        || noise_re().is_match(id)
        || matches!(role, "navigation" | "banner" | "complementary")
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Concatenate descendant text nodes, skipping noise and stripped subtrees.
fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !is_stripped(child_el) && !is_noise(child_el) {
                        collect_text(child_el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn chunk_kind_for_tag(tag: &str) -> Option<ChunkKind> {
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some(ChunkKind::Heading),
        "ul" | "ol" => Some(ChunkKind::List),
        "pre" | "code" => Some(ChunkKind::Code),
        "blockquote" => Some(ChunkKind::Quote),
        "p" => Some(ChunkKind::Paragraph),
        _ => None,
    }
}

/// Walk the content tree in document order, emitting chunks for content
/// tags. List items fold into their parent list; container tags are
/// descended into but never emitted themselves.
fn walk(el: ElementRef, chunks: &mut Vec<Chunk>, seen: &mut HashSet<String>) {
    for child in el.children() {
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        if is_stripped(child_el) || is_noise(child_el) {
            continue;
        }

        let tag = child_el.value().name();
        if !CONTAINER_TAGS.contains(&tag) && tag != "li" {
            if let Some(kind) = chunk_kind_for_tag(tag) {
                let raw = element_text(child_el);
                let text = collapse_ws(&raw);
                if text.chars().count() >= 20 && !seen.contains(&text) {
                    // Code keeps its original whitespace.
                    let final_text = if kind == ChunkKind::Code {
                        raw.trim().to_string()
                    } else {
                        text.clone()
                    };
                    if !final_text.is_empty() {
                        seen.insert(text);
                        chunks.extend(split_long_text(&final_text, kind, MAX_CHUNK_LEN));
                    }
                }
            }
        }

        walk(child_el, chunks, seen);
    }
}

/// Split over-long text at sentence boundaries, greedily packing sentences
/// until the next one would exceed `max_len`.
fn split_long_text(text: &str, kind: ChunkKind, max_len: usize) -> Vec<Chunk> {
    if text.chars().count() <= max_len {
        return vec![Chunk::new(text, kind)];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in split_sentences(text) {
        if !current.is_empty()
            && current.chars().count() + sentence.chars().count() + 1 > max_len
        {
            chunks.push(Chunk::new(current.trim(), kind));
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    if !current.trim().is_empty() {
        chunks.push(Chunk::new(current.trim(), kind));
    }
    chunks
}

/// Sentence boundaries: `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?')
            && chars.get(i + 1).is_some_and(|c| c.is_whitespace())
        {
            out.push(chars[start..=i].iter().collect());
            i += 1;
            while chars.get(i).is_some_and(|c| c.is_whitespace()) {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    if start < chars.len() {
        out.push(chars[start..].iter().collect());
    }
    out
}

fn extract_language(doc: &Html) -> String {
    let html_sel = selector("html");
    let lang = doc
        .select(&html_sel)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .unwrap_or("en");
    // Keep at most two subtags: zh-Hans-CN → zh-Hans.
    lang.split('-').take(2).collect::<Vec<_>>().join("-")
}

fn json_string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Prepend an ingredients chunk and an enumerated instructions chunk for
/// recipe pages; `## section` markers pass through unnumbered.
fn augment_recipe(chunks: &mut Vec<Chunk>, extra: &serde_json::Map<String, Value>) {
    let mut inserted = 0;

    let ingredients = json_string_array(extra.get("ingredients"));
    if !ingredients.is_empty() {
        let mut text = String::from("Ingredients:");
        for item in &ingredients {
            text.push_str("\n- ");
            text.push_str(item);
        }
        chunks.insert(0, Chunk::new(text, ChunkKind::Ingredients));
        inserted += 1;
    }

    let instructions = json_string_array(extra.get("instructions"));
    if !instructions.is_empty() {
        let mut text = String::from("Instructions:");
        let mut step = 0;
        for line in &instructions {
            text.push('\n');
            if line.starts_with("## ") {
                text.push_str(line);
            } else {
                step += 1;
                text.push_str(&format!("{step}. {line}"));
            }
        }
        chunks.insert(inserted.min(chunks.len()), Chunk::new(text, ChunkKind::Instructions));
    }
}

/// Parse HTML into a [`ParsedPage`]: typed metadata, clean chunks in
/// document order, and a short summary.
pub fn chunk_html(url: &str, html: &str) -> ParsedPage {
    let metadata = extract_metadata(html, url);
    let doc = Html::parse_document(html);

    let language = extract_language(&doc);

    let main_sel = selector("main");
    let article_sel = selector("article");
    let body_sel = selector("body");
    let content_root = doc
        .select(&main_sel)
        .next()
        .or_else(|| doc.select(&article_sel).next())
        .or_else(|| doc.select(&body_sel).next())
        .unwrap_or_else(|| doc.root_element());

    let mut chunks = Vec::new();
    let mut seen = HashSet::new();
    if !is_stripped(content_root) && !is_noise(content_root) {
        walk(content_root, &mut chunks, &mut seen);
    }

    if metadata.kind == MetadataKind::Recipe {
        augment_recipe(&mut chunks, &metadata.extra);
    }

    // Summary: leading paragraphs up to ~300 chars, capped at 500.
    let mut summary_parts: Vec<&str> = Vec::new();
    let mut summary_len = 0;
    for chunk in &chunks {
        if chunk.kind == ChunkKind::Paragraph {
            summary_parts.push(&chunk.text);
            summary_len += chunk.text.chars().count() + 1;
            if summary_len > 300 {
                break;
            }
        }
    }
    let summary = if summary_parts.is_empty() {
        metadata
            .description
            .clone()
            .or_else(|| metadata.title.clone())
            .unwrap_or_default()
    } else {
        truncate_chars(&summary_parts.join(" "), 500)
    };

    let title = metadata.title.clone().unwrap_or_default();

    ParsedPage {
        url: url.to_string(),
        title,
        author: metadata.author.clone(),
        published: metadata.published.clone(),
        updated: Some(Utc::now().to_rfc3339()),
        language,
        summary,
        metadata,
        chunks,
    }
}
