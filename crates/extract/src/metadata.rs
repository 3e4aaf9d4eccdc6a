//! Typed metadata extraction.
//!
//! Strict priority ladder: JSON-LD blocks first, OpenGraph / Twitter Card
//! tags fill whatever JSON-LD left blank, plain HTML tags fill the rest.
//! Malformed JSON-LD blocks are tolerated and skipped.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use openfeeder_common::{MetadataKind, PageMetadata};

/// JSON-LD `@type` values we prefer, most specific first.
const TYPE_PRIORITY: [&str; 6] = [
    "Recipe",
    "NewsArticle",
    "Article",
    "BlogPosting",
    "Product",
    "Event",
];

fn selector(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

/// Extract a typed metadata record from raw HTML.
pub fn extract_metadata(html: &str, url: &str) -> PageMetadata {
    let doc = Html::parse_document(html);

    let jsonld = extract_jsonld(&doc);
    let had_jsonld = jsonld.is_some();

    let mut meta = jsonld.unwrap_or_default();
    apply_opengraph(&doc, &mut meta, had_jsonld);
    apply_html_fallbacks(&doc, &mut meta);

    tracing::debug!(
        url = %url,
        kind = ?meta.kind,
        schema_type = ?meta.schema_type,
        "extracted page metadata"
    );
    meta
}

// ---------------------------------------------------------------------------
// Tier 1: JSON-LD
// ---------------------------------------------------------------------------

fn extract_jsonld(doc: &Html) -> Option<PageMetadata> {
    let script_sel = selector(r#"script[type="application/ld+json" i]"#);

    let mut candidates: Vec<Map<String, Value>> = Vec::new();
    for script in doc.select(&script_sel) {
        let raw = script.text().collect::<String>();
        let Ok(parsed) = serde_json::from_str::<Value>(&raw) else {
            tracing::debug!("skipping malformed JSON-LD block");
            continue;
        };
        collect_candidates(parsed, &mut candidates);
    }

    let (candidate, schema_type) = select_candidate(&candidates)?;
    Some(map_candidate(candidate, schema_type))
}

/// Flatten top-level arrays and `@graph` arrays into a candidate list.
fn collect_candidates(value: Value, out: &mut Vec<Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_candidates(item, out);
            }
        }
        Value::Object(obj) => {
            if let Some(Value::Array(graph)) = obj.get("@graph") {
                for item in graph.clone() {
                    collect_candidates(item, out);
                }
            } else {
                out.push(obj);
            }
        }
        _ => {}
    }
}

/// `@type` may be a string or a list of strings; match if any element matches.
fn type_matches(candidate: &Map<String, Value>, wanted: &str) -> bool {
    match candidate.get("@type") {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Array(items)) => items.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn select_candidate(
    candidates: &[Map<String, Value>],
) -> Option<(&Map<String, Value>, Option<String>)> {
    for wanted in TYPE_PRIORITY {
        if let Some(found) = candidates.iter().find(|c| type_matches(c, wanted)) {
            return Some((found, Some(wanted.to_string())));
        }
    }
    // No priority type present: take the first block and report its raw tag.
    let first = candidates.first()?;
    let schema_type = match first.get("@type") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    Some((first, schema_type))
}

fn map_candidate(data: &Map<String, Value>, schema_type: Option<String>) -> PageMetadata {
    let kind = match schema_type.as_deref() {
        Some("Recipe") => MetadataKind::Recipe,
        Some("NewsArticle") | Some("Article") | Some("BlogPosting") => MetadataKind::Article,
        Some("Product") => MetadataKind::Product,
        Some("Event") => MetadataKind::Event,
        _ => MetadataKind::Page,
    };

    let mut meta = PageMetadata::empty(kind);
    meta.schema_type = schema_type;
    meta.title = string_field(data, "headline").or_else(|| string_field(data, "name"));
    meta.description = string_field(data, "description");
    meta.author = data.get("author").and_then(normalize_author);
    meta.published = string_field(data, "datePublished");
    meta.modified = string_field(data, "dateModified");
    meta.keywords = data.get("keywords").map(normalize_keywords).unwrap_or_default();
    meta.image = data.get("image").and_then(normalize_image);

    match kind {
        MetadataKind::Recipe => map_recipe_extra(data, &mut meta.extra),
        MetadataKind::Article => {
            copy_field(data, "articleSection", &mut meta.extra);
        }
        MetadataKind::Product => map_product_extra(data, &mut meta.extra),
        MetadataKind::Event => map_event_extra(data, &mut meta.extra),
        MetadataKind::Page => {}
    }

    meta
}

fn map_recipe_extra(data: &Map<String, Value>, extra: &mut Map<String, Value>) {
    if let Some(Value::Array(ingredients)) = data.get("recipeIngredient") {
        extra.insert("ingredients".into(), Value::Array(ingredients.clone()));
    }
    if let Some(instructions) = data.get("recipeInstructions") {
        let flat = flatten_instructions(instructions);
        if !flat.is_empty() {
            extra.insert(
                "instructions".into(),
                Value::Array(flat.into_iter().map(Value::String).collect()),
            );
        }
    }
    for (source, target) in [
        ("prepTime", "prepTime"),
        ("cookTime", "cookTime"),
        ("totalTime", "totalTime"),
    ] {
        if let Some(raw) = string_field(data, source) {
            extra.insert(target.into(), Value::String(parse_iso_duration(&raw)));
        }
    }
    if let Some(Value::Object(rating)) = data.get("aggregateRating") {
        if let Some(v) = rating.get("ratingValue") {
            extra.insert("rating".into(), v.clone());
        }
        if let Some(v) = rating.get("ratingCount") {
            extra.insert("rating_count".into(), v.clone());
        }
    }
    copy_as(data, "recipeCategory", "category", extra);
    copy_as(data, "recipeYield", "yield", extra);
    copy_as(data, "recipeSubCategories", "sub_categories", extra);
}

fn map_product_extra(data: &Map<String, Value>, extra: &mut Map<String, Value>) {
    if let Some(brand) = data.get("brand") {
        let name = match brand {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        if let Some(name) = name {
            extra.insert("brand".into(), Value::String(name));
        }
    }
    let offer = match data.get("offers") {
        Some(Value::Object(o)) => Some(o),
        Some(Value::Array(items)) => items.first().and_then(Value::as_object),
        _ => None,
    };
    if let Some(offer) = offer {
        if let Some(v) = offer.get("price") {
            extra.insert("price".into(), v.clone());
        }
        if let Some(v) = offer.get("priceCurrency") {
            extra.insert("currency".into(), v.clone());
        }
        if let Some(v) = offer.get("availability") {
            extra.insert("availability".into(), v.clone());
        }
    }
    if let Some(Value::Object(rating)) = data.get("aggregateRating") {
        if let Some(v) = rating.get("ratingValue") {
            extra.insert("rating".into(), v.clone());
        }
    }
}

fn map_event_extra(data: &Map<String, Value>, extra: &mut Map<String, Value>) {
    if let Some(location) = data.get("location") {
        let name = match location {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        if let Some(name) = name {
            extra.insert("location".into(), Value::String(name));
        }
    }
    copy_field(data, "startDate", extra);
    copy_field(data, "endDate", extra);
}

/// Flatten `recipeInstructions`: plain steps become lines, `HowToSection`
/// blocks become a `## <name>` marker followed by their steps.
fn flatten_instructions(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Value::Array(items) = value else {
        if let Value::String(s) = value {
            out.push(s.clone());
        }
        return out;
    };

    for item in items {
        match item {
            Value::String(s) => out.push(s.clone()),
            Value::Object(obj) => {
                let is_section = obj.get("@type").and_then(Value::as_str) == Some("HowToSection");
                if is_section {
                    if let Some(name) = obj.get("name").and_then(Value::as_str) {
                        out.push(format!("## {name}"));
                    }
                    if let Some(Value::Array(steps)) = obj.get("itemListElement") {
                        for step in steps {
                            if let Some(text) = step_text(step) {
                                out.push(text);
                            }
                        }
                    }
                } else if let Some(text) = step_text(item) {
                    out.push(text);
                }
            }
            _ => {}
        }
    }
    out
}

fn step_text(step: &Value) -> Option<String> {
    match step {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("text")
            .or_else(|| obj.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Author may be a string, an object (`name` then `@id`), or a list.
fn normalize_author(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(obj) => obj
            .get("name")
            .or_else(|| obj.get("@id"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let names: Vec<String> = items.iter().filter_map(normalize_author).collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    }
}

/// Keywords may be a comma-separated string or a list of strings.
fn normalize_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Images may be a string, a list (keep the first), or an object with `url`.
fn normalize_image(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(normalize_image),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn copy_field(data: &Map<String, Value>, key: &str, extra: &mut Map<String, Value>) {
    copy_as(data, key, key, extra);
}

fn copy_as(data: &Map<String, Value>, source: &str, target: &str, extra: &mut Map<String, Value>) {
    if let Some(v) = data.get(source) {
        extra.insert(target.into(), v.clone());
    }
}

// ---------------------------------------------------------------------------
// Tier 2: OpenGraph / Twitter Cards
// ---------------------------------------------------------------------------

fn meta_content(doc: &Html, attr: &str, name: &str) -> Option<String> {
    let sel = selector(&format!(r#"meta[{attr}="{name}"]"#));
    doc.select(&sel)
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_contents(doc: &Html, attr: &str, name: &str) -> Vec<String> {
    let sel = selector(&format!(r#"meta[{attr}="{name}"]"#));
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Fill blanks from OpenGraph / Twitter Card tags. When no JSON-LD record
/// existed at all, the OG tags define the record outright.
fn apply_opengraph(doc: &Html, meta: &mut PageMetadata, had_jsonld: bool) {
    if meta.title.is_none() {
        meta.title = meta_content(doc, "property", "og:title")
            .or_else(|| meta_content(doc, "name", "twitter:title"));
    }
    if meta.description.is_none() {
        meta.description = meta_content(doc, "property", "og:description")
            .or_else(|| meta_content(doc, "name", "twitter:description"));
    }
    if meta.image.is_none() {
        meta.image = meta_content(doc, "property", "og:image");
    }
    if meta.author.is_none() {
        meta.author = meta_content(doc, "property", "article:author");
    }
    if meta.published.is_none() {
        meta.published = meta_content(doc, "property", "article:published_time");
    }
    if meta.modified.is_none() {
        meta.modified = meta_content(doc, "property", "article:modified_time");
    }
    if meta.keywords.is_empty() {
        meta.keywords = meta_contents(doc, "property", "article:tag");
    }
    if !had_jsonld && meta_content(doc, "property", "og:type").as_deref() == Some("article") {
        meta.kind = MetadataKind::Article;
    }
}

// ---------------------------------------------------------------------------
// Tier 3: plain HTML
// ---------------------------------------------------------------------------

fn apply_html_fallbacks(doc: &Html, meta: &mut PageMetadata) {
    if meta.title.is_none() {
        let h1_sel = selector("h1");
        let title_sel = selector("title");
        let h1 = doc
            .select(&h1_sel)
            .next()
            .map(|el| collapse_ws(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty());
        let title_tag = doc
            .select(&title_sel)
            .next()
            .map(|el| collapse_ws(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty());
        meta.title = h1.or(title_tag);
    }
    if meta.description.is_none() {
        meta.description = meta_content(doc, "name", "description");
    }
    if meta.author.is_none() {
        meta.author = meta_content(doc, "name", "author");
    }
    if meta.keywords.is_empty() {
        if let Some(raw) = meta_content(doc, "name", "keywords") {
            meta.keywords = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    if meta.published.is_none() {
        for name in ["article:published_time", "datePublished", "date"] {
            meta.published =
                meta_content(doc, "property", name).or_else(|| meta_content(doc, "name", name));
            if meta.published.is_some() {
                break;
            }
        }
    }
    if meta.published.is_none() {
        let time_sel = selector("time[datetime]");
        meta.published = doc
            .select(&time_sel)
            .find_map(|el| el.value().attr("datetime"))
            .map(str::to_string);
    }
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// ISO 8601 durations
// ---------------------------------------------------------------------------

/// Render an ISO 8601 duration (`PT1H30M`) as a human-readable composite
/// (`1h 30 min`). Empty input yields empty output; anything unparseable
/// (or all-zero) passes through unchanged.
pub fn parse_iso_duration(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("valid duration regex")
    });

    if raw.is_empty() {
        return String::new();
    }
    let Some(caps) = re.captures(raw) else {
        return raw.to_string();
    };

    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (days, hours, minutes, seconds) = (part(1), part(2), part(3), part(4));

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} min"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }

    if parts.is_empty() {
        raw.to_string()
    } else {
        parts.join(" ")
    }
}
