//! Offline synthesis of well-shaped results.
//!
//! Everything here is pure: the same request always yields the same output,
//! with no clock, randomness or I/O involved. These functions are the last
//! stop of the generation pipeline and cannot fail.

use html_escape::encode_text;
use serde_json::{Value, json};

use crate::models::{
    ChapterDraftRequest, ChapterOutline, ContentSource, GenerationRequest, OutlineResult,
    SeoMetadata,
};
use crate::utils::slugify;

pub const MIN_CHAPTER_COUNT: usize = 1;
pub const MAX_CHAPTER_COUNT: usize = 20;
pub const DEFAULT_CHAPTER_COUNT: usize = 6;

pub const SEO_TITLE_MAX_LEN: usize = 60;
pub const META_DESCRIPTION_MAX_LEN: usize = 160;

/// `{title}` and `{focus}` are substituted per chapter.
pub const TAKEAWAY_TEMPLATES: [&str; 3] = [
    "Understand the core ideas behind {focus}",
    "Apply {title} concepts to practical scenarios",
    "Identify next steps for deeper study of {focus}",
];

/// `{title}` and `{number}` are substituted per chapter.
pub const RESOURCE_TEMPLATES: [&str; 2] = [
    "Further reading on {title}",
    "Practice exercises for chapter {number}",
];

/// Effective chapter count for synthesis: default when absent, clamped otherwise.
pub fn clamp_chapter_count(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_CHAPTER_COUNT,
        Some(count) => count.clamp(MIN_CHAPTER_COUNT as i64, MAX_CHAPTER_COUNT as i64) as usize,
    }
}

pub fn fallback_chapter_title(request: &GenerationRequest, number: usize) -> String {
    format!("Chapter {}: {} Essentials", number, request.title())
}

pub fn fallback_outline(request: &GenerationRequest) -> OutlineResult {
    let count = clamp_chapter_count(request.chapter_count);
    let chapters = (1..=count)
        .map(|number| fallback_chapter(request, number, None, None))
        .collect();

    OutlineResult {
        chapters,
        source: ContentSource::Fallback,
    }
}

pub fn fallback_draft(request: &GenerationRequest) -> OutlineResult {
    let mut outline = fallback_outline(request);
    for chapter in &mut outline.chapters {
        chapter.content = Some(render_chapter_html(chapter));
    }
    outline
}

pub fn fallback_chapter_draft(request: &ChapterDraftRequest) -> ChapterOutline {
    let mut chapter = fallback_chapter(
        &request.ebook,
        request.number(),
        request.title(),
        request.summary(),
    );
    chapter.content = Some(render_chapter_html(&chapter));
    chapter
}

pub fn fallback_seo(request: &GenerationRequest) -> SeoMetadata {
    let title = request.title();
    let slug = slugify(title);
    let canonical_path = canonical_path(&slug);

    let seo_title = truncate_chars(title, SEO_TITLE_MAX_LEN);
    let mut description = format!("Explore {}", title);
    if let Some(audience) = request.audience() {
        description.push_str(&format!(" for {}", audience));
    }
    description.push_str(&format!(
        ": a practical, chapter-by-chapter guide to {}.",
        request.focus_or_title()
    ));
    let meta_description = truncate_chars(&description, META_DESCRIPTION_MAX_LEN);
    let keywords = default_keywords(request);

    SeoMetadata {
        schema_org_payload: book_schema(title, &meta_description, &keywords, &canonical_path),
        og_title: seo_title.clone(),
        og_description: meta_description.clone(),
        twitter_title: seo_title.clone(),
        twitter_description: meta_description.clone(),
        seo_title,
        meta_description,
        keywords,
        slug,
        canonical_path,
        source: ContentSource::Fallback,
    }
}

/// Tags when any are given, otherwise the title and focus.
pub fn default_keywords(request: &GenerationRequest) -> Vec<String> {
    let tags = request.tags();
    if tags.is_empty() {
        dedup_keywords(vec![
            request.title().to_string(),
            request.focus_or_title().to_string(),
        ])
    } else {
        dedup_keywords(tags)
    }
}

/// Drops repeated keywords, keeping the first occurrence.
pub fn dedup_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        if !unique.contains(&keyword) {
            unique.push(keyword);
        }
    }
    unique
}

pub fn canonical_path(slug: &str) -> String {
    format!("/ebooks/{}", slug)
}

pub fn book_schema(title: &str, description: &str, keywords: &[String], path: &str) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "Book",
        "name": title,
        "description": description,
        "keywords": keywords.join(", "),
        "url": path
    })
}

/// Escaped HTML body built from a chapter's summary and takeaways.
pub fn render_chapter_html(chapter: &ChapterOutline) -> String {
    let mut html = format!(
        "<h2>{}</h2>\n<p>{}</p>\n",
        encode_text(&chapter.title),
        encode_text(&chapter.summary)
    );
    if !chapter.key_takeaways.is_empty() {
        html.push_str("<h3>Key takeaways</h3>\n<ul>\n");
        for takeaway in &chapter.key_takeaways {
            html.push_str(&format!("<li>{}</li>\n", encode_text(takeaway)));
        }
        html.push_str("</ul>\n");
    }
    if !chapter.resources.is_empty() {
        html.push_str("<h3>Resources</h3>\n<ul>\n");
        for resource in &chapter.resources {
            html.push_str(&format!("<li>{}</li>\n", encode_text(resource)));
        }
        html.push_str("</ul>\n");
    }
    html
}

fn fallback_chapter(
    request: &GenerationRequest,
    number: usize,
    title: Option<&str>,
    summary: Option<&str>,
) -> ChapterOutline {
    let ebook_title = request.title();
    let focus = request.focus_or_title();

    let summary = match summary {
        Some(summary) => summary.to_string(),
        None => {
            let mut text = format!(
                "Chapter {} of {} explores {} step by step",
                number, ebook_title, focus
            );
            if let Some(audience) = request.audience() {
                text.push_str(&format!(" for {}", audience));
            }
            text.push('.');
            text
        }
    };

    let fill = |template: &str| {
        template
            .replace("{title}", ebook_title)
            .replace("{focus}", focus)
            .replace("{number}", &number.to_string())
    };

    ChapterOutline {
        title: title
            .map(str::to_string)
            .unwrap_or_else(|| fallback_chapter_title(request, number)),
        summary,
        key_takeaways: TAKEAWAY_TEMPLATES.iter().map(|t| fill(*t)).collect(),
        resources: RESOURCE_TEMPLATES.iter().map(|t| fill(*t)).collect(),
        content: None,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
