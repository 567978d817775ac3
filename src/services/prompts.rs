//! Prompt text for each generation variant.
//!
//! Every builder is a pure function of its request. Absent optional fields are
//! left out entirely rather than rendered as placeholders.

use crate::models::{ChapterDraftRequest, GenerationRequest};
use crate::services::fallback::DEFAULT_CHAPTER_COUNT;
use crate::services::llm::CompletionRequest;

/// The four things we ask the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Outline,
    Draft,
    ChapterDraft,
    Seo,
}

impl PromptVariant {
    /// Sampling temperature; low to keep the model on the JSON shape.
    pub fn temperature(self) -> f32 {
        match self {
            PromptVariant::Outline => 0.5,
            PromptVariant::Draft | PromptVariant::ChapterDraft => 0.6,
            PromptVariant::Seo => 0.4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PromptVariant::Outline => "outline",
            PromptVariant::Draft => "draft",
            PromptVariant::ChapterDraft => "chapter_draft",
            PromptVariant::Seo => "seo",
        }
    }
}

const CHAPTER_SHAPE: &str = r#"{"chapters": [{"title": string, "summary": string, "keyTakeaways": [string], "resources": [string]}]}"#;

const DRAFT_CHAPTER_SHAPE: &str = r#"{"chapters": [{"title": string, "summary": string, "keyTakeaways": [string], "resources": [string], "content": string (HTML)}]}"#;

const SINGLE_CHAPTER_SHAPE: &str = r#"{"title": string, "summary": string, "keyTakeaways": [string], "resources": [string], "content": string (HTML)}"#;

const SEO_SHAPE: &str = r#"{"seoTitle": string, "metaDescription": string, "keywords": [string], "slug": string, "ogTitle": string, "ogDescription": string, "twitterTitle": string, "twitterDescription": string, "schemaOrg": object}"#;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn completion(variant: PromptVariant, prompt: String) -> CompletionRequest {
        CompletionRequest {
            prompt,
            temperature: variant.temperature(),
        }
    }

    pub fn build_outline_prompt(request: &GenerationRequest) -> String {
        format!(
            r#"You are an expert instructional designer planning an ebook.

{brief}
Create an outline with {count} chapters. Each chapter needs a concise title, a two-sentence summary, three to five key takeaways, and two or three suggested resources.

Respond with JSON only, using this shape:
{shape}"#,
            brief = Self::brief(request),
            count = Self::requested_count(request),
            shape = CHAPTER_SHAPE,
        )
    }

    pub fn build_draft_prompt(request: &GenerationRequest) -> String {
        format!(
            r#"You are an expert author writing a complete ebook.

{brief}
Write {count} chapters. For each chapter give a title, a two-sentence summary, three to five key takeaways, two or three suggested resources, and the full chapter body as HTML (use h2, h3, p, ul/li; no h1, no inline styles).

Respond with JSON only, using this shape:
{shape}"#,
            brief = Self::brief(request),
            count = Self::requested_count(request),
            shape = DRAFT_CHAPTER_SHAPE,
        )
    }

    pub fn build_chapter_prompt(request: &ChapterDraftRequest) -> String {
        let mut chapter = format!("Chapter number: {}\n", request.number());
        if let Some(title) = request.title() {
            chapter.push_str(&format!("Chapter title: {}\n", title));
        }
        if let Some(summary) = request.summary() {
            chapter.push_str(&format!("Chapter summary: {}\n", summary));
        }

        format!(
            r#"You are an expert author drafting one chapter of an ebook.

{brief}
{chapter}
Write the full chapter body as HTML (use h2, h3, p, ul/li; no h1, no inline styles), plus a two-sentence summary, three to five key takeaways, and two or three suggested resources.

Respond with JSON only, using this shape:
{shape}"#,
            brief = Self::brief(&request.ebook),
            chapter = chapter,
            shape = SINGLE_CHAPTER_SHAPE,
        )
    }

    pub fn build_seo_prompt(request: &GenerationRequest) -> String {
        let tags = request.tags();
        let tags_line = if tags.is_empty() {
            String::new()
        } else {
            format!("Existing tags: {}\n", tags.join(", "))
        };

        format!(
            r#"You are an SEO specialist preparing a landing page for an ebook.

{brief}{tags}
Produce an SEO title (at most 60 characters), a meta description (120-155 characters), 5-8 keywords, a lowercase hyphenated URL slug, Open Graph and Twitter titles and descriptions, and a schema.org Book object.

Respond with JSON only, using this shape:
{shape}"#,
            brief = Self::brief(request),
            tags = tags_line,
            shape = SEO_SHAPE,
        )
    }

    /// Count passed to the model as requested, unclamped.
    fn requested_count(request: &GenerationRequest) -> i64 {
        request.chapter_count.unwrap_or(DEFAULT_CHAPTER_COUNT as i64)
    }

    fn brief(request: &GenerationRequest) -> String {
        let mut brief = format!("Title: {}\n", request.title());
        if let Some(audience) = request.audience() {
            brief.push_str(&format!("Audience: {}\n", audience));
        }
        if let Some(tone) = request.tone() {
            brief.push_str(&format!("Tone: {}\n", tone));
        }
        if let Some(focus) = request.focus() {
            brief.push_str(&format!("Focus: {}\n", focus));
        }
        brief
    }
}
