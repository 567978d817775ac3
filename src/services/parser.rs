//! Turns raw model text into typed results.
//!
//! Only light coercion happens here (aliases, empty defaults, derived SEO
//! fields). Anything structurally wrong becomes
//! [`GenerationError::MalformedResponse`] so the caller can fall back.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;

use crate::models::{ChapterOutline, ContentSource, GenerationRequest, OutlineResult, SeoMetadata};
use crate::services::fallback::{book_schema, canonical_path, dedup_keywords, default_keywords};
use crate::services::llm::GenerationError;
use crate::utils::slugify;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("code fence pattern compiles")
});

#[derive(Debug, Deserialize)]
struct RawOutline {
    chapters: Vec<RawChapter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChapter {
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    summary: String,
    #[serde(
        default,
        alias = "key_takeaways",
        alias = "takeaways",
        deserialize_with = "null_as_default"
    )]
    key_takeaways: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    resources: Vec<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeo {
    #[serde(alias = "seo_title")]
    seo_title: String,
    #[serde(alias = "meta_description")]
    meta_description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    keywords: Vec<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default, alias = "og_title")]
    og_title: Option<String>,
    #[serde(default, alias = "og_description")]
    og_description: Option<String>,
    #[serde(default, alias = "twitter_title")]
    twitter_title: Option<String>,
    #[serde(default, alias = "twitter_description")]
    twitter_description: Option<String>,
    #[serde(default, alias = "schemaOrgPayload", alias = "schema_org")]
    schema_org: Option<Value>,
}

/// Parses an outline response; chapters carry no content.
pub fn parse_outline(raw: &str) -> Result<OutlineResult, GenerationError> {
    let chapters = parse_chapters(raw, false)?
        .into_iter()
        .map(|mut chapter| {
            chapter.content = None;
            chapter
        })
        .collect();
    Ok(OutlineResult {
        chapters,
        source: ContentSource::Model,
    })
}

/// Parses a full draft response; every chapter must carry content.
pub fn parse_draft(raw: &str) -> Result<OutlineResult, GenerationError> {
    Ok(OutlineResult {
        chapters: parse_chapters(raw, true)?,
        source: ContentSource::Model,
    })
}

/// Parses a single drafted chapter, either bare or wrapped in `{"chapter": ...}`.
pub fn parse_chapter_draft(raw: &str) -> Result<ChapterOutline, GenerationError> {
    let mut value: Value = parse_json(raw)?;
    if value.get("chapter").is_some_and(Value::is_object) {
        value = value["chapter"].take();
    }
    let chapter: RawChapter = from_value(value)?;
    into_chapter(chapter, true)
}

/// Parses SEO metadata, filling derived fields from the request where the
/// model left them out.
pub fn parse_seo(raw: &str, request: &GenerationRequest) -> Result<SeoMetadata, GenerationError> {
    let seo: RawSeo = parse_json(raw)?;

    let seo_title = required_text(seo.seo_title, "seoTitle")?;
    let meta_description = required_text(seo.meta_description, "metaDescription")?;

    let keywords: Vec<String> = seo
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    let keywords = if keywords.is_empty() {
        default_keywords(request)
    } else {
        dedup_keywords(keywords)
    };

    let slug_source = seo
        .slug
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| request.title());
    let slug = slugify(slug_source);
    let path = canonical_path(&slug);

    let schema_org_payload = match seo.schema_org {
        Some(payload) if payload.is_object() => payload,
        _ => book_schema(request.title(), &meta_description, &keywords, &path),
    };

    Ok(SeoMetadata {
        og_title: or_default(seo.og_title, &seo_title),
        og_description: or_default(seo.og_description, &meta_description),
        twitter_title: or_default(seo.twitter_title, &seo_title),
        twitter_description: or_default(seo.twitter_description, &meta_description),
        seo_title,
        meta_description,
        keywords,
        slug,
        canonical_path: path,
        schema_org_payload,
        source: ContentSource::Model,
    })
}

/// Strips one surrounding Markdown code fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str())
        .unwrap_or(trimmed)
}

fn parse_chapters(raw: &str, require_content: bool) -> Result<Vec<ChapterOutline>, GenerationError> {
    let outline: RawOutline = parse_json(raw)?;
    if outline.chapters.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "response has no chapters".to_string(),
        ));
    }
    outline
        .chapters
        .into_iter()
        .map(|chapter| into_chapter(chapter, require_content))
        .collect()
}

fn into_chapter(chapter: RawChapter, require_content: bool) -> Result<ChapterOutline, GenerationError> {
    let title = required_text(chapter.title, "chapter title")?;
    let content = chapter
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if require_content && content.is_none() {
        return Err(GenerationError::MalformedResponse(format!(
            "chapter {:?} has no content",
            title
        )));
    }

    Ok(ChapterOutline {
        title,
        summary: chapter.summary.trim().to_string(),
        key_takeaways: chapter.key_takeaways,
        resources: chapter.resources,
        content,
    })
}

/// `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, GenerationError> {
    serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, GenerationError> {
    serde_json::from_value(value).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}

fn required_text(value: String, field: &str) -> Result<String, GenerationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::MalformedResponse(format!("{} is empty", field)));
    }
    Ok(trimmed.to_string())
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::new("Adaptive Learning Basics").unwrap()
    }

    #[test]
    fn test_parse_outline() {
        let raw = r#"{"chapters": [
            {"title": "Why Adapt?", "summary": "Motivation.", "keyTakeaways": ["a", "b"], "resources": ["r"]},
            {"title": "Measuring Mastery", "summary": "Signals.", "key_takeaways": ["c"]}
        ]}"#;
        let outline = parse_outline(raw).unwrap();

        assert_eq!(outline.source, ContentSource::Model);
        assert_eq!(outline.chapters.len(), 2);
        assert_eq!(outline.chapters[0].title, "Why Adapt?");
        assert_eq!(outline.chapters[0].key_takeaways, vec!["a", "b"]);
        assert_eq!(outline.chapters[1].key_takeaways, vec!["c"]);
        assert!(outline.chapters[1].resources.is_empty());
    }

    #[test]
    fn test_null_fields_read_as_missing() {
        let raw = r#"{"chapters": [{"title": "One", "summary": null, "keyTakeaways": ["a"], "resources": null}]}"#;
        let outline = parse_outline(raw).unwrap();
        assert_eq!(outline.chapters[0].summary, "");
        assert_eq!(outline.chapters[0].key_takeaways, vec!["a"]);
        assert!(outline.chapters[0].resources.is_empty());

        let raw = r#"{"chapters": [{"title": "One", "keyTakeaways": null}]}"#;
        assert!(parse_outline(raw).unwrap().chapters[0].key_takeaways.is_empty());
    }

    #[test]
    fn test_null_keywords_use_request_tags() {
        let raw = r#"{"seoTitle": "Title", "metaDescription": "Desc", "keywords": null}"#;
        let seo = parse_seo(raw, &request().with_tags(["edtech"])).unwrap();
        assert_eq!(seo.keywords, vec!["edtech"]);
    }

    #[test]
    fn test_outline_drops_stray_content() {
        let raw = r#"{"chapters": [{"title": "One", "content": "<p>x</p>"}]}"#;
        assert_eq!(parse_outline(raw).unwrap().chapters[0].content, None);
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = "```json\n{\"chapters\": [{\"title\": \"One\"}]}\n```";
        assert_eq!(parse_outline(raw).unwrap().chapters[0].title, "One");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_malformed_outlines() {
        let cases = [
            "Sure! Here is your outline.",
            "{}",
            r#"{"chapters": []}"#,
            r#"{"chapters": [{"summary": "no title"}]}"#,
            r#"{"chapters": [{"title": "   "}]}"#,
            r#"{"chapters": "one, two"}"#,
            r#"{"chapters": [{"title": "ok", "keyTakeaways": [1, 2]}]}"#,
        ];
        for raw in cases {
            assert!(
                matches!(parse_outline(raw), Err(GenerationError::MalformedResponse(_))),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn test_draft_requires_content() {
        let ok = r#"{"chapters": [{"title": "One", "content": "<p>Body</p>"}]}"#;
        assert_eq!(
            parse_draft(ok).unwrap().chapters[0].content.as_deref(),
            Some("<p>Body</p>")
        );

        let missing = r#"{"chapters": [{"title": "One"}, {"title": "Two", "content": "<p>x</p>"}]}"#;
        assert!(matches!(
            parse_draft(missing),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_chapter_draft_bare_or_wrapped() {
        let bare = r#"{"title": "Recall", "summary": "s", "content": "<p>Body</p>"}"#;
        assert_eq!(parse_chapter_draft(bare).unwrap().title, "Recall");

        let wrapped = r#"{"chapter": {"title": "Recall", "content": "<p>Body</p>"}}"#;
        assert_eq!(parse_chapter_draft(wrapped).unwrap().title, "Recall");

        let empty = r#"{"title": "Recall", "content": "  "}"#;
        assert!(parse_chapter_draft(empty).is_err());
    }

    #[test]
    fn test_parse_seo_full() {
        let raw = r#"{
            "seoTitle": "Adaptive Learning Basics",
            "metaDescription": "A friendly primer.",
            "keywords": ["adaptive learning", "edtech", "edtech"],
            "slug": "Adaptive Learning: Basics!",
            "ogTitle": "Learn Adaptively",
            "twitterDescription": "Short and sweet.",
            "schemaOrg": {"@type": "Book", "name": "X"}
        }"#;
        let seo = parse_seo(raw, &request()).unwrap();

        assert_eq!(seo.source, ContentSource::Model);
        assert_eq!(seo.slug, "adaptive-learning-basics");
        assert_eq!(seo.canonical_path, "/ebooks/adaptive-learning-basics");
        assert_eq!(seo.keywords, vec!["adaptive learning", "edtech"]);
        assert_eq!(seo.og_title, "Learn Adaptively");
        assert_eq!(seo.og_description, "A friendly primer.");
        assert_eq!(seo.twitter_title, "Adaptive Learning Basics");
        assert_eq!(seo.twitter_description, "Short and sweet.");
        assert_eq!(seo.schema_org_payload["name"], "X");
    }

    #[test]
    fn test_parse_seo_fills_gaps_from_request() {
        let raw = r#"{"seoTitle": "Title", "metaDescription": "Desc"}"#;
        let req = request().with_tags(["quizzes", "mastery"]);
        let seo = parse_seo(raw, &req).unwrap();

        assert_eq!(seo.keywords, vec!["quizzes", "mastery"]);
        assert_eq!(seo.slug, "adaptive-learning-basics");
        assert_eq!(seo.schema_org_payload["@type"], "Book");

        let untagged = parse_seo(raw, &request()).unwrap();
        assert_eq!(untagged.keywords, vec!["Adaptive Learning Basics"]);
    }

    #[test]
    fn test_parse_seo_rejects_missing_core_fields() {
        for raw in [
            r#"{"metaDescription": "Desc"}"#,
            r#"{"seoTitle": "", "metaDescription": "Desc"}"#,
            r#"{"seoTitle": "T", "metaDescription": "  "}"#,
            "[]",
        ] {
            assert!(parse_seo(raw, &request()).is_err(), "accepted {raw}");
        }
    }
}
