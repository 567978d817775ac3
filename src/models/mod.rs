use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("title must not be empty")]
    EmptyTitle,
}

/// Parameters shared by every generation variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub title: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub focus: Option<String>,
    /// Raw requested count; clamped only where it drives fallback synthesis.
    #[serde(default, alias = "chapters", deserialize_with = "deserialize_lenient_integer")]
    pub chapter_count: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GenerationRequest {
    pub fn new(title: impl Into<String>) -> Result<Self, RequestError> {
        let request = Self {
            title: title.into().trim().to_string(),
            audience: None,
            tone: None,
            focus: None,
            chapter_count: None,
            tags: Vec::new(),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = Some(focus.into());
        self
    }

    pub fn with_chapter_count(mut self, count: i64) -> Self {
        self.chapter_count = Some(count);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Rejects requests whose title is blank.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.title.trim().is_empty() {
            return Err(RequestError::EmptyTitle);
        }
        Ok(())
    }

    pub fn title(&self) -> &str {
        self.title.trim()
    }

    pub fn audience(&self) -> Option<&str> {
        non_blank(&self.audience)
    }

    pub fn tone(&self) -> Option<&str> {
        non_blank(&self.tone)
    }

    pub fn focus(&self) -> Option<&str> {
        non_blank(&self.focus)
    }

    /// Focus if given, otherwise the title.
    pub fn focus_or_title(&self) -> &str {
        self.focus().unwrap_or_else(|| self.title())
    }

    /// Tags with blanks removed.
    pub fn tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A single chapter to draft in full, in the context of its ebook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDraftRequest {
    pub ebook: GenerationRequest,
    #[serde(default, deserialize_with = "deserialize_lenient_integer")]
    pub chapter_number: Option<i64>,
    #[serde(default)]
    pub chapter_title: Option<String>,
    #[serde(default)]
    pub chapter_summary: Option<String>,
}

impl ChapterDraftRequest {
    pub fn new(ebook: GenerationRequest, chapter_number: i64) -> Self {
        Self {
            ebook,
            chapter_number: Some(chapter_number),
            chapter_title: None,
            chapter_summary: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.chapter_title = Some(title.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.chapter_summary = Some(summary.into());
        self
    }

    /// 1-based chapter number, never below 1.
    pub fn number(&self) -> usize {
        self.chapter_number.unwrap_or(1).max(1) as usize
    }

    pub fn title(&self) -> Option<&str> {
        non_blank(&self.chapter_title)
    }

    pub fn summary(&self) -> Option<&str> {
        non_blank(&self.chapter_summary)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterOutline {
    pub title: String,
    pub summary: String,
    pub key_takeaways: Vec<String>,
    pub resources: Vec<String>,
    /// HTML body; only drafts carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Whether a result came back from the model or was synthesized locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutlineResult {
    pub chapters: Vec<ChapterOutline>,
    pub source: ContentSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDraftResult {
    pub chapter: ChapterOutline,
    pub source: ContentSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeoMetadata {
    pub seo_title: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub slug: String,
    pub og_title: String,
    pub og_description: String,
    pub twitter_title: String,
    pub twitter_description: String,
    pub canonical_path: String,
    pub schema_org_payload: Value,
    pub source: ContentSource,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts integers, fractional numbers (truncated) and numeric strings.
/// Anything else is treated as absent.
fn deserialize_lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_integer))
}

fn coerce_integer(value: &Value) -> Option<i64> {
    let float = match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                return Some(integer);
            }
            number.as_f64()?
        }
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    float.is_finite().then(|| float.trunc() as i64)
}
