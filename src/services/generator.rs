//! Prompt → model → validate → (fallback) orchestration.
//!
//! Every public operation resolves to a well-formed result. Failures of the
//! model call or of validation are logged and answered by the fallback
//! synthesizer; the returned `source` tells callers which path was taken.

use std::fmt;
use std::sync::Arc;

use crate::models::{
    ChapterDraftRequest, ChapterDraftResult, ContentSource, GenerationRequest, OutlineResult,
    SeoMetadata,
};
use crate::services::fallback;
use crate::services::llm::{GenerationError, TextGenerator};
use crate::services::parser;
use crate::services::prompts::{PromptBuilder, PromptVariant};

/// Where a single generation call currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Idle,
    Prompting,
    AwaitingModel,
    Validating,
    Succeeded,
    FallingBack,
    Done,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::Idle => "idle",
            GenerationStage::Prompting => "prompting",
            GenerationStage::AwaitingModel => "awaiting_model",
            GenerationStage::Validating => "validating",
            GenerationStage::Succeeded => "succeeded",
            GenerationStage::FallingBack => "falling_back",
            GenerationStage::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct ContentGenerator {
    client: Arc<dyn TextGenerator>,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn TextGenerator>) -> Self {
        Self { client }
    }

    pub async fn generate_outline(&self, request: &GenerationRequest) -> OutlineResult {
        self.run(
            PromptVariant::Outline,
            request.title(),
            || PromptBuilder::build_outline_prompt(request),
            parser::parse_outline,
            || fallback::fallback_outline(request),
        )
        .await
    }

    pub async fn generate_draft(&self, request: &GenerationRequest) -> OutlineResult {
        self.run(
            PromptVariant::Draft,
            request.title(),
            || PromptBuilder::build_draft_prompt(request),
            parser::parse_draft,
            || fallback::fallback_draft(request),
        )
        .await
    }

    pub async fn generate_chapter_draft(&self, request: &ChapterDraftRequest) -> ChapterDraftResult {
        self.run(
            PromptVariant::ChapterDraft,
            request.ebook.title(),
            || PromptBuilder::build_chapter_prompt(request),
            |raw| {
                parser::parse_chapter_draft(raw).map(|chapter| ChapterDraftResult {
                    chapter,
                    source: ContentSource::Model,
                })
            },
            || ChapterDraftResult {
                chapter: fallback::fallback_chapter_draft(request),
                source: ContentSource::Fallback,
            },
        )
        .await
    }

    pub async fn generate_seo(&self, request: &GenerationRequest) -> SeoMetadata {
        self.run(
            PromptVariant::Seo,
            request.title(),
            || PromptBuilder::build_seo_prompt(request),
            |raw| parser::parse_seo(raw, request),
            || fallback::fallback_seo(request),
        )
        .await
    }

    async fn run<T, B, P, F>(
        &self,
        variant: PromptVariant,
        title: &str,
        build_prompt: B,
        parse: P,
        fallback: F,
    ) -> T
    where
        B: FnOnce() -> String,
        P: FnOnce(&str) -> Result<T, GenerationError>,
        F: FnOnce() -> T,
    {
        let variant_name = variant.name();
        tracing::debug!(variant = variant_name, title, stage = %GenerationStage::Idle, "generation requested");
        tracing::debug!(variant = variant_name, stage = %GenerationStage::Prompting, "building prompt");

        let completion = PromptBuilder::completion(variant, build_prompt());
        tracing::debug!(variant = variant_name, stage = %GenerationStage::AwaitingModel, "calling model");

        let outcome = match self.client.generate(&completion).await {
            Ok(raw) => {
                tracing::debug!(variant = variant_name, stage = %GenerationStage::Validating, bytes = raw.len(), "validating response");
                parse(&raw)
            }
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(result) => {
                tracing::info!(variant = variant_name, title, stage = %GenerationStage::Succeeded, "model generation succeeded");
                result
            }
            Err(e) => {
                log_fallback(variant_name, title, &e);
                fallback()
            }
        };

        tracing::debug!(variant = variant_name, stage = %GenerationStage::Done, "generation finished");
        result
    }
}

fn log_fallback(variant: &str, title: &str, error: &GenerationError) {
    let stage = GenerationStage::FallingBack;
    match error {
        GenerationError::ConfigurationMissing => {
            tracing::info!(variant, title, stage = %stage, "no model configured, using fallback");
        }
        GenerationError::GenerationFailed(_) | GenerationError::MalformedResponse(_) => {
            tracing::warn!(variant, title, stage = %stage, error = %error, "model generation failed, using fallback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::CompletionRequest;
    use async_trait::async_trait;
    use regex::Regex;
    use std::sync::Mutex;

    /// Answers every prompt with the same text and remembers what it was sent.
    struct FixedResponse {
        body: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FixedResponse {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FixedResponse {
        async fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.body.clone())
        }
    }

    struct Failing(GenerationError);

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _request: &CompletionRequest) -> Result<String, GenerationError> {
            Err(self.0.clone())
        }
    }

    fn failing(error: GenerationError) -> ContentGenerator {
        ContentGenerator::new(Arc::new(Failing(error)))
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("Adaptive Learning Basics")
            .unwrap()
            .with_chapter_count(3)
    }

    fn all_failures() -> Vec<GenerationError> {
        vec![
            GenerationError::ConfigurationMissing,
            GenerationError::GenerationFailed("connection reset".to_string()),
            GenerationError::MalformedResponse("not json".to_string()),
        ]
    }

    #[tokio::test]
    async fn test_happy_path_keeps_model_chapters() {
        let client = FixedResponse::new(
            r#"{"chapters": [
                {"title": "What Adapts", "summary": "s1", "keyTakeaways": ["k1"], "resources": []},
                {"title": "Signals of Mastery", "summary": "s2", "keyTakeaways": ["k2"], "resources": []},
                {"title": "Closing the Loop", "summary": "s3", "keyTakeaways": ["k3"], "resources": []}
            ]}"#,
        );
        let generator = ContentGenerator::new(client.clone());

        let outline = generator.generate_outline(&request()).await;

        assert_eq!(outline.source, ContentSource::Model);
        let titles: Vec<&str> = outline.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["What Adapts", "Signals of Mastery", "Closing the Loop"]);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, PromptVariant::Outline.temperature());
        assert!(seen[0].prompt.contains("3 chapters"));
    }

    #[tokio::test]
    async fn test_missing_credential_falls_back() {
        let outline = failing(GenerationError::ConfigurationMissing)
            .generate_outline(&request())
            .await;

        assert_eq!(outline.source, ContentSource::Fallback);
        assert_eq!(outline.chapters.len(), 3);
        for (i, chapter) in outline.chapters.iter().enumerate() {
            assert_eq!(
                chapter.title,
                format!("Chapter {}: Adaptive Learning Basics Essentials", i + 1)
            );
        }
    }

    #[tokio::test]
    async fn test_non_json_response_falls_back() {
        let generator = ContentGenerator::new(FixedResponse::new("Here you go: chapter one..."));
        let outline = generator.generate_outline(&request()).await;

        assert_eq!(outline, fallback::fallback_outline(&request()));
        assert_eq!(outline.chapters.len(), 3);
        assert!(outline.chapters.iter().all(|c| !c.key_takeaways.is_empty()));
    }

    #[tokio::test]
    async fn test_outline_and_seo_are_total() {
        let slug_pattern = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
        let requests = [
            request(),
            GenerationRequest::new("!!!").unwrap().with_chapter_count(0),
            GenerationRequest::new("Über Größe").unwrap().with_chapter_count(35),
            GenerationRequest::new("Tags").unwrap().with_tags(["x"]),
        ];

        for error in all_failures() {
            let generator = failing(error);
            for req in &requests {
                let outline = generator.generate_outline(req).await;
                assert!(!outline.chapters.is_empty());
                assert!(outline.chapters.len() <= fallback::MAX_CHAPTER_COUNT);

                let seo = generator.generate_seo(req).await;
                assert!(slug_pattern.is_match(&seo.slug));
                assert!(!seo.keywords.is_empty());
                assert_eq!(seo.canonical_path, format!("/ebooks/{}", seo.slug));
            }
        }
    }

    #[tokio::test]
    async fn test_draft_paths() {
        let model = ContentGenerator::new(FixedResponse::new(
            r#"{"chapters": [{"title": "One", "summary": "s", "content": "<p>Body</p>"}]}"#,
        ));
        let draft = model.generate_draft(&request()).await;
        assert_eq!(draft.source, ContentSource::Model);
        assert_eq!(draft.chapters.len(), 1);

        // An outline-shaped answer is not a draft.
        let outline_only = ContentGenerator::new(FixedResponse::new(
            r#"{"chapters": [{"title": "One", "summary": "s"}]}"#,
        ));
        let draft = outline_only.generate_draft(&request()).await;
        assert_eq!(draft.source, ContentSource::Fallback);
        assert_eq!(draft.chapters.len(), 3);
        assert!(draft.chapters.iter().all(|c| c.content.is_some()));
    }

    #[tokio::test]
    async fn test_chapter_draft_paths() {
        let chapter_request = ChapterDraftRequest::new(request(), 2).with_title("Feedback");

        let model = ContentGenerator::new(FixedResponse::new(
            r#"{"title": "Feedback Loops", "summary": "s", "content": "<p>Body</p>"}"#,
        ));
        let result = model.generate_chapter_draft(&chapter_request).await;
        assert_eq!(result.source, ContentSource::Model);
        assert_eq!(result.chapter.title, "Feedback Loops");

        let result = failing(GenerationError::GenerationFailed("timeout".to_string()))
            .generate_chapter_draft(&chapter_request)
            .await;
        assert_eq!(result.source, ContentSource::Fallback);
        assert_eq!(result.chapter.title, "Feedback");
        assert!(result.chapter.content.is_some());
    }

    #[tokio::test]
    async fn test_seo_model_and_fallback() {
        let client = FixedResponse::new(
            r#"{"seoTitle": "Adaptive Learning Basics", "metaDescription": "Primer.", "slug": "adaptive-basics"}"#,
        );
        let seo = ContentGenerator::new(client.clone())
            .generate_seo(&request())
            .await;
        assert_eq!(seo.source, ContentSource::Model);
        assert_eq!(seo.slug, "adaptive-basics");
        assert_eq!(seo.canonical_path, "/ebooks/adaptive-basics");
        assert_eq!(
            client.seen.lock().unwrap()[0].temperature,
            PromptVariant::Seo.temperature()
        );

        let focused = request().with_focus("quizzes");
        let seo = failing(GenerationError::ConfigurationMissing)
            .generate_seo(&focused)
            .await;
        assert_eq!(seo.source, ContentSource::Fallback);
        assert_eq!(seo.keywords, vec!["Adaptive Learning Basics", "quizzes"]);
    }

    #[tokio::test]
    async fn test_identical_titles_share_slugs() {
        let generator = failing(GenerationError::ConfigurationMissing);
        let first = generator.generate_seo(&request()).await;
        let second = generator.generate_seo(&request()).await;
        assert_eq!(first.slug, second.slug);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(GenerationStage::Idle.to_string(), "idle");
        assert_eq!(GenerationStage::Prompting.to_string(), "prompting");
        assert_eq!(GenerationStage::AwaitingModel.to_string(), "awaiting_model");
        assert_eq!(GenerationStage::FallingBack.to_string(), "falling_back");
    }
}
