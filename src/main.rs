use axum::{
    Router,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use ebookgen::config::AppConfig;
use ebookgen::models::{
    ChapterDraftRequest, ChapterDraftResult, GenerationRequest, OutlineResult, SeoMetadata,
};
use ebookgen::services::epub;
use ebookgen::services::generator::ContentGenerator;
use ebookgen::services::llm::LlmClient;

#[derive(Clone)]
struct AppState {
    generator: Arc<ContentGenerator>,
    output_dir: PathBuf,
}

type ApiError = (StatusCode, Json<Value>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Create the LLM client
    let llm_client = LlmClient::new(&config.llm)?;
    if !llm_client.is_configured() {
        tracing::warn!("LLM_API_KEY is not set; every request will use fallback content");
    }

    let app_state = AppState {
        generator: Arc::new(ContentGenerator::new(Arc::new(llm_client))),
        output_dir: config.output_dir.clone(),
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app(app_state)).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/ebooks/outline", post(generate_outline))
        .route("/api/ebooks/draft", post(generate_draft))
        .route("/api/ebooks/chapter", post(generate_chapter))
        .route("/api/ebooks/seo", post(generate_seo))
        .route("/api/ebooks/export", post(export_epub))
        .route("/download/:id", get(download_epub))
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(tower_http::cors::Any)
                    .allow_methods(tower_http::cors::AllowMethods::any())
                    .allow_headers(tower_http::cors::AllowHeaders::any()),
            ),
        )
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Ebook Generation Service</title>
        <meta charset="utf-8">
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
            .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
        </style>
    </head>
    <body>
        <h1>Ebook Generation Service</h1>

        <div class="info-box">
            <h2>Service Information</h2>
            <p>This service drafts ebook outlines, chapters and SEO metadata with a hosted language model.</p>
            <p>When the model is unavailable it answers with structured template content instead.</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET / - This information page</div>
        <div class="endpoint">GET /health - Health check</div>
        <div class="endpoint">POST /api/ebooks/outline - Chapter outline</div>
        <div class="endpoint">POST /api/ebooks/draft - Full chapter drafts</div>
        <div class="endpoint">POST /api/ebooks/chapter - Draft a single chapter</div>
        <div class="endpoint">POST /api/ebooks/seo - SEO metadata and slug</div>
        <div class="endpoint">POST /api/ebooks/export - Draft and package as EPUB</div>
        <div class="endpoint">GET /download/{id} - Download an exported EPUB</div>

        <h2>How to Use:</h2>
        <p>POST a JSON body such as {"title": "Adaptive Learning Basics", "audience": "teachers", "chapterCount": 6}</p>
    </body>
    </html>
    "#,
    )
}

async fn health_check() -> &'static str {
    "OK"
}

fn bad_request(message: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": message.to_string()})),
    )
}

/// Malformed or incomplete JSON bodies get the same 400 shape as other bad input.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

fn internal_error(message: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": message.to_string()})),
    )
}

async fn generate_outline(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<OutlineResult>, ApiError> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;
    Ok(Json(state.generator.generate_outline(&request).await))
}

async fn generate_draft(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<OutlineResult>, ApiError> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;
    Ok(Json(state.generator.generate_draft(&request).await))
}

async fn generate_chapter(
    State(state): State<AppState>,
    payload: Result<Json<ChapterDraftRequest>, JsonRejection>,
) -> Result<Json<ChapterDraftResult>, ApiError> {
    let request = json_body(payload)?;
    request.ebook.validate().map_err(bad_request)?;
    Ok(Json(state.generator.generate_chapter_draft(&request).await))
}

async fn generate_seo(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<SeoMetadata>, ApiError> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;
    Ok(Json(state.generator.generate_seo(&request).await))
}

async fn export_epub(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;

    let draft = state.generator.generate_draft(&request).await;
    let bytes = epub::build_epub(&request, &draft.chapters).map_err(|e| {
        tracing::error!("EPUB build failed: {:#}", e);
        internal_error("could not build EPUB")
    })?;
    let epub_id = epub::write_epub(&state.output_dir, &bytes)
        .await
        .map_err(|e| {
            tracing::error!("EPUB write failed: {:#}", e);
            internal_error("could not store EPUB")
        })?;

    Ok(Json(json!({
        "success": true,
        "chapterCount": draft.chapters.len(),
        "source": draft.source,
        "downloadUrl": format!("/download/{}", epub_id)
    })))
}

async fn download_epub(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let epub_id = Uuid::parse_str(&id).map_err(|_| bad_request("invalid download id"))?;
    let path = epub::epub_path(&state.output_dir, &epub_id);

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            [
                (http::header::CONTENT_TYPE, "application/epub+zip".to_string()),
                (
                    http::header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.epub\"", epub_id),
                ),
            ],
            Body::from(bytes),
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err((
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "no such EPUB"})),
        )),
        Err(e) => {
            tracing::error!("reading {} failed: {}", path.display(), e);
            Err(internal_error("could not read EPUB"))
        }
    }
}
