use anyhow::{Result, anyhow};
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::{ElementRef, Html, Node};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{ChapterOutline, GenerationRequest};
use crate::services::fallback::render_chapter_html;

const LANGUAGE: &str = "en";
const GENERATOR: &str = "ebookgen";

/// Elements with no content; XHTML requires them self-closed.
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const DROPPED_ELEMENTS: [&str; 2] = ["script", "style"];

fn epub_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("EPUB generation failed: {}", e)
}

/// Packs drafted chapters into EPUB bytes.
pub fn build_epub(request: &GenerationRequest, chapters: &[ChapterOutline]) -> Result<Vec<u8>> {
    let zip = ZipLibrary::new().map_err(epub_error)?;
    let mut builder = EpubBuilder::new(zip).map_err(epub_error)?;
    builder.epub_version(EpubVersion::V30);

    builder.metadata("title", request.title()).map_err(epub_error)?;
    builder.metadata("lang", LANGUAGE).map_err(epub_error)?;
    builder.metadata("generator", GENERATOR).map_err(epub_error)?;
    if let Some(audience) = request.audience() {
        builder
            .metadata("author", format!("Written for {}", audience))
            .map_err(epub_error)?;
    }
    for tag in request.tags() {
        builder.metadata("subject", tag).map_err(epub_error)?;
    }
    builder.inline_toc();

    for (i, chapter) in chapters.iter().enumerate() {
        let document = chapter_document(chapter);
        let mut content = EpubContent::new(format!("chapter_{}.xhtml", i + 1), document.as_bytes())
            .title(chapter.title.clone());
        if i == 0 {
            content = content.reftype(ReferenceType::Text);
        }
        builder.add_content(content).map_err(epub_error)?;
    }

    let mut bytes = Vec::new();
    builder.generate(&mut bytes).map_err(epub_error)?;
    Ok(bytes)
}

/// Writes the book as `{output_dir}/{id}.epub` and returns the id.
pub async fn write_epub(output_dir: &Path, bytes: &[u8]) -> Result<Uuid> {
    let epub_id = Uuid::new_v4();
    tokio::fs::create_dir_all(output_dir).await?;
    tokio::fs::write(epub_path(output_dir, &epub_id), bytes).await?;
    tracing::info!(%epub_id, size = bytes.len(), "wrote EPUB");
    Ok(epub_id)
}

pub fn epub_path(output_dir: &Path, epub_id: &Uuid) -> PathBuf {
    output_dir.join(format!("{}.epub", epub_id))
}

fn chapter_document(chapter: &ChapterOutline) -> String {
    let body = match chapter.content.as_deref() {
        Some(content) => format!(
            "<h1>{}</h1>\n{}",
            encode_text(&chapter.title),
            to_xhtml(content)
        ),
        None => render_chapter_html(chapter),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
<title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = encode_text(&chapter.title),
        body = body,
    )
}

/// Re-serializes model HTML as well-formed XHTML.
///
/// The fragment goes through an HTML5 parser, so unclosed tags get closed
/// and named entities such as `&nbsp;` become plain characters before the
/// tree is written back out with XML escaping.
pub fn to_xhtml(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut out);
    out
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&encode_text(&text.text[..])),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if DROPPED_ELEMENTS.contains(&name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&encode_double_quoted_attribute(value));
        out.push('"');
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}
