//! Source ingestion: links and inline PDFs to bounded text blocks.
//!
//! Runs once per generation, strictly in order: every link, then every inline
//! PDF. A failed link aborts the run; a failed inline PDF falls back to reading
//! its bytes as UTF-8 text.

use super::{FetchedDocument, PdfTextExtractor, SourceFetcher, classify_link, clip_chars, collapse_whitespace, html_to_text};
use crate::models::{PdfBlob, PipelineError, Result, SourceKind, SourceSnippet};
use std::sync::Arc;
use tracing::{info, warn};

/// Ingested sources in input order.
#[derive(Debug, Clone, Default)]
pub struct IngestedSources {
    pub snippets: Vec<SourceSnippet>,
    /// One block per snippet, each prefixed with its source id
    pub blocks: Vec<String>,
}

impl IngestedSources {
    /// All blocks joined, clipped to `limit` characters overall.
    pub fn context(&self, limit: usize) -> String {
        clip_chars(&self.blocks.join("\n\n"), limit)
    }

    fn push(&mut self, id: String, kind: SourceKind, text: String) {
        info!(source = %id, kind = %kind, chars = text.chars().count(), "Ingested source");
        self.blocks.push(format!("[Source: {id}]\n{text}"));
        self.snippets.push(SourceSnippet {
            chars: text.chars().count(),
            id,
            kind,
        });
    }
}

/// Fetches and normalizes source material.
pub struct SourceIngestor {
    fetcher: Arc<dyn SourceFetcher>,
    pdf: Arc<dyn PdfTextExtractor>,
    per_source_char_limit: usize,
}

impl SourceIngestor {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        pdf: Arc<dyn PdfTextExtractor>,
        per_source_char_limit: usize,
    ) -> Self {
        Self {
            fetcher,
            pdf,
            per_source_char_limit,
        }
    }

    /// Ingest every link, then every inline PDF.
    pub async fn ingest(&self, urls: &[String], pdfs: &[PdfBlob]) -> Result<IngestedSources> {
        let mut sources = IngestedSources::default();

        for url in urls {
            let document = self.fetcher.fetch(url).await?;
            let (kind, text) = self.read_link(url, &document)?;
            sources.push(url.clone(), kind, self.normalize(&text));
        }

        for (idx, pdf) in pdfs.iter().enumerate() {
            let id = pdf
                .filename
                .clone()
                .unwrap_or_else(|| format!("inline-pdf-{}", idx + 1));
            let text = match self.pdf.extract_text(&pdf.bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!(source = %id, error = %e, "PDF extraction failed, reading bytes as text");
                    String::from_utf8_lossy(&pdf.bytes).into_owned()
                }
            };
            sources.push(id, SourceKind::InlinePdf, self.normalize(&text));
        }

        Ok(sources)
    }

    fn read_link(&self, url: &str, document: &FetchedDocument) -> Result<(SourceKind, String)> {
        let kind = classify_link(url, document.content_type.as_deref());
        let text = match kind {
            SourceKind::LinkPdf => self.pdf.extract_text(&document.bytes).map_err(|e| {
                PipelineError::SourceExtraction {
                    source_id: url.to_string(),
                    message: e.to_string(),
                }
            })?,
            SourceKind::LinkHtml => html_to_text(&String::from_utf8_lossy(&document.bytes)),
            _ => String::from_utf8_lossy(&document.bytes).into_owned(),
        };
        Ok((kind, text))
    }

    fn normalize(&self, text: &str) -> String {
        clip_chars(&collapse_whitespace(text), self.per_source_char_limit)
    }
}
