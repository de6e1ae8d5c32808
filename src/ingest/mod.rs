//! Source ingestion module.
//!
//! Provides:
//! - `SourceFetcher` / `HttpFetcher`: retrieving links
//! - `PdfTextExtractor` / `PdfExtractBackend`: PDF text extraction
//! - `SourceIngestor`: classification, normalization and clipping

mod fetcher;
mod html;
mod ingestor;
mod pdf;
mod text;

pub use fetcher::*;
pub use html::*;
pub use ingestor::*;
pub use pdf::*;
pub use text::*;
