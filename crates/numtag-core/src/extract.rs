use std::path::Path;

use crate::backend::{DocumentError, PdfBackend, Word};
use crate::context::get_context;
use crate::syntax::{SyntaxLabel, classify};
use crate::{DocumentExtraction, TokenRecord};

/// Build the token records for one page.
///
/// Every word containing a numeric character (any script) is classified against the page text; list
/// indices are dropped, everything else becomes a [`TokenRecord`] in word order.
pub fn extract_page_numbers(
    page_number: u32,
    words: &[Word],
    page_text: &str,
    window: usize,
) -> Vec<TokenRecord> {
    words
        .iter()
        .filter(|w| w.text.chars().any(char::is_numeric))
        .filter_map(|w| {
            let syntax_label = classify(&w.text, page_text);
            if syntax_label == SyntaxLabel::ListIndex {
                return None;
            }
            Some(TokenRecord {
                value: w.text.clone(),
                page_number,
                context: get_context(page_text, &w.text, window),
                syntax_label,
            })
        })
        .collect()
}

/// Open a document through `backend` and extract token records from every page.
///
/// Pages are numbered from 1 in the order the backend returns them.
pub fn load_document(
    path: &Path,
    backend: &dyn PdfBackend,
    window: usize,
) -> Result<DocumentExtraction, DocumentError> {
    let pages = backend.extract_pages(path)?;
    let mut extraction = DocumentExtraction::default();

    for (page_number, page) in (1u32..).zip(pages) {
        let records = extract_page_numbers(page_number, &page.words, &page.text, window);
        tracing::debug!(
            page = page_number,
            words = page.words.len(),
            records = records.len(),
            "scanned page"
        );
        extraction.records.extend(records);
        extraction.pages.insert(page_number, page.text);
    }

    tracing::info!(
        path = %path.display(),
        pages = extraction.pages.len(),
        records = extraction.records.len(),
        "extracted numeric tokens"
    );
    Ok(extraction)
}
