use std::path::Path;

use mupdf::{Document, TextPageFlags};

use numtag_core::{DocumentError, PageContent, PdfBackend, Word};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate isolates the mupdf dependency (which is AGPL-3.0) so that the
/// rest of the workspace does not transitively depend on it.
///
/// Header and footer exclusion are off by default. When enabled, text blocks
/// lying entirely in the top (header) or bottom (footer) fraction of the page
/// are skipped, which keeps running page numbers out of the token stream.
#[derive(Debug, Clone, Default)]
pub struct MupdfBackend {
    /// Fraction of page height from bottom to exclude as footer (0.0–1.0).
    footer_exclusion_ratio: Option<f32>,
    /// Fraction of page height from top to exclude as header (0.0–1.0).
    header_exclusion_ratio: Option<f32>,
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the footer exclusion ratio. Pass `0.0` to disable.
    pub fn with_footer_exclusion(mut self, ratio: f32) -> Self {
        self.footer_exclusion_ratio = if ratio > 0.0 { Some(ratio) } else { None };
        self
    }

    /// Set the header exclusion ratio. Pass `0.0` to disable.
    pub fn with_header_exclusion(mut self, ratio: f32) -> Self {
        self.header_exclusion_ratio = if ratio > 0.0 { Some(ratio) } else { None };
        self
    }
}

/// Assemble a page from its text lines: text is the lines joined with `\n`,
/// words are the whitespace-separated pieces of each line in order.
pub fn page_from_lines(lines: Vec<String>) -> PageContent {
    let words = lines
        .iter()
        .flat_map(|line| line.split_whitespace().map(Word::new))
        .collect();
    PageContent::new(lines.join("\n"), words)
}

impl PdfBackend for MupdfBackend {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, DocumentError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DocumentError::Open("invalid path encoding".into()))?;

        let document = Document::open(path_str).map_err(|e| DocumentError::Open(e.to_string()))?;

        let mut pages = Vec::new();

        for page_result in document
            .pages()
            .map_err(|e| DocumentError::Extraction(e.to_string()))?
        {
            let page = page_result.map_err(|e| DocumentError::Extraction(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| DocumentError::Extraction(e.to_string()))?;

            let page_bounds = page
                .bounds()
                .map_err(|e| DocumentError::Extraction(e.to_string()))?;
            let page_height = page_bounds.y1 - page_bounds.y0;

            let header_threshold = self
                .header_exclusion_ratio
                .map(|r| page_bounds.y0 + page_height * r);
            let footer_threshold = self
                .footer_exclusion_ratio
                .map(|r| page_bounds.y1 - page_height * r);

            let mut lines = Vec::new();
            for block in text_page.blocks() {
                let block_bounds = block.bounds();

                if header_threshold.is_some_and(|t| block_bounds.y1 <= t) {
                    continue;
                }
                if footer_threshold.is_some_and(|t| block_bounds.y0 >= t) {
                    continue;
                }

                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    lines.push(line_text);
                }
            }

            tracing::trace!(page = pages.len() + 1, lines = lines.len(), "read page");
            pages.push(page_from_lines(lines));
        }

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_become_text_and_words() {
        let page = page_from_lines(vec![
            "Grant Date: January 15, 2024.".to_string(),
            "Award of  5,000 units".to_string(),
        ]);
        assert_eq!(page.text, "Grant Date: January 15, 2024.\nAward of  5,000 units");
        let words: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(
            words,
            vec!["Grant", "Date:", "January", "15,", "2024.", "Award", "of", "5,000", "units"]
        );
    }

    #[test]
    fn empty_page() {
        let page = page_from_lines(vec![]);
        assert!(page.text.is_empty());
        assert!(page.words.is_empty());
    }

    #[test]
    fn exclusion_disabled_by_default() {
        let backend = MupdfBackend::new();
        assert!(backend.footer_exclusion_ratio.is_none());
        assert!(backend.header_exclusion_ratio.is_none());

        let backend = backend.with_footer_exclusion(0.05).with_header_exclusion(0.0);
        assert_eq!(backend.footer_exclusion_ratio, Some(0.05));
        assert!(backend.header_exclusion_ratio.is_none());
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MupdfBackend::new()
            .extract_pages(&dir.path().join("absent.pdf"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::Open(_)));
    }
}
