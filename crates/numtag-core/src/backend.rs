use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to open PDF: {0}")]
    Open(String),
    #[error("failed to extract page text: {0}")]
    Extraction(String),
}

/// A word as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Words and full text of one page.
///
/// `words` are in reading order (left-to-right, top-to-bottom, as the backend
/// sees them).
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub text: String,
    pub words: Vec<Word>,
}

impl PageContent {
    pub fn new(text: String, words: Vec<Word>) -> Self {
        Self { text, words }
    }

    /// Build a page from plain text, splitting words on whitespace.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let words = text.split_whitespace().map(Word::new).collect();
        Self { text, words }
    }
}

/// Trait for PDF page extraction backends.
///
/// Implementors open the document and return one [`PageContent`] per page in
/// document order; classification and context extraction live in
/// [`crate::extract`].
pub trait PdfBackend: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, DocumentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_splits_on_any_whitespace() {
        let page = PageContent::from_text("Award of\n5,000  units");
        let words: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words, vec!["Award", "of", "5,000", "units"]);
        assert_eq!(page.text, "Award of\n5,000  units");
    }

    #[test]
    fn errors_name_the_failing_stage() {
        let open = DocumentError::Open("not a PDF".into());
        assert_eq!(open.to_string(), "failed to open PDF: not a PDF");
        let page = DocumentError::Extraction("bad page".into());
        assert_eq!(page.to_string(), "failed to extract page text: bad page");
    }
}
