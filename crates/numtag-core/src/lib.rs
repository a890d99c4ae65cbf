use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod backend;
pub mod config_file;
pub mod context;
pub mod driver;
pub mod extract;
pub mod group;
pub mod labeler;
pub mod models;
pub mod prompt;
pub mod report;
pub mod response;
pub mod syntax;

// Re-export for convenience
pub use backend::{DocumentError, PageContent, PdfBackend, Word};
pub use context::{DEFAULT_WINDOW, get_context, strip_trailing_index};
pub use driver::label_pages;
pub use extract::{extract_page_numbers, load_document};
pub use group::{GroupingPolicy, group_by_page, group_by_page_dedup, group_records};
pub use labeler::{LabelerError, OllamaLabeler, PageRequest, SemanticLabeler};
pub use models::{DEFAULT_BASE_URL, DEFAULT_MODEL, ModelEndpoint, ModelRegistry};
pub use prompt::PromptTemplate;
pub use response::{
    ParseError, ParsedResponse, Reconciliation, SemanticResult, parse_labeler_response, reconcile,
};
pub use syntax::{SyntaxLabel, classify};

/// A numeric word found on a page, with its syntactic label and the text around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub value: String,
    pub page_number: u32,
    pub context: String,
    pub syntax_label: SyntaxLabel,
}

/// Everything the deterministic pass produces for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentExtraction {
    /// Full text per page, keyed by 1-based page number.
    pub pages: BTreeMap<u32, String>,
    /// Records from all pages, in page then word order.
    pub records: Vec<TokenRecord>,
}

impl DocumentExtraction {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Token records partitioned by page number.
pub type GroupedRecords = BTreeMap<u32, Vec<TokenRecord>>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
    #[error("unknown model '{name}' (available: {available})")]
    UnknownModel { name: String, available: String },
    #[error("invalid config file {path}: {reason}")]
    Config { path: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How a page's labeling call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Labeled,
    Unparsed,
    Failed,
}

/// Result of labeling a single page.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// The model returned a JSON object.
    Labeled {
        page_number: u32,
        response: Map<String, Value>,
        results: Vec<SemanticResult>,
        reconciliation: Reconciliation,
    },
    /// The model answered, but not with a JSON object; the text is kept verbatim.
    Unparsed { page_number: u32, raw: String },
    /// The call itself failed (HTTP error, timeout, cancellation).
    Failed { page_number: u32, error: String },
}

impl PageOutcome {
    pub fn page_number(&self) -> u32 {
        match self {
            Self::Labeled { page_number, .. }
            | Self::Unparsed { page_number, .. }
            | Self::Failed { page_number, .. } => *page_number,
        }
    }

    pub fn status(&self) -> PageStatus {
        match self {
            Self::Labeled { .. } => PageStatus::Labeled,
            Self::Unparsed { .. } => PageStatus::Unparsed,
            Self::Failed { .. } => PageStatus::Failed,
        }
    }

    /// The report entry for this page.
    ///
    /// Parsed responses get a `page_number` field added, unparsed responses are
    /// emitted as the raw string, and failures become `{page_number, error}`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Labeled {
                page_number,
                response,
                ..
            } => {
                let mut object = response.clone();
                object.insert("page_number".into(), Value::from(*page_number));
                Value::Object(object)
            }
            Self::Unparsed { raw, .. } => Value::String(raw.clone()),
            Self::Failed { page_number, error } => serde_json::json!({
                "page_number": page_number,
                "error": error,
            }),
        }
    }
}

/// Progress events emitted while pages are being labeled.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A permit was acquired and the model call for this page is in flight.
    PageStarted { page_number: u32, tokens: usize },
    PageCompleted {
        page_number: u32,
        completed: usize,
        total: usize,
        status: PageStatus,
        elapsed: Duration,
        /// Error text for failed pages.
        message: Option<String>,
    },
    /// The model did not echo back every token it was sent.
    Reconciliation {
        page_number: u32,
        expected: usize,
        returned: usize,
        missing: Vec<String>,
    },
}

/// Settings for one labeling run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model identifier sent to the endpoint (e.g. "llama3.2:3b").
    pub model_id: String,
    /// Maximum number of labeler calls in flight at once.
    pub concurrency: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Characters of context on each side of a token.
    pub context_window: usize,
    pub grouping: GroupingPolicy,
    /// Sort page outcomes by page number instead of completion order.
    pub sort_by_page: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_id: "llama3.2:3b".into(),
            concurrency: 1,
            timeout_secs: 120,
            context_window: DEFAULT_WINDOW,
            grouping: GroupingPolicy::All,
            sort_by_page: false,
        }
    }
}

/// Label every page of an extracted document.
///
/// Groups the records according to `config.grouping` and hands each non-empty
/// page to `labeler`, at most `config.concurrency` at a time. Progress events
/// are emitted via the callback. The run can be cancelled via the
/// CancellationToken; pages that have not finished report a failure.
pub async fn label_document(
    extraction: &DocumentExtraction,
    labeler: Arc<dyn SemanticLabeler>,
    config: &Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Vec<PageOutcome> {
    let grouped = group_records(&extraction.records, config.grouping);
    driver::label_pages(&extraction.pages, grouped, labeler, config, progress, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_entry_gets_page_number() {
        let mut response = Map::new();
        response.insert("classification".into(), Value::Array(vec![]));
        let outcome = PageOutcome::Labeled {
            page_number: 4,
            response,
            results: vec![],
            reconciliation: Reconciliation::default(),
        };
        let json = outcome.to_json();
        assert_eq!(json["page_number"], 4);
        assert!(json["classification"].is_array());
    }

    #[test]
    fn unparsed_entry_is_raw_string() {
        let outcome = PageOutcome::Unparsed {
            page_number: 2,
            raw: "not json {".into(),
        };
        assert_eq!(outcome.to_json(), Value::String("not json {".into()));
        assert_eq!(outcome.status(), PageStatus::Unparsed);
    }

    #[test]
    fn failed_entry_keeps_page_and_error() {
        let outcome = PageOutcome::Failed {
            page_number: 7,
            error: "model call timed out after 5s".into(),
        };
        let json = outcome.to_json();
        assert_eq!(json["page_number"], 7);
        assert_eq!(json["error"], "model call timed out after 5s");
        assert_eq!(outcome.page_number(), 7);
    }

    #[test]
    fn token_record_serializes_snake_case_label() {
        let record = TokenRecord {
            value: "5,000".into(),
            page_number: 1,
            context: "Award of 5,000 units".into(),
            syntax_label: SyntaxLabel::GrantedUnits,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["syntax_label"], "granted_units");
        assert_eq!(json["value"], "5,000");
    }
}
