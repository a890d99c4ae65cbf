//! Mock labeler for testing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use super::{LabelerError, PageRequest, SemanticLabeler};

/// A configurable reply for [`MockLabeler`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return this text verbatim.
    Text(String),
    /// Return a well-formed `{"classification": [...]}` with one entry per record.
    Echo,
    /// Like [`Echo`](MockReply::Echo), but leave out records with these values.
    EchoExcept(Vec<String>),
    /// Fail the call.
    Error(String),
    /// Never complete.
    Hang,
}

/// A hand-rolled mock implementing [`SemanticLabeler`] for tests.
///
/// Supports:
/// - A fallback reply used for every page, with per-page overrides.
/// - Optional per-call latency.
/// - Call counting, plus the highest number of calls seen in flight at once.
pub struct MockLabeler {
    fallback: MockReply,
    per_page: Mutex<HashMap<u32, MockReply>>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockLabeler {
    /// Create a mock that answers every page with `reply`.
    pub fn new(reply: MockReply) -> Self {
        Self {
            fallback: reply,
            per_page: Mutex::new(HashMap::new()),
            delay: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer `page_number` with `reply` instead of the fallback.
    pub fn with_page(self, page_number: u32, reply: MockReply) -> Self {
        self.per_page
            .lock()
            .unwrap()
            .insert(page_number, reply);
        self
    }

    /// Set simulated model latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `label()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Largest number of calls that were in progress simultaneously.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, page_number: u32) -> MockReply {
        self.per_page
            .lock()
            .unwrap()
            .get(&page_number)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Decrements the in-flight counter when the call finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The reply a well-behaved model would give for `request`.
pub fn echo_response(request: &PageRequest, skip: &[String]) -> String {
    let entries: Vec<Value> = request
        .records
        .iter()
        .filter(|r| !skip.contains(&r.value))
        .map(|r| {
            let digits: String = r
                .value
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            let formatted = digits
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(r.value.clone()));
            json!({
                "raw_value": r.value,
                "formatted_value": formatted,
                "semantic_label": r.syntax_label.as_str(),
                "semantic_category": "OTHER",
                "unit": null,
                "llm_confidence": 0.9,
            })
        })
        .collect();
    json!({ "classification": entries }).to_string()
}

impl SemanticLabeler for MockLabeler {
    fn name(&self) -> &str {
        "mock"
    }

    fn label<'a>(
        &'a self,
        request: &'a PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, LabelerError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply_for(request.page_number);
        let delay = self.delay;

        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);

            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Echo => Ok(echo_response(request, &[])),
                MockReply::EchoExcept(skip) => Ok(echo_response(request, &skip)),
                MockReply::Error(msg) => Err(LabelerError::Other(msg)),
                MockReply::Hang => std::future::pending().await,
            }
        })
    }
}
