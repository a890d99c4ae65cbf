use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Built-in labeling prompt. `{page_number}`, `{page_text}` and
/// `{numbers_json}` are substituted per page.
pub const DEFAULT_PROMPT: &str = r#"You label numeric values found in page {page_number} of an equity compensation or legal document.

Each candidate below was extracted from the page and already carries a rough
syntax_label assigned by pattern matching. Use the page text and each
candidate's context to assign a precise semantic label.

Semantic labels, grouped by category:
- FINANCIAL VALUES: grant_amount, exercise_price, strike_price, base_salary, bonus_amount, fee_amount, fair_market_value
- EQUITY: granted_units, share_count, unit_count, performance_multiplier
- PERCENTAGES: vesting_percentage, ownership_percentage, interest_rate, bonus_percentage
- TIME: vesting_period, cliff_period, term_length, notice_period, grant_date, vesting_date, expiration_date
- REFERENCES: code_section, plan_section, address_number, identifier
- OTHER: other

Rules:
- Return one entry per candidate, in the order given, and copy raw_value exactly.
- formatted_value is the number only, without symbols, separators or units.
- unit is one of "$", "%", "x", "units", or null.
- llm_confidence is between 0.0 and 1.0.

Respond with a single JSON object and nothing else:
{"classification": [{"raw_value": "...", "formatted_value": 0, "semantic_label": "...", "semantic_category": "...", "unit": null, "llm_confidence": 0.0}]}

Page text:
{page_text}

Candidates:
{numbers_json}
"#;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(page_number|page_text|numbers_json)\}").unwrap());

/// Prompt template with named placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        std::fs::read_to_string(path).map(Self::new)
    }

    /// Substitute placeholders in a single pass, so placeholder-looking text
    /// inside the page is left alone.
    pub fn render(&self, page_number: u32, page_text: &str, numbers_json: &str) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| match &caps[1] {
                "page_number" => page_number.to_string(),
                "page_text" => page_text.to_string(),
                _ => numbers_json.to_string(),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_placeholders() {
        let prompt = PromptTemplate::new("p={page_number} t={page_text} n={numbers_json}");
        assert_eq!(
            prompt.render(3, "Award of 5,000 units", "[]"),
            "p=3 t=Award of 5,000 units n=[]"
        );
    }

    #[test]
    fn page_text_is_not_reexpanded() {
        let prompt = PromptTemplate::new("{page_text}|{numbers_json}");
        assert_eq!(prompt.render(1, "literal {numbers_json}", "X"), "literal {numbers_json}|X");
    }

    #[test]
    fn default_prompt_mentions_every_placeholder() {
        for name in ["{page_number}", "{page_text}", "{numbers_json}"] {
            assert!(DEFAULT_PROMPT.contains(name));
        }
        let rendered = PromptTemplate::default().render(9, "TEXT", "JSON");
        assert!(rendered.contains("page 9"));
        assert!(rendered.contains("TEXT"));
        assert!(rendered.contains("JSON"));
    }

    #[test]
    fn other_braces_are_untouched() {
        let prompt = PromptTemplate::new(r#"{"classification": []} {page_number}"#);
        assert_eq!(prompt.render(2, "", ""), r#"{"classification": []} 2"#);
    }

    #[test]
    fn from_file_reads_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "page {page_number}").unwrap();
        let prompt = PromptTemplate::from_file(&path).unwrap();
        assert_eq!(prompt.render(5, "", ""), "page 5");
    }
}
