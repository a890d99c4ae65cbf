//! Rule-based syntactic classification of numeric tokens.
//!
//! Rules are evaluated in a fixed order and the first match wins. Several
//! categories overlap (a date is also a number, a list index looks like a
//! section number), so the order is part of the contract.

use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Syntactic category of a numeric token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxLabel {
    ListIndex,
    PerformanceMultiplier,
    Monetary,
    Percentage,
    Date,
    GrantedUnits,
    TimePeriod,
    AddressNumber,
    Uuid,
    CodeSection,
    Unknown,
}

impl SyntaxLabel {
    pub const ALL: [SyntaxLabel; 11] = [
        Self::ListIndex,
        Self::PerformanceMultiplier,
        Self::Monetary,
        Self::Percentage,
        Self::Date,
        Self::GrantedUnits,
        Self::TimePeriod,
        Self::AddressNumber,
        Self::Uuid,
        Self::CodeSection,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListIndex => "list_index",
            Self::PerformanceMultiplier => "performance_multiplier",
            Self::Monetary => "monetary",
            Self::Percentage => "percentage",
            Self::Date => "date",
            Self::GrantedUnits => "granted_units",
            Self::TimePeriod => "time_period",
            Self::AddressNumber => "address_number",
            Self::Uuid => "uuid",
            Self::CodeSection => "code_section",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SyntaxLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Words on each side of a token that the keyword rules look at.
pub const NEIGHBOUR_WORDS: usize = 3;

static LIST_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\d+\.|\(\d+\))$").unwrap());

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$",
    )
    .unwrap()
});

static MULTIPLIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\d+(?:\.\d+)?x$").unwrap());

static CURRENCY_TERMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:dollars?|usd)\b").unwrap());

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static SLASH_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap());

// "January 15, 2024", "Jan. 15, 2024", "Sept 3, 2021"
static DATE_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2}),\s*(\d{4})\b",
    )
    .unwrap()
});

static YEAR_2020S: Lazy<Regex> = Lazy::new(|| Regex::new(r"^202\d$").unwrap());

static BARE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

static ADDRESS_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:street|st|ave|avenue|road|rd|suite|ste|blvd|boulevard|lane|ln|drive|dr|court|ct)\b",
    )
    .unwrap()
});

// "§409A", "§ 83(b)", "422(b)(1)"
static SECTION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:§\s?\d+[a-z]?(?:\([a-z0-9]+\))*|\d+[a-z]?(?:\([a-z0-9]+\))+)$").unwrap()
});

// "Section 3", "Sec. 12", "§ 409A" followed by the referenced number.
static SECTION_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:§|\bsec\.|\bsection)\s*(\d+[a-z]?(?:\([a-z0-9]+\))*)").unwrap()
});

static UNITS_TERMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:units?|shares?|granted)\b").unwrap());

static TIME_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:years?|months?|anniversar(?:y|ies)|vest\w*)\b").unwrap()
});

/// Classify a numeric token using the text of the page it came from.
///
/// Total: always returns a label, `Unknown` when nothing matches.
pub fn classify(token: &str, context: &str) -> SyntaxLabel {
    let t = token.trim();

    if LIST_INDEX.is_match(t) {
        return SyntaxLabel::ListIndex;
    }
    if UUID.is_match(t) {
        return SyntaxLabel::Uuid;
    }
    if MULTIPLIER.is_match(t) {
        return SyntaxLabel::PerformanceMultiplier;
    }

    let near = neighbourhood(context, t);

    if t.starts_with('$') || CURRENCY_TERMS.is_match(&near) {
        return SyntaxLabel::Monetary;
    }
    if t.contains('%') {
        return SyntaxLabel::Percentage;
    }
    if is_date(t, context) {
        return SyntaxLabel::Date;
    }
    if BARE_INTEGER.is_match(t) && ADDRESS_TERMS.is_match(&near) {
        return SyntaxLabel::AddressNumber;
    }
    if is_section_reference(t, context) {
        return SyntaxLabel::CodeSection;
    }
    if UNITS_TERMS.is_match(&near) {
        return SyntaxLabel::GrantedUnits;
    }
    if TIME_TERMS.is_match(&near) {
        return SyntaxLabel::TimePeriod;
    }
    SyntaxLabel::Unknown
}

/// The words around the first whitespace-delimited occurrence of `token` in
/// `context`, or the whole context when the token is not one of its words.
fn neighbourhood<'a>(context: &'a str, token: &str) -> Cow<'a, str> {
    let words: Vec<&str> = context.split_whitespace().collect();
    match words.iter().position(|w| *w == token) {
        Some(i) => {
            let lo = i.saturating_sub(NEIGHBOUR_WORDS);
            let hi = (i + NEIGHBOUR_WORDS + 1).min(words.len());
            Cow::Owned(words[lo..hi].join(" "))
        }
        None => Cow::Borrowed(context),
    }
}

/// Strip the punctuation a word picks up from running text: "15," -> "15".
fn numeric_core(token: &str) -> &str {
    token
        .trim_start_matches(['(', '[', '"', '\''])
        .trim_end_matches([',', '.', ';', ':', ')', ']', '"', '\''])
}

fn is_date(token: &str, context: &str) -> bool {
    if ISO_DATE.is_match(token) || SLASH_DATE.is_match(token) {
        return true;
    }
    let core = numeric_core(token);
    if YEAR_2020S.is_match(core) {
        return true;
    }
    DATE_PHRASE
        .captures_iter(context)
        .any(|caps| &caps[1] == core || &caps[2] == core)
}

fn is_section_reference(token: &str, context: &str) -> bool {
    if SECTION_TOKEN.is_match(token) {
        return true;
    }
    let core = numeric_core(token);
    SECTION_MENTION
        .captures_iter(context)
        .any(|caps| caps[1].eq_ignore_ascii_case(core))
}
