//! Bounded text windows around a token's first occurrence on a page.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default number of characters kept on each side of a token.
pub const DEFAULT_WINDOW: usize = 60;

// Whitespace + digits (+ period) right after the target: usually the next
// list item's index, which is not part of the token's context.
static CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+\d+(\.)?").unwrap());

static TRAILING_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\(?\d+\)?\.?\s*$").unwrap());

/// Return up to `window` characters on each side of the first occurrence of
/// `target` in `full_text`, flattened to a single line.
///
/// Trailing index artifacts are stripped from the end of the snippet, so the
/// result is a fixed point of [`strip_trailing_index`]. A bare number at the
/// end of the window is stripped too, even when it is the target itself.
///
/// Returns an empty string when `target` does not occur. Only the first
/// occurrence is considered, so a token that repeats with different meanings
/// always gets the context of its first appearance.
pub fn get_context(full_text: &str, target: &str, window: usize) -> String {
    if target.is_empty() {
        return String::new();
    }
    let Some(idx) = full_text.find(target) else {
        return String::new();
    };

    let target_end = idx + target.len();
    let start = chars_back(full_text, idx, window);
    let end = chars_forward(full_text, target_end, window);

    // '\n' and ' ' are both one byte, so offsets into the snippet stay valid.
    let mut snippet = full_text[start..end].replace('\n', " ");
    let rel = target_end - start;

    if rel < snippet.len() {
        let after = &snippet[rel..];
        if let Some(caps) = CONTINUATION.captures(after) {
            let rest = &after[caps[0].len()..];
            if is_list_index_artifact(caps.get(1).is_some(), rest) {
                snippet = format!("{} {}", &snippet[..rel], rest);
            }
        }
    }

    strip_trailing_index(&snippet).trim().to_string()
}

/// Decide whether a number found right after the target is a list index.
///
/// The number must be a whole word ("5,000", "5.2", "5%" are not). "4." is an
/// index even when text follows; a bare "4" is kept when a word follows it
/// ("3 years").
fn is_list_index_artifact(has_period: bool, rest: &str) -> bool {
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return false;
    }
    has_period
        || !rest
            .trim_start()
            .starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Remove trailing list-index artifacts like `" 4"`, `" (12)"`, `" 3."`.
///
/// Only whole words are removed ("5,000" keeps its digits). Repeats until
/// nothing more matches, so applying it to its own output is a no-op.
pub fn strip_trailing_index(snippet: &str) -> &str {
    let mut s = snippet;
    while let Some(m) = TRAILING_INDEX.find(s) {
        s = &s[..m.start()];
    }
    s
}

/// Byte offset `n` characters before `from`, clamped to the start.
fn chars_back(text: &str, from: usize, n: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(from, |(i, _)| i)
}

/// Byte offset `n` characters after `from`, clamped to the end.
fn chars_forward(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRANT_PAGE: &str =
        "Grant Date: January 15, 2024. Award of 5,000 units (25%) vesting over 3 years.";

    #[test]
    fn absent_target_is_empty() {
        assert_eq!(get_context(GRANT_PAGE, "9,999", DEFAULT_WINDOW), "");
        assert_eq!(get_context(GRANT_PAGE, "", DEFAULT_WINDOW), "");
        assert_eq!(get_context("", "1", DEFAULT_WINDOW), "");
    }

    #[test]
    fn window_is_clamped_to_text() {
        let ctx = get_context(GRANT_PAGE, "5,000", DEFAULT_WINDOW);
        assert_eq!(ctx, GRANT_PAGE);
    }

    #[test]
    fn window_bounds_each_side() {
        let text = format!("{}TARGET{}", "a".repeat(100), "b".repeat(100));
        let ctx = get_context(&text, "TARGET", 10);
        assert_eq!(ctx, format!("{}TARGET{}", "a".repeat(10), "b".repeat(10)));
    }

    #[test]
    fn length_bound_holds() {
        let text = "Item 1. The Company shall pay 1,250 shares on each vesting date, \n\
                    subject to Section 4(b) of the Plan and the 2.5x multiplier. 7. Next";
        for target in ["1,250", "4(b)", "2.5x", "Item", "Next"] {
            for window in [0, 5, 20, 60] {
                let ctx = get_context(text, target, window);
                assert!(
                    ctx.chars().count() <= 2 * window + target.chars().count(),
                    "{target} / {window}: {ctx:?}"
                );
            }
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "€€€€€ 12 units €€€€€";
        let ctx = get_context(text, "12", 3);
        assert_eq!(ctx, "€€ 12 un");
    }

    #[test]
    fn newlines_become_spaces() {
        let ctx = get_context("Award of\n5,000\nunits", "5,000", 60);
        assert_eq!(ctx, "Award of 5,000 units");
    }

    #[test]
    fn first_occurrence_only() {
        let text = "3 apples here and later 3 years of vesting";
        let ctx = get_context(text, "3", 12);
        assert_eq!(ctx, "3 apples here");
    }

    #[test]
    fn strips_adjacent_list_index() {
        let text = "vesting in equal installments of 250\n4. The Company";
        let ctx = get_context(text, "250", 60);
        assert!(!ctx.contains(" 4"), "{ctx:?}");
    }

    #[test]
    fn keeps_decimal_and_grouped_numbers() {
        assert_eq!(
            get_context("paid 5.2 million", "paid", 60),
            "paid 5.2 million"
        );
        assert_eq!(
            get_context("paid 5,000 in cash", "paid", 60),
            "paid 5,000 in cash"
        );
    }

    #[test]
    fn keeps_number_followed_by_word() {
        let text = "over 3 years and 12 months thereafter";
        let ctx = get_context(text, "over", 60);
        assert_eq!(ctx, "over 3 years and 12 months thereafter");
    }

    #[test]
    fn strips_trailing_index_at_end_of_window() {
        let text = "The Award shall vest as follows:\n(1)";
        let ctx = get_context(text, "Award", 60);
        assert_eq!(ctx, "The Award shall vest as follows:");
    }

    #[test]
    fn strip_trailing_index_removes_stacked_artifacts() {
        assert_eq!(strip_trailing_index("terms 12 3"), "terms");
        assert_eq!(strip_trailing_index("terms (2) 3."), "terms");
        assert_eq!(strip_trailing_index("no digits here "), "no digits here ");
    }

    #[test]
    fn strip_is_idempotent() {
        for text in [
            "Section 4 (a) shares 10 11 (12)",
            "pay $1,000 on 7/1/2023 2.",
            "units 5.",
            "terms (2) 3.  ",
            "Award of 5,000",
        ] {
            let once = strip_trailing_index(text);
            assert_eq!(strip_trailing_index(once), once);
        }
    }

    #[test]
    fn strip_keeps_grouped_number_digits() {
        assert_eq!(strip_trailing_index("Award of 5,000"), "Award of 5,000");
        assert_eq!(strip_trailing_index("dated 7/1/2023"), "dated 7/1/2023");
    }

    #[test]
    fn trailing_numbers_are_stripped_up_to_the_target() {
        let text = "Section 4 (a) shares 10 11 (12)";
        assert_eq!(get_context(text, "11", 60), "Section 4 (a) shares");
        assert_eq!(get_context("vesting over 3", "3", 60), "vesting over");
        assert_eq!(get_context("Award of 5,000", "5,000", 60), "Award of 5,000");
    }

    #[test]
    fn context_is_a_fixed_point_of_strip() {
        let texts = [
            "Section 4 (a) shares 10 11 (12)",
            "vesting over 3",
            "pay $1,000 on 7/1/2023 2.",
            "The Award shall vest as follows:\n(1)",
            GRANT_PAGE,
            "Item 1. The Company shall pay 1,250 shares\n7. Next 8",
        ];
        for text in texts {
            for target in text.split_whitespace() {
                for window in [0, 3, 10, 60] {
                    let ctx = get_context(text, target, window);
                    assert_eq!(strip_trailing_index(&ctx), ctx, "{target} / {window}");
                }
            }
        }
    }
}
