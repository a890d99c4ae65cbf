use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{GroupedRecords, TokenRecord};

/// How records are partitioned into per-page batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// Keep every record.
    #[default]
    All,
    /// One record per distinct value per page; the last occurrence's context
    /// and label win, the first occurrence's position is kept.
    DedupLastWins,
}

pub fn group_records(records: &[TokenRecord], policy: GroupingPolicy) -> GroupedRecords {
    match policy {
        GroupingPolicy::All => group_by_page(records),
        GroupingPolicy::DedupLastWins => group_by_page_dedup(records),
    }
}

/// Partition records by page number, preserving order within each page.
pub fn group_by_page(records: &[TokenRecord]) -> GroupedRecords {
    let mut grouped = GroupedRecords::new();
    for record in records {
        grouped
            .entry(record.page_number)
            .or_default()
            .push(record.clone());
    }
    grouped
}

/// Partition records by page number, collapsing repeated values on a page.
pub fn group_by_page_dedup(records: &[TokenRecord]) -> GroupedRecords {
    let mut grouped = GroupedRecords::new();
    let mut positions: HashMap<(u32, &str), usize> = HashMap::new();

    for record in records {
        let page = grouped.entry(record.page_number).or_default();
        match positions.get(&(record.page_number, record.value.as_str())) {
            Some(&i) => page[i] = record.clone(),
            None => {
                positions.insert((record.page_number, record.value.as_str()), page.len());
                page.push(record.clone());
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyntaxLabel;

    fn rec(page: u32, value: &str, context: &str, label: SyntaxLabel) -> TokenRecord {
        TokenRecord {
            value: value.into(),
            page_number: page,
            context: context.into(),
            syntax_label: label,
        }
    }

    fn sample() -> Vec<TokenRecord> {
        vec![
            rec(1, "100", "grant of 100 shares", SyntaxLabel::GrantedUnits),
            rec(2, "3", "over 3 years", SyntaxLabel::TimePeriod),
            rec(1, "15%", "a 15% bonus", SyntaxLabel::Percentage),
            rec(1, "100", "another 100 things", SyntaxLabel::Unknown),
            rec(5, "$10", "$10 fee", SyntaxLabel::Monetary),
        ]
    }

    #[test]
    fn one_key_per_page_and_sizes_sum() {
        let records = sample();
        let grouped = group_by_page(&records);
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1, 2, 5]);
        assert_eq!(grouped.values().map(Vec::len).sum::<usize>(), records.len());
    }

    #[test]
    fn order_within_page_is_preserved() {
        let grouped = group_by_page(&sample());
        let page1: Vec<&str> = grouped[&1].iter().map(|r| r.value.as_str()).collect();
        assert_eq!(page1, vec!["100", "15%", "100"]);
    }

    #[test]
    fn dedup_keeps_last_context_at_first_position() {
        let grouped = group_by_page_dedup(&sample());
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped.values().map(Vec::len).sum::<usize>(), 4);

        let page1 = &grouped[&1];
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].value, "100");
        assert_eq!(page1[0].context, "another 100 things");
        assert_eq!(page1[0].syntax_label, SyntaxLabel::Unknown);
        assert_eq!(page1[1].value, "15%");
    }

    #[test]
    fn dedup_is_per_page() {
        let records = vec![
            rec(1, "3", "over 3 years", SyntaxLabel::TimePeriod),
            rec(2, "3", "over 3 years", SyntaxLabel::TimePeriod),
        ];
        let grouped = group_by_page_dedup(&records);
        assert_eq!(grouped[&1].len(), 1);
        assert_eq!(grouped[&2].len(), 1);
    }

    #[test]
    fn policy_dispatch() {
        let records = sample();
        assert_eq!(group_records(&records, GroupingPolicy::All)[&1].len(), 3);
        assert_eq!(
            group_records(&records, GroupingPolicy::DedupLastWins)[&1].len(),
            2
        );
    }

    #[test]
    fn empty_input() {
        assert!(group_by_page(&[]).is_empty());
        assert!(group_by_page_dedup(&[]).is_empty());
    }
}
