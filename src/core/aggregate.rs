//! Groups raw donation records into per-donor, per-category summaries.
//!
//! The caller is expected to pass approved records only; pending
//! submissions stay out of the public totals until approval.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::models::Donation;

/// One constituent donation inside an aggregate, in original record order.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub amount: i64,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct DonorAggregate {
    /// Display name as first seen; grouping uses the trimmed lowercase form.
    pub donor_name: String,
    /// Resolved category id, or `"unknown"` when the record points at a
    /// category that no longer exists.
    pub category_id: String,
    pub total: i64,
    pub history: Vec<HistoryEntry>,
    /// Latest donation date across the group; ties keep the first seen.
    pub last_date: NaiveDate,
    /// Notes of the last record folded into the group.
    pub last_notes: Option<String>,
}

pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Folds records into aggregates keyed by (normalized donor name, category).
/// Output order is unspecified beyond first-seen group order; sorting for
/// display is the caller's concern.
pub fn aggregate_donors(
    records: &[Donation],
    known_categories: &HashSet<String>,
) -> Vec<DonorAggregate> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<DonorAggregate> = Vec::new();

    for record in records {
        let category_id = if known_categories.contains(&record.category_id) {
            record.category_id.clone()
        } else {
            UNKNOWN_CATEGORY.to_string()
        };
        let key = (
            record.donor_name.trim().to_lowercase(),
            category_id.clone(),
        );

        let slot = match index.get(&key).copied() {
            Some(i) => i,
            None => {
                out.push(DonorAggregate {
                    donor_name: record.donor_name.trim().to_string(),
                    category_id,
                    total: 0,
                    history: Vec::new(),
                    last_date: record.donated_on,
                    last_notes: None,
                });
                index.insert(key, out.len() - 1);
                out.len() - 1
            }
        };

        let agg = &mut out[slot];
        agg.total += record.amount;
        agg.history.push(HistoryEntry {
            amount: record.amount,
            date: record.donated_on,
            notes: record.notes.clone(),
        });
        // Strictly-greater keeps the first-seen date on ties.
        if record.donated_on > agg.last_date {
            agg.last_date = record.donated_on;
        }
        agg.last_notes = record.notes.clone();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn donation(name: &str, category: &str, amount: i64, day: u32) -> Donation {
        Donation {
            id: format!("d-{name}-{amount}-{day}"),
            donor_name: name.to_string(),
            amount,
            donated_on: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            category_id: category.to_string(),
            notes: None,
            status: crate::db::models::STATUS_APPROVED.to_string(),
            created_at: Utc::now(),
        }
    }

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_case_insensitively_and_sums() {
        let records = vec![
            donation("Ram", "cat-1", 500, 1),
            donation("ram", "cat-1", 300, 2),
        ];
        let aggregates = aggregate_donors(&records, &known(&["cat-1"]));
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].donor_name, "Ram");
        assert_eq!(aggregates[0].total, 800);
        assert_eq!(aggregates[0].history.len(), 2);
    }

    #[test]
    fn same_donor_in_two_categories_stays_split() {
        let records = vec![
            donation("Sita", "cat-1", 100, 1),
            donation("Sita", "cat-2", 200, 1),
        ];
        let aggregates = aggregate_donors(&records, &known(&["cat-1", "cat-2"]));
        assert_eq!(aggregates.len(), 2);
    }

    #[test]
    fn missing_category_groups_under_unknown() {
        let records = vec![donation("Mohan", "gone", 50, 1)];
        let aggregates = aggregate_donors(&records, &known(&["cat-1"]));
        assert_eq!(aggregates[0].category_id, UNKNOWN_CATEGORY);
    }

    #[test]
    fn zero_amount_donor_still_appears() {
        let records = vec![donation("Gita", "cat-1", 0, 1)];
        let aggregates = aggregate_donors(&records, &known(&["cat-1"]));
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].total, 0);
    }

    #[test]
    fn duplicate_amounts_both_land_in_history() {
        let records = vec![
            donation("Ravi", "cat-1", 100, 1),
            donation("Ravi", "cat-1", 100, 1),
        ];
        let aggregates = aggregate_donors(&records, &known(&["cat-1"]));
        assert_eq!(aggregates[0].history.len(), 2);
        assert_eq!(aggregates[0].total, 200);
    }

    #[test]
    fn last_date_is_running_max() {
        let records = vec![
            donation("Asha", "cat-1", 10, 5),
            donation("Asha", "cat-1", 20, 2),
            donation("Asha", "cat-1", 30, 9),
        ];
        let aggregates = aggregate_donors(&records, &known(&["cat-1"]));
        assert_eq!(
            aggregates[0].last_date,
            NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
        );
    }

    #[test]
    fn last_notes_follow_record_order_not_date_order() {
        let mut first = donation("Asha", "cat-1", 10, 9);
        first.notes = Some("early".to_string());
        let mut second = donation("Asha", "cat-1", 20, 2);
        second.notes = Some("late".to_string());
        let aggregates = aggregate_donors(&[first, second], &known(&["cat-1"]));
        assert_eq!(aggregates[0].last_notes.as_deref(), Some("late"));
    }

    #[test]
    fn totals_conserve_per_category() {
        let records = vec![
            donation("A", "cat-1", 500, 1),
            donation("a", "cat-1", 300, 2),
            donation("B", "cat-1", 0, 3),
            donation("C", "cat-2", 250, 4),
        ];
        let aggregates = aggregate_donors(&records, &known(&["cat-1", "cat-2"]));

        for category in ["cat-1", "cat-2"] {
            let aggregate_sum: i64 = aggregates
                .iter()
                .filter(|a| a.category_id == category)
                .map(|a| a.total)
                .sum();
            let record_sum: i64 = records
                .iter()
                .filter(|r| r.category_id == category)
                .map(|r| r.amount)
                .sum();
            assert_eq!(aggregate_sum, record_sum, "category {category}");
        }
    }
}
