//! Category display-order management.
//!
//! Order keys are plain integers with no contiguity guarantee; moving a
//! category exchanges its key with the adjacent neighbour instead of
//! renumbering the whole list, so a move is always two writes.

use crate::db::models::Category;

/// Ascending by order key, creation time breaking ties.
pub fn sort_for_display(mut categories: Vec<Category>) -> Vec<Category> {
    categories.sort_by(|a, b| {
        a.order_key
            .cmp(&b.order_key)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    categories
}

/// Key for a newly created category: one past the current maximum.
pub fn next_order_key(categories: &[Category]) -> i64 {
    categories
        .iter()
        .map(|c| c.order_key)
        .max()
        .map_or(1, |max| max + 1)
}

/// A planned `(category id, new order key)` write.
pub type KeyAssignment = (String, i64);

/// Plans the swap that moves `id` one position earlier in the display
/// order. Returns `None` when the category is already first or not in the
/// snapshot at all.
pub fn plan_move_up(categories: &[Category], id: &str) -> Option<[KeyAssignment; 2]> {
    let ordered = sort_for_display(categories.to_vec());
    let position = ordered.iter().position(|c| c.id == id)?;
    if position == 0 {
        return None;
    }
    let previous = &ordered[position - 1];
    let current = &ordered[position];
    Some([
        (current.id.clone(), previous.order_key),
        (previous.id.clone(), current.order_key),
    ])
}

/// Mirror of [`plan_move_up`] towards the end of the list.
pub fn plan_move_down(categories: &[Category], id: &str) -> Option<[KeyAssignment; 2]> {
    let ordered = sort_for_display(categories.to_vec());
    let position = ordered.iter().position(|c| c.id == id)?;
    if position + 1 >= ordered.len() {
        return None;
    }
    let next = &ordered[position + 1];
    let current = &ordered[position];
    Some([
        (current.id.clone(), next.order_key),
        (next.id.clone(), current.order_key),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn category(id: &str, order_key: i64, created_minute: u32) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            order_key,
            created_at: Utc
                .with_ymd_and_hms(2025, 1, 1, 10, created_minute, 0)
                .unwrap(),
        }
    }

    fn ids(categories: &[Category]) -> Vec<&str> {
        categories.iter().map(|c| c.id.as_str()).collect()
    }

    fn apply(categories: &mut [Category], assignments: [KeyAssignment; 2]) {
        for (id, key) in assignments {
            if let Some(c) = categories.iter_mut().find(|c| c.id == id) {
                c.order_key = key;
            }
        }
    }

    #[test]
    fn display_sort_breaks_key_ties_by_creation_time() {
        let list = vec![category("b", 2, 5), category("a", 2, 1), category("c", 1, 9)];
        let sorted = sort_for_display(list);
        assert_eq!(ids(&sorted), vec!["c", "a", "b"]);
    }

    #[test]
    fn next_key_is_max_plus_one_and_defaults_to_one() {
        assert_eq!(next_order_key(&[]), 1);
        let list = vec![category("a", 3, 0), category("b", 7, 1)];
        assert_eq!(next_order_key(&list), 8);
    }

    #[test]
    fn move_up_on_first_is_a_noop() {
        let list = vec![category("a", 1, 0), category("b", 2, 1)];
        assert!(plan_move_up(&list, "a").is_none());
    }

    #[test]
    fn move_down_on_last_is_a_noop() {
        let list = vec![category("a", 1, 0), category("b", 2, 1)];
        assert!(plan_move_down(&list, "b").is_none());
    }

    #[test]
    fn unknown_id_plans_nothing() {
        let list = vec![category("a", 1, 0)];
        assert!(plan_move_up(&list, "zzz").is_none());
        assert!(plan_move_down(&list, "zzz").is_none());
    }

    #[test]
    fn move_up_swaps_only_the_adjacent_pair() {
        let mut list = vec![category("a", 1, 0), category("b", 2, 1), category("c", 3, 2)];
        let plan = plan_move_up(&list, "c").expect("plan");
        apply(&mut list, plan);
        assert_eq!(ids(&sort_for_display(list.clone())), vec!["a", "c", "b"]);
        // "a" kept its key untouched.
        assert_eq!(list.iter().find(|c| c.id == "a").unwrap().order_key, 1);
    }

    #[test]
    fn move_up_then_down_restores_the_order() {
        let mut list = vec![category("a", 1, 0), category("b", 2, 1), category("c", 3, 2)];
        let original = ids(&sort_for_display(list.clone()))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let up = plan_move_up(&list, "b").expect("up");
        apply(&mut list, up);
        let down = plan_move_down(&list, "b").expect("down");
        apply(&mut list, down);

        assert_eq!(ids(&sort_for_display(list)), original);
    }

    #[test]
    fn swaps_work_over_non_contiguous_keys() {
        let mut list = vec![category("a", 10, 0), category("b", 40, 1)];
        let plan = plan_move_up(&list, "b").expect("plan");
        apply(&mut list, plan);
        let sorted = sort_for_display(list);
        assert_eq!(ids(&sorted), vec!["b", "a"]);
        assert_eq!(sorted[0].order_key, 10);
        assert_eq!(sorted[1].order_key, 40);
    }
}
