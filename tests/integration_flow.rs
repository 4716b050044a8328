use std::collections::HashSet;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use mandir_ledger::core::aggregate::aggregate_donors;
use mandir_ledger::core::ordering;
use mandir_ledger::db::{self, models};

fn temp_pool() -> db::DbPool {
    let path = std::env::temp_dir().join(format!("mandir-test-{}.db", Uuid::new_v4()));
    db::init_pool_at(path.to_str().expect("utf8 path")).expect("init pool")
}

#[tokio::test]
async fn donation_lifecycle_and_audit_flow() {
    let pool = temp_pool();
    let base = Utc::now();

    // Two categories in creation order
    let annadaan = Uuid::new_v4().to_string();
    let bhandara = Uuid::new_v4().to_string();
    let existing = db::list_categories(&pool).await.expect("list categories");
    assert_eq!(ordering::next_order_key(&existing), 1);
    db::create_category(&pool, &annadaan, "Annadaan", 1, base)
        .await
        .expect("create category");
    db::create_category(&pool, &bhandara, "Bhandara", 2, base + Duration::seconds(1))
        .await
        .expect("create category");

    let date = NaiveDate::from_ymd_opt(2026, 2, 18).expect("valid date");
    db::add_donation(
        &pool,
        &Uuid::new_v4().to_string(),
        "Ram",
        500,
        date,
        &annadaan,
        &Some("first visit".to_string()),
        models::STATUS_APPROVED,
        base,
    )
    .await
    .expect("add_donation");
    db::add_donation(
        &pool,
        &Uuid::new_v4().to_string(),
        "ram",
        300,
        date,
        &annadaan,
        &None,
        models::STATUS_APPROVED,
        base + Duration::seconds(1),
    )
    .await
    .expect("add_donation");
    // A pledge: committed but nothing paid yet
    db::add_donation(
        &pool,
        &Uuid::new_v4().to_string(),
        "Gita",
        0,
        date,
        &bhandara,
        &None,
        models::STATUS_APPROVED,
        base + Duration::seconds(2),
    )
    .await
    .expect("add_donation");

    // Sub-admin submission waits for approval and stays out of the totals
    let pending_id = Uuid::new_v4().to_string();
    db::add_donation(
        &pool,
        &pending_id,
        "Shyam",
        1000,
        date,
        &bhandara,
        &None,
        models::STATUS_PENDING,
        base + Duration::seconds(3),
    )
    .await
    .expect("add_donation");

    let approved = db::list_donations(&pool, Some(models::STATUS_APPROVED))
        .await
        .expect("list approved");
    assert_eq!(approved.len(), 3);

    assert!(db::approve_donation(&pool, &pending_id).await.expect("approve"));
    // The transition is one-way; a second approval changes nothing
    assert!(!db::approve_donation(&pool, &pending_id).await.expect("approve again"));

    let approved = db::list_donations(&pool, Some(models::STATUS_APPROVED))
        .await
        .expect("list approved");
    assert_eq!(approved.len(), 4);

    // Aggregate and check the conservation law per category
    let known: HashSet<String> = [annadaan.clone(), bhandara.clone()].into_iter().collect();
    let aggregates = aggregate_donors(&approved, &known);

    let ram = aggregates
        .iter()
        .find(|a| a.donor_name == "Ram")
        .expect("Ram aggregate");
    assert_eq!(ram.total, 800);
    assert_eq!(ram.history.len(), 2);
    assert_eq!(ram.history[0].amount, 500);
    assert_eq!(ram.last_notes, None);

    for category in [&annadaan, &bhandara] {
        let aggregate_sum: i64 = aggregates
            .iter()
            .filter(|a| &a.category_id == category)
            .map(|a| a.total)
            .sum();
        let record_sum: i64 = approved
            .iter()
            .filter(|d| &d.category_id == category)
            .map(|d| d.amount)
            .sum();
        assert_eq!(aggregate_sum, record_sum);
    }

    // Annadaan is referenced, so the caller must see the blocking count
    let blocking = db::count_donations_for_category(&pool, &annadaan)
        .await
        .expect("count");
    assert_eq!(blocking, 2);

    // An unreferenced category deletes cleanly
    let spare = Uuid::new_v4().to_string();
    db::create_category(&pool, &spare, "Spare", 3, base + Duration::seconds(4))
        .await
        .expect("create category");
    assert_eq!(
        db::count_donations_for_category(&pool, &spare).await.expect("count"),
        0
    );
    assert!(db::delete_category(&pool, &spare).await.expect("delete"));

    // Activity entries are appended and retrievable, newest first
    db::log_activity(
        &pool,
        &Uuid::new_v4().to_string(),
        "donation_approved",
        "donations",
        Some(&pending_id),
        "Approved donation by Shyam",
        "admin",
        "admin",
        "127.0.0.1",
    )
    .await
    .expect("log_activity");

    let logs = db::list_activity_logs(&pool, None).await.expect("list logs");
    assert!(!logs.is_empty());
    assert_eq!(logs[0].action, "donation_approved");
    assert_eq!(logs[0].entity_id.as_deref(), Some(pending_id.as_str()));
}

#[tokio::test]
async fn category_moves_swap_keys_and_round_trip() {
    let pool = temp_pool();
    let base = Utc::now();

    let ids: Vec<String> = (0..3).map(|_| Uuid::new_v4().to_string()).collect();
    for (i, id) in ids.iter().enumerate() {
        db::create_category(
            &pool,
            id,
            &format!("Category {}", i + 1),
            (i + 1) as i64,
            base + Duration::seconds(i as i64),
        )
        .await
        .expect("create category");
    }

    let categories = db::list_categories(&pool).await.expect("list");
    let original: Vec<String> = ordering::sort_for_display(categories.clone())
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(original, ids);

    // First element cannot move further up
    assert!(ordering::plan_move_up(&categories, &ids[0]).is_none());
    // Last element cannot move further down
    assert!(ordering::plan_move_down(&categories, &ids[2]).is_none());

    // Move the middle element up, then back down
    let up = ordering::plan_move_up(&categories, &ids[1]).expect("plan up");
    db::swap_category_order(&pool, up).await.expect("swap");

    let moved = db::list_categories(&pool).await.expect("list");
    let after_up: Vec<String> = ordering::sort_for_display(moved.clone())
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(after_up, vec![ids[1].clone(), ids[0].clone(), ids[2].clone()]);

    let down = ordering::plan_move_down(&moved, &ids[1]).expect("plan down");
    db::swap_category_order(&pool, down).await.expect("swap");

    let restored = db::list_categories(&pool).await.expect("list");
    let after_down: Vec<String> = ordering::sort_for_display(restored)
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(after_down, original);
}

#[tokio::test]
async fn subadmin_accounts_round_trip_and_reject_duplicates() {
    let pool = temp_pool();

    let account = models::SubAdmin {
        id: Uuid::new_v4().to_string(),
        username: "ramu".to_string(),
        secret: "seva123".to_string(),
        can_add: true,
        can_edit: false,
        can_delete: false,
        can_manage_categories: false,
        assigned_categories: vec!["cat-a".to_string()],
        created_at: Utc::now(),
    };
    db::create_subadmin(&pool, &account).await.expect("create");

    // Unique username is enforced by the schema
    let duplicate = models::SubAdmin {
        id: Uuid::new_v4().to_string(),
        ..account.clone()
    };
    assert!(db::create_subadmin(&pool, &duplicate).await.is_err());

    let fetched = db::find_subadmin_by_username(&pool, "ramu")
        .await
        .expect("find")
        .expect("account exists");
    assert_eq!(fetched.id, account.id);
    assert!(fetched.can_add);
    assert!(!fetched.can_edit);
    assert_eq!(fetched.assigned_categories, vec!["cat-a".to_string()]);

    let changed = db::update_subadmin(
        &pool,
        &account.id,
        None,
        None,
        None,
        Some(true),
        None,
        None,
        Some(Vec::new()),
    )
    .await
    .expect("update");
    assert!(changed);

    let fetched = db::get_subadmin(&pool, &account.id)
        .await
        .expect("get")
        .expect("account exists");
    assert!(fetched.can_edit);
    assert!(fetched.assigned_categories.is_empty());

    assert!(db::delete_subadmin(&pool, &account.id).await.expect("delete"));
    assert!(db::get_subadmin(&pool, &account.id)
        .await
        .expect("get")
        .is_none());
}

#[tokio::test]
async fn settings_singleton_updates_partially() {
    let pool = temp_pool();

    let settings = db::get_settings(&pool).await.expect("settings");
    assert_eq!(settings.view_mode, "list");
    assert!(!settings.community_enabled);

    db::update_settings(&pool, Some("grouped".to_string()), Some(true), None, None, None)
        .await
        .expect("update settings");

    let settings = db::get_settings(&pool).await.expect("settings");
    assert_eq!(settings.view_mode, "grouped");
    assert!(settings.community_enabled);
    // Untouched fields keep their values
    assert!(settings.show_dates);
}
