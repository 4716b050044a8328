use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::env;

use chrono::{DateTime, NaiveDate, Utc};

pub mod models;

use models::{ActivityLog, Category, CommunityPost, Donation, Settings, SubAdmin};

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    order_key INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS donations (
    id TEXT PRIMARY KEY,
    donor_name TEXT NOT NULL,
    amount INTEGER NOT NULL DEFAULT 0,
    donated_on TEXT NOT NULL,
    category_id TEXT NOT NULL REFERENCES categories(id),
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'approved',
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS subadmins (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    secret TEXT NOT NULL,
    can_add INTEGER NOT NULL DEFAULT 0,
    can_edit INTEGER NOT NULL DEFAULT 0,
    can_delete INTEGER NOT NULL DEFAULT 0,
    can_manage_categories INTEGER NOT NULL DEFAULT 0,
    assigned_categories TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    view_mode TEXT NOT NULL DEFAULT 'list',
    community_enabled INTEGER NOT NULL DEFAULT 0,
    show_dates INTEGER NOT NULL DEFAULT 1,
    admin_username TEXT NOT NULL,
    admin_secret TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS activity_logs (
    id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id TEXT,
    details TEXT,
    actor_id TEXT NOT NULL,
    actor_kind TEXT NOT NULL,
    origin TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS community_posts (
    id TEXT PRIMARY KEY,
    alias TEXT,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

pub async fn init_pool() -> anyhow::Result<DbPool> {
    let path = env::var("DB_PATH").unwrap_or_else(|_| "data/mandir.db".to_string());
    init_pool_at(&path)
}

pub fn init_pool_at(path: &str) -> anyhow::Result<DbPool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        // Tolerate transient lock contention from parallel requests
        .max_size(10)
        .connection_timeout(std::time::Duration::from_secs(60))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    let conn = pool.get()?;
    run_migrations(&conn)?;

    Ok(pool)
}

pub fn run_migrations(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute_batch(SCHEMA)?;

    // Seed the settings singleton on first run. The admin credential comes
    // from the environment so a fresh deployment never ships a known secret.
    let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let admin_secret = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "changeme".to_string());
    conn.execute(
        "INSERT OR IGNORE INTO settings (id, view_mode, community_enabled, show_dates, admin_username, admin_secret)
         VALUES (1, 'list', 0, 1, ?1, ?2)",
        params![admin_username, admin_secret],
    )?;

    Ok(())
}

// ---- donations ----

fn donation_from_row(row: &Row) -> rusqlite::Result<Donation> {
    Ok(Donation {
        id: row.get(0)?,
        donor_name: row.get(1)?,
        amount: row.get(2)?,
        donated_on: row.get(3)?,
        category_id: row.get(4)?,
        notes: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const DONATION_COLUMNS: &str =
    "id, donor_name, amount, donated_on, category_id, notes, status, created_at";

pub async fn add_donation(
    pool: &DbPool,
    id: &str,
    donor_name: &str,
    amount: i64,
    donated_on: NaiveDate,
    category_id: &str,
    notes: &Option<String>,
    status: &str,
    created_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let pool = pool.clone();
    let id = id.to_string();
    let donor_name = donor_name.to_string();
    let category_id = category_id.to_string();
    let notes = notes.clone();
    let status = status.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO donations (id, donor_name, amount, donated_on, category_id, notes, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, donor_name, amount, donated_on, category_id, notes, status, created_at],
        )?;
        Ok(())
    })
    .await?
}

pub async fn update_donation(
    pool: &DbPool,
    id: &str,
    donor_name: Option<String>,
    amount: Option<i64>,
    donated_on: Option<NaiveDate>,
    category_id: Option<String>,
    notes: &Option<String>,
) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    let notes = notes.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute(
            "UPDATE donations SET
                donor_name = COALESCE(?1, donor_name),
                amount = COALESCE(?2, amount),
                donated_on = COALESCE(?3, donated_on),
                category_id = COALESCE(?4, category_id),
                notes = COALESCE(?5, notes)
             WHERE id = ?6",
            params![donor_name, amount, donated_on, category_id, notes, id],
        )?;
        Ok(changed > 0)
    })
    .await?
}

pub async fn delete_donation(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute("DELETE FROM donations WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
    .await?
}

/// Approval is one-way; the WHERE clause refuses a second transition.
pub async fn approve_donation(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute(
            "UPDATE donations SET status = 'approved' WHERE id = ?1 AND status = 'pending'",
            params![id],
        )?;
        Ok(changed > 0)
    })
    .await?
}

pub async fn get_donation(pool: &DbPool, id: &str) -> anyhow::Result<Option<Donation>> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Donation>> {
        let conn = pool.get()?;
        let donation = conn
            .query_row(
                &format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"),
                params![id],
                donation_from_row,
            )
            .optional()?;
        Ok(donation)
    })
    .await?
}

/// Insertion order (creation time) so aggregate histories read in the order
/// the records were entered.
pub async fn list_donations(pool: &DbPool, status: Option<&str>) -> anyhow::Result<Vec<Donation>> {
    let pool = pool.clone();
    let status = status.map(|s| s.to_string());
    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Donation>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![status], donation_from_row)?;
        let donations = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(donations)
    })
    .await?
}

pub async fn count_donations_for_category(pool: &DbPool, category_id: &str) -> anyhow::Result<i64> {
    let pool = pool.clone();
    let category_id = category_id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<i64> {
        let conn = pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM donations WHERE category_id = ?1",
            params![category_id],
            |row| row.get(0),
        )?;
        Ok(count)
    })
    .await?
}

// ---- categories ----

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        order_key: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub async fn create_category(
    pool: &DbPool,
    id: &str,
    name: &str,
    order_key: i64,
    created_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let pool = pool.clone();
    let id = id.to_string();
    let name = name.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO categories (id, name, order_key, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, order_key, created_at],
        )?;
        Ok(())
    })
    .await?
}

pub async fn rename_category(pool: &DbPool, id: &str, name: &str) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    let name = name.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute(
            "UPDATE categories SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok(changed > 0)
    })
    .await?
}

pub async fn delete_category(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
    .await?
}

pub async fn get_category(pool: &DbPool, id: &str) -> anyhow::Result<Option<Category>> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Category>> {
        let conn = pool.get()?;
        let category = conn
            .query_row(
                "SELECT id, name, order_key, created_at FROM categories WHERE id = ?1",
                params![id],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    })
    .await?
}

pub async fn list_categories(pool: &DbPool) -> anyhow::Result<Vec<Category>> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Category>> {
        let conn = pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, name, order_key, created_at FROM categories")?;
        let rows = stmt.query_map([], category_from_row)?;
        let categories = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    })
    .await?
}

pub async fn set_category_order(pool: &DbPool, id: &str, order_key: i64) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute(
            "UPDATE categories SET order_key = ?1 WHERE id = ?2",
            params![order_key, id],
        )?;
        Ok(changed > 0)
    })
    .await?
}

/// Applies both halves of an order-key swap in one transaction so a move
/// never leaves a half-exchanged pair behind.
pub async fn swap_category_order(
    pool: &DbPool,
    assignments: [(String, i64); 2],
) -> anyhow::Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        for (id, order_key) in &assignments {
            tx.execute(
                "UPDATE categories SET order_key = ?1 WHERE id = ?2",
                params![order_key, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    })
    .await?
}

// ---- sub-admins ----

fn subadmin_from_row(row: &Row) -> rusqlite::Result<SubAdmin> {
    let assigned_raw: String = row.get(7)?;
    Ok(SubAdmin {
        id: row.get(0)?,
        username: row.get(1)?,
        secret: row.get(2)?,
        can_add: row.get(3)?,
        can_edit: row.get(4)?,
        can_delete: row.get(5)?,
        can_manage_categories: row.get(6)?,
        assigned_categories: serde_json::from_str(&assigned_raw).unwrap_or_default(),
        created_at: row.get(8)?,
    })
}

const SUBADMIN_COLUMNS: &str = "id, username, secret, can_add, can_edit, can_delete, can_manage_categories, assigned_categories, created_at";

pub async fn create_subadmin(pool: &DbPool, account: &SubAdmin) -> anyhow::Result<()> {
    let pool = pool.clone();
    let account = account.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = pool.get()?;
        let assigned = serde_json::to_string(&account.assigned_categories)?;
        conn.execute(
            "INSERT INTO subadmins (id, username, secret, can_add, can_edit, can_delete, can_manage_categories, assigned_categories, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                account.id,
                account.username,
                account.secret,
                account.can_add,
                account.can_edit,
                account.can_delete,
                account.can_manage_categories,
                assigned,
                account.created_at,
            ],
        )?;
        Ok(())
    })
    .await?
}

#[allow(clippy::too_many_arguments)]
pub async fn update_subadmin(
    pool: &DbPool,
    id: &str,
    username: Option<String>,
    secret: Option<String>,
    can_add: Option<bool>,
    can_edit: Option<bool>,
    can_delete: Option<bool>,
    can_manage_categories: Option<bool>,
    assigned_categories: Option<Vec<String>>,
) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let assigned = match assigned_categories {
            Some(list) => Some(serde_json::to_string(&list)?),
            None => None,
        };
        let changed = conn.execute(
            "UPDATE subadmins SET
                username = COALESCE(?1, username),
                secret = COALESCE(?2, secret),
                can_add = COALESCE(?3, can_add),
                can_edit = COALESCE(?4, can_edit),
                can_delete = COALESCE(?5, can_delete),
                can_manage_categories = COALESCE(?6, can_manage_categories),
                assigned_categories = COALESCE(?7, assigned_categories)
             WHERE id = ?8",
            params![username, secret, can_add, can_edit, can_delete, can_manage_categories, assigned, id],
        )?;
        Ok(changed > 0)
    })
    .await?
}

pub async fn delete_subadmin(pool: &DbPool, id: &str) -> anyhow::Result<bool> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let conn = pool.get()?;
        let changed = conn.execute("DELETE FROM subadmins WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
    .await?
}

pub async fn get_subadmin(pool: &DbPool, id: &str) -> anyhow::Result<Option<SubAdmin>> {
    let pool = pool.clone();
    let id = id.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Option<SubAdmin>> {
        let conn = pool.get()?;
        let account = conn
            .query_row(
                &format!("SELECT {SUBADMIN_COLUMNS} FROM subadmins WHERE id = ?1"),
                params![id],
                subadmin_from_row,
            )
            .optional()?;
        Ok(account)
    })
    .await?
}

pub async fn find_subadmin_by_username(
    pool: &DbPool,
    username: &str,
) -> anyhow::Result<Option<SubAdmin>> {
    let pool = pool.clone();
    let username = username.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Option<SubAdmin>> {
        let conn = pool.get()?;
        let account = conn
            .query_row(
                &format!("SELECT {SUBADMIN_COLUMNS} FROM subadmins WHERE username = ?1"),
                params![username],
                subadmin_from_row,
            )
            .optional()?;
        Ok(account)
    })
    .await?
}

pub async fn list_subadmins(pool: &DbPool) -> anyhow::Result<Vec<SubAdmin>> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<SubAdmin>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBADMIN_COLUMNS} FROM subadmins ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map([], subadmin_from_row)?;
        let accounts = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    })
    .await?
}

// ---- settings ----

pub async fn get_settings(pool: &DbPool) -> anyhow::Result<Settings> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Settings> {
        let conn = pool.get()?;
        let settings = conn.query_row(
            "SELECT view_mode, community_enabled, show_dates, admin_username, admin_secret
             FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(Settings {
                    view_mode: row.get(0)?,
                    community_enabled: row.get(1)?,
                    show_dates: row.get(2)?,
                    admin_username: row.get(3)?,
                    admin_secret: row.get(4)?,
                })
            },
        )?;
        Ok(settings)
    })
    .await?
}

pub async fn update_settings(
    pool: &DbPool,
    view_mode: Option<String>,
    community_enabled: Option<bool>,
    show_dates: Option<bool>,
    admin_username: Option<String>,
    admin_secret: Option<String>,
) -> anyhow::Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE settings SET
                view_mode = COALESCE(?1, view_mode),
                community_enabled = COALESCE(?2, community_enabled),
                show_dates = COALESCE(?3, show_dates),
                admin_username = COALESCE(?4, admin_username),
                admin_secret = COALESCE(?5, admin_secret)
             WHERE id = 1",
            params![view_mode, community_enabled, show_dates, admin_username, admin_secret],
        )?;
        Ok(())
    })
    .await?
}

// ---- activity log (append-only; no update or delete exists) ----

#[allow(clippy::too_many_arguments)]
pub async fn log_activity(
    pool: &DbPool,
    id: &str,
    action: &str,
    entity: &str,
    entity_id: Option<&str>,
    details: &str,
    actor_id: &str,
    actor_kind: &str,
    origin: &str,
) -> anyhow::Result<()> {
    let pool = pool.clone();
    let id = id.to_string();
    let action = action.to_string();
    let entity = entity.to_string();
    let entity_id = entity_id.map(|s| s.to_string());
    let details = details.to_string();
    let actor_id = actor_id.to_string();
    let actor_kind = actor_kind.to_string();
    let origin = origin.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO activity_logs (id, action, entity, entity_id, details, actor_id, actor_kind, origin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![id, action, entity, entity_id, details, actor_id, actor_kind, origin, Utc::now()],
        )?;
        Ok(())
    })
    .await?
}

pub async fn list_activity_logs(
    pool: &DbPool,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<Vec<ActivityLog>> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ActivityLog>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, action, entity, entity_id, details, actor_id, actor_kind, origin, created_at
             FROM activity_logs
             WHERE (?1 IS NULL OR created_at >= ?1)
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(ActivityLog {
                id: row.get(0)?,
                action: row.get(1)?,
                entity: row.get(2)?,
                entity_id: row.get(3)?,
                details: row.get(4)?,
                actor_id: row.get(5)?,
                actor_kind: row.get(6)?,
                origin: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;
        let logs = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    })
    .await?
}

// ---- community board ----

pub async fn add_community_post(
    pool: &DbPool,
    id: &str,
    alias: &Option<String>,
    message: &str,
    created_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let pool = pool.clone();
    let id = id.to_string();
    let alias = alias.clone();
    let message = message.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO community_posts (id, alias, message, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, alias, message, created_at],
        )?;
        Ok(())
    })
    .await?
}

pub async fn list_community_posts(pool: &DbPool, limit: i64) -> anyhow::Result<Vec<CommunityPost>> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<CommunityPost>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, alias, message, created_at FROM community_posts
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(CommunityPost {
                id: row.get(0)?,
                alias: row.get(1)?,
                message: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let posts = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    })
    .await?
}
