use std::env;

fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Starting database migration...");

    let path = env::var("DB_PATH").unwrap_or_else(|_| "data/mandir.db".to_string());
    println!("Applying schema to {}", path);

    // The pool constructor runs the idempotent schema and seeds the
    // settings singleton, so standing it up once is the whole migration.
    let pool = mandir_ledger::db::init_pool_at(&path)?;
    let conn = pool.get()?;
    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    println!("Migration complete, {} tables present.", tables);

    Ok(())
}
