//! Append-only activity trail.
//!
//! Every successful mutating action records exactly one entry before the
//! response goes out. Recording is best-effort: a failed append is reported
//! to operator diagnostics and swallowed so the primary action still
//! completes. Nothing in the codebase updates or deletes these rows.

use uuid::Uuid;

use crate::db::{self, DbPool};

pub const KIND_ADMIN: &str = "admin";
pub const KIND_SUBADMIN: &str = "subadmin";
pub const KIND_ANONYMOUS: &str = "anonymous";

#[allow(clippy::too_many_arguments)]
pub async fn record(
    pool: &DbPool,
    action: &str,
    entity: &str,
    entity_id: Option<&str>,
    details: &str,
    actor_id: &str,
    actor_kind: &str,
    origin: &str,
) {
    let id = Uuid::new_v4().to_string();
    if let Err(e) = db::log_activity(
        pool, &id, action, entity, entity_id, details, actor_id, actor_kind, origin,
    )
    .await
    {
        tracing::warn!("activity log append failed ({} {}): {}", action, entity, e);
    }
}
