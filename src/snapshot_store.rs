// SnapshotStore — persists point-in-time metric observations per post and
// serves delta queries between arbitrary timestamps.
//
// This is the leaf of the dependency graph: BaselineBuilder and
// AttributionEngine both read through it, but it reads through nothing else.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::models::Metrics;
use crate::db::queries::{CategoryDelta, PostDelta};
use crate::db::Database;
use crate::error::{AnalyticsError, Result};

pub struct SnapshotStore {
    db: Arc<dyn Database>,
}

/// Whether a `record` call wrote a new row or matched an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    AlreadyRecorded,
}

impl SnapshotStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Append a snapshot, refreshing the post's latest cumulative counters.
    ///
    /// Fails with `InvalidMetrics` if any counter is negative. Succeeds
    /// idempotently if (post, t) duplicates an existing snapshot with
    /// identical values — no new row is written, no error is raised.
    pub async fn record(
        &self,
        post_id: i64,
        creator_id: i64,
        t: DateTime<Utc>,
        metrics: &Metrics,
        import_ref: Option<&str>,
    ) -> Result<RecordOutcome> {
        if metrics.has_negative() {
            let (field, value) = negative_field(metrics);
            return Err(AnalyticsError::InvalidMetrics {
                field: field.to_string(),
                value,
            });
        }

        if self.db.snapshot_exists_identical(post_id, t, metrics).await? {
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        self.db
            .record_snapshot(post_id, creator_id, t, metrics, import_ref)
            .await?;
        Ok(RecordOutcome::Created)
    }

    /// Per-post deltas over `[t0, t1)`.
    pub async fn delta_per_post(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<PostDelta>> {
        validate_window(t0, t1)?;
        Ok(self.db.delta_per_post(creator_id, t0, t1).await?)
    }

    /// Per-category aggregate deltas over `[t0, t1)`.
    pub async fn delta_per_category(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<HashMap<String, CategoryDelta>> {
        validate_window(t0, t1)?;
        Ok(self.db.delta_per_category(creator_id, t0, t1).await?)
    }
}

/// `w_end <= w_start` is always invalid. A window ending in the future is
/// allowed here (callers analysing "up to now" naturally do this); the
/// stricter future-window rejection lives in the attribution engine, which
/// knows the analysis clock.
fn validate_window(t0: DateTime<Utc>, t1: DateTime<Utc>) -> Result<()> {
    if t1 <= t0 {
        return Err(AnalyticsError::WindowInvalid {
            start: t0,
            end: t1,
            reason: "window end must be after window start".to_string(),
        });
    }
    Ok(())
}

fn negative_field(m: &Metrics) -> (&'static str, i64) {
    if m.views < 0 {
        ("views", m.views)
    } else if m.likes < 0 {
        ("likes", m.likes)
    } else if m.comments < 0 {
        ("comments", m.comments)
    } else if m.shares < 0 {
        ("shares", m.shares)
    } else {
        ("saves", m.saves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::LabelSource;
    use crate::db::sqlite::SqliteDatabase;
    use rusqlite::Connection;

    async fn test_store() -> (SnapshotStore, Arc<dyn Database>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::create_tables(&conn).unwrap();
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::new(conn));
        (SnapshotStore::new(db.clone()), db)
    }

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn record_rejects_negative_metrics() {
        let (store, db) = test_store().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let post_id = db
            .get_or_create_post(
                creator_id,
                "tiktok",
                "p1",
                t("2026-01-01T00:00:00Z"),
                "storytime",
                LabelSource::UserConfirmed,
            )
            .await
            .unwrap();

        let bad = Metrics {
            views: -5,
            ..Default::default()
        };
        let result = store
            .record(post_id, creator_id, t("2026-01-02T00:00:00Z"), &bad, None)
            .await;
        assert!(matches!(result, Err(AnalyticsError::InvalidMetrics { .. })));
    }

    #[tokio::test]
    async fn record_is_idempotent_on_identical_resubmission() {
        let (store, db) = test_store().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let post_id = db
            .get_or_create_post(
                creator_id,
                "tiktok",
                "p1",
                t("2026-01-01T00:00:00Z"),
                "storytime",
                LabelSource::UserConfirmed,
            )
            .await
            .unwrap();

        let metrics = Metrics {
            views: 1000,
            ..Default::default()
        };
        let first = store
            .record(post_id, creator_id, t("2026-01-02T00:00:00Z"), &metrics, None)
            .await
            .unwrap();
        assert_eq!(first, RecordOutcome::Created);

        let second = store
            .record(post_id, creator_id, t("2026-01-02T00:00:00Z"), &metrics, None)
            .await
            .unwrap();
        assert_eq!(second, RecordOutcome::AlreadyRecorded);
    }

    #[tokio::test]
    async fn delta_per_post_rejects_inverted_window() {
        let (store, db) = test_store().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let result = store
            .delta_per_post(creator_id, t("2026-01-10T00:00:00Z"), t("2026-01-01T00:00:00Z"))
            .await;
        assert!(matches!(result, Err(AnalyticsError::WindowInvalid { .. })));
    }

    #[tokio::test]
    async fn delta_per_category_buckets_other_without_dropping_it() {
        let (store, db) = test_store().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let post_id = db
            .get_or_create_post(
                creator_id,
                "tiktok",
                "p1",
                t("2026-01-01T00:00:00Z"),
                "other",
                LabelSource::MlSuggested,
            )
            .await
            .unwrap();
        db.record_snapshot(
            post_id,
            creator_id,
            t("2026-01-02T00:00:00Z"),
            &Metrics {
                views: 500,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let deltas = store
            .delta_per_category(creator_id, t("2026-01-01T00:00:00Z"), t("2026-01-03T00:00:00Z"))
            .await
            .unwrap();
        assert!(deltas.contains_key("other"));
        assert_eq!(deltas["other"].views_delta, 500);
    }
}
