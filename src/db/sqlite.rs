// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points — Rust enforces this because
// MutexGuard is !Send.
//
// The free functions in queries.rs remain unchanged so their own tests
// continue to exercise a raw Connection directly.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{
    AttributionMethod, ConfounderEvent, ConfounderImpact, ConfounderType, Creator, Fan,
    LabelSource, Metrics, RevenueEventType,
};
use super::queries::{CategoryDelta, DailyRollup, PostDelta};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn insert_creator(&self, name: &str, optimal_attribution_window_hours: i64) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_creator(&conn, name, optimal_attribution_window_hours)
    }

    async fn get_creator(&self, creator_id: i64) -> Result<Option<Creator>> {
        let conn = self.conn.lock().await;
        super::queries::get_creator(&conn, creator_id)
    }

    async fn creator_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::creator_count(&conn)
    }

    async fn get_or_create_post(
        &self,
        creator_id: i64,
        platform: &str,
        external_post_id: &str,
        posted_at: DateTime<Utc>,
        category: &str,
        label_source: LabelSource,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::get_or_create_post(
            &conn,
            creator_id,
            platform,
            external_post_id,
            posted_at,
            category,
            label_source,
        )
    }

    async fn post_category(&self, post_id: i64) -> Result<String> {
        let conn = self.conn.lock().await;
        super::queries::post_category(&conn, post_id)
    }

    async fn post_count_in_window(
        &self,
        creator_id: i64,
        category: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::post_count_in_window(&conn, creator_id, category, t0, t1)
    }

    async fn snapshot_exists_identical(
        &self,
        post_id: i64,
        t: DateTime<Utc>,
        metrics: &Metrics,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::snapshot_exists_identical(&conn, post_id, t, metrics)
    }

    async fn record_snapshot(
        &self,
        post_id: i64,
        creator_id: i64,
        t: DateTime<Utc>,
        metrics: &Metrics,
        import_ref: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        let id = super::queries::insert_snapshot(&conn, post_id, creator_id, t, metrics, import_ref)?;
        super::queries::update_post_latest_metrics(&conn, post_id, metrics, t)?;
        Ok(id)
    }

    async fn delta_per_post(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<PostDelta>> {
        let conn = self.conn.lock().await;
        super::queries::delta_per_post(&conn, creator_id, t0, t1)
    }

    async fn delta_per_category(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<HashMap<String, CategoryDelta>> {
        let conn = self.conn.lock().await;
        super::queries::delta_per_category(&conn, creator_id, t0, t1)
    }

    async fn insert_fan(
        &self,
        creator_id: i64,
        acquired_at: DateTime<Utc>,
        external_id_hash: &str,
        referral_link_category_hint: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_fan(
            &conn,
            creator_id,
            acquired_at,
            external_id_hash,
            referral_link_category_hint,
        )
    }

    async fn get_fans_in_window(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<Fan>> {
        let conn = self.conn.lock().await;
        super::queries::get_fans_in_window(&conn, creator_id, t0, t1)
    }

    async fn get_unattributed_fans(&self, creator_id: i64) -> Result<Vec<Fan>> {
        let conn = self.conn.lock().await;
        super::queries::get_unattributed_fans(&conn, creator_id)
    }

    async fn update_fan_attribution(
        &self,
        fan_id: i64,
        category: &str,
        method: AttributionMethod,
        confidence: f64,
        weights: &HashMap<String, f64>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::update_fan_attribution(&conn, fan_id, category, method, confidence, weights)
    }

    async fn count_fans_in_window(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::count_fans_in_window(&conn, creator_id, t0, t1)
    }

    async fn count_fans_by_category_in_window(
        &self,
        creator_id: i64,
        category: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::count_fans_by_category_in_window(&conn, creator_id, category, t0, t1)
    }

    async fn insert_revenue_event(
        &self,
        creator_id: i64,
        fan_id: i64,
        event_type: RevenueEventType,
        amount: f64,
        currency: &str,
        event_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_revenue_event(&conn, creator_id, fan_id, event_type, amount, currency, event_at)
    }

    async fn sum_revenue_in_window(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<f64> {
        let conn = self.conn.lock().await;
        super::queries::sum_revenue_in_window(&conn, creator_id, t0, t1)
    }

    async fn insert_confounder(
        &self,
        creator_id: i64,
        event_type: ConfounderType,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
        impact: ConfounderImpact,
        description: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_confounder(&conn, creator_id, event_type, start_at, end_at, impact, description)
    }

    async fn confounders_overlapping(
        &self,
        creator_id: i64,
        w_start: DateTime<Utc>,
        w_end: DateTime<Utc>,
    ) -> Result<Vec<ConfounderEvent>> {
        let conn = self.conn.lock().await;
        super::queries::confounders_overlapping(&conn, creator_id, w_start, w_end)
    }

    async fn daily_rollups(
        &self,
        creator_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyRollup>> {
        let conn = self.conn.lock().await;
        super::queries::daily_rollups(&conn, creator_id, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    async fn test_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteDatabase::new(conn)
    }

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = test_db().await;
        assert_eq!(db.table_count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_trait_creator_roundtrip() {
        let db = test_db().await;
        let id = db.insert_creator("talent_1", 48).await.unwrap();
        let creator = db.get_creator(id).await.unwrap().unwrap();
        assert_eq!(creator.name, "talent_1");
        assert_eq!(db.creator_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_trait_snapshot_and_delta() {
        let db = test_db().await;
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
        db.record_snapshot(
            post_id,
            creator_id,
            t("2026-01-02T00:00:00Z"),
            &Metrics {
                views: 10_000,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let deltas = db
            .delta_per_post(creator_id, t("2026-01-01T00:00:00Z"), t("2026-01-03T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].metrics_delta.views, 10_000);
    }

    #[tokio::test]
    async fn test_trait_fan_attribution_roundtrip() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let fan_id = db
            .insert_fan(creator_id, t("2026-01-01T00:00:00Z"), "hash1", None)
            .await
            .unwrap();

        let mut weights = HashMap::new();
        weights.insert("storytime".to_string(), 1.0);
        db.update_fan_attribution(fan_id, "storytime", AttributionMethod::WeightedWindow, 0.8, &weights)
            .await
            .unwrap();

        let fans = db
            .get_fans_in_window(creator_id, t("2026-01-01T00:00:00Z"), t("2026-01-02T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(fans.len(), 1);
        assert_eq!(fans[0].attributed_category.as_deref(), Some("storytime"));
        assert!(db.get_unattributed_fans(creator_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trait_confounder_overlap() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        db.insert_confounder(
            creator_id,
            ConfounderType::PriceChange,
            t("2026-01-10T00:00:00Z"),
            None,
            ConfounderImpact::High,
            "price bump".into(),
        )
        .await
        .unwrap();

        let overlapping = db
            .confounders_overlapping(creator_id, t("2026-01-01T00:00:00Z"), t("2026-01-31T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(overlapping.len(), 1);
    }
}
