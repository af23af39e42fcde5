// Database trait — backend-agnostic async interface for all DB operations.
//
// Implementors: SqliteDatabase (wraps rusqlite behind a Mutex, since
// rusqlite::Connection is not Send+Sync on its own). The trait mirrors the
// existing queries.rs function signatures, so the engines above it never
// touch SQL directly — they hold an `Arc<dyn Database>`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    AttributionMethod, ConfounderEvent, ConfounderImpact, ConfounderType, Creator, Fan,
    LabelSource, Metrics, RevenueEventType,
};
use super::queries::{CategoryDelta, DailyRollup, PostDelta};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    async fn table_count(&self) -> Result<i64>;

    // --- Creators ---

    async fn insert_creator(&self, name: &str, optimal_attribution_window_hours: i64) -> Result<i64>;

    async fn get_creator(&self, creator_id: i64) -> Result<Option<Creator>>;

    async fn creator_count(&self) -> Result<i64>;

    // --- Posts & snapshots ---

    #[allow(clippy::too_many_arguments)]
    async fn get_or_create_post(
        &self,
        creator_id: i64,
        platform: &str,
        external_post_id: &str,
        posted_at: DateTime<Utc>,
        category: &str,
        label_source: LabelSource,
    ) -> Result<i64>;

    async fn post_category(&self, post_id: i64) -> Result<String>;

    async fn post_count_in_window(
        &self,
        creator_id: i64,
        category: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<i64>;

    async fn snapshot_exists_identical(
        &self,
        post_id: i64,
        t: DateTime<Utc>,
        metrics: &Metrics,
    ) -> Result<bool>;

    async fn record_snapshot(
        &self,
        post_id: i64,
        creator_id: i64,
        t: DateTime<Utc>,
        metrics: &Metrics,
        import_ref: Option<&str>,
    ) -> Result<i64>;

    /// Per-post deltas for every post owned by `creator_id` over `[t0, t1)`.
    async fn delta_per_post(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<PostDelta>>;

    /// Aggregate per-category deltas over `[t0, t1)`.
    async fn delta_per_category(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<HashMap<String, CategoryDelta>>;

    // --- Fans ---

    async fn insert_fan(
        &self,
        creator_id: i64,
        acquired_at: DateTime<Utc>,
        external_id_hash: &str,
        referral_link_category_hint: Option<&str>,
    ) -> Result<i64>;

    async fn get_fans_in_window(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<Vec<Fan>>;

    async fn get_unattributed_fans(&self, creator_id: i64) -> Result<Vec<Fan>>;

    async fn update_fan_attribution(
        &self,
        fan_id: i64,
        category: &str,
        method: AttributionMethod,
        confidence: f64,
        weights: &HashMap<String, f64>,
    ) -> Result<()>;

    async fn count_fans_in_window(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<i64>;

    async fn count_fans_by_category_in_window(
        &self,
        creator_id: i64,
        category: &str,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<i64>;

    // --- Revenue ---

    #[allow(clippy::too_many_arguments)]
    async fn insert_revenue_event(
        &self,
        creator_id: i64,
        fan_id: i64,
        event_type: RevenueEventType,
        amount: f64,
        currency: &str,
        event_at: DateTime<Utc>,
    ) -> Result<i64>;

    async fn sum_revenue_in_window(
        &self,
        creator_id: i64,
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
    ) -> Result<f64>;

    // --- Confounders ---

    async fn insert_confounder(
        &self,
        creator_id: i64,
        event_type: ConfounderType,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
        impact: ConfounderImpact,
        description: &str,
    ) -> Result<i64>;

    async fn confounders_overlapping(
        &self,
        creator_id: i64,
        w_start: DateTime<Utc>,
        w_end: DateTime<Utc>,
    ) -> Result<Vec<ConfounderEvent>>;

    // --- Baseline rollups ---

    async fn daily_rollups(
        &self,
        creator_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyRollup>>;
}
