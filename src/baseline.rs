// BaselineBuilder — produces per-creator expected-rate models from a
// lookback window that ends strictly at the analysis window's start.
//
// Everything downstream (AttributionEngine, ConfidenceScorer) treats a
// Baseline as an opaque input; this module is the only place that touches
// historical rollups directly.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::db::Database;
use crate::error::Result;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 14;

const DEFAULT_SUBS_PER_DAY: f64 = 5.0;
const DEFAULT_REV_PER_DAY: f64 = 100.0;
const DEFAULT_SUBS_PER_1K_DELTA_VIEWS: f64 = 0.2;
const MIN_ROLLUPS_FOR_FITTED_BASELINE: usize = 3;

/// Expected-rate model for a creator, fit over the lookback window that
/// ends strictly at `baseline_end`.
#[derive(Debug, Clone)]
pub struct Baseline {
    pub subs_per_day: f64,
    pub rev_per_day: f64,
    pub subs_per_1k_delta_views: f64,
    pub data_days: i64,
    pub is_default: bool,
    /// Index 0 = Monday .. 6 = Sunday, matching `chrono::Weekday::num_days_from_monday`.
    pub dow_factors: [f64; 7],
}

impl Baseline {
    fn defaults(data_days: i64) -> Self {
        Self {
            subs_per_day: DEFAULT_SUBS_PER_DAY,
            rev_per_day: DEFAULT_REV_PER_DAY,
            subs_per_1k_delta_views: DEFAULT_SUBS_PER_1K_DELTA_VIEWS,
            data_days,
            is_default: true,
            dow_factors: [1.0; 7],
        }
    }
}

pub struct BaselineBuilder {
    db: Arc<dyn Database>,
    lookback_days: i64,
}

impl BaselineBuilder {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(db: Arc<dyn Database>, lookback_days: i64) -> Self {
        Self { db, lookback_days }
    }

    /// Fit a baseline for `creator_id` over `[baseline_end - lookback_days, baseline_end)`.
    /// Never reads data at or after `baseline_end`.
    pub async fn build(&self, creator_id: i64, baseline_end: DateTime<Utc>) -> Result<Baseline> {
        let baseline_start = baseline_end - Duration::days(self.lookback_days);
        let rollups = self
            .db
            .daily_rollups(creator_id, baseline_start, baseline_end)
            .await?;

        if rollups.len() < MIN_ROLLUPS_FOR_FITTED_BASELINE {
            return Ok(Baseline::defaults(rollups.len() as i64));
        }

        let n = rollups.len() as f64;
        let total_subs: i64 = rollups.iter().map(|r| r.new_subs).sum();
        let total_revenue: f64 = rollups.iter().map(|r| r.revenue).sum();
        let total_delta_views: i64 = rollups.iter().map(|r| r.delta_views).sum();

        let subs_per_day = total_subs as f64 / n;
        let rev_per_day = total_revenue / n;
        let subs_per_1k_delta_views = if total_delta_views > 0 {
            total_subs as f64 / (total_delta_views as f64 / 1000.0)
        } else {
            0.0
        };

        let mut dow_sums = [0.0f64; 7];
        let mut dow_counts = [0i64; 7];
        for r in &rollups {
            let idx = r.date.weekday().num_days_from_monday() as usize;
            dow_sums[idx] += r.new_subs as f64;
            dow_counts[idx] += 1;
        }

        let mut dow_factors = [1.0f64; 7];
        if subs_per_day > 0.0 {
            for d in 0..7 {
                if dow_counts[d] > 0 {
                    let mean_on_day = dow_sums[d] / dow_counts[d] as f64;
                    dow_factors[d] = mean_on_day / subs_per_day;
                }
            }
        }

        Ok(Baseline {
            subs_per_day,
            rev_per_day,
            subs_per_1k_delta_views,
            data_days: rollups.len() as i64,
            is_default: false,
            dow_factors,
        })
    }
}

/// Expected subscriber count over an arbitrary window, day-of-week adjusted.
///
/// Partitions `[w_start, w_end)` into contiguous calendar-day slices and
/// sums `subs_per_day * (hours_in_slice / 24) * dow_factor[weekday]` across
/// slices. Computing in fractional hours (rather than truncating to whole
/// days) avoids collapsing sub-24h windows to zero.
pub fn expected_subs_over_window(baseline: &Baseline, w_start: DateTime<Utc>, w_end: DateTime<Utc>) -> f64 {
    day_slices(w_start, w_end)
        .into_iter()
        .map(|(weekday, hours)| {
            let factor = baseline.dow_factors[weekday.num_days_from_monday() as usize];
            baseline.subs_per_day * (hours / 24.0) * factor
        })
        .sum()
}

/// Split `[w_start, w_end)` into `(weekday, hours)` slices, one per calendar
/// day the window touches.
fn day_slices(w_start: DateTime<Utc>, w_end: DateTime<Utc>) -> Vec<(Weekday, f64)> {
    let mut slices = Vec::new();
    let mut cursor = w_start;

    while cursor < w_end {
        let day_end = cursor
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            + Duration::days(1);
        let slice_end = day_end.min(w_end);
        let hours = (slice_end - cursor).num_milliseconds() as f64 / (1000.0 * 3600.0);
        if hours > 0.0 {
            slices.push((cursor.weekday(), hours));
        }
        cursor = slice_end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteDatabase;
    use rusqlite::Connection;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn test_db() -> Arc<dyn Database> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::create_tables(&conn).unwrap();
        Arc::new(SqliteDatabase::new(conn))
    }

    #[tokio::test]
    async fn falls_back_to_defaults_with_sparse_history() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let builder = BaselineBuilder::new(db);
        let baseline = builder.build(creator_id, t("2026-02-01T00:00:00Z")).await.unwrap();
        assert!(baseline.is_default);
        assert_eq!(baseline.subs_per_day, DEFAULT_SUBS_PER_DAY);
    }

    #[tokio::test]
    async fn never_reads_data_at_or_after_baseline_end() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        // Plenty of fans before baseline_end, plus one exactly at baseline_end
        // that must not leak in.
        for day in 1..=10 {
            db.insert_fan(
                creator_id,
                t(&format!("2026-01-{day:02}T12:00:00Z")),
                &format!("hash{day}"),
                None,
            )
            .await
            .unwrap();
        }
        db.insert_fan(creator_id, t("2026-01-15T00:00:00Z"), "hash_future", None)
            .await
            .unwrap();

        let builder = BaselineBuilder::new(db);
        let baseline = builder.build(creator_id, t("2026-01-15T00:00:00Z")).await.unwrap();
        assert!(!baseline.is_default);
        // 10 fans over a 14-day lookback that only contains 10 days of fans
        assert!(baseline.subs_per_day > 0.0);
        assert!(baseline.subs_per_day < 10.0 / 10.0 + 0.01 || baseline.data_days <= 14);
    }

    #[test]
    fn expected_subs_nonzero_for_sub_day_window() {
        let baseline = Baseline {
            subs_per_day: 8.0,
            rev_per_day: 0.0,
            subs_per_1k_delta_views: 0.0,
            data_days: 14,
            is_default: false,
            dow_factors: [1.0; 7],
        };
        let expected = expected_subs_over_window(
            &baseline,
            t("2026-01-05T00:00:00Z"),
            t("2026-01-05T18:00:00Z"),
        );
        assert!((expected - 6.0).abs() < 1e-9);
    }

    #[test]
    fn expected_subs_over_multi_day_window_sums_slices() {
        let baseline = Baseline {
            subs_per_day: 7.0,
            rev_per_day: 0.0,
            subs_per_1k_delta_views: 0.0,
            data_days: 14,
            is_default: false,
            dow_factors: [1.0; 7],
        };
        let expected = expected_subs_over_window(
            &baseline,
            t("2026-01-05T00:00:00Z"),
            t("2026-01-08T00:00:00Z"),
        );
        assert!((expected - 21.0).abs() < 1e-9);
    }
}
