// Database queries — CRUD and delta-reconstruction operations.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.
// Timestamps are stored as RFC3339 strings; SQLite's textual ordering of
// RFC3339 strings matches chronological ordering, so range queries against
// the stored TEXT columns are correct without a custom collation.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{
    ConfounderEvent, ConfounderImpact, ConfounderType, Creator, CreatorStatus, Fan, LabelSource,
    Metrics, RevenueEventType,
};

fn to_rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn from_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

// --- Creators ---

pub fn insert_creator(
    conn: &Connection,
    name: &str,
    optimal_attribution_window_hours: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO creators (name, optimal_attribution_window_hours, status)
         VALUES (?1, ?2, 'active')",
        params![name, optimal_attribution_window_hours],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_creator(conn: &Connection, creator_id: i64) -> Result<Option<Creator>> {
    let result = conn
        .query_row(
            "SELECT id, name, optimal_attribution_window_hours, status
             FROM creators WHERE id = ?1",
            params![creator_id],
            |row| {
                Ok(Creator {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    optimal_attribution_window_hours: row.get(2)?,
                    status: CreatorStatus::parse(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    Ok(result)
}

pub fn creator_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM creators", [], |row| row.get(0))?)
}

// --- Posts ---

/// Get the post id for (creator, platform, external_post_id), inserting a
/// fresh row (with zeroed counters) if it doesn't exist yet.
pub fn get_or_create_post(
    conn: &Connection,
    creator_id: i64,
    platform: &str,
    external_post_id: &str,
    posted_at: DateTime<Utc>,
    category: &str,
    label_source: LabelSource,
) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM social_posts WHERE creator_id = ?1 AND platform = ?2 AND external_post_id = ?3",
            params![creator_id, platform, external_post_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO social_posts
            (creator_id, platform, external_post_id, posted_at, category, label_source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            creator_id,
            platform,
            external_post_id,
            to_rfc3339(posted_at),
            category,
            label_source.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Refresh a post's latest cumulative counters and `last_snapshot_at`.
pub fn update_post_latest_metrics(
    conn: &Connection,
    post_id: i64,
    metrics: &Metrics,
    snapshot_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE social_posts
         SET views = ?1, likes = ?2, comments = ?3, shares = ?4, saves = ?5, last_snapshot_at = ?6
         WHERE id = ?7",
        params![
            metrics.views,
            metrics.likes,
            metrics.comments,
            metrics.shares,
            metrics.saves,
            to_rfc3339(snapshot_at),
            post_id,
        ],
    )?;
    Ok(())
}

pub fn post_category(conn: &Connection, post_id: i64) -> Result<String> {
    Ok(conn.query_row(
        "SELECT category FROM social_posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?)
}

/// (post_id, category, posted_at) for every post owned by a creator.
pub fn posts_for_creator(conn: &Connection, creator_id: i64) -> Result<Vec<(i64, String, DateTime<Utc>)>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, posted_at FROM social_posts WHERE creator_id = ?1",
    )?;
    let rows = stmt.query_map(params![creator_id], |row| {
        let posted_at: String = row.get(2)?;
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, posted_at))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, category, posted_at) = row?;
        out.push((id, category, from_rfc3339(&posted_at)?));
    }
    Ok(out)
}

/// Count of posts in a category published within `[t0, t1)`, used as the
/// "current posts/week" denominator for the weekly plan.
pub fn post_count_in_window(
    conn: &Connection,
    creator_id: i64,
    category: &str,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM social_posts
         WHERE creator_id = ?1 AND category = ?2 AND posted_at >= ?3 AND posted_at < ?4",
        params![creator_id, category, to_rfc3339(t0), to_rfc3339(t1)],
        |row| row.get(0),
    )?)
}

// --- Snapshots ---

/// The latest snapshot metrics at or before `t` for a post, or `None` if
/// the post has no snapshot that early (implicit zero per spec).
pub fn latest_snapshot_at_or_before(
    conn: &Connection,
    post_id: i64,
    t: DateTime<Utc>,
) -> Result<Option<Metrics>> {
    let result = conn
        .query_row(
            "SELECT views, likes, comments, shares, saves
             FROM post_snapshots
             WHERE post_id = ?1 AND snapshot_at <= ?2
             ORDER BY snapshot_at DESC
             LIMIT 1",
            params![post_id, to_rfc3339(t)],
            |row| {
                Ok(Metrics {
                    views: row.get(0)?,
                    likes: row.get(1)?,
                    comments: row.get(2)?,
                    shares: row.get(3)?,
                    saves: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(result)
}

/// Whether a post has *any* snapshot at or before `t`.
pub fn has_snapshot_at_or_before(conn: &Connection, post_id: i64, t: DateTime<Utc>) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM post_snapshots WHERE post_id = ?1 AND snapshot_at <= ?2)",
        params![post_id, to_rfc3339(t)],
        |row| row.get(0),
    )?)
}

/// Check whether an identical (post, t, metrics) snapshot already exists,
/// for idempotent re-imports.
pub fn snapshot_exists_identical(
    conn: &Connection,
    post_id: i64,
    t: DateTime<Utc>,
    metrics: &Metrics,
) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT views, likes, comments, shares, saves
             FROM post_snapshots WHERE post_id = ?1 AND snapshot_at = ?2",
            params![post_id, to_rfc3339(t)],
            |row| {
                Ok(Metrics {
                    views: row.get(0)?,
                    likes: row.get(1)?,
                    comments: row.get(2)?,
                    shares: row.get(3)?,
                    saves: row.get(4)?,
                })
            },
        )
        .optional()?
        .is_some_and(|existing| {
            existing.views == metrics.views
                && existing.likes == metrics.likes
                && existing.comments == metrics.comments
                && existing.shares == metrics.shares
                && existing.saves == metrics.saves
        }))
}

/// Append a snapshot row. Caller is responsible for the idempotency check
/// (`snapshot_exists_identical`) and for the negative-counter validation —
/// this function only writes.
pub fn insert_snapshot(
    conn: &Connection,
    post_id: i64,
    creator_id: i64,
    t: DateTime<Utc>,
    metrics: &Metrics,
    import_ref: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO post_snapshots
            (post_id, creator_id, snapshot_at, views, likes, comments, shares, saves, import_ref)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(post_id, snapshot_at) DO UPDATE SET
            views = ?4, likes = ?5, comments = ?6, shares = ?7, saves = ?8, import_ref = ?9",
        params![
            post_id,
            creator_id,
            to_rfc3339(t),
            metrics.views,
            metrics.likes,
            metrics.comments,
            metrics.shares,
            metrics.saves,
            import_ref,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Per-post deltas for every post owned by `creator` over `[t0, t1)`.
/// Posts with no snapshot at or before `t1` are omitted, per spec.
pub struct PostDelta {
    pub post_id: i64,
    pub category: String,
    pub posted_at: DateTime<Utc>,
    pub metrics_delta: Metrics,
}

pub fn delta_per_post(
    conn: &Connection,
    creator_id: i64,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<Vec<PostDelta>> {
    let posts = posts_for_creator(conn, creator_id)?;
    let mut out = Vec::new();

    for (post_id, category, posted_at) in posts {
        let s1 = match latest_snapshot_at_or_before(conn, post_id, t1)? {
            Some(m) => m,
            None => continue, // no snapshot at or before t1 -> omitted
        };
        let s0 = latest_snapshot_at_or_before(conn, post_id, t0)?.unwrap_or_default();
        let delta = s1.saturating_delta_from(&s0);
        out.push(PostDelta {
            post_id,
            category,
            posted_at,
            metrics_delta: delta,
        });
    }

    Ok(out)
}

/// Aggregate per-category deltas over `[t0, t1)`.
#[derive(Debug, Clone, Default)]
pub struct CategoryDelta {
    pub views_delta: i64,
    pub likes_delta: i64,
    pub posts_with_views: i64,
    pub post_ids: Vec<i64>,
}

pub fn delta_per_category(
    conn: &Connection,
    creator_id: i64,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<HashMap<String, CategoryDelta>> {
    let deltas = delta_per_post(conn, creator_id, t0, t1)?;
    let mut by_category: HashMap<String, CategoryDelta> = HashMap::new();

    for d in deltas {
        let entry = by_category.entry(d.category).or_default();
        entry.views_delta += d.metrics_delta.views;
        entry.likes_delta += d.metrics_delta.likes;
        if d.metrics_delta.views > 0 {
            entry.posts_with_views += 1;
        }
        entry.post_ids.push(d.post_id);
    }

    Ok(by_category)
}

/// Total view-gain across all categories over `[t0, t1)` — used by the
/// baseline builder's daily rollups.
pub fn total_views_delta(
    conn: &Connection,
    creator_id: i64,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<i64> {
    let deltas = delta_per_post(conn, creator_id, t0, t1)?;
    Ok(deltas.iter().map(|d| d.metrics_delta.views).sum())
}

// --- Fans ---

pub fn insert_fan(
    conn: &Connection,
    creator_id: i64,
    acquired_at: DateTime<Utc>,
    external_id_hash: &str,
    referral_link_category_hint: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO fans (creator_id, acquired_at, external_id_hash, referral_link_category_hint, attribution_method, confidence)
         VALUES (?1, ?2, ?3, ?4, 'none', 0.0)",
        params![
            creator_id,
            to_rfc3339(acquired_at),
            external_id_hash,
            referral_link_category_hint,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_fan(row: &rusqlite::Row) -> rusqlite::Result<Fan> {
    let acquired_at: String = row.get(2)?;
    let method: String = row.get(6)?;
    let weights_json: Option<String> = row.get(7)?;
    let weights = weights_json
        .and_then(|j| serde_json::from_str(&j).ok())
        .unwrap_or_default();

    Ok(Fan {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        acquired_at: DateTime::parse_from_rfc3339(&acquired_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        external_id_hash: row.get(3)?,
        referral_link_category_hint: row.get(4)?,
        attributed_category: row.get(5)?,
        attribution_method: super::models::AttributionMethod::parse(&method),
        confidence: row.get(8)?,
        weights,
    })
}

const FAN_COLUMNS: &str = "id, creator_id, acquired_at, external_id_hash, referral_link_category_hint, attributed_category, attribution_method, weights_json, confidence";

pub fn get_fans_in_window(
    conn: &Connection,
    creator_id: i64,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<Vec<Fan>> {
    let sql = format!(
        "SELECT {FAN_COLUMNS} FROM fans WHERE creator_id = ?1 AND acquired_at >= ?2 AND acquired_at < ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![creator_id, to_rfc3339(t0), to_rfc3339(t1)],
        row_to_fan,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get_unattributed_fans(conn: &Connection, creator_id: i64) -> Result<Vec<Fan>> {
    let sql = format!(
        "SELECT {FAN_COLUMNS} FROM fans WHERE creator_id = ?1 AND attributed_category IS NULL"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![creator_id], row_to_fan)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn update_fan_attribution(
    conn: &Connection,
    fan_id: i64,
    category: &str,
    method: super::models::AttributionMethod,
    confidence: f64,
    weights: &HashMap<String, f64>,
) -> Result<()> {
    let weights_json = serde_json::to_string(weights)?;
    conn.execute(
        "UPDATE fans SET attributed_category = ?1, attribution_method = ?2, confidence = ?3, weights_json = ?4
         WHERE id = ?5",
        params![category, method.as_str(), confidence, weights_json, fan_id],
    )?;
    Ok(())
}

pub fn count_fans_in_window(
    conn: &Connection,
    creator_id: i64,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM fans WHERE creator_id = ?1 AND acquired_at >= ?2 AND acquired_at < ?3",
        params![creator_id, to_rfc3339(t0), to_rfc3339(t1)],
        |row| row.get(0),
    )?)
}

pub fn count_fans_by_category_in_window(
    conn: &Connection,
    creator_id: i64,
    category: &str,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM fans
         WHERE creator_id = ?1 AND attributed_category = ?2 AND acquired_at >= ?3 AND acquired_at < ?4",
        params![creator_id, category, to_rfc3339(t0), to_rfc3339(t1)],
        |row| row.get(0),
    )?)
}

// --- Revenue ---

pub fn insert_revenue_event(
    conn: &Connection,
    creator_id: i64,
    fan_id: i64,
    event_type: RevenueEventType,
    amount: f64,
    currency: &str,
    event_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO revenue_events (creator_id, fan_id, event_type, amount, currency, event_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            creator_id,
            fan_id,
            event_type.as_str(),
            amount,
            currency,
            to_rfc3339(event_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn sum_revenue_in_window(
    conn: &Connection,
    creator_id: i64,
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
) -> Result<f64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM revenue_events
         WHERE creator_id = ?1 AND event_at >= ?2 AND event_at < ?3",
        params![creator_id, to_rfc3339(t0), to_rfc3339(t1)],
        |row| row.get(0),
    )?)
}

// --- Confounders ---

pub fn insert_confounder(
    conn: &Connection,
    creator_id: i64,
    event_type: ConfounderType,
    start_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
    impact: ConfounderImpact,
    description: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO confounder_events (creator_id, event_type, start_at, end_at, impact, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            creator_id,
            event_type.as_str(),
            to_rfc3339(start_at),
            end_at.map(to_rfc3339),
            impact.as_str(),
            description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Confounders overlapping `[w_start, w_end)` per the overlap rule in §4.3:
/// `event_start <= w_end AND (event_end IS NULL OR event_end >= w_start)`.
pub fn confounders_overlapping(
    conn: &Connection,
    creator_id: i64,
    w_start: DateTime<Utc>,
    w_end: DateTime<Utc>,
) -> Result<Vec<ConfounderEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, creator_id, event_type, start_at, end_at, impact, description
         FROM confounder_events
         WHERE creator_id = ?1 AND start_at <= ?2 AND (end_at IS NULL OR end_at >= ?3)",
    )?;
    let rows = stmt.query_map(
        params![creator_id, to_rfc3339(w_end), to_rfc3339(w_start)],
        |row| {
            let start_at: String = row.get(3)?;
            let end_at: Option<String> = row.get(4)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                start_at,
                end_at,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        let (id, creator_id, event_type, start_at, end_at, impact, description) = row?;
        out.push(ConfounderEvent {
            id,
            creator_id,
            event_type: ConfounderType::parse(&event_type),
            start_at: from_rfc3339(&start_at)?,
            end_at: end_at.map(|s| from_rfc3339(&s)).transpose()?,
            impact: ConfounderImpact::parse(&impact),
            description,
        });
    }
    Ok(out)
}

// --- Daily rollups (for BaselineBuilder) ---

/// One calendar day's aggregate for baseline fitting. `date` is the UTC
/// calendar date; `new_subs`/`revenue`/`delta_views` are all *delta*
/// quantities for that single day, never cumulative.
#[derive(Debug, Clone)]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub new_subs: i64,
    pub revenue: f64,
    pub delta_views: i64,
}

/// Aggregate daily rollups for dates in `[start, end)`, where `start`/`end`
/// are UTC instants (typically midnight-aligned, but not required to be —
/// each day slice is still a midnight-to-midnight UTC calendar day).
pub fn daily_rollups(
    conn: &Connection,
    creator_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DailyRollup>> {
    let mut rollups = Vec::new();
    let mut day_start = start.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();

    while day_start < end {
        let day_end = day_start + Duration::days(1);
        let window_start = day_start.max(start);
        let window_end = day_end.min(end);
        if window_start >= window_end {
            day_start = day_end;
            continue;
        }

        let new_subs = count_fans_in_window(conn, creator_id, window_start, window_end)?;
        let revenue = sum_revenue_in_window(conn, creator_id, window_start, window_end)?;
        let delta_views = total_views_delta(conn, creator_id, window_start, window_end)?;

        rollups.push(DailyRollup {
            date: day_start.date_naive(),
            new_subs,
            revenue,
            delta_views,
        });

        day_start = day_end;
    }

    Ok(rollups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::LabelSource;
    use crate::db::schema::create_tables;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn creator_roundtrip() {
        let conn = test_db();
        let id = insert_creator(&conn, "talent_1", 48).unwrap();
        let creator = get_creator(&conn, id).unwrap().unwrap();
        assert_eq!(creator.name, "talent_1");
        assert_eq!(creator.optimal_attribution_window_hours, 48);
        assert_eq!(creator.status, CreatorStatus::Active);
    }

    #[test]
    fn delta_per_post_clamps_regressions_to_zero() {
        let conn = test_db();
        let creator_id = insert_creator(&conn, "c1", 48).unwrap();
        let post_id = get_or_create_post(
            &conn,
            creator_id,
            "tiktok",
            "p1",
            t("2026-01-01T00:00:00Z"),
            "storytime",
            LabelSource::UserConfirmed,
        )
        .unwrap();

        insert_snapshot(
            &conn,
            post_id,
            creator_id,
            t("2026-01-01T00:00:00Z"),
            &Metrics {
                views: 500_000,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        insert_snapshot(
            &conn,
            post_id,
            creator_id,
            t("2026-01-02T00:00:00Z"),
            &Metrics {
                views: 499_000, // recount regression
                ..Default::default()
            },
            None,
        )
        .unwrap();

        let deltas = delta_per_post(
            &conn,
            creator_id,
            t("2026-01-01T00:00:00Z"),
            t("2026-01-02T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].metrics_delta.views, 0);
    }

    #[test]
    fn delta_per_post_credits_full_cumulative_when_published_inside_window() {
        let conn = test_db();
        let creator_id = insert_creator(&conn, "c1", 48).unwrap();
        let post_id = get_or_create_post(
            &conn,
            creator_id,
            "tiktok",
            "p2",
            t("2026-01-05T00:00:00Z"), // published after t0
            "grwm",
            LabelSource::UserConfirmed,
        )
        .unwrap();

        insert_snapshot(
            &conn,
            post_id,
            creator_id,
            t("2026-01-06T00:00:00Z"),
            &Metrics {
                views: 8000,
                ..Default::default()
            },
            None,
        )
        .unwrap();

        let deltas = delta_per_post(
            &conn,
            creator_id,
            t("2026-01-01T00:00:00Z"),
            t("2026-01-10T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(deltas[0].metrics_delta.views, 8000);
    }

    #[test]
    fn delta_per_post_omits_posts_with_no_snapshot_at_or_before_t1() {
        let conn = test_db();
        let creator_id = insert_creator(&conn, "c1", 48).unwrap();
        get_or_create_post(
            &conn,
            creator_id,
            "tiktok",
            "p3",
            t("2026-01-05T00:00:00Z"),
            "grwm",
            LabelSource::UserConfirmed,
        )
        .unwrap();
        // no snapshots recorded at all

        let deltas = delta_per_post(
            &conn,
            creator_id,
            t("2026-01-01T00:00:00Z"),
            t("2026-01-10T00:00:00Z"),
        )
        .unwrap();
        assert!(deltas.is_empty());
    }

    #[test]
    fn snapshot_reimport_is_idempotent() {
        let conn = test_db();
        let creator_id = insert_creator(&conn, "c1", 48).unwrap();
        let post_id = get_or_create_post(
            &conn,
            creator_id,
            "tiktok",
            "p1",
            t("2026-01-01T00:00:00Z"),
            "storytime",
            LabelSource::UserConfirmed,
        )
        .unwrap();
        let metrics = Metrics {
            views: 100,
            likes: 10,
            ..Default::default()
        };
        assert!(!snapshot_exists_identical(&conn, post_id, t("2026-01-01T00:00:00Z"), &metrics).unwrap());
        insert_snapshot(&conn, post_id, creator_id, t("2026-01-01T00:00:00Z"), &metrics, None).unwrap();
        assert!(snapshot_exists_identical(&conn, post_id, t("2026-01-01T00:00:00Z"), &metrics).unwrap());

        let count_before: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_snapshots", [], |r| r.get(0))
            .unwrap();
        insert_snapshot(&conn, post_id, creator_id, t("2026-01-01T00:00:00Z"), &metrics, None).unwrap();
        let count_after: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_snapshots", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count_before, count_after);
    }

    #[test]
    fn confounder_overlap_query_matches_model_rule() {
        let conn = test_db();
        let creator_id = insert_creator(&conn, "c1", 48).unwrap();
        insert_confounder(
            &conn,
            creator_id,
            ConfounderType::Promotion,
            t("2026-01-10T00:00:00Z"),
            Some(t("2026-01-15T00:00:00Z")),
            ConfounderImpact::Medium,
            "promo week".into(),
        )
        .unwrap();

        let overlapping = confounders_overlapping(
            &conn,
            creator_id,
            t("2026-01-01T00:00:00Z"),
            t("2026-01-31T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(overlapping.len(), 1);

        let not_overlapping = confounders_overlapping(
            &conn,
            creator_id,
            t("2026-02-01T00:00:00Z"),
            t("2026-02-28T00:00:00Z"),
        )
        .unwrap();
        assert!(not_overlapping.is_empty());
    }

    #[test]
    fn daily_rollups_never_cross_into_future_data() {
        let conn = test_db();
        let creator_id = insert_creator(&conn, "c1", 48).unwrap();
        insert_fan(&conn, creator_id, t("2026-01-05T12:00:00Z"), "hash1", None).unwrap();
        insert_fan(&conn, creator_id, t("2026-01-20T12:00:00Z"), "hash2", None).unwrap();

        let rollups = daily_rollups(
            &conn,
            creator_id,
            t("2026-01-01T00:00:00Z"),
            t("2026-01-15T00:00:00Z"),
        )
        .unwrap();
        let total_subs: i64 = rollups.iter().map(|r| r.new_subs).sum();
        assert_eq!(total_subs, 1, "the Jan 20 fan must not leak into a Jan 1-15 baseline");
    }
}
