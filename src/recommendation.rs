// RecommendationEngine — synthesises AttributionEngine output into
// tier-labelled actions and a weekly posting plan.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::attribution::AttributionEngine;
use crate::config::AnalysisSettings;
use crate::db::Database;
use crate::error::Result;

const POSTS_PER_WEEK_LOOKBACK_DAYS: i64 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Increase,
    Decrease,
    Maintain,
    Test,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Increase => "increase",
            Action::Decrease => "decrease",
            Action::Maintain => "maintain",
            Action::Test => "test",
        }
    }
}

/// Per-category outcome of an analysis. Closed taxonomy of states, matching
/// the three-way `subs < 10 / hypothesis / confident` split in the state
/// machine — this prevents a caller from silently upgrading a hypothesis
/// into a confident claim by convention, since the two aren't even the
/// same variant.
#[derive(Debug, Clone)]
pub enum CategoryRecommendation {
    Confident {
        category: String,
        subs: i64,
        lift_pct: f64,
        share: f64,
        action: Action,
        suggested_posts_per_week: f64,
        confidence: f64,
    },
    Hypothesis {
        category: String,
        subs: i64,
        lift_pct: f64,
        share: f64,
        action: Action,
        suggested_posts_per_week: f64,
        confidence: f64,
        reasons: Vec<String>,
    },
    InsufficientData {
        category: String,
        subs: i64,
        views_delta: i64,
        reason: String,
    },
}

impl CategoryRecommendation {
    pub fn category(&self) -> &str {
        match self {
            CategoryRecommendation::Confident { category, .. } => category,
            CategoryRecommendation::Hypothesis { category, .. } => category,
            CategoryRecommendation::InsufficientData { category, .. } => category,
        }
    }

    pub fn lift_pct(&self) -> Option<f64> {
        match self {
            CategoryRecommendation::Confident { lift_pct, .. } => Some(*lift_pct),
            CategoryRecommendation::Hypothesis { lift_pct, .. } => Some(*lift_pct),
            CategoryRecommendation::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeeklyPlan {
    pub total_posts: f64,
    /// category -> suggested posts/week. Empty when withheld by confounders.
    pub breakdown: std::collections::HashMap<String, f64>,
    pub rationale: String,
}

#[derive(Debug, Clone)]
pub struct RecommendationReport {
    pub confident: Vec<CategoryRecommendation>,
    pub hypothesis: Vec<CategoryRecommendation>,
    pub insufficient_data: Vec<CategoryRecommendation>,
    pub weekly_plan: WeeklyPlan,
    pub top_performer: Option<String>,
    pub underperformer: Option<String>,
    pub has_confounders: bool,
    pub data_quality_notes: Vec<String>,
}

pub struct RecommendationEngine {
    db: Arc<dyn Database>,
    attribution: AttributionEngine,
    settings: AnalysisSettings,
}

impl RecommendationEngine {
    pub fn new(db: Arc<dyn Database>, settings: AnalysisSettings) -> Self {
        Self {
            attribution: AttributionEngine::new(db.clone()),
            db,
            settings,
        }
    }

    pub async fn generate(&self, creator_id: i64, days: i64) -> Result<RecommendationReport> {
        let w_end = Utc::now();
        let w_start = w_end - Duration::days(days);

        let attribution_window_hours = match self.db.get_creator(creator_id).await? {
            Some(creator) => creator.optimal_attribution_window_hours,
            None => self.settings.optimal_attribution_window_hours,
        };
        self.attribution
            .attribute_fans(creator_id, attribution_window_hours)
            .await?;

        let overall = self.attribution.attribute(creator_id, w_start, w_end, None).await?;
        let has_confounders = !overall.confounders.is_empty();

        let mut confident = Vec::new();
        let mut hypothesis = Vec::new();
        let mut insufficient_data = Vec::new();
        let mut data_quality_notes = Vec::new();

        if overall.baseline.is_default {
            data_quality_notes.push("Baseline is a conservative default — too little history to fit one.".to_string());
        }
        if has_confounders {
            data_quality_notes.push(format!(
                "{} confounder event(s) overlap this window; claims are downgraded.",
                overall.confounders.len()
            ));
        }

        for category in &self.settings.category_taxonomy {
            if category == crate::db::models::OTHER_CATEGORY {
                continue;
            }

            let per_category = self
                .attribution
                .attribute(creator_id, w_start, w_end, Some(category))
                .await?;
            let subs = per_category.actual_subs;
            let views_delta = overall
                .content_type_deltas
                .get(category)
                .map(|d| d.views_delta)
                .unwrap_or(0);

            if subs < self.settings.min_subs_recommendation {
                insufficient_data.push(CategoryRecommendation::InsufficientData {
                    category: category.clone(),
                    subs,
                    views_delta,
                    reason: format!("Only {subs} subs attributed"),
                });
                continue;
            }

            let share = overall.credit_weights.get(category).copied().unwrap_or(0.0);
            let lift_pct = per_category.subs_lift_pct;

            let is_confident = subs >= self.settings.min_subs_confident
                && per_category.confidence.score >= 0.7
                && !has_confounders;

            let action = if lift_pct >= 50.0 {
                Action::Increase
            } else if lift_pct <= -50.0 && share >= 0.10 {
                Action::Decrease
            } else if !is_confident {
                Action::Test
            } else {
                Action::Maintain
            };

            let current_posts_per_week = self
                .posts_per_week(creator_id, category, w_start)
                .await?;
            let suggested_posts_per_week = suggested_posts(action, current_posts_per_week);

            if is_confident {
                confident.push(CategoryRecommendation::Confident {
                    category: category.clone(),
                    subs,
                    lift_pct,
                    share,
                    action,
                    suggested_posts_per_week,
                    confidence: per_category.confidence.score,
                });
            } else {
                hypothesis.push(CategoryRecommendation::Hypothesis {
                    category: category.clone(),
                    subs,
                    lift_pct,
                    share,
                    action,
                    suggested_posts_per_week,
                    confidence: per_category.confidence.score,
                    reasons: per_category.confidence.reasons.clone(),
                });
            }
        }

        rank_by_abs_lift(&mut confident);
        rank_by_abs_lift(&mut hypothesis);
        confident.truncate(3);
        hypothesis.truncate(3);

        let weekly_plan = self
            .build_weekly_plan(creator_id, w_start, &confident, &hypothesis, has_confounders)
            .await?;

        let (top_performer, underperformer) = top_and_bottom(&confident, &hypothesis);

        Ok(RecommendationReport {
            confident,
            hypothesis,
            insufficient_data,
            weekly_plan,
            top_performer,
            underperformer,
            has_confounders,
            data_quality_notes,
        })
    }

    /// Posts/week for `category`, averaged over the 4 weeks immediately
    /// preceding `w_start` (§9 Open Question 2: fixed at 28 days).
    async fn posts_per_week(&self, creator_id: i64, category: &str, w_start: DateTime<Utc>) -> Result<f64> {
        let lookback_start = w_start - Duration::days(POSTS_PER_WEEK_LOOKBACK_DAYS);
        let count = self
            .db
            .post_count_in_window(creator_id, category, lookback_start, w_start)
            .await?;
        Ok(count as f64 / (POSTS_PER_WEEK_LOOKBACK_DAYS as f64 / 7.0))
    }

    async fn build_weekly_plan(
        &self,
        creator_id: i64,
        w_start: DateTime<Utc>,
        confident: &[CategoryRecommendation],
        hypothesis: &[CategoryRecommendation],
        has_confounders: bool,
    ) -> Result<WeeklyPlan> {
        let mut current_total = 0.0;
        for category in &self.settings.category_taxonomy {
            if category == crate::db::models::OTHER_CATEGORY {
                continue;
            }
            current_total += self.posts_per_week(creator_id, category, w_start).await?;
        }

        if has_confounders {
            return Ok(WeeklyPlan {
                total_posts: current_total,
                breakdown: std::collections::HashMap::new(),
                rationale: "Weekly plan unavailable due to confounders overlapping the analysis window.".to_string(),
            });
        }

        let mut breakdown = std::collections::HashMap::new();
        for rec in confident.iter().chain(hypothesis.iter()) {
            let suggested = match rec {
                CategoryRecommendation::Confident { suggested_posts_per_week, .. } => *suggested_posts_per_week,
                CategoryRecommendation::Hypothesis { suggested_posts_per_week, .. } => *suggested_posts_per_week,
                CategoryRecommendation::InsufficientData { .. } => continue,
            };
            breakdown.insert(rec.category().to_string(), suggested);
        }

        let total: f64 = breakdown.values().sum();
        let capped_total = total.min(self.settings.weekly_plan_cap as f64);

        Ok(WeeklyPlan {
            total_posts: capped_total,
            breakdown,
            rationale: if total > self.settings.weekly_plan_cap as f64 {
                format!(
                    "Capped at {} posts/week per the configured ceiling.",
                    self.settings.weekly_plan_cap
                )
            } else {
                "Derived from category lift and current posting cadence.".to_string()
            },
        })
    }
}

fn suggested_posts(action: Action, current: f64) -> f64 {
    match action {
        Action::Increase => (current * 1.5).max(current + 2.0),
        Action::Decrease => (current * 0.5).max(1.0),
        Action::Maintain | Action::Test => current,
    }
}

fn rank_by_abs_lift(recs: &mut [CategoryRecommendation]) {
    recs.sort_by(|a, b| {
        let a_lift = a.lift_pct().unwrap_or(0.0).abs();
        let b_lift = b.lift_pct().unwrap_or(0.0).abs();
        b_lift.partial_cmp(&a_lift).unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn top_and_bottom(
    confident: &[CategoryRecommendation],
    hypothesis: &[CategoryRecommendation],
) -> (Option<String>, Option<String>) {
    let all: Vec<&CategoryRecommendation> = confident.iter().chain(hypothesis.iter()).collect();
    let top = all
        .iter()
        .max_by(|a, b| {
            a.lift_pct()
                .unwrap_or(f64::MIN)
                .partial_cmp(&b.lift_pct().unwrap_or(f64::MIN))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|r| r.category().to_string());
    let bottom = all
        .iter()
        .min_by(|a, b| {
            a.lift_pct()
                .unwrap_or(f64::MAX)
                .partial_cmp(&b.lift_pct().unwrap_or(f64::MAX))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|r| r.category().to_string());
    (top, bottom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ConfounderImpact, ConfounderType, LabelSource, Metrics};
    use crate::db::sqlite::SqliteDatabase;
    use rusqlite::Connection;

    async fn test_db() -> Arc<dyn Database> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::create_tables(&conn).unwrap();
        Arc::new(SqliteDatabase::new(conn))
    }

    #[tokio::test]
    async fn insufficient_data_withholds_weekly_plan_rationale_but_not_on_confounders() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let engine = RecommendationEngine::new(db, AnalysisSettings::default());
        let report = engine.generate(creator_id, 7).await.unwrap();
        assert!(!report.has_confounders);
        assert!(report.confident.is_empty());
        assert!(!report.insufficient_data.is_empty());
    }

    #[tokio::test]
    async fn confounder_overlap_withholds_weekly_plan() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let now = Utc::now();
        db.insert_confounder(
            creator_id,
            ConfounderType::Promotion,
            now - Duration::days(5),
            Some(now - Duration::days(1)),
            ConfounderImpact::Medium,
            "promo".into(),
        )
        .await
        .unwrap();

        let engine = RecommendationEngine::new(db, AnalysisSettings::default());
        let report = engine.generate(creator_id, 30).await.unwrap();
        assert!(report.has_confounders);
        assert!(report.weekly_plan.breakdown.is_empty());
        assert!(report.weekly_plan.rationale.contains("confounders"));
    }

    #[tokio::test]
    async fn clean_confident_win_reaches_confident_tier() {
        let db = test_db().await;
        let creator_id = db.insert_creator("c1", 48).await.unwrap();
        let now = Utc::now();

        let post_id = db
            .get_or_create_post(creator_id, "tiktok", "p1", now - Duration::days(60), "storytime", LabelSource::UserConfirmed)
            .await
            .unwrap();
        db.record_snapshot(post_id, creator_id, now - Duration::days(31), &Metrics::default(), None)
            .await
            .unwrap();
        db.record_snapshot(
            post_id,
            creator_id,
            now,
            &Metrics { views: 100_000, ..Default::default() },
            None,
        )
        .await
        .unwrap();

        for day in 0..30 {
            db.insert_fan(
                creator_id,
                now - Duration::days(day) - Duration::hours(1),
                &format!("hash_storytime_{day}"),
                Some("storytime"),
            )
            .await
            .unwrap();
        }

        let engine = RecommendationEngine::new(db, AnalysisSettings::default());
        let report = engine.generate(creator_id, 30).await.unwrap();
        assert!(
            report.confident.iter().any(|r| r.category() == "storytime"),
            "{:?}",
            report.confident
        );
    }
}
