// AttributionEngine — computes lift, credit weights, and confounder
// annotations for a requested window, and runs weighted fan attribution.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::baseline::{expected_subs_over_window, Baseline, BaselineBuilder};
use crate::confidence::{ConfidenceResult, ConfidenceScorer};
use crate::db::models::{AttributionMethod, ConfounderEvent};
use crate::db::queries::CategoryDelta;
use crate::db::Database;
use crate::error::{AnalyticsError, Result};

pub const DEFAULT_ATTRIBUTION_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Clone)]
pub struct AttributionReport {
    pub window_hours: f64,
    pub baseline: Baseline,
    pub expected_subs: f64,
    pub actual_subs: i64,
    pub subs_lift_pct: f64,
    pub expected_revenue: f64,
    pub actual_revenue: f64,
    pub revenue_lift_pct: f64,
    pub content_type_deltas: HashMap<String, CategoryDelta>,
    pub credit_weights: HashMap<String, f64>,
    pub total_delta_views: i64,
    pub confounders: Vec<ConfounderEvent>,
    pub confidence: ConfidenceResult,
    pub recommendation_tier: String,
}

/// Summary of one `attribute_fans` pass, including any ties encountered
/// when picking a primary category — surfaced as notes rather than
/// recorded on the Fan rows themselves.
#[derive(Debug, Clone, Default)]
pub struct AttributionRunSummary {
    pub referral_link_count: i64,
    pub weighted_window_count: i64,
    pub unattributed_count: i64,
    pub notes: Vec<String>,
}

pub struct AttributionEngine {
    db: Arc<dyn Database>,
}

impl AttributionEngine {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Compute a lift report for `[w_start, w_end)`. When `category_filter`
    /// is present, `expected`/`actual` are scoped to that category: actual
    /// counts only fans attributed to it, and expected is pro-rated by its
    /// credit weight over the unfiltered window (§9 Open Question 3).
    pub async fn attribute(
        &self,
        creator_id: i64,
        w_start: DateTime<Utc>,
        w_end: DateTime<Utc>,
        category_filter: Option<&str>,
    ) -> Result<AttributionReport> {
        validate_window(w_start, w_end)?;

        let window_hours = ((w_end - w_start).num_milliseconds() as f64 / (1000.0 * 3600.0)).max(1.0);

        let builder = BaselineBuilder::new(self.db.clone());
        let baseline = builder.build(creator_id, w_start).await?;

        let content_type_deltas = self.db.delta_per_category(creator_id, w_start, w_end).await?;
        let total_delta_views: i64 = content_type_deltas.values().map(|d| d.views_delta).sum();
        let credit_weights = credit_weights_from_deltas(&content_type_deltas, total_delta_views);

        let expected_subs_full = expected_subs_over_window(&baseline, w_start, w_end);
        let expected_revenue_full = expected_quantity_over_window(&baseline, w_start, w_end, baseline.rev_per_day);

        let (expected_subs, actual_subs) = match category_filter {
            None => {
                let actual = self.db.count_fans_in_window(creator_id, w_start, w_end).await?;
                (expected_subs_full, actual)
            }
            Some(category) => {
                let share = credit_weights.get(category).copied().unwrap_or(0.0);
                let actual = self
                    .db
                    .count_fans_by_category_in_window(creator_id, category, w_start, w_end)
                    .await?;
                (expected_subs_full * share, actual)
            }
        };

        let actual_revenue = self.db.sum_revenue_in_window(creator_id, w_start, w_end).await?;

        let subs_lift_pct = lift_pct(actual_subs as f64, expected_subs);
        let revenue_lift_pct = lift_pct(actual_revenue, expected_revenue_full);

        let confounders = self.db.confounders_overlapping(creator_id, w_start, w_end).await?;
        let has_confounders = !confounders.is_empty();

        let confidence = ConfidenceScorer::score(
            actual_subs,
            expected_subs,
            window_hours,
            has_confounders,
            baseline.data_days,
        );

        let recommendation_tier = if confidence.score >= 0.7 {
            "confident".to_string()
        } else {
            "hypothesis".to_string()
        };

        Ok(AttributionReport {
            window_hours,
            baseline,
            expected_subs,
            actual_subs,
            subs_lift_pct,
            expected_revenue: expected_revenue_full,
            actual_revenue,
            revenue_lift_pct,
            content_type_deltas,
            credit_weights,
            total_delta_views,
            confounders,
            confidence,
            recommendation_tier,
        })
    }

    /// Attribute every fan lacking a category, using a referral-link hint
    /// when present and falling back to weighted-window view-share
    /// otherwise. Re-running on unchanged inputs is idempotent: the same
    /// fan with the same deltas produces the same weights every time.
    pub async fn attribute_fans(
        &self,
        creator_id: i64,
        window_hours: i64,
    ) -> Result<AttributionRunSummary> {
        let fans = self.db.get_unattributed_fans(creator_id).await?;
        let mut summary = AttributionRunSummary::default();

        for fan in fans {
            if let Some(hint) = fan.referral_link_category_hint.as_deref() {
                let mut weights = HashMap::new();
                weights.insert(hint.to_string(), 1.0);
                self.db
                    .update_fan_attribution(fan.id, hint, AttributionMethod::ReferralLink, 0.95, &weights)
                    .await?;
                summary.referral_link_count += 1;
                continue;
            }

            let window_start = fan.acquired_at - Duration::hours(window_hours);
            let deltas = self
                .db
                .delta_per_category(creator_id, window_start, fan.acquired_at)
                .await?;
            let total_views: i64 = deltas.values().map(|d| d.views_delta).sum();

            if total_views > 0 {
                let weights: HashMap<String, f64> = deltas
                    .iter()
                    .map(|(category, delta)| (category.clone(), delta.views_delta as f64 / total_views as f64))
                    .collect();

                let (primary, max_weight, tied) = pick_primary_category(&weights);
                if tied {
                    summary.notes.push(format!(
                        "fan {} had a tied max weight across categories; chose \"{}\" by name order",
                        fan.id, primary
                    ));
                }

                let confidence = (0.3 + 0.5 * max_weight).clamp(0.3, 0.8);
                self.db
                    .update_fan_attribution(fan.id, &primary, AttributionMethod::WeightedWindow, confidence, &weights)
                    .await?;
                summary.weighted_window_count += 1;
            } else {
                summary.unattributed_count += 1;
            }
        }

        Ok(summary)
    }
}

fn credit_weights_from_deltas(
    deltas: &HashMap<String, CategoryDelta>,
    total_delta_views: i64,
) -> HashMap<String, f64> {
    if total_delta_views <= 0 {
        return deltas.keys().map(|c| (c.clone(), 0.0)).collect();
    }
    deltas
        .iter()
        .map(|(category, delta)| (category.clone(), delta.views_delta as f64 / total_delta_views as f64))
        .collect()
}

fn lift_pct(actual: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        0.0
    } else {
        (actual / expected - 1.0) * 100.0
    }
}

/// Same day-slice/dow-factor weighting `expected_subs_over_window` uses,
/// generalised to any per-day rate (here, revenue).
fn expected_quantity_over_window(
    baseline: &Baseline,
    w_start: DateTime<Utc>,
    w_end: DateTime<Utc>,
    rate_per_day: f64,
) -> f64 {
    if baseline.subs_per_day <= 0.0 {
        // No DOW signal to scale by; fall back to a flat hourly rate.
        let hours = ((w_end - w_start).num_milliseconds() as f64 / (1000.0 * 3600.0)).max(0.0);
        return rate_per_day * (hours / 24.0);
    }
    let scale = rate_per_day / baseline.subs_per_day;
    expected_subs_over_window(baseline, w_start, w_end) * scale
}

/// Pick the category with the highest weight, breaking ties by category
/// name ascending. Returns (category, weight, was_tied).
fn pick_primary_category(weights: &HashMap<String, f64>) -> (String, f64, bool) {
    let max_weight = weights.values().cloned().fold(f64::MIN, f64::max);
    let mut tied_categories: Vec<&String> = weights
        .iter()
        .filter(|(_, w)| (**w - max_weight).abs() < 1e-9)
        .map(|(c, _)| c)
        .collect();
    tied_categories.sort();
    let primary = tied_categories[0].clone();
    (primary, max_weight, tied_categories.len() > 1)
}

fn validate_window(w_start: DateTime<Utc>, w_end: DateTime<Utc>) -> Result<()> {
    if w_end <= w_start {
        return Err(AnalyticsError::WindowInvalid {
            start: w_start,
            end: w_end,
            reason: "window end must be after window start".to_string(),
        });
    }
    if w_end > Utc::now() {
        return Err(AnalyticsError::WindowInvalid {
            start: w_start,
            end: w_end,
            reason: "window end cannot be in the future".to_string(),
        });
    }
    Ok(())
}
