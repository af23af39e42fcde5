// ConfidenceScorer — bounds the strength of any claim by the amount and
// quality of evidence behind it.
//
// The only non-trivial numeric primitive here is the Poisson exact test,
// implemented directly against log-factorials rather than pulling in a
// full statistics crate — the operating regime (events typically <= a few
// hundred) makes that entirely tractable.

pub const MIN_SUBS_FOR_RECOMMENDATION: i64 = 10;
pub const MIN_SUBS_FOR_CONFIDENT: i64 = 25;
pub const MIN_BASELINE_DAYS: i64 = 7;

const SCORE_FLOOR: f64 = 0.1;
const SCORE_CEILING: f64 = 0.95;
const POISSON_SKIP_BELOW: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct ConfidenceResult {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub reasons: Vec<String>,
    /// Hard gate, independent of `score`: false means no recommendation may
    /// be emitted at all, regardless of how high `score` ends up.
    pub min_events_met: bool,
}

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Evaluate confidence for an observed `actual_events` against
    /// `expected_events` over `window_hours`, penalising thin baselines and
    /// overlapping confounders.
    pub fn score(
        actual_events: i64,
        expected_events: f64,
        window_hours: f64,
        has_confounders: bool,
        baseline_data_days: i64,
    ) -> ConfidenceResult {
        let mut score = 0.5f64;
        let mut reasons = Vec::new();
        let min_events_met = actual_events >= MIN_SUBS_FOR_RECOMMENDATION;

        if actual_events < MIN_SUBS_FOR_RECOMMENDATION {
            score -= 0.30;
            reasons.push(format!("Low sample: only {actual_events} subs attributed"));
        } else if actual_events < MIN_SUBS_FOR_CONFIDENT {
            reasons.push(format!("Moderate sample: {actual_events} subs"));
        } else {
            score += 0.15;
            reasons.push(format!("Good sample: {actual_events} subs"));
        }

        if actual_events >= POISSON_SKIP_BELOW {
            let p = poisson_two_sided_test(actual_events, expected_events);
            if p < 0.05 {
                score += 0.20;
                reasons.push("Lift is statistically significant".to_string());
            } else if p < 0.10 {
                score += 0.10;
                reasons.push("Marginally significant".to_string());
            } else {
                score -= 0.10;
                reasons.push("Lift not significant".to_string());
            }
        }

        if baseline_data_days < MIN_BASELINE_DAYS {
            score -= 0.15;
            reasons.push("Limited baseline".to_string());
        } else if baseline_data_days >= 14 {
            score += 0.05;
        }

        if has_confounders {
            score -= 0.20;
            reasons.push("Confounder event(s) overlap".to_string());
        }

        if window_hours < 24.0 {
            score -= 0.10;
            reasons.push("Short window increases noise".to_string());
        }

        score = score.clamp(SCORE_FLOOR, SCORE_CEILING);
        let level = if score >= 0.7 {
            ConfidenceLevel::High
        } else if score >= 0.4 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        ConfidenceResult {
            score,
            level,
            reasons,
            min_events_met,
        }
    }
}

/// Two-sided exact Poisson test for a rate change: is `k` actual events
/// surprising given `lambda` expected events?
///
/// `lambda <= 0` returns p = 1.0 (no baseline to compare against, so no
/// claim of significance is possible). Uses the regularised incomplete
/// gamma function via a direct log-factorial summation of the Poisson CDF.
pub fn poisson_two_sided_test(k: i64, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }

    let p_side = if k as f64 >= lambda {
        if k == 0 {
            1.0
        } else {
            1.0 - poisson_cdf(k - 1, lambda)
        }
    } else {
        poisson_cdf(k, lambda)
    };

    (2.0 * p_side).min(1.0)
}

/// P(X <= k) for X ~ Poisson(lambda), computed as a direct sum of Poisson
/// pmf terms in log-space to avoid overflow for moderately large k.
fn poisson_cdf(k: i64, lambda: f64) -> f64 {
    if k < 0 {
        return 0.0;
    }
    let mut cdf = 0.0;
    for i in 0..=k {
        cdf += poisson_pmf(i, lambda);
    }
    cdf.min(1.0)
}

fn poisson_pmf(k: i64, lambda: f64) -> f64 {
    let log_pmf = k as f64 * lambda.ln() - lambda - log_factorial(k);
    log_pmf.exp()
}

/// ln(k!) via the sum of ln(i) for i in 1..=k. Exact for the small-to-
/// moderate k values this scorer operates on; a Stirling approximation is
/// unnecessary at this scale.
fn log_factorial(k: i64) -> f64 {
    (1..=k).map(|i| (i as f64).ln()).sum()
}
