use std::env;

use anyhow::Result;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Only
/// `db_path` and `hash_salt` have defaults — `hash_salt` defaults to a
/// fixed dev value so `init`/`status` work out of the box, but any agency
/// running this for real must override it before ingesting fan data.
pub struct Config {
    pub db_path: String,
    pub log_filter: String,
    pub default_currency: String,
    pub hash_salt: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            db_path: env::var("CREATOR_LIFT_DB_PATH").unwrap_or_else(|_| "./creator_lift.db".to_string()),
            log_filter: env::var("CREATOR_LIFT_LOG").unwrap_or_else(|_| "creator_lift=info".to_string()),
            default_currency: env::var("CREATOR_LIFT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            hash_salt: env::var("CREATOR_LIFT_HASH_SALT").unwrap_or_else(|_| "dev-only-salt-change-me".to_string()),
        })
    }

    /// Check that a production-grade hash salt has been configured.
    /// Call this before any operation that ingests fan identifiers.
    pub fn require_hash_salt(&self) -> Result<()> {
        if self.hash_salt == "dev-only-salt-change-me" {
            anyhow::bail!(
                "CREATOR_LIFT_HASH_SALT not set. Add it to your .env file before ingesting fan data.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }
}

impl crate::status::HasDbPath for Config {
    fn db_path(&self) -> &str {
        &self.db_path
    }
}

/// Agency/creator-level analytic configuration — thresholds, taxonomy, and
/// windows that tune the engines. No global state: this is constructed once
/// and passed explicitly into engine constructors.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub optimal_attribution_window_hours: i64,
    pub baseline_lookback_days: i64,
    pub min_subs_recommendation: i64,
    pub min_subs_confident: i64,
    pub min_baseline_days: i64,
    pub category_taxonomy: Vec<String>,
    pub weekly_plan_cap: i64,
    pub posts_per_week_lookback_days: i64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            optimal_attribution_window_hours: 48,
            baseline_lookback_days: 14,
            min_subs_recommendation: 10,
            min_subs_confident: 25,
            min_baseline_days: 7,
            category_taxonomy: crate::db::models::DEFAULT_TAXONOMY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            weekly_plan_cap: 14,
            posts_per_week_lookback_days: 28,
        }
    }
}
