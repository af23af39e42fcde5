// Data models — Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a managed creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorStatus {
    Active,
    Paused,
    Archived,
}

impl CreatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreatorStatus::Active => "active",
            CreatorStatus::Paused => "paused",
            CreatorStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paused" => CreatorStatus::Paused,
            "archived" => CreatorStatus::Archived,
            _ => CreatorStatus::Active,
        }
    }
}

/// Identity of a talent managed by an agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    pub id: i64,
    pub name: String,
    pub optimal_attribution_window_hours: i64,
    pub status: CreatorStatus,
}

/// Where a post's content-category label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    MlSuggested,
    UserConfirmed,
    UserOverride,
}

impl LabelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelSource::MlSuggested => "ml_suggested",
            LabelSource::UserConfirmed => "user_confirmed",
            LabelSource::UserOverride => "user_override",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "user_confirmed" => LabelSource::UserConfirmed,
            "user_override" => LabelSource::UserOverride,
            _ => LabelSource::MlSuggested,
        }
    }
}

/// Cumulative engagement counters for a post, as last observed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub saves: i64,
}

impl Metrics {
    /// The per-field non-negative delta between two cumulative observations.
    /// `self` is the later observation, `earlier` the prior one.
    pub fn saturating_delta_from(&self, earlier: &Metrics) -> Metrics {
        Metrics {
            views: (self.views - earlier.views).max(0),
            likes: (self.likes - earlier.likes).max(0),
            comments: (self.comments - earlier.comments).max(0),
            shares: (self.shares - earlier.shares).max(0),
            saves: (self.saves - earlier.saves).max(0),
        }
    }

    pub fn has_negative(&self) -> bool {
        self.views < 0 || self.likes < 0 || self.comments < 0 || self.shares < 0 || self.saves < 0
    }
}

/// A published piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: i64,
    pub creator_id: i64,
    pub platform: String,
    pub posted_at: DateTime<Utc>,
    pub metrics: Metrics,
    pub category: String,
    pub label_source: LabelSource,
    pub last_snapshot_at: Option<DateTime<Utc>>,
}

/// An observation of a post's cumulative counters at a specific moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: i64,
    pub post_id: i64,
    pub creator_id: i64,
    pub snapshot_at: DateTime<Utc>,
    pub metrics: Metrics,
}

/// How a fan's content category was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    ReferralLink,
    WeightedWindow,
    Campaign,
    None,
}

impl AttributionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionMethod::ReferralLink => "referral_link",
            AttributionMethod::WeightedWindow => "weighted_window",
            AttributionMethod::Campaign => "campaign",
            AttributionMethod::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "referral_link" => AttributionMethod::ReferralLink,
            "weighted_window" => AttributionMethod::WeightedWindow,
            "campaign" => AttributionMethod::Campaign,
            _ => AttributionMethod::None,
        }
    }
}

/// A subscriber acquisition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fan {
    pub id: i64,
    pub creator_id: i64,
    pub acquired_at: DateTime<Utc>,
    /// HMAC-hashed external identifier — never the raw one (see `privacy`).
    pub external_id_hash: String,
    pub referral_link_category_hint: Option<String>,
    pub attributed_category: Option<String>,
    pub attribution_method: AttributionMethod,
    pub confidence: f64,
    /// category -> share, summing to 1.0 ± 1e-6 when present
    pub weights: HashMap<String, f64>,
}

/// Kind of monetisation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueEventType {
    Subscription,
    Renewal,
    Tip,
    Ppv,
    Message,
}

impl RevenueEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueEventType::Subscription => "subscription",
            RevenueEventType::Renewal => "renewal",
            RevenueEventType::Tip => "tip",
            RevenueEventType::Ppv => "ppv",
            RevenueEventType::Message => "message",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "renewal" => RevenueEventType::Renewal,
            "tip" => RevenueEventType::Tip,
            "ppv" => RevenueEventType::Ppv,
            "message" => RevenueEventType::Message,
            _ => RevenueEventType::Subscription,
        }
    }
}

/// A monetisation event tied to a fan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueEvent {
    pub id: i64,
    pub creator_id: i64,
    pub fan_id: i64,
    pub event_type: RevenueEventType,
    pub amount: f64,
    pub currency: String,
    pub event_at: DateTime<Utc>,
}

/// External cause of estimated impact on subs, independent of content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfounderType {
    PriceChange,
    Promotion,
    Collab,
    ExternalTraffic,
    MassDm,
    PlatformPromo,
    Other,
}

impl ConfounderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfounderType::PriceChange => "price_change",
            ConfounderType::Promotion => "promotion",
            ConfounderType::Collab => "collab",
            ConfounderType::ExternalTraffic => "external_traffic",
            ConfounderType::MassDm => "mass_dm",
            ConfounderType::PlatformPromo => "platform_promo",
            ConfounderType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "price_change" => ConfounderType::PriceChange,
            "promotion" => ConfounderType::Promotion,
            "collab" => ConfounderType::Collab,
            "external_traffic" => ConfounderType::ExternalTraffic,
            "mass_dm" => ConfounderType::MassDm,
            "platform_promo" => ConfounderType::PlatformPromo,
            _ => ConfounderType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfounderImpact {
    Low,
    Medium,
    High,
}

impl ConfounderImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfounderImpact::Low => "low",
            ConfounderImpact::Medium => "medium",
            ConfounderImpact::High => "high",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "medium" => ConfounderImpact::Medium,
            "high" => ConfounderImpact::High,
            _ => ConfounderImpact::Low,
        }
    }
}

/// A period or point-in-time external cause that biases attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfounderEvent {
    pub id: i64,
    pub creator_id: i64,
    pub event_type: ConfounderType,
    pub start_at: DateTime<Utc>,
    /// Absent => point event.
    pub end_at: Option<DateTime<Utc>>,
    pub impact: ConfounderImpact,
    pub description: String,
}

impl ConfounderEvent {
    /// An event overlaps `[w_start, w_end)` iff `event_start <= w_end` AND
    /// (`event_end` is absent OR `event_end >= w_start`).
    pub fn overlaps(&self, w_start: DateTime<Utc>, w_end: DateTime<Utc>) -> bool {
        self.start_at <= w_end && self.end_at.is_none_or(|end| end >= w_start)
    }
}

/// Default closed taxonomy of content categories. Posts labelled outside
/// this set are normalised to `"other"`.
pub const DEFAULT_TAXONOMY: &[&str] = &[
    "storytime",
    "grwm",
    "thirst_trap",
    "behind_scenes",
    "money_talk",
    "other",
];

pub const OTHER_CATEGORY: &str = "other";

/// Normalise a raw category label against a taxonomy, falling back to "other".
pub fn normalize_category(raw: &str, taxonomy: &[String]) -> String {
    if taxonomy.iter().any(|c| c == raw) {
        raw.to_string()
    } else {
        OTHER_CATEGORY.to_string()
    }
}

// --- Plain constructor/record types for an external ingestion layer ---
//
// CSV parsing and column-mapping heuristics are out of scope for this
// crate; these are the typed targets an import layer populates once it
// has parsed a row.

/// A normalised post observation ready to hand to `SnapshotStore::record`.
#[derive(Debug, Clone)]
pub struct NewPostRecord {
    pub creator_id: i64,
    pub platform: String,
    pub external_post_id: String,
    pub posted_at: DateTime<Utc>,
    pub metrics: Metrics,
    pub category: String,
    pub label_source: LabelSource,
}

/// A normalised fan acquisition ready for ingestion.
#[derive(Debug, Clone)]
pub struct NewFanRecord {
    pub creator_id: i64,
    pub acquired_at: DateTime<Utc>,
    /// Raw external identifier — hashed at the persistence boundary, never stored as-is.
    pub external_id: String,
    pub referral_link_category_hint: Option<String>,
}

/// A normalised revenue event ready for ingestion.
#[derive(Debug, Clone)]
pub struct NewRevenueRecord {
    pub creator_id: i64,
    pub fan_id: i64,
    pub event_type: RevenueEventType,
    pub amount: f64,
    pub currency: String,
    pub event_at: DateTime<Utc>,
}

/// A normalised confounder declaration ready for ingestion.
#[derive(Debug, Clone)]
pub struct NewConfounderRecord {
    pub creator_id: i64,
    pub event_type: ConfounderType,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub impact: ConfounderImpact,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_delta_clamps_to_zero_on_regression() {
        let earlier = Metrics {
            views: 500_000,
            likes: 1000,
            comments: 10,
            shares: 5,
            saves: 2,
        };
        let later = Metrics {
            views: 499_000, // platform recount regressed
            likes: 1100,
            comments: 10,
            shares: 5,
            saves: 2,
        };
        let delta = later.saturating_delta_from(&earlier);
        assert_eq!(delta.views, 0);
        assert_eq!(delta.likes, 100);
    }

    #[test]
    fn confounder_point_event_overlap() {
        let t = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        let event = ConfounderEvent {
            id: 1,
            creator_id: 1,
            event_type: ConfounderType::Promotion,
            start_at: t("2026-01-10T00:00:00Z"),
            end_at: None,
            impact: ConfounderImpact::Medium,
            description: "one-off".into(),
        };
        assert!(event.overlaps(t("2026-01-05T00:00:00Z"), t("2026-01-15T00:00:00Z")));
        assert!(!event.overlaps(t("2026-01-11T00:00:00Z"), t("2026-01-15T00:00:00Z")));
    }

    #[test]
    fn confounder_ranged_event_overlap_boundaries() {
        let t = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        let event = ConfounderEvent {
            id: 1,
            creator_id: 1,
            event_type: ConfounderType::Promotion,
            start_at: t("2026-01-10T00:00:00Z"),
            end_at: Some(t("2026-01-15T00:00:00Z")),
            impact: ConfounderImpact::Medium,
            description: "promo week".into(),
        };
        // window ends exactly at event start -> overlaps (event_start <= w_end)
        assert!(event.overlaps(t("2026-01-01T00:00:00Z"), t("2026-01-10T00:00:00Z")));
        // window starts exactly at event end -> overlaps (event_end >= w_start)
        assert!(event.overlaps(t("2026-01-15T00:00:00Z"), t("2026-01-20T00:00:00Z")));
        // clearly before
        assert!(!event.overlaps(t("2025-12-01T00:00:00Z"), t("2025-12-31T00:00:00Z")));
        // clearly after
        assert!(!event.overlaps(t("2026-02-01T00:00:00Z"), t("2026-02-10T00:00:00Z")));
    }

    #[test]
    fn normalize_category_falls_back_to_other() {
        let taxonomy: Vec<String> = DEFAULT_TAXONOMY.iter().map(|s| s.to_string()).collect();
        assert_eq!(normalize_category("storytime", &taxonomy), "storytime");
        assert_eq!(normalize_category("cooking", &taxonomy), "other");
    }
}
