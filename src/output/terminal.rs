// Colored terminal output for recommendation reports.
//
// This module handles all terminal-specific formatting: colors, tables,
// section headers. main.rs's analyze command delegates here.

use colored::Colorize;

use crate::recommendation::{Action, CategoryRecommendation, RecommendationReport};

/// Display a full recommendation report: confident picks, hypotheses,
/// insufficient-data categories, and the weekly posting plan.
pub fn display_recommendation_report(creator_name: &str, days: i64, report: &RecommendationReport) {
    println!(
        "\n{}",
        format!("=== Attribution Report: {creator_name} (last {days}d) ===").bold()
    );

    if report.has_confounders {
        println!(
            "{}",
            "  Confounder event(s) overlap this window — claims downgraded to hypothesis."
                .yellow()
        );
    }
    for note in &report.data_quality_notes {
        println!("  {}", note.dimmed());
    }

    println!("\n{}", "Confident".green().bold());
    if report.confident.is_empty() {
        println!("  {}", "(none — insufficient evidence this period)".dimmed());
    } else {
        for rec in &report.confident {
            display_category_line(rec, "confident".green());
        }
    }

    println!("\n{}", "Hypothesis".yellow().bold());
    if report.hypothesis.is_empty() {
        println!("  {}", "(none)".dimmed());
    } else {
        for rec in &report.hypothesis {
            display_category_line(rec, "hypothesis".yellow());
        }
    }

    if !report.insufficient_data.is_empty() {
        println!("\n{}", "Insufficient data".dimmed().bold());
        for rec in &report.insufficient_data {
            if let CategoryRecommendation::InsufficientData { category, subs, reason, .. } = rec {
                println!("  {:<16} {}", category, format!("({reason}, {subs} subs)").dimmed());
            }
        }
    }

    println!("\n{}", "Weekly posting plan".bold());
    if report.weekly_plan.breakdown.is_empty() {
        println!("  {}", report.weekly_plan.rationale.dimmed());
        println!("  Total posts/week: {:.1} (unchanged)", report.weekly_plan.total_posts);
    } else {
        let mut entries: Vec<(&String, &f64)> = report.weekly_plan.breakdown.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (category, posts) in entries {
            println!("  {:<16} {:.1} posts/week", category, posts);
        }
        println!(
            "  {:<16} {:.1} posts/week",
            "Total".bold(),
            report.weekly_plan.total_posts
        );
        println!("  {}", report.weekly_plan.rationale.dimmed());
    }

    if let Some(top) = &report.top_performer {
        println!("\nTop performer: {}", top.green().bold());
    }
    if let Some(under) = &report.underperformer {
        println!("Underperformer: {}", under.red());
    }
}

fn display_category_line(rec: &CategoryRecommendation, tier_label: colored::ColoredString) {
    match rec {
        CategoryRecommendation::Confident {
            category,
            subs,
            lift_pct,
            action,
            confidence,
            suggested_posts_per_week,
            ..
        } => {
            println!(
                "  {:<16} {} subs, lift {:+.0}%, {} [{}]  -> {:.1} posts/week (score {:.2})",
                category,
                subs,
                lift_pct,
                colorize_action(*action),
                tier_label,
                suggested_posts_per_week,
                confidence,
            );
        }
        CategoryRecommendation::Hypothesis {
            category,
            subs,
            lift_pct,
            action,
            confidence,
            suggested_posts_per_week,
            reasons,
            ..
        } => {
            println!(
                "  {:<16} {} subs, lift {:+.0}%, {} [{}]  -> {:.1} posts/week (score {:.2})",
                category,
                subs,
                lift_pct,
                colorize_action(*action),
                tier_label,
                suggested_posts_per_week,
                confidence,
            );
            for reason in reasons {
                println!("      {}", reason.dimmed());
            }
        }
        CategoryRecommendation::InsufficientData { .. } => {}
    }
}

fn colorize_action(action: Action) -> colored::ColoredString {
    match action {
        Action::Increase => action.as_str().green(),
        Action::Decrease => action.as_str().red(),
        Action::Maintain => action.as_str().normal(),
        Action::Test => action.as_str().cyan(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn colorize_action_does_not_panic_on_any_variant() {
        for action in [Action::Increase, Action::Decrease, Action::Maintain, Action::Test] {
            let _ = colorize_action(action);
        }
    }

    #[test]
    fn display_recommendation_report_handles_empty_report() {
        let report = RecommendationReport {
            confident: Vec::new(),
            hypothesis: Vec::new(),
            insufficient_data: Vec::new(),
            weekly_plan: crate::recommendation::WeeklyPlan {
                total_posts: 0.0,
                breakdown: HashMap::new(),
                rationale: "no data".to_string(),
            },
            top_performer: None,
            underperformer: None,
            has_confounders: false,
            data_quality_notes: Vec::new(),
        };
        // Just confirm this doesn't panic on an empty/default report.
        display_recommendation_report("talent_1", 30, &report);
    }
}
