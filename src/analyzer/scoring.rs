//! Score aggregation for a whole run

use crate::config::RunConfig;
use crate::{
    CategoryScore, CriticalPenalty, Grade, Issue, Rule, ScoreReport, ScoringCategory, Severity,
};
use std::collections::{BTreeMap, BTreeSet};

/// Penalty points per issue by severity, charged to the issue's category.
const PENALTY_PER_ERROR: f64 = 15.0;
const PENALTY_PER_WARNING: f64 = 5.0;
const PENALTY_PER_INFO: f64 = 1.0;

/// Run-level penalties charged once to Assertions when the rule is present at all
const CRITICAL_PENALTIES: &[(Rule, f64)] = &[
    (Rule::MissingAssertions, 20.0),
    (Rule::TrivialAssertion, 10.0),
];

/// Calculator for run scores
pub struct ScoreCalculator;

impl ScoreCalculator {
    pub fn severity_penalty(severity: Severity) -> f64 {
        match severity {
            Severity::Error => PENALTY_PER_ERROR,
            Severity::Warning => PENALTY_PER_WARNING,
            Severity::Info => PENALTY_PER_INFO,
        }
    }

    /// Scoring groups with at least one enabled member analyzer
    pub fn enabled_categories(config: &RunConfig) -> BTreeSet<ScoringCategory> {
        ScoringCategory::ALL
            .into_iter()
            .filter(|group| group.members().iter().any(|c| config.is_enabled(*c)))
            .collect()
    }

    /// Score an issue multiset. The result does not depend on issue order.
    ///
    /// Weights of disabled groups are redistributed over the enabled ones;
    /// with nothing enabled the overall score is 100.
    pub fn aggregate(issues: &[Issue], enabled: &BTreeSet<ScoringCategory>) -> ScoreReport {
        let mut penalties: BTreeMap<ScoringCategory, f64> = BTreeMap::new();
        let mut categories: BTreeMap<ScoringCategory, CategoryScore> = ScoringCategory::ALL
            .into_iter()
            .map(|group| {
                (
                    group,
                    CategoryScore {
                        subtotal: 100.0,
                        weight: 0.0,
                        enabled: enabled.contains(&group),
                        issue_count: 0,
                        errors: 0,
                        warnings: 0,
                        info: 0,
                    },
                )
            })
            .collect();

        for issue in issues {
            // parsing, config and run diagnostics are never scored
            let Some(category) = issue.rule.category() else {
                continue;
            };
            let group = category.scoring_category();
            *penalties.entry(group).or_default() += Self::severity_penalty(issue.severity);
            if let Some(score) = categories.get_mut(&group) {
                score.issue_count += 1;
                match issue.severity {
                    Severity::Error => score.errors += 1,
                    Severity::Warning => score.warnings += 1,
                    Severity::Info => score.info += 1,
                }
            }
        }

        let mut critical_penalties = Vec::new();
        for (rule, amount) in CRITICAL_PENALTIES {
            if issues.iter().any(|i| i.rule == *rule) {
                *penalties.entry(ScoringCategory::Assertions).or_default() += amount;
                critical_penalties.push(CriticalPenalty {
                    rule: *rule,
                    amount: *amount,
                });
            }
        }

        let total_weight: u32 = enabled.iter().map(|g| g.weight_pct()).sum();
        let mut weighted = 0.0;
        for (group, score) in categories.iter_mut() {
            let penalty = penalties.get(group).copied().unwrap_or(0.0);
            score.subtotal = (100.0 - penalty).max(0.0);
            if score.enabled && total_weight > 0 {
                score.weight = f64::from(group.weight_pct()) / f64::from(total_weight);
                weighted += score.subtotal * score.weight;
            }
        }

        let overall = if total_weight == 0 {
            100.0
        } else {
            round2(weighted).clamp(0.0, 100.0)
        };

        ScoreReport {
            overall,
            grade: Grade::from_score(overall),
            categories,
            critical_penalties,
        }
    }

    /// Get a description of the grade
    pub fn grade_description(grade: Grade) -> &'static str {
        match grade {
            Grade::A => "Excellent - Tests are focused, isolated and assert meaningfully",
            Grade::B => "Good - Tests are solid but have room for improvement",
            Grade::C => "Fair - Tests work but need strengthening",
            Grade::D => "Poor - Tests have significant quality issues",
            Grade::F => "Failing - Tests need major improvements",
        }
    }

    /// Advice for the weakest enabled categories
    pub fn recommendations(report: &ScoreReport) -> Vec<String> {
        let mut recs = Vec::new();
        let weak = |group: ScoringCategory| {
            report
                .categories
                .get(&group)
                .is_some_and(|c| c.enabled && c.subtotal < 70.0)
        };

        if weak(ScoringCategory::Assertions) {
            recs.push(
                "Make every test assert on a concrete expected value; avoid assert True".to_string(),
            );
        }
        if weak(ScoringCategory::Clarity) {
            recs.push(
                "Use descriptive snake_case names and add messages to related assertions"
                    .to_string(),
            );
        }
        if weak(ScoringCategory::Isolation) {
            recs.push(
                "Use fixtures or monkeypatch instead of changing module or class state".to_string(),
            );
        }
        if weak(ScoringCategory::Simplicity) {
            recs.push("Split long or branching tests; prefer pytest.mark.parametrize".to_string());
        }
        if weak(ScoringCategory::Performance) {
            recs.push("Mock slow dependencies and remove sleeps from tests".to_string());
        }

        if recs.is_empty() {
            recs.push("Tests are in good shape!".to_string());
        }
        recs
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
