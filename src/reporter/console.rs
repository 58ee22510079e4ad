//! Console reporter with colored output

use crate::analyzer::scoring::ScoreCalculator;
use crate::{Grade, Issue, ReviewReport, Severity};
use colored::{ColoredString, Colorize};
use std::fmt::Write;

/// Info issues per file shown before collapsing (unless verbose)
const MAX_INFO_SHOWN: usize = 5;

/// Reporter for terminal output
pub struct ConsoleReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
}

impl ConsoleReporter {
    /// Create a new console reporter
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    /// Disable colors
    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Print the full report to stdout
    pub fn report(&self, report: &ReviewReport) {
        print!("{}", self.render(report));
    }

    /// Print only the score line
    pub fn report_quiet(&self, report: &ReviewReport) {
        println!("{}", self.render_quiet(report));
    }

    pub fn render_quiet(&self, report: &ReviewReport) -> String {
        format!(
            "{:.2} ({}) - {} tests, {} issues",
            report.score.overall,
            self.paint(self.colorize_grade(report.score.grade)),
            report.summary.tests_analyzed,
            report.summary.total_issues
        )
    }

    /// Render the full report
    pub fn render(&self, report: &ReviewReport) -> String {
        let mut out = String::new();
        self.write_header(&mut out, report);
        self.write_score(&mut out, report);
        self.write_categories(&mut out, report);
        self.write_issues(&mut out, report);
        self.write_recommendations(&mut out, report);
        self.write_verdict(&mut out, report);
        out
    }

    fn write_header(&self, out: &mut String, report: &ReviewReport) {
        let summary = &report.summary;
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.paint("📊 Test Quality Review".bold()));
        let _ = write!(
            out,
            "   Files: {} | Tests: {}",
            summary.files_analyzed, summary.tests_analyzed
        );
        if summary.skipped_review > 0 {
            let _ = write!(out, " | Skipped review: {}", summary.skipped_review);
        }
        let _ = writeln!(
            out,
            " | Issues: {} ({} errors, {} warnings, {} info)",
            summary.total_issues, summary.errors, summary.warnings, summary.info
        );
        let _ = writeln!(out);
    }

    fn write_score(&self, out: &mut String, report: &ReviewReport) {
        let grade = self.paint(self.colorize_grade(report.score.grade).bold());
        let _ = writeln!(
            out,
            "   Score: {} {}",
            self.create_score_bar(report.score.overall),
            grade
        );
        let _ = writeln!(
            out,
            "   {}",
            self.paint(ScoreCalculator::grade_description(report.score.grade).dimmed())
        );
        let _ = writeln!(out);
    }

    fn write_categories(&self, out: &mut String, report: &ReviewReport) {
        let _ = writeln!(out, "   {}", self.paint("Categories:".bold()));
        for (group, score) in &report.score.categories {
            if !score.enabled {
                let _ = writeln!(
                    out,
                    "   {} {:>6} {}",
                    self.create_mini_bar(0.0),
                    "-",
                    self.paint(format!("{} (disabled)", group).dimmed())
                );
                continue;
            }
            let value = format!("{:>6.1}", score.subtotal);
            let value = if score.subtotal >= 80.0 {
                value.green()
            } else if score.subtotal >= 60.0 {
                value.yellow()
            } else {
                value.red()
            };
            let plural = if score.issue_count == 1 { "" } else { "s" };
            let _ = writeln!(
                out,
                "   {} {} {} (weight {:.0}%, {} issue{})",
                self.create_mini_bar(score.subtotal),
                self.paint(value),
                group,
                score.weight * 100.0,
                score.issue_count,
                plural
            );
        }
        for penalty in &report.score.critical_penalties {
            let _ = writeln!(
                out,
                "   {} -{} critical penalty for {}",
                self.paint("!".red().bold()),
                penalty.amount,
                penalty.rule
            );
        }
        let _ = writeln!(out);
    }

    fn write_issues(&self, out: &mut String, report: &ReviewReport) {
        if report.issues.is_empty() {
            return;
        }
        let _ = writeln!(out, "   {}", self.paint("Issues Found:".bold()));

        // Run-level diagnostics first (config, no tests), then per file
        let run_level: Vec<&Issue> = report.issues.iter().filter(|i| i.file.is_empty()).collect();
        for issue in run_level {
            self.write_issue(out, issue);
        }

        for file in report.files() {
            let issues: Vec<&Issue> = report.issues_for_file(file).collect();
            if issues.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "   {}", self.paint(file.underline()));

            let by_severity = |severity: Severity| {
                issues
                    .iter()
                    .copied()
                    .filter(move |i| i.severity == severity)
            };
            for issue in by_severity(Severity::Error).chain(by_severity(Severity::Warning)) {
                self.write_issue(out, issue);
            }

            let infos: Vec<&Issue> = by_severity(Severity::Info).collect();
            if self.verbose || infos.len() <= MAX_INFO_SHOWN {
                for issue in infos {
                    self.write_issue(out, issue);
                }
            } else {
                let _ = writeln!(
                    out,
                    "   {} {} additional suggestions (use --verbose to show)",
                    self.paint("ℹ".blue()),
                    infos.len()
                );
            }
        }
        let _ = writeln!(out);
    }

    fn write_issue(&self, out: &mut String, issue: &Issue) {
        let icon = match issue.severity {
            Severity::Error => "✗".red(),
            Severity::Warning => "⚠".yellow(),
            Severity::Info => "ℹ".blue(),
        };
        let location = format!("L{}", issue.line);
        let _ = write!(
            out,
            "   {} {} [{}] {}",
            self.paint(icon),
            self.paint(location.dimmed()),
            self.paint(issue.rule.id().dimmed()),
            issue.message
        );
        if let Some(test) = &issue.test {
            let _ = write!(out, " {}", self.paint(format!("({})", test).dimmed()));
        }
        let _ = writeln!(out);

        if self.verbose {
            let note = match issue.rule.category() {
                Some(category) => format!("affects category: {}", category.scoring_category()),
                None => "not scored".to_string(),
            };
            let _ = writeln!(out, "       {} {}", self.paint("↳".dimmed()), self.paint(note.dimmed()));
        }

        if let Some(suggestion) = &issue.suggestion {
            let _ = writeln!(
                out,
                "       {} {}",
                self.paint("→".dimmed()),
                self.paint(suggestion.italic())
            );
        }
    }

    fn write_recommendations(&self, out: &mut String, report: &ReviewReport) {
        if report.score.overall >= 90.0 {
            return;
        }
        let _ = writeln!(out, "   {}", self.paint("Recommendations:".bold()));
        for rec in ScoreCalculator::recommendations(&report.score).iter().take(3) {
            let _ = writeln!(out, "   {} {}", self.paint("→".cyan()), rec);
        }
        let _ = writeln!(out);
    }

    fn write_verdict(&self, out: &mut String, report: &ReviewReport) {
        if report.verdict.passed {
            let _ = writeln!(out, "   {}", self.paint("PASSED".green().bold()));
        } else {
            let _ = writeln!(out, "   {}", self.paint("FAILED".red().bold()));
            for reason in &report.verdict.reasons {
                let _ = writeln!(out, "   {} {}", self.paint("✗".red()), reason);
            }
        }
    }

    fn paint(&self, s: ColoredString) -> String {
        if self.use_colors {
            s.to_string()
        } else {
            s.clear().to_string()
        }
    }

    fn colorize_grade(&self, grade: Grade) -> ColoredString {
        let s = grade.to_string();
        match grade {
            Grade::A => s.green().bold(),
            Grade::B => s.green(),
            Grade::C => s.yellow(),
            Grade::D => s.red(),
            Grade::F => s.red().bold(),
        }
    }

    fn create_score_bar(&self, score: f64) -> String {
        let filled = ((score.clamp(0.0, 100.0) * 20.0) / 100.0) as usize;
        let empty = 20 - filled;

        let bar = format!("[{}{}] {:>6.2}", "█".repeat(filled), "░".repeat(empty), score);

        if score >= 80.0 {
            self.paint(bar.green())
        } else if score >= 60.0 {
            self.paint(bar.yellow())
        } else {
            self.paint(bar.red())
        }
    }

    fn create_mini_bar(&self, subtotal: f64) -> String {
        let filled = ((subtotal.clamp(0.0, 100.0) * 10.0) / 100.0) as usize;
        let empty = 10 - filled;
        format!("[{}{}]", "▓".repeat(filled), "░".repeat(empty))
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReviewEngine, RunConfig};

    fn report(min_score: f64) -> ReviewReport {
        let config = RunConfig {
            min_score,
            ..RunConfig::default()
        };
        ReviewEngine::new(config).review_sources(&[
            ("tests/test_user.py", "def test_saves_user_record():\n    return\n"),
            (
                "tests/test_math.py",
                "def test_addition_returns_sum():\n    assert add(1, 0) == 1, 'sum'\n",
            ),
        ])
    }

    #[test]
    fn test_render_plain_text() {
        let text = ConsoleReporter::new().without_colors().render(&report(0.0));
        assert!(!text.contains('\u{1b}'));
        assert!(text.contains("Files: 2 | Tests: 2"));
        assert!(text.contains("89.50"));
        assert!(text.contains("tests/test_user.py"));
        assert!(text.contains("[assertions.missing]"));
        assert!(text.contains("(test_saves_user_record)"));
        assert!(text.contains("-20 critical penalty for assertions.missing"));
        assert!(text.contains("Assertions (weight 30%, 1 issue)"));
        assert!(text.contains("PASSED"));
        // No issues in the clean file, so it gets no section
        assert!(!text.contains("tests/test_math.py"));
    }

    #[test]
    fn test_render_failed_verdict() {
        let text = ConsoleReporter::new().without_colors().render(&report(95.0));
        assert!(text.contains("FAILED"));
        assert!(text.contains("below min_score 95"));
    }

    #[test]
    fn test_verbose_shows_category() {
        let text = ConsoleReporter::new()
            .without_colors()
            .verbose()
            .render(&report(0.0));
        assert!(text.contains("affects category: Assertions"));
    }

    #[test]
    fn test_quiet_line() {
        let line = ConsoleReporter::new().without_colors().render_quiet(&report(0.0));
        assert_eq!(line, "89.50 (B) - 2 tests, 1 issues");
    }

    #[test]
    fn test_disabled_category_marked() {
        let config = RunConfig::default().with_only([crate::Category::Assertions]);
        let report = ReviewEngine::new(config).review_sources(&[(
            "tests/test_math.py",
            "def test_addition_returns_sum():\n    assert add(1, 0) == 1\n",
        )]);
        let text = ConsoleReporter::new().without_colors().render(&report);
        assert!(text.contains("Clarity (disabled)"));
        assert!(text.contains("Assertions (weight 100%, 0 issues)"));
    }
}
