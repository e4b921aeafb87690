//! Console rendering of an analysis report.

use std::io::{self, Write};

use raincheck_protocol::{AnalysisResponse, Category};

const RULE_WIDTH: usize = 50;

/// Write the full report for `path` to `out`.
pub fn render(out: &mut impl Write, path: &str, report: &AnalysisResponse) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "📊 Code Analysis Report for {path}")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;

    writeln!(out)?;
    writeln!(out, "🏆 Overall Score: {:.1}/10", report.overall_score)?;
    writeln!(out, "{}", "-".repeat(30))?;

    for (name, category) in report.categories() {
        render_category(out, name, category)?;
    }

    if !report.suggestions.is_empty() {
        writeln!(out)?;
        writeln!(out, "💡 General Suggestions")?;
        writeln!(out, "{}", "-".repeat(20))?;
        for suggestion in &report.suggestions {
            writeln!(out, "• {suggestion}")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

fn render_category(out: &mut impl Write, name: &str, category: &Category) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} (Score: {:.1}/10)", name.to_uppercase(), category.score)?;
    writeln!(out, "{}", "-".repeat(name.len() + 15))?;

    if category.issues.is_empty() {
        return writeln!(out, "✓ No issues found");
    }

    for issue in &category.issues {
        writeln!(
            out,
            "{} [{}] {}",
            severity_marker(&issue.severity),
            issue.kind,
            issue.description
        )?;
        if issue.line > 0 {
            writeln!(out, "   Line: {}", issue.line)?;
        }
        if !issue.suggestion.is_empty() {
            writeln!(out, "   💡 Suggestion: {}", issue.suggestion)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn severity_marker(severity: &str) -> &'static str {
    match severity.to_ascii_lowercase().as_str() {
        "error" | "critical" | "high" => "🔴",
        "warning" | "medium" => "🟡",
        _ => "🔵",
    }
}

#[cfg(test)]
mod tests {
    use raincheck_protocol::Issue;

    use super::*;

    fn rendered(report: &AnalysisResponse) -> String {
        let mut buf = Vec::new();
        render(&mut buf, "src/lib.rs", report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn clean_report_lists_every_category() {
        let text = rendered(&AnalysisResponse {
            overall_score: 8.5,
            ..Default::default()
        });

        assert!(text.contains("📊 Code Analysis Report for src/lib.rs"));
        assert!(text.contains("🏆 Overall Score: 8.5/10"));
        for heading in ["SECURITY", "PERFORMANCE", "CODE QUALITY", "MAINTAINABILITY", "BEST PRACTICES"] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert_eq!(text.matches("✓ No issues found").count(), 5);
        assert!(!text.contains("General Suggestions"));
    }

    #[test]
    fn issues_show_marker_line_and_suggestion() {
        let mut report = AnalysisResponse::default();
        report.security.score = 3.0;
        report.security.issues = vec![
            Issue {
                severity: "ERROR".into(),
                kind: "Injection".into(),
                description: "query built from input".into(),
                line: 12,
                suggestion: "use bound parameters".into(),
            },
            Issue {
                severity: "info".into(),
                kind: "Style".into(),
                description: "long function".into(),
                line: 0,
                suggestion: String::new(),
            },
        ];
        report.suggestions = vec!["add tests".into()];

        let text = rendered(&report);
        assert!(text.contains("SECURITY (Score: 3.0/10)"));
        assert!(text.contains("🔴 [Injection] query built from input"));
        assert!(text.contains("   Line: 12"));
        assert!(text.contains("   💡 Suggestion: use bound parameters"));
        assert!(text.contains("🔵 [Style] long function"));
        assert_eq!(text.matches("Line:").count(), 1);
        assert!(text.contains("• add tests"));
    }

    #[test]
    fn severity_markers() {
        assert_eq!(severity_marker("WARNING"), "🟡");
        assert_eq!(severity_marker("medium"), "🟡");
        assert_eq!(severity_marker("High"), "🔴");
        assert_eq!(severity_marker("low"), "🔵");
    }
}
