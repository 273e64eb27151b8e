pub mod scanners;

pub use scanners::{load_all, RawFinding, ScanReport, Tool};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highlights shown in the summary markdown.
const SUMMARY_HIGHLIGHTS: usize = 20;
/// Highlights written to `triage-high.md`.
const HIGH_LIST_LIMIT: usize = 50;

/// Common severity scale used to compare scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl ScanSeverity {
    pub const ORDER: [ScanSeverity; 5] = [
        ScanSeverity::Critical,
        ScanSeverity::High,
        ScanSeverity::Medium,
        ScanSeverity::Low,
        ScanSeverity::Info,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            ScanSeverity::Critical => "CRITICAL",
            ScanSeverity::High => "HIGH",
            ScanSeverity::Medium => "MEDIUM",
            ScanSeverity::Low => "LOW",
            ScanSeverity::Info => "INFO",
        }
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(self, ScanSeverity::Critical | ScanSeverity::High)
    }
}

/// Map a scanner's severity name onto the common scale.
///
/// Unknown or missing names count as MEDIUM.
pub fn normalize_severity(raw: Option<&str>) -> ScanSeverity {
    let Some(raw) = raw else {
        return ScanSeverity::Medium;
    };
    match raw.trim().to_uppercase().as_str() {
        "CRITICAL" | "ERROR" | "BLOCKER" => ScanSeverity::Critical,
        "HIGH" | "MAJOR" => ScanSeverity::High,
        "MEDIUM" | "WARNING" | "WARN" => ScanSeverity::Medium,
        "LOW" | "MINOR" => ScanSeverity::Low,
        "INFO" | "INFORMATIONAL" => ScanSeverity::Info,
        _ => ScanSeverity::Medium,
    }
}

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: ScanSeverity) {
        *self.slot(severity) += 1;
    }

    pub fn get(&self, severity: ScanSeverity) -> usize {
        match severity {
            ScanSeverity::Critical => self.critical,
            ScanSeverity::High => self.high,
            ScanSeverity::Medium => self.medium,
            ScanSeverity::Low => self.low,
            ScanSeverity::Info => self.info,
        }
    }

    pub fn merge(&mut self, other: &SeverityCounts) {
        for sev in ScanSeverity::ORDER {
            *self.slot(sev) += other.get(sev);
        }
    }

    pub fn total(&self) -> usize {
        ScanSeverity::ORDER.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, severity: ScanSeverity) -> &mut usize {
        match severity {
            ScanSeverity::Critical => &mut self.critical,
            ScanSeverity::High => &mut self.high,
            ScanSeverity::Medium => &mut self.medium,
            ScanSeverity::Low => &mut self.low,
            ScanSeverity::Info => &mut self.info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCounts {
    pub tool: Tool,
    pub found: bool,
    pub counts: SeverityCounts,
}

/// Aggregated view over every scanner report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageSummary {
    pub generated: DateTime<Utc>,
    pub by_tool: Vec<ToolCounts>,
    /// `[Tool] id: message` lines for HIGH/CRITICAL findings, in tool order.
    pub highlights: Vec<String>,
}

impl TriageSummary {
    pub fn from_reports(reports: &[ScanReport], generated: DateTime<Utc>) -> Self {
        let mut by_tool = Vec::with_capacity(reports.len());
        let mut highlights = Vec::new();

        for report in reports {
            let mut counts = SeverityCounts::default();
            for finding in &report.findings {
                let severity = normalize_severity(finding.severity.as_deref());
                counts.add(severity);
                // ZAP only reports which levels occur, nothing worth listing.
                if severity.is_high_risk() && report.tool != Tool::Zap {
                    highlights.push(format!("[{}] {}", report.tool.label(), finding.label));
                }
            }
            by_tool.push(ToolCounts {
                tool: report.tool,
                found: report.found,
                counts,
            });
        }

        Self {
            generated,
            by_tool,
            highlights,
        }
    }

    pub fn totals(&self) -> SeverityCounts {
        let mut totals = SeverityCounts::default();
        for tool in &self.by_tool {
            totals.merge(&tool.counts);
        }
        totals
    }

    /// `triage-summary.md`
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# Security Triage Summary".to_string(),
            format!("**Generated:** {}", self.generated.format("%Y-%m-%d %H:%M:%S UTC")),
            String::new(),
            "| Tool | CRITICAL | HIGH | MEDIUM | LOW | INFO |".to_string(),
            "|------|----------|------|--------|-----|------|".to_string(),
        ];

        let mut rows: Vec<&ToolCounts> = self.by_tool.iter().collect();
        rows.sort_by_key(|t| t.tool.label());
        for row in rows {
            let cells: Vec<String> = ScanSeverity::ORDER
                .iter()
                .map(|s| row.counts.get(*s).to_string())
                .collect();
            lines.push(format!("| {} | {} |", row.tool.label(), cells.join(" | ")));
        }

        let totals = self.totals();
        lines.push(String::new());
        lines.push("## Totals".to_string());
        for sev in ScanSeverity::ORDER {
            lines.push(format!("- {}: **{}**", sev.symbol(), totals.get(sev)));
        }
        lines.push(String::new());
        lines.push("## High-Risk Highlights".to_string());
        if self.highlights.is_empty() {
            lines.push("- No HIGH/CRITICAL items found.".to_string());
        } else {
            lines.extend(
                self.highlights
                    .iter()
                    .take(SUMMARY_HIGHLIGHTS)
                    .map(|h| format!("- {}", h)),
            );
        }

        lines.join("\n") + "\n"
    }

    /// `triage-summary.json`: totals keyed by lower-case severity.
    pub fn totals_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.totals()).map(|s| s + "\n")
    }

    /// `triage-high.md`
    pub fn highs_markdown(&self) -> String {
        let mut out = String::from("# High/Critical Findings\n\n");
        if self.highlights.is_empty() {
            out.push_str("- None\n");
        } else {
            for h in self.highlights.iter().take(HIGH_LIST_LIMIT) {
                out.push_str(&format!("- {}\n", h));
            }
        }
        out
    }
}

/// Read every scanner report under `dir` and aggregate them.
pub fn triage(dir: &Path, generated: DateTime<Utc>) -> TriageSummary {
    TriageSummary::from_reports(&load_all(dir), generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 10, 1, 23, 45).unwrap()
    }

    fn report(tool: Tool, severities: &[Option<&str>]) -> ScanReport {
        ScanReport {
            tool,
            found: true,
            findings: severities
                .iter()
                .enumerate()
                .map(|(i, s)| RawFinding {
                    severity: s.map(String::from),
                    label: format!("R{}: issue", i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_normalize_severity_table() {
        let cases = [
            (Some("critical"), ScanSeverity::Critical),
            (Some("ERROR"), ScanSeverity::Critical),
            (Some("blocker"), ScanSeverity::Critical),
            (Some("MAJOR"), ScanSeverity::High),
            (Some("Warning"), ScanSeverity::Medium),
            (Some("WARN"), ScanSeverity::Medium),
            (Some("MINOR"), ScanSeverity::Low),
            (Some("INFORMATIONAL"), ScanSeverity::Info),
            (Some("UNKNOWN"), ScanSeverity::Medium),
            (Some(""), ScanSeverity::Medium),
            (None, ScanSeverity::Medium),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_severity(raw), expected, "{:?}", raw);
        }
    }

    #[test]
    fn test_summary_counts_and_highlights() {
        let reports = vec![
            report(Tool::Bandit, &[Some("HIGH"), Some("LOW")]),
            report(Tool::Semgrep, &[Some("ERROR"), Some("WARNING")]),
            ScanReport::missing(Tool::PipAudit),
            report(Tool::Trivy, &[Some("CRITICAL"), Some("UNKNOWN")]),
            report(Tool::Zap, &[Some("HIGH")]),
        ];
        let summary = TriageSummary::from_reports(&reports, at());
        let totals = summary.totals();

        assert_eq!(totals.critical, 2);
        assert_eq!(totals.high, 2);
        assert_eq!(totals.medium, 2);
        assert_eq!(totals.low, 1);
        assert_eq!(totals.total(), 7);
        assert_eq!(
            summary.highlights,
            vec!["[Bandit] R0: issue", "[Semgrep] R0: issue", "[Trivy] R0: issue"]
        );
        assert_eq!(summary.by_tool.len(), 5);
    }

    #[test]
    fn test_markdown_rows_sorted_and_empty_highlights() {
        let reports: Vec<ScanReport> = Tool::ALL.iter().map(|t| ScanReport::missing(*t)).collect();
        let summary = TriageSummary::from_reports(&reports, at());
        let md = summary.to_markdown();

        assert!(md.contains("**Generated:** 2025-10-10 01:23:45 UTC"));
        let bandit = md.find("| Bandit |").unwrap();
        let zap = md.find("| ZAP |").unwrap();
        let pip = md.find("| pip-audit |").unwrap();
        assert!(bandit < zap && zap < pip);
        assert!(md.contains("- No HIGH/CRITICAL items found."));
        assert_eq!(summary.highs_markdown(), "# High/Critical Findings\n\n- None\n");
    }

    #[test]
    fn test_totals_json_uses_lowercase_keys() {
        let summary = TriageSummary::from_reports(&[report(Tool::Bandit, &[Some("HIGH")])], at());
        let json: serde_json::Value = serde_json::from_str(&summary.totals_json().unwrap()).unwrap();
        assert_eq!(json["high"], 1);
        assert_eq!(json["critical"], 0);
    }

    #[test]
    fn test_highlight_limits() {
        let many: Vec<Option<&str>> = vec![Some("HIGH"); 60];
        let summary = TriageSummary::from_reports(&[report(Tool::Trivy, &many)], at());
        let md = summary.to_markdown();
        let listed = md.lines().filter(|l| l.starts_with("- [Trivy]")).count();
        assert_eq!(listed, SUMMARY_HIGHLIGHTS);
        let highs = summary.highs_markdown();
        assert_eq!(highs.lines().filter(|l| l.starts_with("- ")).count(), HIGH_LIST_LIMIT);
    }
}
