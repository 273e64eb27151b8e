use crate::gate::GateReport;
use crate::register::Severity;
use crate::triage::{ScanReport, Tool};
use chrono::{DateTime, Utc};

fn section(title: &str, body: &str) -> String {
    format!("## {}\n\n{}\n", title, body)
}

fn find(reports: &[ScanReport], tool: Tool) -> ScanReport {
    reports
        .iter()
        .find(|r| r.tool == tool)
        .cloned()
        .unwrap_or_else(|| ScanReport::missing(tool))
}

/// Render `security_summary.md`.
///
/// `gate` is `None` when the register file was not found; `register_path` is
/// shown as the source either way.
pub fn security_summary(
    gate: Option<&GateReport>,
    register_path: &str,
    reports: &[ScanReport],
    generated: DateTime<Utc>,
) -> String {
    let mut md = vec![format!(
        "# Security Summary\nGenerated: **{}**\n",
        generated.format("%Y-%m-%d %H:%M UTC")
    )];

    let mut threat_lines = match gate {
        Some(report) => vec![
            format!("- Source: `{}`", register_path),
            format!("- Open **Critical**: **{}**", report.open_count(Severity::Critical)),
            format!("- Open **High**: **{}**", report.open_count(Severity::High)),
        ],
        None => vec![
            format!("- Source: `{} (not found)`", register_path),
            "- Open **Critical**: **0**".to_string(),
            "- Open **High**: **0**".to_string(),
        ],
    };
    if let Some(report) = gate.filter(|r| !r.violations.is_empty()) {
        let items: Vec<String> = report
            .violations
            .iter()
            .map(|v| {
                format!(
                    "- [{}] {} (Risk: {}) – **{}**",
                    v.id,
                    v.title,
                    v.severity.symbol(),
                    v.status.label().to_uppercase()
                )
            })
            .collect();
        threat_lines.push(format!("\n**Open High/Critical Items:**\n{}", items.join("\n")));
    }
    md.push(section("Threat Model", &threat_lines.join("\n")));

    let bandit = find(reports, Tool::Bandit);
    let semgrep = find(reports, Tool::Semgrep);
    md.push(section(
        "SAST (Bandit & Semgrep)",
        &[
            format!(
                "**Bandit** `{}` → HIGH: **{}**, MED: **{}**, LOW: **{}**",
                bandit.source(),
                bandit.raw_count("HIGH"),
                bandit.raw_count("MEDIUM"),
                bandit.raw_count("LOW"),
            ),
            format!(
                "**Semgrep** `{}` → ERROR: **{}**, WARNING: **{}**, INFO: **{}**",
                semgrep.source(),
                semgrep.raw_count("ERROR"),
                semgrep.raw_count("WARNING"),
                semgrep.raw_count("INFO"),
            ),
        ]
        .join("\n"),
    ));

    let pip = find(reports, Tool::PipAudit);
    md.push(section(
        "Dependencies (SCA - pip-audit)",
        &format!(
            "`{}` → total vulnerable findings: **{}**",
            pip.source(),
            pip.findings.len()
        ),
    ));

    let trivy = find(reports, Tool::Trivy);
    md.push(section(
        "Container (Trivy)",
        &format!(
            "`{}` → CRITICAL: **{}**, HIGH: **{}**, MEDIUM: **{}**, LOW: **{}**",
            trivy.source(),
            trivy.raw_count("CRITICAL"),
            trivy.raw_count("HIGH"),
            trivy.raw_count("MEDIUM"),
            trivy.raw_count("LOW"),
        ),
    ));

    md.push(section(
        "Notes",
        "- Values are best-effort if reports were not produced in this workflow.\n\
         - Empty or missing files are reported as \"(not found)\".\n\
         - Treat this report as a governance view; gates remain in their own workflows.",
    ));

    md.join("\n").trim().to_string() + "\n"
}

/// Header and threat-model section only, for the CI job summary.
pub fn step_summary_excerpt(summary: &str) -> &str {
    summary.split("## SAST").next().unwrap_or(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatePolicy;
    use crate::gate::evaluate;
    use crate::register::parse_register;
    use crate::triage::RawFinding;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 10, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_summary_with_open_items() {
        let register = parse_register(
            "- {id: T1, title: SQL injection, severity: Critical, status: Open}\n- {id: T2, title: XSS, severity: High, status: Open}",
            "threat_model/threats.yml".into(),
        )
        .unwrap();
        let gate = evaluate(&register, &GatePolicy::default());
        let reports = vec![ScanReport {
            tool: Tool::Trivy,
            found: true,
            findings: vec![RawFinding {
                severity: Some("CRITICAL".into()),
                label: "CVE-1 in openssl".into(),
            }],
        }];

        let md = security_summary(Some(&gate), "threat_model/threats.yml", &reports, at());

        assert!(md.starts_with("# Security Summary\nGenerated: **2025-10-10 08:30 UTC**"));
        assert!(md.contains("- Open **Critical**: **1**"));
        assert!(md.contains("- Open **High**: **1**"));
        assert!(md.contains("- [T1] SQL injection (Risk: CRITICAL) – **OPEN**"));
        assert!(md.contains("`trivy-report.json` → CRITICAL: **1**"));
        assert!(md.contains("`bandit-report.json (not found)` → HIGH: **0**"));
        assert!(md.ends_with("workflows.\n"));
    }

    #[test]
    fn test_summary_without_register() {
        let md = security_summary(None, "threat_model/threats.yml", &[], at());
        assert!(md.contains("- Source: `threat_model/threats.yml (not found)`"));
        assert!(!md.contains("Open High/Critical Items"));
    }

    #[test]
    fn test_step_summary_excerpt_stops_before_sast() {
        let md = security_summary(None, "threats.yml", &[], at());
        let excerpt = step_summary_excerpt(&md);
        assert!(excerpt.contains("## Threat Model"));
        assert!(!excerpt.contains("Bandit"));
    }
}
