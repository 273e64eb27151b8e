pub mod sarif;

pub use sarif::{to_sarif, to_sarif_all};

use crate::gate::{GateReport, GateViolation};
use crate::register::Severity;

/// One bullet per blocking threat, as shown in the text and markdown views.
pub fn violation_line(violation: &GateViolation) -> String {
    format!(
        "[{}] {} (Risk: {}) – Status: {}",
        violation.id,
        violation.title,
        violation.severity.label(),
        violation.status.label()
    )
}

/// Markdown threat-model section for a gate report.
pub fn to_markdown(report: &GateReport) -> String {
    let mut md = String::new();
    md.push_str(&format!("- Source: `{}`\n", report.source_file));
    md.push_str(&format!(
        "- Open **Critical**: **{}**\n",
        report.open_count(Severity::Critical)
    ));
    md.push_str(&format!(
        "- Open **High**: **{}**\n",
        report.open_count(Severity::High)
    ));
    md.push_str(&format!(
        "- Gate: **{}**\n",
        if report.passed { "PASS" } else { "FAIL" }
    ));

    if !report.violations.is_empty() {
        md.push_str("\n**Blocking items:**\n");
        for v in &report.violations {
            md.push_str(&format!(
                "- [{}] {} (Risk: {}) – **{}**\n",
                v.id,
                v.title,
                v.severity.label(),
                v.status.label()
            ));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatePolicy;
    use crate::gate::evaluate;
    use crate::register::parse_register;

    #[test]
    fn test_markdown_lists_blocking_items() {
        let register = parse_register(
            "- {id: T1, title: SQL injection, severity: Critical, status: Open}\n- {id: T2, title: Weak TLS, severity: High, status: Mitigated}",
            "threats.yml".into(),
        )
        .unwrap();
        let md = to_markdown(&evaluate(&register, &GatePolicy::default()));

        assert!(md.contains("- Open **Critical**: **1**"));
        assert!(md.contains("- Open **High**: **0**"));
        assert!(md.contains("- Gate: **FAIL**"));
        assert!(md.contains("- [T1] SQL injection (Risk: Critical) – **Open**"));
        assert!(!md.contains("T2"));
    }

    #[test]
    fn test_violation_line() {
        let register = parse_register(
            "- {id: T1, title: SQL injection, severity: critical, status: open}",
            "threats.yml".into(),
        )
        .unwrap();
        let report = evaluate(&register, &GatePolicy::default());
        assert_eq!(
            violation_line(&report.violations[0]),
            "[T1] SQL injection (Risk: Critical) – Status: Open"
        );
    }
}
