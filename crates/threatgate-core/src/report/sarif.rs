use crate::gate::{GateReport, GateViolation};
use crate::register::Severity;
use serde_json::json;

const UNCATEGORIZED: &str = "TG000";

/// Generate a SARIF 2.1.0 log from a gate report.
///
/// One rule per STRIDE category that has violations, one `error` result per
/// blocking threat. Code-scanning dashboards pick the results up as alerts
/// against the register file.
pub fn to_sarif(report: &GateReport) -> serde_json::Value {
    to_sarif_all(std::slice::from_ref(report))
}

/// A single SARIF run covering several registers.
pub fn to_sarif_all(reports: &[GateReport]) -> serde_json::Value {
    let mut rule_ids: Vec<&'static str> = reports
        .iter()
        .flat_map(|r| r.violations.iter())
        .map(rule_id)
        .collect();
    rule_ids.sort_unstable();
    rule_ids.dedup();

    let rules: Vec<serde_json::Value> = rule_ids.iter().map(|id| sarif_rule(id)).collect();

    let results: Vec<serde_json::Value> = reports
        .iter()
        .flat_map(|r| r.violations.iter().map(move |v| sarif_result(v, &r.source_file)))
        .collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "threatgate",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": rules,
                }
            },
            "results": results,
            "invocations": [{
                "executionSuccessful": true,
                "toolExecutionNotifications": [],
            }]
        }]
    })
}

fn rule_id(violation: &GateViolation) -> &'static str {
    use crate::register::Stride::*;
    match violation.stride {
        Some(Spoofing) => "TG001",
        Some(Tampering) => "TG002",
        Some(Repudiation) => "TG003",
        Some(InformationDisclosure) => "TG004",
        Some(DenialOfService) => "TG005",
        Some(ElevationOfPrivilege) => "TG006",
        None => UNCATEGORIZED,
    }
}

fn rule_name(id: &str) -> &'static str {
    match id {
        "TG001" => "Spoofing",
        "TG002" => "Tampering",
        "TG003" => "Repudiation",
        "TG004" => "Information Disclosure",
        "TG005" => "Denial of Service",
        "TG006" => "Elevation of Privilege",
        _ => "Uncategorized",
    }
}

fn sarif_rule(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": rule_name(id),
        "shortDescription": {
            "text": format!("Open high-risk threat: {}", rule_name(id)),
        },
        "defaultConfiguration": {
            "level": "error",
        },
    })
}

fn sarif_result(violation: &GateViolation, source_file: &str) -> serde_json::Value {
    let security_severity = match violation.severity {
        Severity::Critical => "9.5",
        Severity::High => "8.0",
        Severity::Medium => "5.5",
        Severity::Low => "2.0",
    };

    json!({
        "ruleId": rule_id(violation),
        "level": "error",
        "message": {
            "text": format!(
                "[{}] {} (Risk: {}) is still {}",
                violation.id,
                violation.title,
                violation.severity.label(),
                violation.status.label()
            ),
        },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": {
                    "uri": source_file,
                },
                "region": {
                    "startLine": 1,
                }
            }
        }],
        "partialFingerprints": {
            "threatId": violation.id,
        },
        "properties": {
            "security-severity": security_severity,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatePolicy;
    use crate::gate::evaluate;
    use crate::register::parse_register;

    #[test]
    fn test_sarif_output_is_valid() {
        let yaml = r#"
- {id: T1, title: SQL injection, stride: Tampering, severity: Critical, status: Open}
- {id: T2, title: Cookie theft, stride: Spoofing, severity: High, status: Open}
- {id: T3, title: Session fixation, stride: Spoofing, severity: High, status: Open}
- {id: T4, title: No audit log, severity: High, status: Open}
"#;
        let register = parse_register(yaml, "threats.yml".into()).unwrap();
        let sarif = to_sarif(&evaluate(&register, &GatePolicy::default()));

        assert_eq!(sarif["version"], "2.1.0");
        let runs = sarif["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["tool"]["driver"]["name"], "threatgate");

        let rules = runs[0]["tool"]["driver"]["rules"].as_array().unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["TG000", "TG001", "TG002"]);

        let results = runs[0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0]["ruleId"], "TG002");
        assert_eq!(results[0]["partialFingerprints"]["threatId"], "T1");
    }

    #[test]
    fn test_passing_report_has_no_results() {
        let register = parse_register("[]", "threats.yml".into()).unwrap();
        let sarif = to_sarif(&evaluate(&register, &GatePolicy::default()));
        assert!(sarif["runs"][0]["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_multiple_registers_share_one_run() {
        let a = parse_register("- {id: A1, stride: R, severity: High, status: Open}", "a.yml".into()).unwrap();
        let b = parse_register("- {id: B1, stride: R, severity: Critical, status: Open}", "b.yml".into()).unwrap();
        let policy = GatePolicy::default();
        let sarif = to_sarif_all(&[evaluate(&a, &policy), evaluate(&b, &policy)]);

        let run = &sarif["runs"][0];
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 1);
        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"], "b.yml");
    }
}
